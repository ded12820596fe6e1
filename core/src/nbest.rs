//! Bounded, deduplicated n-best list: keeps the `max_size` highest-scoring
//! distinct documents a search run has visited.

use std::rc::Rc;

use crate::document::{document_state_hash, DocumentState};
use crate::random::Random;

/// Dedup is by document *value* (segmentation equality, see
/// `DocumentState::eq`), not by identity: two distinct searches that land on
/// the same translation only occupy one slot.
pub struct NbestStorage {
    max_size: usize,
    nbest: Vec<Rc<DocumentState>>,
    best_score: f32,
}

impl NbestStorage {
    pub fn new(max_size: usize) -> Self {
        NbestStorage {
            max_size,
            nbest: Vec::with_capacity(max_size + 1),
            best_score: f32::NEG_INFINITY,
        }
    }

    fn lowest_score(&self) -> f32 {
        self.nbest.iter().map(|d| d.score()).fold(f32::INFINITY, f32::min)
    }

    pub fn best_score(&self) -> f32 {
        self.best_score
    }

    pub fn lowest_score_in_list(&self) -> f32 {
        if self.nbest.is_empty() {
            f32::NEG_INFINITY
        } else {
            self.lowest_score()
        }
    }

    /// Try to add `doc`; returns whether it was actually added (rejected if
    /// it can't beat the current worst entry once the list is full, or if an
    /// equal document is already present).
    pub fn offer(&mut self, doc: &DocumentState) -> bool {
        let new_score = doc.score();
        if self.nbest.len() >= self.max_size && new_score <= self.lowest_score() {
            return false;
        }

        let new_hash = document_state_hash(doc);
        if self
            .nbest
            .iter()
            .any(|d| document_state_hash(d) == new_hash && d.as_ref() == doc)
        {
            return false;
        }

        if new_score > self.best_score {
            self.best_score = new_score;
        }

        self.nbest.push(Rc::new(doc.clone()));

        if self.nbest.len() > self.max_size {
            let (worst, _) = self
                .nbest
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.score().total_cmp(&b.1.score()))
                .unwrap();
            self.nbest.remove(worst);
        }

        true
    }

    pub fn pick_random(&self, rnd: &Random) -> Rc<DocumentState> {
        assert!(!self.nbest.is_empty(), "pick_random on an empty n-best list");
        let n = rnd.draw_from_range(self.nbest.len() as u32) as usize;
        Rc::clone(&self.nbest[n])
    }

    pub fn best_document_state(&self) -> &Rc<DocumentState> {
        self.nbest
            .iter()
            .max_by(|a, b| a.score().total_cmp(&b.score()))
            .expect("best_document_state on an empty n-best list")
    }

    /// A copy of the n-best list, sorted best-score-first.
    pub fn copy_nbest_list(&self) -> Vec<Rc<DocumentState>> {
        let mut v = self.nbest.clone();
        v.sort_by(|a, b| b.score().total_cmp(&a.score()));
        v
    }

    pub fn len(&self) -> usize {
        self.nbest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nbest.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rc<DocumentState>> {
        self.nbest.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DecoderRuntime;
    use crate::phrase::{AnchoredPhrasePair, CoverageBitmap, PhrasePairData, PhrasePairInterner, WordAlignment};
    use crate::phrase_collection::PhrasePairCollection;
    use crate::types::Scores;
    use std::rc::Rc as StdRc;

    fn runtime() -> StdRc<DecoderRuntime> {
        StdRc::new(DecoderRuntime {
            feature_functions: Vec::new(),
            feature_weights: Vec::new(),
            random: Random::seeded(1),
        })
    }

    /// A single one-word sentence translated as `target` — varying `target`
    /// across calls gives distinct, unequal `DocumentState`s.
    fn doc_with_translation(target: &str) -> DocumentState {
        let interner = PhrasePairInterner::new();
        let data = PhrasePairData::new(
            vec!["x".into()],
            vec![target.to_string()],
            Vec::new(),
            WordAlignment::new(1, 1),
            Scores::zeros(0),
        );
        let anchored = AnchoredPhrasePair::new(CoverageBitmap::from_range(1, 0, 1), interner.intern(data));
        let random = Random::seeded(2);
        let pt = StdRc::new(PhrasePairCollection::new(1, random));
        DocumentState::new(runtime(), vec![pt], vec![vec![anchored]])
    }

    #[test]
    fn offer_respects_capacity() {
        let mut nb = NbestStorage::new(2);
        let a = doc_with_translation("A");
        let b = doc_with_translation("B");
        let c = doc_with_translation("C");
        assert!(nb.offer(&a));
        assert!(nb.offer(&b));
        assert!(nb.offer(&c));
        assert_eq!(nb.len(), 2);
    }

    #[test]
    fn offer_rejects_duplicate_value() {
        let mut nb = NbestStorage::new(5);
        let a = doc_with_translation("A");
        assert!(nb.offer(&a));
        assert!(!nb.offer(&a.clone()));
        assert_eq!(nb.len(), 1);
    }

    #[test]
    fn best_score_tracks_the_maximum_ever_offered() {
        let mut nb = NbestStorage::new(5);
        let a = doc_with_translation("A");
        nb.offer(&a);
        assert_eq!(nb.best_score(), a.score());
    }
}
