//! `SearchStep`: a candidate bundle of disjoint per-sentence edits, with
//! lazy two-phase scoring.

use crate::document::{DecoderRuntime, DocumentState, Generation};
use crate::feature::StateModification;
use crate::phrase::PhraseSegmentation;
use crate::types::Scores;

/// A proposed local edit: replace positions `[from, to)` of sentence
/// `sentno`'s segmentation with `proposal`. Index-based (rather than
/// iterator-based, which the host language doesn't support splice-stably in
/// the way the original's `std::list` iterators do) per the design notes.
#[derive(Debug, Clone)]
pub struct Modification {
    pub sentno: usize,
    pub from: usize,
    pub to: usize,
    pub proposal: PhraseSegmentation,
}

impl Modification {
    pub fn new(sentno: usize, from: usize, to: usize, proposal: PhraseSegmentation) -> Self {
        Modification { sentno, from, to, proposal }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoreState {
    NoScores,
    ScoresEstimated,
    ScoresComputed,
}

/// A candidate modification to a document, not yet committed. Constructed
/// by a [`crate::operation::StateOperation`], scored lazily by the search
/// loop, and either discarded or consumed by
/// [`DocumentState::apply_modifications`].
pub struct SearchStep {
    generation: Generation,
    operator_id: usize,
    modifications: Vec<Modification>,
    consolidated: bool,
    state_modifications: Vec<Option<Box<dyn StateModification>>>,
    scores: Scores,
    score_state: ScoreState,
}

impl SearchStep {
    pub fn new(operator_id: usize, doc: &DocumentState) -> Self {
        SearchStep {
            generation: doc.generation(),
            operator_id,
            modifications: Vec::new(),
            consolidated: true,
            state_modifications: Vec::new(),
            scores: Scores::zeros(doc.scores().len()),
            score_state: ScoreState::NoScores,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn operator_id(&self) -> usize {
        self.operator_id
    }

    pub fn add_modification(&mut self, modification: Modification) {
        self.modifications.push(modification);
        self.consolidated = false;
    }

    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    /// Sort modifications by `(sentno, from, to)` and fuse adjacent-in-
    /// sentence runs (`prev.to == next.from`), concatenating `prev`'s
    /// proposal before `next`'s. Idempotent: running this again on already-
    /// consolidated modifications changes nothing (invariant I7), since no
    /// two fused entries can ever again satisfy `prev.to == next.from`
    /// after the merge (their ranges now overlap the gap that would have
    /// allowed a further fuse).
    pub fn consolidate(&mut self) {
        if self.consolidated {
            return;
        }
        if self.modifications.is_empty() {
            self.consolidated = true;
            return;
        }

        self.modifications.sort_by_key(|m| (m.sentno, m.from, m.to));

        let mut merged: Vec<Modification> = Vec::with_capacity(self.modifications.len());
        for m in self.modifications.drain(..) {
            let fuse = merged
                .last()
                .map(|last: &Modification| last.sentno == m.sentno && last.to == m.from)
                .unwrap_or(false);
            if fuse {
                let last = merged.last_mut().unwrap();
                last.to = m.to;
                last.proposal.extend(m.proposal);
            } else {
                merged.push(m);
            }
        }
        self.modifications = merged;
        self.consolidated = true;
    }

    pub fn modifications(&mut self) -> &[Modification] {
        self.consolidate();
        &self.modifications
    }

    /// The already-consolidated modifications, for `FeatureFunction`
    /// implementations, which only ever see a `&SearchStep` (scoring must
    /// not itself trigger mutation of the step it is scoring). Safe to call
    /// from `estimate_score_update`/`update_score`: both are only invoked
    /// from within `estimate_scores`/`compute_scores`, which consolidate
    /// before entering the per-feature loop.
    pub fn consolidated_modifications(&self) -> &[Modification] {
        debug_assert!(self.consolidated, "SearchStep scored before consolidation");
        &self.modifications
    }

    fn estimate_scores(&mut self, doc: &DocumentState) {
        if self.score_state != ScoreState::NoScores {
            return;
        }
        self.consolidate();

        let runtime: &DecoderRuntime = doc.config();
        let old_scores = doc.scores().0.clone();
        let total = old_scores.len();
        let mut buf = vec![0.0f32; total];
        let mut mods = Vec::with_capacity(runtime.feature_functions.len());

        let mut offset = 0usize;
        for (i, ff) in runtime.feature_functions.iter().enumerate() {
            let n = ff.number_of_scores();
            let feature_state = doc.feature_state(i);
            let modif = ff.implementation.estimate_score_update(
                doc,
                self,
                feature_state,
                &old_scores[offset..offset + n],
                &mut buf[offset..offset + n],
            );
            mods.push(modif);
            offset += n;
        }

        self.scores = Scores(buf);
        self.state_modifications = mods;
        self.score_state = ScoreState::ScoresEstimated;
    }

    fn compute_scores(&mut self, doc: &DocumentState) {
        if self.score_state == ScoreState::ScoresComputed {
            return;
        }
        self.estimate_scores(doc);

        let runtime: &DecoderRuntime = doc.config();
        let old_scores = doc.scores().0.clone();
        let mut buf = vec![0.0f32; old_scores.len()];
        // `estimate_scores` already populated one entry per feature function;
        // take them so each `update_score` call can consume its own estimate.
        let est_mods = std::mem::take(&mut self.state_modifications);
        let mut new_mods = Vec::with_capacity(runtime.feature_functions.len());

        let mut offset = 0usize;
        for (i, (ff, est)) in runtime.feature_functions.iter().zip(est_mods.into_iter()).enumerate() {
            let n = ff.number_of_scores();
            let feature_state = doc.feature_state(i);
            let modif = ff.implementation.update_score(
                doc,
                self,
                feature_state,
                est.as_deref(),
                &old_scores[offset..offset + n],
                &mut buf[offset..offset + n],
            );
            new_mods.push(modif);
            offset += n;
        }

        self.scores = Scores(buf);
        self.state_modifications = new_mods;
        self.score_state = ScoreState::ScoresComputed;
    }

    /// Forces the estimate phase and reports whether `accept` judges the
    /// estimated weighted score acceptable. This is the only call that
    /// should run before a caller decides whether the exact score is worth
    /// computing.
    pub fn is_provisionally_acceptable(&mut self, doc: &DocumentState, accept: &crate::search::AcceptanceDecision) -> bool {
        self.estimate_scores(doc);
        accept.accepts(self.scores.weighted_sum(&doc.config().feature_weights))
    }

    pub fn score_estimate(&mut self, doc: &DocumentState) -> f32 {
        self.estimate_scores(doc);
        self.scores.weighted_sum(&doc.config().feature_weights)
    }

    /// Forces the exact phase and returns the weighted score.
    pub fn score(&mut self, doc: &DocumentState) -> f32 {
        self.compute_scores(doc);
        self.scores.weighted_sum(&doc.config().feature_weights)
    }

    pub fn take_modifications(&mut self) -> Vec<Modification> {
        self.consolidate();
        std::mem::take(&mut self.modifications)
    }

    pub fn take_final_scores(&mut self) -> Scores {
        std::mem::take(&mut self.scores)
    }

    pub fn take_state_modifications(&mut self) -> Vec<Option<Box<dyn StateModification>>> {
        std::mem::take(&mut self.state_modifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrase::{AnchoredPhrasePair, CoverageBitmap, PhrasePairData, PhrasePairInterner, WordAlignment};

    fn anchored(interner: &PhrasePairInterner, from: usize, to: usize, len: usize) -> AnchoredPhrasePair {
        let data = PhrasePairData::new(
            vec!["x".into()],
            vec!["Y".into()],
            Vec::new(),
            WordAlignment::new(1, 1),
            Scores::zeros(0),
        );
        AnchoredPhrasePair::new(CoverageBitmap::from_range(len, from, to), interner.intern(data))
    }

    #[test]
    fn consolidation_fuses_adjacent_same_sentence_modifications() {
        let interner = PhrasePairInterner::new();
        let mut step = SearchStep {
            generation: 0,
            operator_id: 0,
            modifications: vec![
                Modification::new(0, 2, 3, vec![anchored(&interner, 2, 3, 4)]),
                Modification::new(0, 0, 1, vec![anchored(&interner, 0, 1, 4)]),
                Modification::new(0, 1, 2, vec![anchored(&interner, 1, 2, 4)]),
            ],
            consolidated: false,
            state_modifications: Vec::new(),
            scores: Scores::zeros(0),
            score_state: ScoreState::NoScores,
        };
        step.consolidate();
        assert_eq!(step.modifications.len(), 1);
        assert_eq!(step.modifications[0].from, 0);
        assert_eq!(step.modifications[0].to, 3);
        assert_eq!(step.modifications[0].proposal.len(), 3);
    }

    #[test]
    fn consolidation_is_idempotent() {
        let interner = PhrasePairInterner::new();
        let mut step = SearchStep {
            generation: 0,
            operator_id: 0,
            modifications: vec![
                Modification::new(0, 0, 1, vec![anchored(&interner, 0, 1, 2)]),
                Modification::new(1, 0, 1, vec![anchored(&interner, 0, 1, 2)]),
            ],
            consolidated: false,
            state_modifications: Vec::new(),
            scores: Scores::zeros(0),
            score_state: ScoreState::NoScores,
        };
        step.consolidate();
        let first_pass = step.modifications.clone();
        step.consolidated = false;
        step.consolidate();
        assert_eq!(step.modifications.len(), first_pass.len());
        for (a, b) in step.modifications.iter().zip(first_pass.iter()) {
            assert_eq!(a.sentno, b.sentno);
            assert_eq!(a.from, b.from);
            assert_eq!(a.to, b.to);
        }
    }
}
