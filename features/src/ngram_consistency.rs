//! A document-scoped consistency feature: penalizes a source phrase that is
//! rendered with more than one distinct target phrase across the document.
//! Exercises the full `FeatureState`/`StateModification` machinery `spec.md`
//! describes for features with a document-wide cache, standing in for the
//! out-of-scope lexical consistency models.

use std::any::Any;

use ahash::AHashMap;

use docent_core::document::DocumentState;
use docent_core::feature::{FeatureFunction, FeatureState, StateModification};
use docent_core::phrase::AnchoredPhrasePair;
use docent_core::step::SearchStep;

/// Source phrase (joined with spaces) -> { target rendering -> occurrence
/// count }. A source phrase with more than one key is translated
/// inconsistently somewhere in the document.
type RenderingCounts = AHashMap<String, AHashMap<String, u32>>;

fn key_of(phrase: &AnchoredPhrasePair) -> (String, String) {
    let data = phrase.phrase.data();
    (data.source_phrase().join(" "), data.target_phrase().join(" "))
}

fn record(counts: &mut RenderingCounts, phrase: &AnchoredPhrasePair) {
    let (src, tgt) = key_of(phrase);
    *counts.entry(src).or_default().entry(tgt).or_insert(0) += 1;
}

fn unrecord(counts: &mut RenderingCounts, phrase: &AnchoredPhrasePair) {
    let (src, tgt) = key_of(phrase);
    if let Some(renderings) = counts.get_mut(&src) {
        if let Some(n) = renderings.get_mut(&tgt) {
            *n -= 1;
            if *n == 0 {
                renderings.remove(&tgt);
            }
        }
        if renderings.is_empty() {
            counts.remove(&src);
        }
    }
}

fn score_of(counts: &RenderingCounts) -> f32 {
    counts
        .values()
        .map(|renderings| -(renderings.len() as f32 - 1.0))
        .sum()
}

#[derive(Clone, Default)]
struct NgramConsistencyState(RenderingCounts);

impl FeatureState for NgramConsistencyState {
    fn clone_box(&self) -> Box<dyn FeatureState> {
        Box::new(self.clone())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct NgramConsistencyModification(RenderingCounts);

impl StateModification for NgramConsistencyModification {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct NgramConsistencyFeature;

impl NgramConsistencyFeature {
    pub fn new() -> Self {
        NgramConsistencyFeature
    }
}

impl Default for NgramConsistencyFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureFunction for NgramConsistencyFeature {
    fn number_of_scores(&self) -> usize {
        1
    }

    fn init_document(&self, doc: &DocumentState, scores_out: &mut [f32]) -> Option<Box<dyn FeatureState>> {
        let mut counts = RenderingCounts::default();
        for seg in doc.sentences() {
            for phrase in seg {
                record(&mut counts, phrase);
            }
        }
        scores_out[0] = score_of(&counts);
        Some(Box::new(NgramConsistencyState(counts)))
    }

    fn estimate_score_update(
        &self,
        doc: &DocumentState,
        step: &SearchStep,
        state: Option<&dyn FeatureState>,
        _prev_scores: &[f32],
        scores_out: &mut [f32],
    ) -> Option<Box<dyn StateModification>> {
        let mut counts = state
            .and_then(|s| s.as_any().downcast_ref::<NgramConsistencyState>())
            .map(|s| s.0.clone())
            .unwrap_or_default();

        for m in step.consolidated_modifications() {
            for phrase in &doc.sentence(m.sentno)[m.from..m.to] {
                unrecord(&mut counts, phrase);
            }
            for phrase in &m.proposal {
                record(&mut counts, phrase);
            }
        }

        scores_out[0] = score_of(&counts);
        Some(Box::new(NgramConsistencyModification(counts)))
    }

    fn update_score(
        &self,
        _doc: &DocumentState,
        _step: &SearchStep,
        _state: Option<&dyn FeatureState>,
        est_mods: Option<&dyn StateModification>,
        _prev_scores: &[f32],
        scores_out: &mut [f32],
    ) -> Option<Box<dyn StateModification>> {
        // The estimate phase already computed the exact document-wide
        // rendering counts; nothing further to refine.
        let counts = est_mods
            .and_then(|m| m.as_any().downcast_ref::<NgramConsistencyModification>())
            .map(|m| m.0.clone())
            .unwrap_or_default();
        scores_out[0] = score_of(&counts);
        Some(Box::new(NgramConsistencyModification(counts)))
    }

    fn apply_state_modifications(
        &self,
        state: &mut Option<Box<dyn FeatureState>>,
        modif: Option<Box<dyn StateModification>>,
    ) {
        if let Some(m) = modif.as_ref().and_then(|m| m.as_any().downcast_ref::<NgramConsistencyModification>()) {
            *state = Some(Box::new(NgramConsistencyState(m.0.clone())));
        }
    }

    fn compute_sentence_scores(&self, doc: &DocumentState, sentno: usize, scores_out: &mut [f32]) {
        let mut counts = RenderingCounts::default();
        for phrase in doc.sentence(sentno) {
            record(&mut counts, phrase);
        }
        scores_out[0] = score_of(&counts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::document::DecoderRuntime;
    use docent_core::feature::FeatureFunctionInstantiation;
    use docent_core::phrase::{CoverageBitmap, PhrasePairData, PhrasePairInterner, WordAlignment};
    use docent_core::phrase_collection::PhrasePairCollection;
    use docent_core::random::Random;
    use docent_core::step::Modification;
    use docent_core::types::Scores;
    use std::rc::Rc;

    fn phrase(interner: &PhrasePairInterner, len: usize, pos: usize, src: &str, tgt: &str) -> AnchoredPhrasePair {
        let data = PhrasePairData::new(
            vec![src.to_string()],
            vec![tgt.to_string()],
            Vec::new(),
            WordAlignment::new(1, 1),
            Scores::zeros(0),
        );
        AnchoredPhrasePair::new(CoverageBitmap::from_range(len, pos, pos + 1), interner.intern(data))
    }

    fn doc(interner: &PhrasePairInterner, s0: &[(&str, &str)], s1: &[(&str, &str)]) -> DocumentState {
        let mk = |words: &[(&str, &str)]| -> Vec<AnchoredPhrasePair> {
            words
                .iter()
                .enumerate()
                .map(|(i, (s, t))| phrase(interner, words.len(), i, s, t))
                .collect()
        };
        let seg0 = mk(s0);
        let seg1 = mk(s1);
        let ff = FeatureFunctionInstantiation::new("ngram-consistency", 0, Box::new(NgramConsistencyFeature::new()));
        let runtime = Rc::new(DecoderRuntime {
            feature_functions: vec![ff],
            feature_weights: vec![1.0],
            random: Random::seeded(1),
        });
        let pt0 = Rc::new(PhrasePairCollection::new(s0.len(), Random::seeded(2)));
        let pt1 = Rc::new(PhrasePairCollection::new(s1.len(), Random::seeded(3)));
        DocumentState::new(runtime, vec![pt0, pt1], vec![seg0, seg1])
    }

    #[test]
    fn consistent_translations_score_zero() {
        let interner = PhrasePairInterner::new();
        let d = doc(&interner, &[("chien", "dog")], &[("chien", "dog")]);
        assert_eq!(d.score(), 0.0);
    }

    #[test]
    fn inconsistent_translations_are_penalized() {
        let interner = PhrasePairInterner::new();
        let d = doc(&interner, &[("chien", "dog")], &[("chien", "hound")]);
        assert_eq!(d.score(), -1.0);
    }

    #[test]
    fn estimate_score_update_reflects_a_proposed_fix() {
        let interner = PhrasePairInterner::new();
        let d = doc(&interner, &[("chien", "dog")], &[("chien", "hound")]);
        assert_eq!(d.score(), -1.0);

        let mut step = SearchStep::new(0, &d);
        let fixed = phrase(&interner, 1, 0, "chien", "dog");
        step.add_modification(Modification::new(1, 0, 1, vec![fixed]));

        assert_eq!(step.score_estimate(&d), 0.0);
    }
}
