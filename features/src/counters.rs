//! Simple per-phrase counting features: each sums a per-phrase functor over
//! the whole document and reports the (negated, for penalties) total as a
//! single score. All four are exact, stateless, and never overestimate —
//! `estimate_score_update`'s result is the same value `update_score` would
//! compute, so `update_score` just forwards the estimate.

use docent_core::document::DocumentState;
use docent_core::feature::{FeatureFunction, FeatureState, StateModification};
use docent_core::phrase::AnchoredPhrasePair;
use docent_core::step::SearchStep;

/// A per-phrase scalar functor, summed across a document to produce one
/// feature score.
pub trait Counter {
    fn count(&self, phrase: &AnchoredPhrasePair) -> f32;
}

fn sum<C: Counter>(counter: &C, segmentation: &[AnchoredPhrasePair]) -> f32 {
    segmentation.iter().map(|p| counter.count(p)).sum()
}

/// Generic feature function over any [`Counter`]: scores the document by
/// summing the counter over every phrase, and updates incrementally by
/// subtracting the counter's contribution over each modification's old span
/// and adding it back for the proposal.
pub struct CountingFeatureFunction<C> {
    counter: C,
}

impl<C: Counter> CountingFeatureFunction<C> {
    pub fn new(counter: C) -> Self {
        CountingFeatureFunction { counter }
    }
}

impl<C: Counter> FeatureFunction for CountingFeatureFunction<C> {
    fn number_of_scores(&self) -> usize {
        1
    }

    fn init_document(&self, doc: &DocumentState, scores_out: &mut [f32]) -> Option<Box<dyn FeatureState>> {
        scores_out[0] = doc.sentences().iter().map(|seg| sum(&self.counter, seg)).sum();
        None
    }

    fn estimate_score_update(
        &self,
        doc: &DocumentState,
        step: &SearchStep,
        _state: Option<&dyn FeatureState>,
        prev_scores: &[f32],
        scores_out: &mut [f32],
    ) -> Option<Box<dyn StateModification>> {
        let mut s = prev_scores[0];
        for m in step.consolidated_modifications() {
            let old_span = &doc.sentence(m.sentno)[m.from..m.to];
            s -= sum(&self.counter, old_span);
            s += sum(&self.counter, &m.proposal);
        }
        scores_out[0] = s;
        None
    }

    fn update_score(
        &self,
        _doc: &DocumentState,
        _step: &SearchStep,
        _state: Option<&dyn FeatureState>,
        _est_mods: Option<&dyn StateModification>,
        prev_scores: &[f32],
        scores_out: &mut [f32],
    ) -> Option<Box<dyn StateModification>> {
        // The estimate above is already exact; nothing left to refine.
        scores_out[0] = prev_scores[0];
        None
    }

    fn compute_sentence_scores(&self, doc: &DocumentState, sentno: usize, scores_out: &mut [f32]) {
        scores_out[0] = sum(&self.counter, doc.sentence(sentno));
    }
}

/// +1 per phrase: rewards/penalizes the total number of phrases used.
pub struct PhrasePenaltyCounter;

impl Counter for PhrasePenaltyCounter {
    fn count(&self, _phrase: &AnchoredPhrasePair) -> f32 {
        1.0
    }
}

pub fn phrase_penalty() -> CountingFeatureFunction<PhrasePenaltyCounter> {
    CountingFeatureFunction::new(PhrasePenaltyCounter)
}

/// `-len(target phrase)` per phrase: penalizes longer translations.
pub struct WordPenaltyCounter;

impl Counter for WordPenaltyCounter {
    fn count(&self, phrase: &AnchoredPhrasePair) -> f32 {
        -(phrase.phrase.data().target_phrase().len() as f32)
    }
}

pub fn word_penalty() -> CountingFeatureFunction<WordPenaltyCounter> {
    CountingFeatureFunction::new(WordPenaltyCounter)
}

/// `-1` per out-of-vocabulary phrase pair.
pub struct OovPenaltyCounter;

impl Counter for OovPenaltyCounter {
    fn count(&self, phrase: &AnchoredPhrasePair) -> f32 {
        if phrase.phrase.data().is_oov() {
            -1.0
        } else {
            0.0
        }
    }
}

pub fn oov_penalty() -> CountingFeatureFunction<OovPenaltyCounter> {
    CountingFeatureFunction::new(OovPenaltyCounter)
}

/// `-(count of target words at least `long_limit` characters long)` per
/// phrase. Upstream default `long_limit`: 7 (the LIX readability constant).
pub struct LongWordPenaltyCounter {
    long_limit: usize,
}

impl LongWordPenaltyCounter {
    pub fn new(long_limit: usize) -> Self {
        LongWordPenaltyCounter { long_limit }
    }
}

impl Default for LongWordPenaltyCounter {
    fn default() -> Self {
        LongWordPenaltyCounter { long_limit: 7 }
    }
}

impl Counter for LongWordPenaltyCounter {
    fn count(&self, phrase: &AnchoredPhrasePair) -> f32 {
        let num_long = phrase
            .phrase
            .data()
            .target_phrase()
            .iter()
            .filter(|w| w.chars().count() >= self.long_limit)
            .count();
        -(num_long as f32)
    }
}

pub fn long_word_penalty(long_limit: usize) -> CountingFeatureFunction<LongWordPenaltyCounter> {
    CountingFeatureFunction::new(LongWordPenaltyCounter::new(long_limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::document::DecoderRuntime;
    use docent_core::phrase::{CoverageBitmap, PhrasePairData, PhrasePairInterner, WordAlignment};
    use docent_core::phrase_collection::PhrasePairCollection;
    use docent_core::random::Random;
    use docent_core::step::Modification;
    use docent_core::types::Scores;
    use std::rc::Rc;

    fn word(interner: &PhrasePairInterner, len: usize, pos: usize, target: &[&str], oov: bool) -> AnchoredPhrasePair {
        let mut data = PhrasePairData::new(
            vec!["x".into()],
            target.iter().map(|w| w.to_string()).collect(),
            Vec::new(),
            WordAlignment::new(1, target.len()),
            Scores::zeros(0),
        );
        if oov {
            data = PhrasePairData::oov("x".into(), Scores::zeros(0));
        }
        AnchoredPhrasePair::new(CoverageBitmap::from_range(len, pos, pos + 1), interner.intern(data))
    }

    fn doc_with_two_words(interner: &PhrasePairInterner) -> DocumentState {
        let w0 = word(interner, 2, 0, &["Hello"], false);
        let w1 = word(interner, 2, 1, &["world"], false);
        let ff = docent_core::feature::FeatureFunctionInstantiation::new("wp", 0, Box::new(word_penalty()));
        let runtime = Rc::new(DecoderRuntime {
            feature_functions: vec![ff],
            feature_weights: vec![1.0],
            random: Random::seeded(1),
        });
        let pt = Rc::new(PhrasePairCollection::new(2, Random::seeded(2)));
        DocumentState::new(runtime, vec![pt], vec![vec![w0, w1]])
    }

    #[test]
    fn phrase_penalty_counts_one_per_phrase() {
        let interner = PhrasePairInterner::new();
        let counter = PhrasePenaltyCounter;
        let seg = vec![
            word(&interner, 2, 0, &["a"], false),
            word(&interner, 2, 1, &["b"], false),
        ];
        assert_eq!(sum(&counter, &seg), 2.0);
    }

    #[test]
    fn word_penalty_is_negative_target_length() {
        let interner = PhrasePairInterner::new();
        let counter = WordPenaltyCounter;
        let p = word(&interner, 1, 0, &["a", "b", "c"], false);
        assert_eq!(counter.count(&p), -3.0);
    }

    #[test]
    fn oov_penalty_only_penalizes_oov_phrases() {
        let interner = PhrasePairInterner::new();
        let counter = OovPenaltyCounter;
        let regular = word(&interner, 1, 0, &["a"], false);
        let oov = word(&interner, 1, 0, &["a"], true);
        assert_eq!(counter.count(&regular), 0.0);
        assert_eq!(counter.count(&oov), -1.0);
    }

    #[test]
    fn long_word_penalty_respects_the_configured_limit() {
        let interner = PhrasePairInterner::new();
        let counter = LongWordPenaltyCounter::new(5);
        let short = word(&interner, 1, 0, &["cat"], false);
        let long = word(&interner, 1, 0, &["elephant"], false);
        assert_eq!(counter.count(&short), 0.0);
        assert_eq!(counter.count(&long), -1.0);
    }

    #[test]
    fn init_document_sums_the_whole_document() {
        let interner = PhrasePairInterner::new();
        let doc = doc_with_two_words(&interner);
        // "Hello" (5) + "world" (5) => word penalty -10
        assert_eq!(doc.score(), -10.0);
    }

    #[test]
    fn estimate_score_update_matches_a_full_recount() {
        let interner = PhrasePairInterner::new();
        let doc = doc_with_two_words(&interner);
        let replacement = word(&interner, 2, 0, &["Hi"], false);

        let mut step = SearchStep::new(0, &doc);
        step.add_modification(Modification::new(0, 0, 1, vec![replacement]));

        let estimate = step.score_estimate(&doc);
        // Hello(5) replaced by Hi(2): -10 - (-2) - (-5) = -10 +5 -2 = -7
        assert_eq!(estimate, -7.0);
    }
}
