//! Exposes a phrase pair's own intrinsic scores (translation-model scores
//! the phrase table itself carries) as an ordinary `FeatureFunction`,
//! mirroring `DecoderConfiguration::DecoderConfiguration`'s treatment of the
//! `phrase-table` model: it is configured and weighted exactly like any
//! other feature, it just happens to read scores the phrase table already
//! attached to each `PhrasePairData` rather than computing its own.

use docent_core::document::DocumentState;
use docent_core::feature::{FeatureFunction, FeatureState, StateModification};
use docent_core::phrase::AnchoredPhrasePair;
use docent_core::step::SearchStep;
use docent_core::types::Scores;

fn sum_scores(dim: usize, segmentation: &[AnchoredPhrasePair]) -> Vec<f32> {
    let mut totals = vec![0.0f32; dim];
    for app in segmentation {
        let scores = app.phrase.data().scores();
        for (t, s) in totals.iter_mut().zip(scores.0.iter()) {
            *t += s;
        }
    }
    totals
}

/// Sums each phrase pair's `scores()` vector, component-wise, across the
/// whole document. `dim` is fixed at construction time (the `num-scores`
/// configuration parameter) since `number_of_scores` must be known before
/// any phrase pair exists.
pub struct PhraseTableScoresFeature {
    dim: usize,
}

impl PhraseTableScoresFeature {
    pub fn new(dim: usize) -> Self {
        PhraseTableScoresFeature { dim }
    }
}

impl FeatureFunction for PhraseTableScoresFeature {
    fn number_of_scores(&self) -> usize {
        self.dim
    }

    fn init_document(&self, doc: &DocumentState, scores_out: &mut [f32]) -> Option<Box<dyn FeatureState>> {
        let mut total = vec![0.0f32; self.dim];
        for seg in doc.sentences() {
            for (t, s) in total.iter_mut().zip(sum_scores(self.dim, seg)) {
                *t += s;
            }
        }
        scores_out.copy_from_slice(&total);
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
        let mut s = Scores(prev_scores.to_vec());
        for m in step.consolidated_modifications() {
            let old_span = &doc.sentence(m.sentno)[m.from..m.to];
            s -= &Scores(sum_scores(self.dim, old_span));
            s += &Scores(sum_scores(self.dim, &m.proposal));
        }
        scores_out.copy_from_slice(&s.0);
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
        scores_out.copy_from_slice(prev_scores);
        None
    }

    fn compute_sentence_scores(&self, doc: &DocumentState, sentno: usize, scores_out: &mut [f32]) {
        scores_out.copy_from_slice(&sum_scores(self.dim, doc.sentence(sentno)));
    }
}
