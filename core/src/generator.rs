//! `StateGenerator`: the weighted-random operator sampler that drives the
//! search loop, plus the `StateInitialiser` family that builds each
//! sentence's starting segmentation.

use tracing::{debug, warn};

use crate::document::DocumentState;
use crate::error::DocentResult;
use crate::operation::StateOperation;
use crate::phrase_collection::PhrasePairCollection;
use crate::random::Random;
use crate::step::SearchStep;
use crate::types::Word;

/// Builds the starting segmentation for one sentence of one document.
/// Implementations live wherever their input format does:
/// [`MonotonicStateInitialiser`] and [`SavedStateInitialiser`] here, the
/// NIST XML testset-baseline initialiser in `docent-io` (it needs a parsed
/// corpus type this crate has no business depending on).
pub trait StateInitialiser {
    fn init_segmentation(
        &self,
        phrase_translations: &PhrasePairCollection,
        sentence: &[Word],
        document_number: usize,
        sentence_number: usize,
    ) -> DocentResult<crate::phrase::PhraseSegmentation>;
}

/// Samples a fresh segmentation from the phrase table, with no regard for
/// any previous run.
pub struct MonotonicStateInitialiser;

impl StateInitialiser for MonotonicStateInitialiser {
    fn init_segmentation(
        &self,
        phrase_translations: &PhrasePairCollection,
        _sentence: &[Word],
        _document_number: usize,
        _sentence_number: usize,
    ) -> DocentResult<crate::phrase::PhraseSegmentation> {
        phrase_translations.propose_segmentation().ok_or_else(|| {
            crate::error::DocentError::configuration(
                "phrase-table",
                "no segmentation covers the sentence; phrase table has gaps in coverage",
            )
        })
    }
}

/// Restores segmentations from a previously saved decoder state.
pub struct SavedStateInitialiser {
    segmentations: Vec<Vec<crate::phrase::PhraseSegmentation>>,
}

impl SavedStateInitialiser {
    pub fn new(segmentations: Vec<Vec<crate::phrase::PhraseSegmentation>>) -> Self {
        SavedStateInitialiser { segmentations }
    }
}

impl StateInitialiser for SavedStateInitialiser {
    fn init_segmentation(
        &self,
        phrase_translations: &PhrasePairCollection,
        _sentence: &[Word],
        document_number: usize,
        sentence_number: usize,
    ) -> DocentResult<crate::phrase::PhraseSegmentation> {
        let seg = self.segmentations[document_number][sentence_number].clone();
        if !phrase_translations.phrases_exist(&seg) {
            return Err(crate::error::DocentError::configuration(
                "saved-state",
                "a phrase from the saved state does not exist in the phrase table; make sure the \
                 same phrase table is used as when the state was saved",
            ));
        }
        Ok(seg)
    }
}

/// Samples one of a weighted set of [`StateOperation`]s and retries on
/// failure, giving up after 100 consecutive failures (the document is then
/// left untouched for this search step).
pub struct StateGenerator {
    random: Random,
    operations: Vec<Box<dyn StateOperation>>,
    cumulative_operation_distribution: Vec<f32>,
    initialiser: Box<dyn StateInitialiser>,
}

impl StateGenerator {
    pub fn new(initialiser: Box<dyn StateInitialiser>, random: Random) -> Self {
        StateGenerator {
            random,
            operations: Vec::new(),
            cumulative_operation_distribution: Vec::new(),
            initialiser,
        }
    }

    pub fn add_operation(&mut self, weight: f32, operation: Box<dyn StateOperation>) {
        let cumulative = weight + self.cumulative_operation_distribution.last().copied().unwrap_or(0.0);
        self.operations.push(operation);
        self.cumulative_operation_distribution.push(cumulative);
    }

    pub fn operator_description(&self, operator_id: usize) -> String {
        self.operations[operator_id].description()
    }

    pub fn init_segmentation(
        &self,
        phrase_translations: &PhrasePairCollection,
        sentence: &[Word],
        document_number: usize,
        sentence_number: usize,
    ) -> DocentResult<crate::phrase::PhraseSegmentation> {
        self.initialiser
            .init_segmentation(phrase_translations, sentence, document_number, sentence_number)
    }

    /// Returns `None` if 100 consecutive operations failed to produce a
    /// usable, non-empty step; the caller should treat the document as
    /// unchangeable this round.
    pub fn create_search_step(&self, doc: &DocumentState) -> Option<SearchStep> {
        let mut failed = 0u32;
        loop {
            let next_op = self
                .random
                .draw_from_cumulative_distribution(&self.cumulative_operation_distribution);
            debug!(operator = %self.operations[next_op].description(), failed, "sampling next search step");

            let mut step = match self.operations[next_op].create_search_step(next_op, doc) {
                Some(s) => s,
                None => {
                    failed += 1;
                    if failed >= 100 {
                        warn!("100 consecutive failed search steps; leaving document untouched this round");
                        return None;
                    }
                    continue;
                }
            };

            if step.is_empty() {
                continue;
            }

            return Some(step);
        }
    }
}
