//! The `FeatureFunction` contract: the only user-extensible polymorphism in
//! the engine. Everything else (operators, schedules, algorithms) is a
//! closed set of variants (see `operation.rs`, `cooling.rs`, `search.rs`);
//! this is the one seam where trait objects are appropriate.

use std::any::Any;

use crate::document::DocumentState;
use crate::step::SearchStep;

/// Opaque per-document state a feature function keeps between calls (a
/// discourse-level language model's n-gram counts, a consistency model's
/// translation-choice map, ...). The core never inspects its contents; it
/// only clones it (via [`FeatureState::clone_box`]) when `NbestStorage`
/// deep-clones a document, and hands it back to the owning feature function
/// on every call.
pub trait FeatureState: Any {
    fn clone_box(&self) -> Box<dyn FeatureState>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn FeatureState> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Opaque scratch object describing how a feature's state must change if a
/// [`SearchStep`] is committed. Lives from `estimate_score_update` (or
/// `update_score`) until `apply_state_modifications` consumes it, or is
/// dropped if the step is discarded.
pub trait StateModification: Any {
    fn as_any(&self) -> &dyn Any;
}

/// A scoring component whose weighted contribution is one summand of the
/// document score. Features must be deterministic given `(doc, step)`.
///
/// The five operations mirror the original's exactly (`spec.md` §4.1):
/// `init_document` builds the initial per-document state and writes the
/// feature's initial scores; `estimate_score_update` is a cheap upper bound
/// used to reject unpromising steps before paying for exact scoring;
/// `update_score` is the exact computation, called only when the estimate
/// passed the acceptance test (invariant I3: its result is always ≤ the
/// estimate, in the direction that keeps the weighted sum ≤); `apply_state_
/// modifications` destructively installs a committed step's changes into
/// the feature's state; `compute_sentence_scores` is a debug-only
/// sentence-level breakdown.
pub trait FeatureFunction {
    /// Number of score-vector slots this feature occupies, starting at its
    /// configured `score_index`.
    fn number_of_scores(&self) -> usize;

    /// Build this feature's initial state for a freshly constructed
    /// document, writing its contribution into `scores_out` (length
    /// `number_of_scores()`).
    fn init_document(
        &self,
        doc: &DocumentState,
        scores_out: &mut [f32],
    ) -> Option<Box<dyn FeatureState>>;

    /// Cheap, possibly-overestimating score delta for a not-yet-committed
    /// step. `prev_scores` is this feature's current score slice.
    /// `scores_out` receives the *new* (not delta) score slice this feature
    /// would have if the step were committed.
    fn estimate_score_update(
        &self,
        doc: &DocumentState,
        step: &SearchStep,
        state: Option<&dyn FeatureState>,
        prev_scores: &[f32],
        scores_out: &mut [f32],
    ) -> Option<Box<dyn StateModification>>;

    /// Exact score delta; only called once the estimate has cleared the
    /// acceptance threshold.
    fn update_score(
        &self,
        doc: &DocumentState,
        step: &SearchStep,
        state: Option<&dyn FeatureState>,
        est_mods: Option<&dyn StateModification>,
        prev_scores: &[f32],
        scores_out: &mut [f32],
    ) -> Option<Box<dyn StateModification>>;

    /// Destructively install a committed step's changes. Only called when
    /// the search actually commits the step that produced `modif`.
    fn apply_state_modifications(
        &self,
        state: &mut Option<Box<dyn FeatureState>>,
        modif: Option<Box<dyn StateModification>>,
    ) {
        let _ = (state, modif);
    }

    /// Debug-only per-sentence score breakdown; zeros where not meaningful.
    fn compute_sentence_scores(&self, doc: &DocumentState, sentno: usize, scores_out: &mut [f32]) {
        let _ = (doc, sentno);
        scores_out.fill(0.0);
    }
}

/// A configured feature function together with its identity and its offset
/// into the document-wide score vector.
pub struct FeatureFunctionInstantiation {
    pub id: String,
    pub score_index: usize,
    pub implementation: Box<dyn FeatureFunction>,
}

impl FeatureFunctionInstantiation {
    pub fn new(id: impl Into<String>, score_index: usize, implementation: Box<dyn FeatureFunction>) -> Self {
        FeatureFunctionInstantiation {
            id: id.into(),
            score_index,
            implementation,
        }
    }

    pub fn number_of_scores(&self) -> usize {
        self.implementation.number_of_scores()
    }
}
