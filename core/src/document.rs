//! `DocumentState`: the mutable per-document search state.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::AHashMap;

use crate::feature::{FeatureFunctionInstantiation, FeatureState};
use crate::phrase::{segmentations_equal, PhraseSegmentation};
use crate::phrase_collection::PhrasePairCollection;
use crate::random::Random;
use crate::step::SearchStep;
use crate::types::Scores;

/// Monotonic counter bumped by exactly one on every [`DocumentState::apply_modifications`].
/// A [`SearchStep`] captures the generation at construction time and may
/// only be applied while it still matches (invariant I4).
pub type Generation = u64;

/// Shared, read-only configuration every `DocumentState` of one decoding run
/// refers to: the ordered feature functions and their weights. Shared via
/// `Rc` rather than re-threaded through every call, mirroring the original's
/// `const DecoderConfiguration *`.
pub struct DecoderRuntime {
    pub feature_functions: Vec<FeatureFunctionInstantiation>,
    pub feature_weights: Vec<f32>,
    pub random: Random,
}

impl DecoderRuntime {
    pub fn total_number_of_scores(&self) -> usize {
        self.feature_functions.iter().map(|f| f.number_of_scores()).sum()
    }
}

/// Identifies one of the `DecoderRuntime` instances a `DocumentState` can
/// point to, for the cheap equality check used by `NbestStorage` and
/// `DocumentState::eq`: two documents are equal only if they share the same
/// configuration (pointer identity) *and* have equal segmentations.
#[derive(Clone)]
pub struct RuntimeHandle(pub Rc<DecoderRuntime>);

impl PartialEq for RuntimeHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// One document's full search state: the segmentation of every sentence,
/// the feature-score vector, one opaque feature state per feature function,
/// and the generation counter.
pub struct DocumentState {
    config: RuntimeHandle,
    sentences: Vec<PhraseSegmentation>,
    phrase_translations: Vec<Rc<PhrasePairCollection>>,
    cumulative_sentence_length: Rc<Vec<f32>>,
    scores: Scores,
    feature_states: Vec<Option<Box<dyn FeatureState>>>,
    move_counts: AHashMap<usize, (u64, u64)>,
    generation: Generation,
}

impl DocumentState {
    /// Construct a document from precomputed per-sentence phrase-pair
    /// collections and the segmentation a `StateInitialiser` picked for
    /// each. Runs `init_document` on every feature function, in
    /// configuration order, accumulating the score vector.
    pub fn new(
        config: Rc<DecoderRuntime>,
        phrase_translations: Vec<Rc<PhrasePairCollection>>,
        initial_segmentations: Vec<PhraseSegmentation>,
    ) -> Self {
        debug_assert_eq!(phrase_translations.len(), initial_segmentations.len());

        let mut cumulative = Vec::with_capacity(phrase_translations.len());
        let mut acc = 0.0f32;
        for pt in &phrase_translations {
            acc += pt.sentence_length() as f32;
            cumulative.push(acc);
        }

        let total_scores = config.total_number_of_scores();

        let doc = DocumentState {
            config: RuntimeHandle(config),
            sentences: initial_segmentations,
            phrase_translations,
            cumulative_sentence_length: Rc::new(cumulative),
            scores: Scores::zeros(total_scores),
            feature_states: Vec::new(),
            move_counts: AHashMap::default(),
            generation: 0,
        };

        // init_document needs to observe `doc` (immutably) while writing
        // into a score buffer, so the buffer is kept separate from
        // `doc.scores` until every feature function has run.
        let mut scores_buf = vec![0.0f32; total_scores];
        let mut feature_states = Vec::with_capacity(doc.config.0.feature_functions.len());
        let mut offset = 0usize;
        for ff in &doc.config.0.feature_functions {
            let n = ff.number_of_scores();
            let state = ff
                .implementation
                .init_document(&doc, &mut scores_buf[offset..offset + n]);
            feature_states.push(state);
            offset += n;
        }

        let mut doc = doc;
        doc.scores = Scores(scores_buf);
        doc.feature_states = feature_states;
        doc
    }

    pub fn config(&self) -> &Rc<DecoderRuntime> {
        &self.config.0
    }

    pub fn sentences(&self) -> &[PhraseSegmentation] {
        &self.sentences
    }

    pub fn sentence(&self, sentno: usize) -> &PhraseSegmentation {
        &self.sentences[sentno]
    }

    pub fn phrase_translations(&self, sentno: usize) -> &Rc<PhrasePairCollection> {
        &self.phrase_translations[sentno]
    }

    pub fn feature_state(&self, i: usize) -> Option<&dyn FeatureState> {
        self.feature_states[i].as_deref()
    }

    pub fn number_of_sentences(&self) -> usize {
        self.sentences.len()
    }

    pub fn input_word_count(&self) -> f32 {
        *self.cumulative_sentence_length.last().unwrap_or(&0.0)
    }

    pub fn input_sentence_length(&self, i: usize) -> f32 {
        if i == 0 {
            self.cumulative_sentence_length[0]
        } else {
            self.cumulative_sentence_length[i] - self.cumulative_sentence_length[i - 1]
        }
    }

    /// Sample a sentence index with probability proportional to its source
    /// length.
    pub fn draw_sentence(&self, rnd: &Random) -> usize {
        rnd.draw_from_cumulative_distribution(&self.cumulative_sentence_length)
    }

    /// The decoder-wide shared random stream (cheap to clone: shares the
    /// same underlying generator).
    pub fn random(&self) -> Random {
        self.config.0.random.clone()
    }

    pub fn scores(&self) -> &Scores {
        &self.scores
    }

    /// Weighted inner product of the score vector and the configured weight
    /// vector.
    pub fn score(&self) -> f32 {
        self.scores.weighted_sum(&self.config.0.feature_weights)
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn move_counts(&self) -> &AHashMap<usize, (u64, u64)> {
        &self.move_counts
    }

    pub fn register_attempted_move(&mut self, operator_id: usize) {
        self.move_counts.entry(operator_id).or_insert((0, 0)).0 += 1;
    }

    /// Consume an accepted `SearchStep`: splice in its modifications (which
    /// must already be consolidated), replace the score vector with the
    /// step's final scores, install each feature's state modification, and
    /// bump the generation counter.
    ///
    /// Panics (the original asserts) if `step`'s captured generation no
    /// longer matches `self` — this is invariant I4.
    pub fn apply_modifications(&mut self, mut step: SearchStep) {
        assert_eq!(
            step.generation(),
            self.generation,
            "SearchStep applied to a DocumentState past its captured generation"
        );

        self.move_counts.entry(step.operator_id()).or_insert((0, 0)).1 += 1;

        // Apply in descending order of `from`: a splice only shifts indices
        // at or after its own start, so processing the highest-indexed
        // modification of each sentence first keeps every lower modification's
        // indices valid. (Multiple disjoint modifications against one
        // sentence happen, e.g. MovePhrases' insert-at-dest plus
        // remove-at-source.) Consolidation already sorts ascending, so a
        // simple reverse gives the right application order.
        for modification in step.take_modifications().into_iter().rev() {
            let sentno = modification.sentno;
            let sent = &mut self.sentences[sentno];
            sent.splice(modification.from..modification.to, modification.proposal);
        }

        self.scores = step.take_final_scores();

        let state_mods = step.take_state_modifications();
        for (i, (ff, modif)) in self
            .config
            .0
            .feature_functions
            .iter()
            .zip(state_mods.into_iter())
            .enumerate()
        {
            if modif.is_some() {
                ff.implementation
                    .apply_state_modifications(&mut self.feature_states[i], modif);
            }
        }

        self.generation += 1;

        if cfg!(debug_assertions) {
            for sent in &self.sentences {
                debug_assert_coverage(sent);
            }
        }
    }

    /// Debug-only: the per-sentence score breakdown.
    pub fn compute_sentence_scores(&self, sentno: usize) -> Scores {
        let total = self.config.0.total_number_of_scores();
        let mut out = Scores::zeros(total);
        let mut offset = 0;
        for ff in &self.config.0.feature_functions {
            let n = ff.number_of_scores();
            ff.implementation
                .compute_sentence_scores(self, sentno, &mut out.0[offset..offset + n]);
            offset += n;
        }
        out
    }

    /// Flatten every sentence's target phrases into a plain-text document.
    pub fn as_plain_text(&self) -> Vec<Vec<String>> {
        self.sentences
            .iter()
            .map(|seg| {
                seg.iter()
                    .flat_map(|app| app.phrase.data().target_phrase().clone())
                    .collect()
            })
            .collect()
    }
}

impl PartialEq for DocumentState {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
            && self.sentences.len() == other.sentences.len()
            && self
                .sentences
                .iter()
                .zip(other.sentences.iter())
                .all(|(a, b)| segmentations_equal(a, b))
    }
}

impl Clone for DocumentState {
    fn clone(&self) -> Self {
        DocumentState {
            config: self.config.clone(),
            sentences: self.sentences.clone(),
            phrase_translations: self.phrase_translations.clone(),
            cumulative_sentence_length: Rc::clone(&self.cumulative_sentence_length),
            scores: self.scores.clone(),
            feature_states: self.feature_states.iter().map(|s| s.clone()).collect(),
            move_counts: self.move_counts.clone(),
            generation: self.generation,
        }
    }
}

/// Hash combining configuration identity and segmentation contents, for use
/// as the key of `NbestStorage`'s dedup set.
pub fn document_state_hash(doc: &DocumentState) -> u64 {
    let mut hasher = DefaultHasher::new();
    (Rc::as_ptr(&doc.config.0) as usize).hash(&mut hasher);
    for seg in &doc.sentences {
        for app in seg {
            app.coverage.hash(&mut hasher);
            app.phrase.hash(&mut hasher);
        }
    }
    hasher.finish()
}

fn debug_assert_coverage(seg: &PhraseSegmentation) {
    if seg.is_empty() {
        return;
    }
    let len = seg[0].coverage.len();
    let mut union = crate::phrase::CoverageBitmap::new(len);
    for app in seg {
        debug_assert!(!union.intersects(&app.coverage), "overlapping coverage in segmentation");
        union = union.union(&app.coverage);
    }
    debug_assert_eq!(union.count_ones(), len, "incomplete coverage in segmentation");
}
