//! The six built-in local-move proposal operators. Each inspects a document
//! and a shared random stream and returns a [`SearchStep`] describing one
//! candidate edit, or `None` if it had nothing useful to propose (an empty
//! step is never worth scoring).

use crate::document::DocumentState;
use crate::phrase::{compare_anchored_phrase_pairs, AnchoredPhrasePair, CoverageBitmap, PhraseSegmentation};
use crate::random::Random;
use crate::step::{Modification, SearchStep};

/// Closed set of local moves a [`crate::generator::StateGenerator`] samples
/// from. `operator_id` is the index the generator assigned this operator in
/// its own operator list (used as the key into `DocumentState`'s
/// move-acceptance statistics, not an identity the operator carries itself).
pub trait StateOperation {
    fn description(&self) -> String;
    fn create_search_step(&self, operator_id: usize, doc: &DocumentState) -> Option<SearchStep>;
}

/// Draw sentences until one with at least `min_size` phrases turns up, or
/// give up after 10 tries (mirrors every operator's `trials++ < 10` loop).
fn draw_sentence_with_min_size(doc: &DocumentState, rnd: &Random, min_size: usize) -> Option<usize> {
    let mut trials = 0;
    loop {
        let sentno = doc.draw_sentence(rnd);
        if doc.sentence(sentno).len() >= min_size {
            return Some(sentno);
        }
        trials += 1;
        if trials >= 10 {
            return None;
        }
    }
}

/// Trim the unchanged prefix and suffix shared between an original sub-
/// segmentation and a proposed replacement of the same length, so the
/// resulting `Modification` only spans what actually differs. Returns
/// `None` if the two are identical everywhere (nothing to propose).
fn trim_unchanged(original: &[AnchoredPhrasePair], proposed: &[AnchoredPhrasePair]) -> Option<(usize, usize)> {
    debug_assert_eq!(original.len(), proposed.len());
    let len = original.len();
    let mut prefix = 0;
    while prefix < len && original[prefix] == proposed[prefix] {
        prefix += 1;
    }
    if prefix == len {
        return None;
    }
    let mut suffix = 0;
    while suffix < len - prefix && original[len - 1 - suffix] == proposed[len - 1 - suffix] {
        suffix += 1;
    }
    Some((prefix, suffix))
}

/// Fisher-Yates shuffle driven by the shared random stream, matching
/// `std::random_shuffle` with an explicit generator.
fn shuffle(rnd: &Random, items: &mut [AnchoredPhrasePair]) {
    for i in (1..items.len()).rev() {
        let j = rnd.draw_from_range((i + 1) as u32) as usize;
        items.swap(i, j);
    }
}

/// Replaces one randomly chosen phrase's translation with an alternative
/// candidate from the same source span.
pub struct ChangePhraseTranslationOperation;

impl ChangePhraseTranslationOperation {
    pub fn new() -> Self {
        ChangePhraseTranslationOperation
    }
}

impl Default for ChangePhraseTranslationOperation {
    fn default() -> Self {
        Self::new()
    }
}

impl StateOperation for ChangePhraseTranslationOperation {
    fn description(&self) -> String {
        "ChangePhraseTranslation".to_string()
    }

    fn create_search_step(&self, operator_id: usize, doc: &DocumentState) -> Option<SearchStep> {
        let rnd = doc.random();
        let sentno = doc.draw_sentence(&rnd);
        let sent = doc.sentence(sentno);
        let sentsize = sent.len();
        let ph = rnd.draw_from_range(sentsize as u32) as usize;

        let pcoll = doc.phrase_translations(sentno);
        let alternative = pcoll.propose_alternative_translation(&sent[ph]);
        if alternative == sent[ph] {
            return None;
        }

        let mut step = SearchStep::new(operator_id, doc);
        step.add_modification(Modification::new(sentno, ph, ph + 1, vec![alternative]));
        Some(step)
    }
}

/// Randomly permutes a contiguous run of phrases within one sentence.
pub struct PermutePhrasesOperation {
    phrase_permutation_decay: f32,
}

impl PermutePhrasesOperation {
    pub fn new(phrase_permutation_decay: f32) -> Self {
        PermutePhrasesOperation { phrase_permutation_decay }
    }
}

impl StateOperation for PermutePhrasesOperation {
    fn description(&self) -> String {
        format!("PermutePhrases(decay={})", self.phrase_permutation_decay)
    }

    fn create_search_step(&self, operator_id: usize, doc: &DocumentState) -> Option<SearchStep> {
        let rnd = doc.random();
        let sentno = draw_sentence_with_min_size(doc, &rnd, 2)?;
        let sent = doc.sentence(sentno);
        let sentsize = sent.len();

        let nperm = rnd.draw_from_geometric_distribution(self.phrase_permutation_decay, (sentsize - 1) as u32) as usize + 1;
        let start = rnd.draw_from_range((sentsize - nperm + 1) as u32) as usize;

        let original = &sent[start..start + nperm];
        let mut permuted = original.to_vec();

        let mut trials = 0;
        loop {
            shuffle(&rnd, &mut permuted);
            if permuted != original {
                break;
            }
            trials += 1;
            if trials >= 10 {
                return None;
            }
        }

        let (prefix, suffix) = trim_unchanged(original, &permuted)?;
        let from = start + prefix;
        let to = start + nperm - suffix;
        let proposal: PhraseSegmentation = permuted[prefix..nperm - suffix].to_vec();

        let mut step = SearchStep::new(operator_id, doc);
        step.add_modification(Modification::new(sentno, from, to, proposal));
        Some(step)
    }
}

/// Sorts a contiguous run of phrases by source coverage, undoing whatever
/// non-monotone reordering earlier moves introduced.
pub struct LinearisePhrasesOperation {
    phrase_linearisation_decay: f32,
}

impl LinearisePhrasesOperation {
    pub fn new(phrase_linearisation_decay: f32) -> Self {
        LinearisePhrasesOperation { phrase_linearisation_decay }
    }
}

impl StateOperation for LinearisePhrasesOperation {
    fn description(&self) -> String {
        format!("LinearisePhrases(decay={})", self.phrase_linearisation_decay)
    }

    fn create_search_step(&self, operator_id: usize, doc: &DocumentState) -> Option<SearchStep> {
        let rnd = doc.random();
        let sentno = draw_sentence_with_min_size(doc, &rnd, 2)?;
        let sent = doc.sentence(sentno);
        let sentsize = sent.len();

        let nperm = rnd.draw_from_geometric_distribution(self.phrase_linearisation_decay, (sentsize - 1) as u32) as usize + 1;
        let start = rnd.draw_from_range((sentsize - nperm + 1) as u32) as usize;

        let original = &sent[start..start + nperm];

        // already monotone: nothing to do.
        let already_sorted = original
            .windows(2)
            .all(|w| compare_anchored_phrase_pairs(&w[0], &w[1]) != std::cmp::Ordering::Greater);
        if already_sorted {
            return None;
        }

        let mut sorted = original.to_vec();
        sorted.sort_by(|a, b| a.coverage.lowest_set_bit().cmp(&b.coverage.lowest_set_bit()));

        let (prefix, suffix) = trim_unchanged(original, &sorted)?;
        let from = start + prefix;
        let to = start + nperm - suffix;
        let proposal: PhraseSegmentation = sorted[prefix..nperm - suffix].to_vec();

        let mut step = SearchStep::new(operator_id, doc);
        step.add_modification(Modification::new(sentno, from, to, proposal));
        Some(step)
    }
}

/// Swaps two phrases within a sentence, with the second drawn at a
/// geometrically decaying distance from the first.
pub struct SwapPhrasesOperation {
    swap_distance_decay: f32,
}

impl SwapPhrasesOperation {
    pub fn new(swap_distance_decay: f32) -> Self {
        SwapPhrasesOperation { swap_distance_decay }
    }
}

impl StateOperation for SwapPhrasesOperation {
    fn description(&self) -> String {
        format!("SwapPhrases(decay={})", self.swap_distance_decay)
    }

    fn create_search_step(&self, operator_id: usize, doc: &DocumentState) -> Option<SearchStep> {
        let rnd = doc.random();
        let sentno = draw_sentence_with_min_size(doc, &rnd, 2)?;
        let sent = doc.sentence(sentno);
        let sentsize = sent.len();

        let phrase1 = rnd.draw_from_range(sentsize as u32) as usize;
        let direction = if phrase1 == 0 {
            true
        } else if phrase1 == sentsize - 1 {
            false
        } else {
            rnd.flip_coin(0.5)
        };

        let phrase2 = if direction {
            if phrase1 == sentsize - 2 {
                sentsize - 1
            } else {
                let ph2range = sentsize - phrase1 - 1;
                let dist = rnd.draw_from_geometric_distribution(self.swap_distance_decay, (ph2range - 1) as u32) as usize + 1;
                phrase1 + dist
            }
        } else if phrase1 == 1 {
            0
        } else {
            let dist = rnd.draw_from_geometric_distribution(self.swap_distance_decay, (phrase1 - 1) as u32) as usize + 1;
            phrase1 - dist
        };

        let item1 = sent[phrase1].clone();
        let item2 = sent[phrase2].clone();

        let mut step = SearchStep::new(operator_id, doc);
        step.add_modification(Modification::new(sentno, phrase1, phrase1 + 1, vec![item2]));
        step.add_modification(Modification::new(sentno, phrase2, phrase2 + 1, vec![item1]));
        Some(step)
    }
}

/// Moves a contiguous block of phrases elsewhere in the same sentence.
pub struct MovePhrasesOperation {
    block_size_decay: f32,
    right_move_preference: f32,
    right_distance_decay: f32,
    left_distance_decay: f32,
}

impl MovePhrasesOperation {
    pub fn new(
        block_size_decay: f32,
        right_move_preference: f32,
        right_distance_decay: f32,
        left_distance_decay: f32,
    ) -> Self {
        MovePhrasesOperation {
            block_size_decay,
            right_move_preference,
            right_distance_decay,
            left_distance_decay,
        }
    }
}

impl StateOperation for MovePhrasesOperation {
    fn description(&self) -> String {
        format!(
            "MovePhrases(block-size-decay={},right-move-preference={},right-distance-decay={},left-distance-decay={})",
            self.block_size_decay, self.right_move_preference, self.right_distance_decay, self.left_distance_decay
        )
    }

    fn create_search_step(&self, operator_id: usize, doc: &DocumentState) -> Option<SearchStep> {
        let rnd = doc.random();
        let sentno = draw_sentence_with_min_size(doc, &rnd, 2)?;
        let sent = doc.sentence(sentno);
        let sentsize = sent.len();

        let direction_right = rnd.flip_coin(self.right_move_preference);

        let block = rnd.draw_from_geometric_distribution(self.block_size_decay, (sentsize - 2) as u32) as usize + 1;
        let mut start = rnd.draw_from_range((sentsize - block) as u32) as usize;
        if !direction_right {
            start += 1;
        }

        let dest = if direction_right {
            if start + block == sentsize - 1 {
                sentsize
            } else {
                let range = sentsize - start - block;
                let dist = rnd.draw_from_geometric_distribution(self.right_distance_decay, (range - 1) as u32) as usize + 1;
                start + block + dist
            }
        } else if start == 1 {
            0
        } else {
            let dist = rnd.draw_from_geometric_distribution(self.left_distance_decay, (start - 1) as u32) as usize + 1;
            start - dist
        };

        let block_content: PhraseSegmentation = sent[start..start + block].to_vec();

        let mut step = SearchStep::new(operator_id, doc);
        step.add_modification(Modification::new(sentno, dest, dest, block_content));
        step.add_modification(Modification::new(sentno, start, start + block, Vec::new()));
        Some(step)
    }
}

/// Re-splits a contiguous source span of a sentence into a fresh
/// segmentation sampled from the phrase table.
pub struct ResegmentOperation {
    phrase_resegmentation_decay: f32,
}

impl ResegmentOperation {
    pub fn new(phrase_resegmentation_decay: f32) -> Self {
        ResegmentOperation { phrase_resegmentation_decay }
    }
}

impl StateOperation for ResegmentOperation {
    fn description(&self) -> String {
        format!("Resegment(decay={})", self.phrase_resegmentation_decay)
    }

    fn create_search_step(&self, operator_id: usize, doc: &DocumentState) -> Option<SearchStep> {
        let rnd = doc.random();
        let sentno = doc.draw_sentence(&rnd);
        let sent = doc.sentence(sentno);
        let sentsize = sent.len();
        let pcoll = doc.phrase_translations(sentno);

        let nperm = rnd.draw_from_geometric_distribution(self.phrase_resegmentation_decay, (sentsize - 1) as u32) as usize + 1;
        let start = rnd.draw_from_range((sentsize - nperm + 1) as u32) as usize;

        let original = &sent[start..start + nperm];

        let mut target = CoverageBitmap::new(pcoll.sentence_length());
        for app in original {
            target = target.union(&app.coverage);
        }

        let newseg = pcoll.propose_segmentation_for_range(&target)?;

        // original and newseg need not have the same length: trim the
        // unchanged prefix/suffix by direct element comparison rather than
        // the equal-length fast path `trim_unchanged` assumes.
        let mut prefix = 0;
        while prefix < original.len() && prefix < newseg.len() && original[prefix] == newseg[prefix] {
            prefix += 1;
        }
        if prefix == newseg.len() {
            return None;
        }
        let mut suffix = 0;
        while suffix < original.len() - prefix
            && suffix < newseg.len() - prefix
            && original[original.len() - 1 - suffix] == newseg[newseg.len() - 1 - suffix]
        {
            suffix += 1;
        }

        let from = start + prefix;
        let to = start + original.len() - suffix;
        let proposal: PhraseSegmentation = newseg[prefix..newseg.len() - suffix].to_vec();

        let mut step = SearchStep::new(operator_id, doc);
        step.add_modification(Modification::new(sentno, from, to, proposal));
        Some(step)
    }
}
