//! Per-sentence collection of candidate phrase pairs, and the recursive
//! backtracking sampler that proposes complete segmentations from it.

use crate::phrase::{AnchoredPhrasePair, CoverageBitmap, PhraseSegmentation};
use crate::random::Random;

/// All phrase pairs the phrase table offered for one sentence, plus the
/// machinery to sample a complete, disjoint, exhaustive segmentation (or a
/// segmentation restricted to a sub-range, used by `Resegment`).
#[derive(Debug)]
pub struct PhrasePairCollection {
    sentence_length: usize,
    phrase_pairs: Vec<AnchoredPhrasePair>,
    random: Random,
}

impl PhrasePairCollection {
    pub fn new(sentence_length: usize, random: Random) -> Self {
        PhrasePairCollection {
            sentence_length,
            phrase_pairs: Vec::new(),
            random,
        }
    }

    pub fn add_phrase_pair(&mut self, anchored: AnchoredPhrasePair) {
        self.phrase_pairs.push(anchored);
    }

    pub fn sentence_length(&self) -> usize {
        self.sentence_length
    }

    pub fn phrase_pairs(&self) -> &[AnchoredPhrasePair] {
        &self.phrase_pairs
    }

    /// Propose a segmentation covering the entire sentence.
    pub fn propose_segmentation(&self) -> Option<PhraseSegmentation> {
        let all = CoverageBitmap::all_ones(self.sentence_length);
        self.propose_segmentation_for_range(&all)
    }

    /// Propose a segmentation covering exactly `range` (used by Resegment to
    /// re-split a contiguous sub-span of a sentence).
    pub fn propose_segmentation_for_range(&self, range: &CoverageBitmap) -> Option<PhraseSegmentation> {
        debug_assert_eq!(range.len(), self.sentence_length);

        let mut candidates: Vec<&AnchoredPhrasePair> = self
            .phrase_pairs
            .iter()
            .filter(|p| p.coverage.is_subset_of(range))
            .collect();
        candidates.sort_by_key(|p| p.coverage.lowest_set_bit().unwrap_or(usize::MAX));

        let mut seg = PhraseSegmentation::new();
        if propose_segmentation_left_right(&self.random, range, &candidates, &mut seg) {
            Some(seg)
        } else {
            None
        }
    }

    /// Sample a uniformly random alternative for `old` among phrase pairs
    /// anchored at the same coverage; falls back to `old` itself if there is
    /// no other candidate with that coverage.
    pub fn propose_alternative_translation(&self, old: &AnchoredPhrasePair) -> AnchoredPhrasePair {
        let matches: Vec<&AnchoredPhrasePair> = self
            .phrase_pairs
            .iter()
            .filter(|p| p.coverage == old.coverage)
            .collect();
        if matches.is_empty() {
            return old.clone();
        }
        let idx = self.random.draw_from_range(matches.len() as u32) as usize;
        matches[idx].clone()
    }

    /// Whether every anchored phrase pair in `segmentation` is present in
    /// this collection (used to validate a loaded saved-state segmentation).
    pub fn phrases_exist(&self, segmentation: &PhraseSegmentation) -> bool {
        segmentation.iter().all(|p1| {
            self.phrase_pairs
                .iter()
                .any(|p2| p1.coverage == p2.coverage && p1.phrase == p2.phrase)
        })
    }
}

/// Recursive left-to-right backtracking sampler. `candidates` is sorted by
/// lowest covered bit. Prepends the chosen pair to `seg` on the way back up
/// the call stack, which (given the left-to-right recursion shape) yields
/// the final segmentation in left-to-right order despite the prepending.
fn propose_segmentation_left_right(
    random: &Random,
    range: &CoverageBitmap,
    candidates: &[&AnchoredPhrasePair],
    seg: &mut PhraseSegmentation,
) -> bool {
    if range.none_set() {
        return true;
    }
    if candidates.is_empty() {
        return false;
    }

    let first_bit = match range.lowest_set_bit() {
        Some(b) => b,
        None => return true,
    };

    let start = match candidates.iter().position(|p| p.coverage.get(first_bit)) {
        Some(i) => i,
        None => return false,
    };
    let group_end = candidates[start..]
        .iter()
        .position(|p| p.coverage.lowest_set_bit().unwrap_or(usize::MAX) > first_bit)
        .map(|off| start + off)
        .unwrap_or(candidates.len());

    let noptions = group_end - start;
    let mut bad_choices = vec![false; noptions];
    let mut bad_count = 0;

    loop {
        if bad_count == noptions {
            return false;
        }

        let mut choice;
        loop {
            choice = random.draw_from_range(noptions as u32) as usize;
            if !bad_choices[choice] {
                break;
            }
        }
        bad_choices[choice] = true;
        bad_count += 1;

        let ph = candidates[start + choice];
        if !ph.coverage.is_subset_of(range) {
            continue;
        }

        let mut i = first_bit;
        while let Some(next) = ph.coverage.find_next(i) {
            if next == i + 1 {
                i = next;
            } else {
                break;
            }
        }
        i += 1;

        let next_start = candidates[group_end..]
            .iter()
            .position(|p| p.coverage.lowest_set_bit().unwrap_or(usize::MAX) >= i)
            .map(|off| group_end + off)
            .unwrap_or(candidates.len());

        let remaining_range = range.difference(&ph.coverage);
        if propose_segmentation_left_right(random, &remaining_range, &candidates[next_start..], seg) {
            seg.insert(0, (*ph).clone());
            return true;
        }
    }
}
