//! Phrase pairs, their hash-consing, and the per-sentence segmentation they
//! compose into.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};

use crate::types::{PhraseData, Scores, Word};

/// A bit set over the words of one source sentence. Bit `i` set means word
/// `i` is covered by some phrase pair in the segmentation. A complete
/// sentence segmentation's bitmaps are pairwise disjoint and their union is
/// the all-ones bitmap of length `sentence_len`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoverageBitmap {
    len: usize,
    bits: Vec<u64>,
}

impl CoverageBitmap {
    pub fn new(len: usize) -> Self {
        CoverageBitmap {
            len,
            bits: vec![0u64; len.div_ceil(64).max(1)],
        }
    }

    pub fn from_range(len: usize, from: usize, to: usize) -> Self {
        let mut bm = CoverageBitmap::new(len);
        for i in from..to {
            bm.set(i);
        }
        bm
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set(&mut self, i: usize) {
        debug_assert!(i < self.len);
        self.bits[i / 64] |= 1u64 << (i % 64);
    }

    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        self.bits[i / 64] & (1u64 << (i % 64)) != 0
    }

    pub fn union(&self, other: &CoverageBitmap) -> CoverageBitmap {
        debug_assert_eq!(self.len, other.len);
        let bits = self
            .bits
            .iter()
            .zip(other.bits.iter())
            .map(|(a, b)| a | b)
            .collect();
        CoverageBitmap { len: self.len, bits }
    }

    pub fn intersects(&self, other: &CoverageBitmap) -> bool {
        debug_assert_eq!(self.len, other.len);
        self.bits.iter().zip(other.bits.iter()).any(|(a, b)| a & b != 0)
    }

    pub fn is_subset_of(&self, other: &CoverageBitmap) -> bool {
        debug_assert_eq!(self.len, other.len);
        self.bits
            .iter()
            .zip(other.bits.iter())
            .all(|(a, b)| a & !b == 0)
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn all_ones(len: usize) -> CoverageBitmap {
        CoverageBitmap::from_range(len, 0, len)
    }

    /// Index of the lowest set bit, if any.
    pub fn lowest_set_bit(&self) -> Option<usize> {
        for i in 0..self.len {
            if self.get(i) {
                return Some(i);
            }
        }
        None
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&i| self.get(i))
    }

    /// Smallest set bit strictly greater than `i`, if any.
    pub fn find_next(&self, i: usize) -> Option<usize> {
        ((i + 1)..self.len).find(|&j| self.get(j))
    }

    /// Bitwise difference: bits set in `self` but not in `other`.
    pub fn difference(&self, other: &CoverageBitmap) -> CoverageBitmap {
        debug_assert_eq!(self.len, other.len);
        let bits = self
            .bits
            .iter()
            .zip(other.bits.iter())
            .map(|(a, b)| a & !b)
            .collect();
        CoverageBitmap { len: self.len, bits }
    }

    pub fn none_set(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }
}

impl PartialOrd for CoverageBitmap {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CoverageBitmap {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bits.cmp(&other.bits)
    }
}

/// Word-to-word alignment links within one phrase pair, addressable either
/// per source position or per target position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WordAlignment {
    nsrc: usize,
    ntgt: usize,
    links: Vec<bool>,
}

impl WordAlignment {
    pub fn new(nsrc: usize, ntgt: usize) -> Self {
        WordAlignment {
            nsrc,
            ntgt,
            links: vec![false; nsrc * ntgt],
        }
    }

    pub fn from_pairs(nsrc: usize, ntgt: usize, pairs: &[(usize, usize)]) -> Self {
        let mut wa = WordAlignment::new(nsrc, ntgt);
        for &(s, t) in pairs {
            wa.set_link(s, t);
        }
        wa
    }

    pub fn set_link(&mut self, s: usize, t: usize) {
        self.links[t * self.nsrc + s] = true;
    }

    pub fn has_link(&self, s: usize, t: usize) -> bool {
        self.links[t * self.nsrc + s]
    }

    pub fn source_size(&self) -> usize {
        self.nsrc
    }

    pub fn target_size(&self) -> usize {
        self.ntgt
    }

    /// Target positions linked from source position `s`, in increasing order.
    pub fn targets_for_source(&self, s: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.ntgt).filter(move |&t| self.has_link(s, t))
    }

    /// Source positions linked from target position `t`, in increasing order.
    pub fn sources_for_target(&self, t: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.nsrc).filter(move |&s| self.has_link(s, t))
    }
}

/// The immutable content of one phrase pair: a source phrase, a target
/// phrase, optional parallel target annotation layers (POS tags, lemmas,
/// ...), the word alignment between them, a per-feature score vector, and an
/// out-of-vocabulary flag.
///
/// Equality and hashing mirror the original's: only the sentence-internal
/// coverage length, source phrase and target phrase participate (alignment,
/// annotations, scores and the OOV flag are not part of the interning key).
#[derive(Debug, Clone)]
pub struct PhrasePairData {
    phrase_len: usize,
    source_phrase: PhraseData,
    target_phrase: PhraseData,
    target_annotations: Vec<PhraseData>,
    alignment: WordAlignment,
    scores: Scores,
    oov: bool,
}

impl PhrasePairData {
    pub fn new(
        source_phrase: PhraseData,
        target_phrase: PhraseData,
        target_annotations: Vec<PhraseData>,
        alignment: WordAlignment,
        scores: Scores,
    ) -> Self {
        let phrase_len = source_phrase.len();
        PhrasePairData {
            phrase_len,
            source_phrase,
            target_phrase,
            target_annotations,
            alignment,
            scores,
            oov: false,
        }
    }

    /// The special one-word-to-one-word pair used when the phrase table has
    /// no entry for a source word: source and target phrase are both the
    /// literal source word, linked to each other.
    pub fn oov(word: Word, scores: Scores) -> Self {
        let mut alignment = WordAlignment::new(1, 1);
        alignment.set_link(0, 0);
        PhrasePairData {
            phrase_len: 1,
            source_phrase: vec![word.clone()],
            target_phrase: vec![word],
            target_annotations: Vec::new(),
            alignment,
            scores,
            oov: true,
        }
    }

    pub fn source_phrase(&self) -> &PhraseData {
        &self.source_phrase
    }

    pub fn target_phrase(&self) -> &PhraseData {
        &self.target_phrase
    }

    pub fn target_annotations(&self, level: usize) -> &PhraseData {
        self.target_annotations
            .get(level)
            .unwrap_or(&self.target_phrase)
    }

    pub fn alignment(&self) -> &WordAlignment {
        &self.alignment
    }

    pub fn scores(&self) -> &Scores {
        &self.scores
    }

    pub fn is_oov(&self) -> bool {
        self.oov
    }

    fn interning_key(&self) -> (usize, &PhraseData, &PhraseData) {
        (self.phrase_len, &self.source_phrase, &self.target_phrase)
    }
}

impl PartialEq for PhrasePairData {
    fn eq(&self, other: &Self) -> bool {
        self.interning_key() == other.interning_key()
    }
}
impl Eq for PhrasePairData {}

impl Hash for PhrasePairData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.interning_key().hash(state);
    }
}

/// A hash-consed handle to a [`PhrasePairData`]. Two handles compare equal
/// iff they point at the same physical allocation: the interner guarantees
/// there is exactly one allocation per logically distinct value, so pointer
/// equality and structural equality coincide.
#[derive(Debug, Clone)]
pub struct PhrasePair(Rc<PhrasePairData>);

impl PhrasePair {
    pub fn data(&self) -> &PhrasePairData {
        &self.0
    }
}

impl PartialEq for PhrasePair {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for PhrasePair {}

impl Hash for PhrasePair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

/// Interning table for [`PhrasePairData`]; replaces the original's
/// `boost::flyweight` with an explicit table returning `Rc` handles.
#[derive(Debug, Default)]
pub struct PhrasePairInterner {
    table: RefCell<AHashMap<PhrasePairData, Rc<PhrasePairData>>>,
}

impl PhrasePairInterner {
    pub fn new() -> Self {
        PhrasePairInterner {
            table: RefCell::new(AHashMap::default()),
        }
    }

    pub fn intern(&self, data: PhrasePairData) -> PhrasePair {
        let mut table = self.table.borrow_mut();
        match table.entry(data) {
            Entry::Occupied(e) => PhrasePair(Rc::clone(e.get())),
            Entry::Vacant(e) => {
                let rc = Rc::new(e.key().clone());
                e.insert(Rc::clone(&rc));
                PhrasePair(rc)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A phrase pair anchored to specific source positions within its sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredPhrasePair {
    pub coverage: CoverageBitmap,
    pub phrase: PhrasePair,
}

impl AnchoredPhrasePair {
    pub fn new(coverage: CoverageBitmap, phrase: PhrasePair) -> Self {
        AnchoredPhrasePair { coverage, phrase }
    }
}

/// An ordered sequence of anchored phrase pairs for one sentence. Invariants
/// (checked under `debug_assertions` by [`crate::document::DocumentState`]):
/// bitmaps are pairwise disjoint, their union is the full source bitmap, and
/// the target order is the list order.
pub type PhraseSegmentation = Vec<AnchoredPhrasePair>;

/// Total number of target words spanned by a slice of anchored phrase pairs.
pub fn count_target_words(segmentation: &[AnchoredPhrasePair]) -> usize {
    segmentation
        .iter()
        .map(|p| p.phrase.data().target_phrase().len())
        .sum()
}

/// Lexicographic comparator over (coverage, source phrase, target phrase),
/// used by `LinearisePhrases` in the original. This crate instead sorts by
/// lowest covered source bit directly (see `DESIGN.md`'s pinned open
/// question); this comparator is kept only where a full tuple compare is
/// genuinely needed (none, currently) and as a documented equivalence point.
pub fn compare_anchored_phrase_pairs(a: &AnchoredPhrasePair, b: &AnchoredPhrasePair) -> Ordering {
    a.coverage
        .cmp(&b.coverage)
        .then_with(|| a.phrase.data().source_phrase().cmp(b.phrase.data().source_phrase()))
        .then_with(|| a.phrase.data().target_phrase().cmp(b.phrase.data().target_phrase()))
}

/// Structural equality of two segmentations, used by `DocumentState`
/// equality and `NbestStorage` deduplication: two anchored phrase pairs are
/// equal iff their coverage bitmaps are equal and they reference the same
/// interned phrase pair.
pub fn segmentations_equal(a: &[AnchoredPhrasePair], b: &[AnchoredPhrasePair]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.coverage == y.coverage && x.phrase == y.phrase)
}

/// A set of phrase pairs used for deduplicating proposals; keyed on the
/// pointer identity of the interned handle.
pub type PhrasePairSet = AHashSet<PhrasePair>;
