//! The phrase-table query interface `docent_core::phrase_collection`
//! consumes when building a document's per-sentence `PhrasePairCollection`,
//! plus a simple in-memory implementation sufficient to run the end-to-end
//! scenarios. A real corpus-backed implementation is out of scope; this
//! trait is the contract it would satisfy.

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use ahash::AHashSet;
use serde::Deserialize;

use docent_core::error::{DocentError, DocentResult};
use docent_core::phrase::{AnchoredPhrasePair, CoverageBitmap, PhrasePairData, PhrasePairInterner};
use docent_core::phrase_collection::PhrasePairCollection;
use docent_core::random::Random;
use docent_core::types::{Scores, Word};

/// The source vocabulary a phrase table covers, used to decide whether a
/// source word needs an OOV fallback phrase pair.
#[derive(Debug, Default)]
pub struct Vocab {
    words: AHashSet<Word>,
}

impl Vocab {
    pub fn new() -> Self {
        Vocab::default()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Answers "all phrase pairs covering this source span" for one source
/// sentence's worth of spans.
pub trait PhraseTable {
    fn query(&self, source_span: &[Word]) -> Option<&[PhrasePairData]>;
    fn vocab(&self) -> &Vocab;
}

/// A phrase table built from a flat list of `(source, target, scores)`
/// tuples, keyed by the joined source span. Sufficient for the fixed,
/// small phrase tables the end-to-end scenarios and unit tests use; not a
/// corpus-scale index.
#[derive(Debug, Default)]
pub struct InMemoryPhraseTable {
    by_source: AHashMap<String, Vec<PhrasePairData>>,
    vocab: Vocab,
}

fn source_key(source_span: &[Word]) -> String {
    source_span.join(" ")
}

impl InMemoryPhraseTable {
    pub fn new() -> Self {
        InMemoryPhraseTable::default()
    }

    /// Adds one phrase-table entry. `source` and `target` are the phrase's
    /// word sequences; `scores` are the feature-function score
    /// contributions the phrase table itself carries (translation model
    /// scores, etc.) — opaque to this type, just stored in the
    /// `PhrasePairData`.
    pub fn add_entry(&mut self, source: Vec<Word>, target: Vec<Word>, scores: docent_core::types::Scores) {
        for w in &source {
            self.vocab.words.insert(w.clone());
        }
        let key = source_key(&source);
        let alignment = docent_core::phrase::WordAlignment::new(source.len(), target.len());
        let data = PhrasePairData::new(source, target, Vec::new(), alignment, scores);
        self.by_source.entry(key).or_default().push(data);
    }

    pub fn len(&self) -> usize {
        self.by_source.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    /// Loads a fixture file of `{"source": [...], "target": [...], "scores": [...]}`
    /// entries — enough to run the end-to-end scenarios without a real
    /// corpus-backed phrase table, which is out of scope.
    pub fn load_json<P: AsRef<Path>>(path: P) -> DocentResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| DocentError::file_format(path.display().to_string(), "<read>", e.to_string()))?;
        let entries: Vec<JsonEntry> = serde_json::from_str(&text)
            .map_err(|e| DocentError::file_format(path.display().to_string(), "<parse>", e.to_string()))?;

        let mut table = InMemoryPhraseTable::new();
        for entry in entries {
            table.add_entry(entry.source, entry.target, Scores(entry.scores));
        }
        Ok(table)
    }
}

#[derive(Debug, Deserialize)]
struct JsonEntry {
    source: Vec<Word>,
    target: Vec<Word>,
    #[serde(default)]
    scores: Vec<f32>,
}

impl PhraseTable for InMemoryPhraseTable {
    fn query(&self, source_span: &[Word]) -> Option<&[PhrasePairData]> {
        self.by_source.get(&source_key(source_span)).map(Vec::as_slice)
    }

    fn vocab(&self) -> &Vocab {
        &self.vocab
    }
}

/// Builds one sentence's `PhrasePairCollection` by querying `table` over
/// every contiguous span up to `max_phrase_length` words, then filling any
/// source position no span covered with an OOV fallback phrase pair.
/// Grounded directly on `PhraseTable::getPhrasesForSentence` in the
/// original: span enumeration order, the `uncovered` bitmap, and the
/// OOV-fallback pass are all the same shape.
pub fn collect_phrases(
    table: &dyn PhraseTable,
    sentence: &[Word],
    max_phrase_length: usize,
    interner: &PhrasePairInterner,
    random: Random,
) -> PhrasePairCollection {
    let len = sentence.len();
    let mut collection = PhrasePairCollection::new(len, random);
    let mut uncovered = CoverageBitmap::all_ones(len);

    for i in 0..len {
        for j in 0..max_phrase_length {
            if i + j >= len {
                break;
            }
            let span = &sentence[i..=i + j];
            if let Some(candidates) = table.query(span) {
                let coverage = CoverageBitmap::from_range(len, i, i + j + 1);
                for data in candidates {
                    collection.add_phrase_pair(AnchoredPhrasePair::new(coverage.clone(), interner.intern(data.clone())));
                }
                uncovered = uncovered.difference(&coverage);
            }
        }
    }

    for i in uncovered.iter_ones() {
        let data = PhrasePairData::oov(sentence[i].clone(), Scores::zeros(0));
        let coverage = CoverageBitmap::from_range(len, i, i + 1);
        collection.add_phrase_pair(AnchoredPhrasePair::new(coverage, interner.intern(data)));
    }

    collection
}
