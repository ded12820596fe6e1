//! Persisted decoder state: a bincode archive of every document's current
//! segmentation, written at the end of a run and read back by
//! [`docent_core::generator::SavedStateInitialiser`] to resume (or compare
//! against) a previous one. Phrase pairs are hash-consed `Rc` handles and
//! are not themselves serializable; round-tripping re-interns each saved
//! phrase against the phrase table supplied at load time, which returns the
//! identical `Rc` when an entry with the same source and target phrase is
//! already present (interning is content-addressed, see `phrase.rs`).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use docent_core::document::DocumentState;
use docent_core::error::{DocentError, DocentResult};
use docent_core::phrase::{AnchoredPhrasePair, CoverageBitmap, PhrasePairData, PhrasePairInterner, PhraseSegmentation, WordAlignment};
use docent_core::types::{Scores, Word};

#[derive(Debug, Serialize, Deserialize)]
struct SavedPhrasePair {
    from: usize,
    to: usize,
    source_phrase: Vec<Word>,
    target_phrase: Vec<Word>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedState {
    /// Indexed `[document][sentence][phrase-in-segmentation]`.
    documents: Vec<Vec<Vec<SavedPhrasePair>>>,
}

/// Serializes every document's current segmentation to `path` as a bincode
/// archive.
pub fn save<P: AsRef<Path>>(documents: &[DocumentState], path: P) -> DocentResult<()> {
    let saved = SavedState {
        documents: documents
            .iter()
            .map(|doc| {
                doc.sentences()
                    .iter()
                    .map(|seg| {
                        seg.iter()
                            .map(|app| {
                                let (from, to) = coverage_range(&app.coverage);
                                SavedPhrasePair {
                                    from,
                                    to,
                                    source_phrase: app.phrase.data().source_phrase().clone(),
                                    target_phrase: app.phrase.data().target_phrase().clone(),
                                }
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect(),
    };

    let bytes = bincode::serialize(&saved)
        .map_err(|e| DocentError::file_format(path.as_ref().display().to_string(), "<encode>", e.to_string()))?;
    fs::write(path.as_ref(), bytes)
        .map_err(|e| DocentError::file_format(path.as_ref().display().to_string(), "<write>", e.to_string()))
}

/// Reads a saved-state archive back, re-interning each phrase pair against
/// `interner` so the result's `Rc` handles are identical to the phrase
/// table's own entries. Returns segmentations in the same
/// `[document][sentence]` shape `SavedStateInitialiser::new` expects.
///
/// A saved phrase pair with no matching entry in the interner (e.g. the
/// phrase table changed since the state was saved) still round-trips: the
/// interner happily mints a fresh allocation for it, but
/// `PhrasePairCollection::phrases_exist` will then correctly reject it, since
/// that fresh allocation cannot match any pointer already in the phrase
/// table's own collection.
pub fn load<P: AsRef<Path>>(
    path: P,
    interner: &PhrasePairInterner,
    sentence_lengths: &[Vec<usize>],
) -> DocentResult<Vec<Vec<PhraseSegmentation>>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| DocentError::file_format(path.display().to_string(), "<read>", e.to_string()))?;
    let saved: SavedState = bincode::deserialize(&bytes)
        .map_err(|e| DocentError::file_format(path.display().to_string(), "<decode>", e.to_string()))?;

    saved
        .documents
        .into_iter()
        .enumerate()
        .map(|(doc_no, doc)| {
            doc.into_iter()
                .enumerate()
                .map(|(sent_no, seg)| {
                    let len = *sentence_lengths
                        .get(doc_no)
                        .and_then(|lengths| lengths.get(sent_no))
                        .ok_or_else(|| {
                            DocentError::file_format(
                                path.display().to_string(),
                                "<decode>",
                                format!("saved state has more sentences than document {doc_no} has"),
                            )
                        })?;
                    Ok(seg
                        .into_iter()
                        .map(|p| {
                            let coverage = CoverageBitmap::from_range(len, p.from, p.to);
                            let alignment = WordAlignment::new(p.source_phrase.len(), p.target_phrase.len());
                            let data = PhrasePairData::new(p.source_phrase, p.target_phrase, Vec::new(), alignment, Scores::zeros(0));
                            AnchoredPhrasePair::new(coverage, interner.intern(data))
                        })
                        .collect())
                })
                .collect::<DocentResult<Vec<_>>>()
        })
        .collect()
}

fn coverage_range(coverage: &CoverageBitmap) -> (usize, usize) {
    let from = coverage.lowest_set_bit().unwrap_or(0);
    let to = from + coverage.count_ones();
    (from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_a_segmentation_through_the_same_interner() {
        let interner = PhrasePairInterner::new();
        let data = PhrasePairData::new(
            vec!["le".into(), "chien".into()],
            vec!["the".into(), "dog".into()],
            Vec::new(),
            WordAlignment::new(2, 2),
            Scores::zeros(0),
        );
        let original = interner.intern(data);
        let seg = vec![AnchoredPhrasePair::new(CoverageBitmap::from_range(2, 0, 2), original.clone())];

        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.bin");
        let saved = SavedState {
            documents: vec![vec![seg
                .iter()
                .map(|app| SavedPhrasePair {
                    from: 0,
                    to: 2,
                    source_phrase: app.phrase.data().source_phrase().clone(),
                    target_phrase: app.phrase.data().target_phrase().clone(),
                })
                .collect()]],
        };
        let bytes = bincode::serialize(&saved).expect("encode");
        fs::write(&path, bytes).expect("write");

        let loaded = load(&path, &interner, &[vec![2]]).expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].len(), 1);
        assert_eq!(loaded[0][0].len(), 1);
        assert_eq!(loaded[0][0][0].phrase, original);
    }
}
