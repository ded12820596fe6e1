//! Markable annotation layers (MMAX2 stand-off markup): named spans over a
//! document's sentences carrying arbitrary attributes, used by document-
//! scoped feature functions that need more than plain tokens (coreference
//! chains, named-entity spans, ...). Parsing the MMAX2 file format itself
//! (its `.mmax` project files, `words.xml`, and per-layer markable files
//! with stand-off pointers) is out of scope; this is the trait such a
//! parser would satisfy, plus an in-memory implementation for tests and for
//! markables derived some other way (e.g. from a simpler in-house format).

use ahash::AHashMap;

/// One annotated span: a sentence number, the word positions it covers, and
/// a flat attribute map (`"entity-type" -> "PERSON"`, and so on).
#[derive(Debug, Clone, PartialEq)]
pub struct Markable {
    pub sentence: usize,
    pub from: usize,
    pub to: usize,
    pub attributes: AHashMap<String, String>,
}

/// Answers "which markables touch sentence N" for one document.
pub trait MarkableSource {
    fn markables_for(&self, sentno: usize) -> &[Markable];
}

/// A `MarkableSource` built from a flat list, grouped by sentence at
/// construction time.
#[derive(Debug, Default)]
pub struct InMemoryMarkableSource {
    by_sentence: AHashMap<usize, Vec<Markable>>,
    empty: Vec<Markable>,
}

impl InMemoryMarkableSource {
    pub fn new(markables: Vec<Markable>) -> Self {
        let mut by_sentence: AHashMap<usize, Vec<Markable>> = AHashMap::default();
        for m in markables {
            by_sentence.entry(m.sentence).or_default().push(m);
        }
        InMemoryMarkableSource { by_sentence, empty: Vec::new() }
    }
}

impl MarkableSource for InMemoryMarkableSource {
    fn markables_for(&self, sentno: usize) -> &[Markable] {
        self.by_sentence.get(&sentno).unwrap_or(&self.empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_markables_by_sentence() {
        let mut attrs = AHashMap::default();
        attrs.insert("entity-type".to_string(), "PERSON".to_string());
        let source = InMemoryMarkableSource::new(vec![
            Markable { sentence: 0, from: 0, to: 1, attributes: attrs.clone() },
            Markable { sentence: 1, from: 2, to: 3, attributes: attrs },
        ]);
        assert_eq!(source.markables_for(0).len(), 1);
        assert_eq!(source.markables_for(1).len(), 1);
        assert!(source.markables_for(2).is_empty());
    }
}
