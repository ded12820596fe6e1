//! Everything that crosses the document-state search engine's boundary with
//! the outside world: the phrase-table query interface, the NIST XML
//! testset reader/writer, persisted decoder state, and markable annotation
//! layers.

pub mod mmax;
pub mod nistxml;
pub mod phrase_table;
pub mod saved_state;

pub use mmax::{InMemoryMarkableSource, Markable, MarkableSource};
pub use nistxml::{render_testset, NistDocument, NistSegment, NistXmlStateInitialiser, TranslatedDocument, TranslatedSegment};
pub use phrase_table::{collect_phrases, InMemoryPhraseTable, PhraseTable, Vocab};
