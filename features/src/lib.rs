//! Built-in `FeatureFunction` implementations: the counting penalties named
//! in the original source, a demonstrative document-scoped consistency
//! feature, and the name registry that resolves configured model types to
//! constructors.

pub mod counters;
pub mod ngram_consistency;
pub mod phrase_table_scores;
pub mod registry;

pub use ngram_consistency::NgramConsistencyFeature;
pub use phrase_table_scores::PhraseTableScoresFeature;
pub use registry::builtin;
