//! Name -> constructor lookup for built-in feature functions, mirroring
//! `FeatureFunctionFactory::create`'s dispatch table in
//! `examples/original_source/src/FeatureFunction.cpp`: a string type name
//! resolves to a constructor, and an unrecognised name is indistinguishable
//! from one that's simply not implemented here.

use docent_core::config::Parameters;
use docent_core::feature::FeatureFunction;

use crate::counters::{long_word_penalty, oov_penalty, phrase_penalty, word_penalty};
use crate::ngram_consistency::NgramConsistencyFeature;
use crate::phrase_table_scores::PhraseTableScoresFeature;

const DEFAULT_LONG_WORD_LIMIT: usize = 7;
const DEFAULT_PHRASE_TABLE_NUM_SCORES: usize = 1;

/// Resolve a feature function by its configured type name, using default
/// parameters where a feature takes any. Returns `None` both for names this
/// crate never implements (`bleu`, `bracketing`, `consistency-qmodel-*`,
/// `semantic-similarity`, `sentence-parity`, `well-formedness`, ...) and for
/// genuinely unrecognised names — the caller reports both the same way.
pub fn builtin(name: &str) -> Option<Box<dyn FeatureFunction>> {
    builtin_with_params(name, &Parameters::new())
}

/// Like [`builtin`], but lets configuration parameters reach the
/// constructor (currently only `long-word-penalty`'s
/// `long-word-length-limit`).
pub fn builtin_with_params(name: &str, params: &Parameters) -> Option<Box<dyn FeatureFunction>> {
    match name {
        "phrase-penalty" => Some(Box::new(phrase_penalty())),
        "word-penalty" => Some(Box::new(word_penalty())),
        "oov-penalty" => Some(Box::new(oov_penalty())),
        "long-word-penalty" => {
            let limit = params
                .get("long-word-length-limit")
                .and_then(|v| v.as_u32())
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_LONG_WORD_LIMIT);
            Some(Box::new(long_word_penalty(limit)))
        }
        "ngram-consistency" => Some(Box::new(NgramConsistencyFeature::new())),
        "phrase-table" => {
            let dim = params
                .get("num-scores")
                .and_then(|v| v.as_u32())
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_PHRASE_TABLE_NUM_SCORES);
            Some(Box::new(PhraseTableScoresFeature::new(dim)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_documented_name() {
        for name in [
            "phrase-penalty",
            "word-penalty",
            "oov-penalty",
            "long-word-penalty",
            "ngram-consistency",
            "phrase-table",
        ] {
            assert!(builtin(name).is_some(), "expected {name} to resolve");
        }
    }

    #[test]
    fn out_of_scope_and_unknown_names_both_resolve_to_none() {
        for name in ["bleu", "bracketing", "consistency-qmodel-word", "semantic-similarity", "sentence-parity", "well-formedness", "totally-unknown"] {
            assert!(builtin(name).is_none(), "expected {name} to resolve to None");
        }
    }
}
