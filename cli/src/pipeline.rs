//! Shared per-run assembly: config + phrase table -> a runnable search
//! loop. Mirrors `docent.cpp`'s `main()`/`processTestset()`: parse the
//! configuration once, then for every document build a `DocumentState`,
//! run the configured search algorithm to completion, and collect the
//! single best translation.

use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};

use docent_core::config::{require_u32, DecoderConfig};
use docent_core::cooling::CoolingSchedule;
use docent_core::document::{DecoderRuntime, DocumentState};
use docent_core::error::DocentError;
use docent_core::generator::{StateGenerator, StateInitialiser};
use docent_core::nbest::NbestStorage;
use docent_core::phrase::PhrasePairInterner;
use docent_core::random::Random;
use docent_core::search::{LocalBeamSearch, SearchOutcome, SimulatedAnnealing};
use docent_core::types::Word;

use docent_io::nistxml::{self, NistXmlStateInitialiser};
use docent_io::{collect_phrases, saved_state, InMemoryPhraseTable};

use crate::config_load::{build_cooling_schedule, build_runtime, build_state_generator, phrase_table_file, phrase_table_model};

pub const DEFAULT_MAX_PHRASE_LENGTH: usize = 7;

/// Everything one decoding run needs, built once from a `DecoderConfig`.
/// Holds a single [`PhrasePairInterner`] shared across every document in the
/// run (not one per document): `init-method = "saved-state"` re-interns a
/// persisted segmentation against the phrase pairs the table itself minted,
/// and that only resolves to the identical `Rc` when both sides went through
/// the same interner instance.
pub struct Pipeline {
    pub config: DecoderConfig,
    pub runtime: Rc<DecoderRuntime>,
    pub phrase_table: InMemoryPhraseTable,
    pub max_phrase_length: usize,
    pub interner: PhrasePairInterner,
}

impl Pipeline {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = DecoderConfig::load_toml(config_path)
            .with_context(|| format!("loading configuration from {}", config_path.display()))?;
        let random = Random::seeded(config.random.seed);
        let runtime = build_runtime(&config, random).context("resolving configured models")?;

        let pt_model = phrase_table_model(&config, "models")?;
        let pt_path = phrase_table_file(pt_model, &format!("models.{}", pt_model.id))?;
        let phrase_table = InMemoryPhraseTable::load_json(pt_path)
            .with_context(|| format!("loading phrase table from {pt_path}"))?;
        let max_phrase_length = pt_model
            .parameters
            .get("max-phrase-length")
            .and_then(|v| v.as_u32())
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_PHRASE_LENGTH);

        Ok(Pipeline { config, runtime, phrase_table, max_phrase_length, interner: PhrasePairInterner::new() })
    }

    pub fn state_generator(&self, initialiser: Box<dyn StateInitialiser>) -> Result<StateGenerator> {
        build_state_generator(&self.config.state_generator, initialiser, self.runtime.random.clone())
            .context("building state generator")
    }

    pub fn cooling_schedule(&self) -> Result<CoolingSchedule> {
        build_cooling_schedule(&self.config.search, "search").map_err(Into::into)
    }

    /// Builds one document's per-sentence phrase-pair collections and the
    /// initial segmentation `generator`'s initialiser proposes for each.
    pub fn build_document(
        &self,
        sentences: &[Vec<Word>],
        document_number: usize,
        generator: &StateGenerator,
    ) -> Result<DocumentState> {
        let mut phrase_translations = Vec::with_capacity(sentences.len());
        let mut initial_segmentations = Vec::with_capacity(sentences.len());

        for (sentno, sentence) in sentences.iter().enumerate() {
            let collection = collect_phrases(
                &self.phrase_table,
                sentence,
                self.max_phrase_length,
                &self.interner,
                self.runtime.random.clone(),
            );
            let segmentation = generator
                .init_segmentation(&collection, sentence, document_number, sentno)
                .with_context(|| format!("initialising segmentation for sentence {sentno}"))?;
            phrase_translations.push(Rc::new(collection));
            initial_segmentations.push(segmentation);
        }

        Ok(DocumentState::new(Rc::clone(&self.runtime), phrase_translations, initial_segmentations))
    }
}

/// Runs the configured search algorithm (`search.algorithm`) to completion
/// for one document. `max_steps`/`max_accepted` bound this particular call
/// (detailed-docent samples in slices; the plain driver passes `u32::MAX`
/// for both, matching `docent.cpp`'s parameterless `search(doc, nbest)`
/// call, which relies solely on the algorithm's own `total_max_steps`).
pub fn run_search(
    pipeline: &Pipeline,
    document: DocumentState,
    generator: &StateGenerator,
    nbest: &mut NbestStorage,
    max_steps: u32,
    max_accepted: u32,
) -> Result<SearchOutcome> {
    let params = &pipeline.config.search.parameters;
    let path = "search";
    let target_score = params.get("target-score").and_then(|v| v.as_f32()).unwrap_or(f32::INFINITY);

    match pipeline.config.search.algorithm.as_str() {
        "simulated-annealing" => {
            let total_max_steps = require_u32(params, "max-steps", path)?;
            let schedule = pipeline.cooling_schedule()?;
            let algo = SimulatedAnnealing::new(pipeline.runtime.random.clone(), total_max_steps, target_score);
            Ok(algo.search(document, generator, nbest, schedule, max_steps, max_accepted))
        }
        "local-beam-search" => {
            let total_max_steps = require_u32(params, "max-steps", path)?;
            let max_rejected = require_u32(params, "max-rejected", path)?;
            let beam_size = require_u32(params, "beam-size", path)? as usize;
            let algo = LocalBeamSearch::new(pipeline.runtime.random.clone(), total_max_steps, max_rejected, target_score, beam_size);
            Ok(algo.search(document, generator, nbest, max_steps, max_accepted))
        }
        other => Err(DocentError::configuration(path, format!("unknown search algorithm `{other}`")).into()),
    }
}

/// Resolves the per-sentence initial-segmentation source for a whole
/// testset. `baseline_path` takes precedence over the configured
/// `init-method` when present, matching `docent.cpp`'s `-t` flag, which
/// forces `type="testset"` regardless of what the configuration says.
/// `sentence_lengths` (`[document][sentence] -> token count`) is only
/// consulted for `init-method = "saved-state"`.
pub fn resolve_initialiser(
    pipeline: &Pipeline,
    baseline_path: Option<&Path>,
    sentence_lengths: &[Vec<usize>],
) -> Result<Box<dyn StateInitialiser>> {
    if let Some(path) = baseline_path {
        let baseline = nistxml::read_testset(path)
            .with_context(|| format!("reading baseline translations from {}", path.display()))?;
        return Ok(Box::new(NistXmlStateInitialiser::new(baseline)));
    }

    let sg = &pipeline.config.state_generator;
    match sg.init_method.as_str() {
        "monotonic" => Ok(Box::new(docent_core::generator::MonotonicStateInitialiser)),
        "testset" => {
            let file = docent_core::config::require_string(&sg.parameters, "file", "state-generator")?;
            let baseline = nistxml::read_testset(file)
                .with_context(|| format!("reading baseline translations from {file}"))?;
            Ok(Box::new(NistXmlStateInitialiser::new(baseline)))
        }
        "saved-state" => {
            let file = docent_core::config::require_string(&sg.parameters, "file", "state-generator")?;
            let segmentations = saved_state::load(file, &pipeline.interner, sentence_lengths)
                .with_context(|| format!("reading saved state from {file}"))?;
            Ok(Box::new(docent_core::generator::SavedStateInitialiser::new(segmentations)))
        }
        other => Err(DocentError::configuration("state-generator.init-method", format!("unknown init-method `{other}`")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).expect("create fixture");
        f.write_all(contents.as_bytes()).expect("write fixture");
        path
    }

    #[test]
    fn loads_a_pipeline_end_to_end_from_toml_and_json_fixtures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let phrase_table_path = write_fixture(
            &dir,
            "phrases.json",
            r#"[
                {"source": ["a"], "target": ["A"], "scores": [0.1]},
                {"source": ["b"], "target": ["B"], "scores": [0.1]},
                {"source": ["c"], "target": ["C"], "scores": [0.1]}
            ]"#,
        );
        let config_toml = format!(
            r#"
            [random]
            seed = 1

            [state-generator]
            init-method = "monotonic"

            [[state-generator.operations]]
            type = "change-phrase-translation"
            weight = 1.0

            [search]
            algorithm = "simulated-annealing"
            parameters = {{ max-steps = 100, schedule = "hill-climbing" }}

            [[models]]
            id = "pt0"
            type = "phrase-table"
            parameters = {{ file = "{}" }}

            [[models]]
            id = "pp"
            type = "phrase-penalty"

            [[weights]]
            model = "pt0"
            score = 1.0

            [[weights]]
            model = "pp"
            score = 1.0
            "#,
            phrase_table_path.display()
        );
        let config_path = write_fixture(&dir, "config.toml", &config_toml);

        let pipeline = Pipeline::load(&config_path).expect("pipeline loads");
        let initialiser = Box::new(docent_core::generator::MonotonicStateInitialiser);
        let generator = pipeline.state_generator(initialiser).expect("builds generator");
        let doc = pipeline
            .build_document(&[vec!["a".to_string(), "b".to_string(), "c".to_string()]], 0, &generator)
            .expect("builds document");
        assert_eq!(doc.number_of_sentences(), 1);
        assert_eq!(doc.as_plain_text(), vec![vec!["A".to_string(), "B".to_string(), "C".to_string()]]);
    }

    fn write_baseline_testset(dir: &tempfile::TempDir, name: &str, docid: &str, segid: &str, text: &str) -> std::path::PathBuf {
        let xml = format!(r#"<srcset><doc docid="{docid}"><seg id="{segid}">{text}</seg></doc></srcset>"#);
        write_fixture(dir, name, &xml)
    }

    #[test]
    fn resolve_initialiser_falls_back_to_the_configured_init_method_when_no_baseline_is_given() {
        let dir = tempfile::tempdir().expect("tempdir");
        let phrase_table_path = write_fixture(&dir, "phrases.json", r#"[{"source": ["a"], "target": ["A"], "scores": [0.1]}]"#);
        let config_toml = format!(
            r#"
            [random]
            seed = 1
            [state-generator]
            init-method = "monotonic"
            [search]
            algorithm = "simulated-annealing"
            parameters = {{ max-steps = 10 }}
            [[models]]
            id = "pt0"
            type = "phrase-table"
            parameters = {{ file = "{}" }}
            [[weights]]
            model = "pt0"
            score = 1.0
            "#,
            phrase_table_path.display()
        );
        let config_path = write_fixture(&dir, "config.toml", &config_toml);
        let pipeline = Pipeline::load(&config_path).expect("pipeline loads");

        let initialiser = resolve_initialiser(&pipeline, None, &[]).expect("resolves");
        let generator = pipeline.state_generator(initialiser).expect("builds generator");
        let doc = pipeline.build_document(&[vec!["a".to_string()]], 0, &generator).expect("builds document");
        assert_eq!(doc.as_plain_text(), vec![vec!["A".to_string()]]);
    }

    #[test]
    fn resolve_initialiser_prefers_a_baseline_override_over_the_configured_init_method() {
        let dir = tempfile::tempdir().expect("tempdir");
        let phrase_table_path = write_fixture(
            &dir,
            "phrases.json",
            r#"[{"source": ["a"], "target": ["A"], "scores": [0.1]}, {"source": ["a"], "target": ["Z"], "scores": [0.1]}]"#,
        );
        let config_toml = format!(
            r#"
            [random]
            seed = 1
            [state-generator]
            init-method = "this-is-not-a-real-init-method"
            [search]
            algorithm = "simulated-annealing"
            parameters = {{ max-steps = 10 }}
            [[models]]
            id = "pt0"
            type = "phrase-table"
            parameters = {{ file = "{}" }}
            [[weights]]
            model = "pt0"
            score = 1.0
            "#,
            phrase_table_path.display()
        );
        let config_path = write_fixture(&dir, "config.toml", &config_toml);
        let pipeline = Pipeline::load(&config_path).expect("pipeline loads");

        let baseline_path = write_baseline_testset(&dir, "baseline.xml", "d1", "1", "Z");
        let initialiser = resolve_initialiser(&pipeline, Some(&baseline_path), &[]).expect("baseline override bypasses init-method");
        let generator = pipeline.state_generator(initialiser).expect("builds generator");
        let doc = pipeline.build_document(&[vec!["a".to_string()]], 0, &generator).expect("builds document");
        assert_eq!(doc.as_plain_text(), vec![vec!["Z".to_string()]]);
    }
}
