//! End-to-end scenarios driven through the public `Pipeline`/`run_search`
//! surface, exercising the same path the `docent` binary takes from a TOML
//! configuration and a JSON phrase-table fixture down to a decoded
//! document.

use std::io::Write;

use docent_core::nbest::NbestStorage;
use docent_io::saved_state;

use docent_cli::pipeline::{resolve_initialiser, run_search, Pipeline};

fn write_fixture(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).expect("create fixture");
    f.write_all(contents.as_bytes()).expect("write fixture");
    path
}

/// Single-sentence monotonic identity (spec scenario 1, initial-state half):
/// with only `phrase-penalty` weighted, splitting `a b c` into three
/// one-word phrases scores `1.0 * 3 == 3`, matching
/// `docent_core::generator::MonotonicStateInitialiser`'s fresh-sample
/// behaviour against a table that offers no multi-word entries.
#[test]
fn monotonic_initialisation_of_three_single_word_phrases_scores_three() {
    let dir = tempfile::tempdir().expect("tempdir");
    let phrase_table_path = write_fixture(
        &dir,
        "phrases.json",
        r#"[
            {"source": ["a"], "target": ["A"], "scores": []},
            {"source": ["b"], "target": ["B"], "scores": []},
            {"source": ["c"], "target": ["C"], "scores": []}
        ]"#,
    );
    let config_toml = format!(
        r#"
        [random]
        seed = 7

        [state-generator]
        init-method = "monotonic"

        [[state-generator.operations]]
        type = "change-phrase-translation"
        weight = 1.0

        [search]
        algorithm = "simulated-annealing"
        parameters = {{ max-steps = 1, schedule = "hill-climbing" }}

        [[models]]
        id = "pt0"
        type = "phrase-table"
        parameters = {{ file = "{}" }}

        [[models]]
        id = "pp"
        type = "phrase-penalty"

        [[weights]]
        model = "pt0"
        score = 0.0

        [[weights]]
        model = "pp"
        score = 1.0
        "#,
        phrase_table_path.display()
    );
    let config_path = write_fixture(&dir, "config.toml", &config_toml);

    let pipeline = Pipeline::load(&config_path).expect("pipeline loads");
    let initialiser = resolve_initialiser(&pipeline, None, &[]).expect("resolves");
    let generator = pipeline.state_generator(initialiser).expect("builds generator");
    let doc = pipeline
        .build_document(&[vec!["a".to_string(), "b".to_string(), "c".to_string()]], 0, &generator)
        .expect("builds document");

    assert_eq!(doc.as_plain_text(), vec![vec!["A".to_string(), "B".to_string(), "C".to_string()]]);
    assert_eq!(doc.score(), 3.0);
}

/// Abort (spec scenario 6, boundary-behaviour variant): a single-word
/// sentence with permute/swap/move as the only operators. Every one of
/// those three refuses outright on a size-1 sentence (spec's boundary
/// behaviour bullet), so `StateGenerator::create_search_step` exhausts its
/// 100-consecutive-failure budget on the very first draw and the search
/// aborts without ever touching the document.
#[test]
fn search_aborts_and_keeps_the_initial_translation_when_every_operator_refuses() {
    let dir = tempfile::tempdir().expect("tempdir");
    let phrase_table_path = write_fixture(&dir, "phrases.json", r#"[{"source": ["bonjour"], "target": ["hello"], "scores": []}]"#);
    let config_toml = format!(
        r#"
        [random]
        seed = 3

        [state-generator]
        init-method = "monotonic"

        [[state-generator.operations]]
        type = "permute-phrases"
        weight = 1.0

        [[state-generator.operations]]
        type = "swap-phrases"
        weight = 1.0

        [[state-generator.operations]]
        type = "move-phrases"
        weight = 1.0
        parameters = {{ block-size-decay = 0.5, right-move-preference = 0.5, right-distance-decay = 0.5, left-distance-decay = 0.5 }}

        [search]
        algorithm = "simulated-annealing"
        parameters = {{ max-steps = 1000, schedule = "hill-climbing" }}

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
    let doc = pipeline.build_document(&[vec!["bonjour".to_string()]], 0, &generator).expect("builds document");

    let mut nbest = NbestStorage::new(1);
    let outcome = run_search(&pipeline, doc, &generator, &mut nbest, 1000, u32::MAX).expect("search runs");

    assert!(outcome.aborted);
    assert_eq!(outcome.accepted, 0);
    assert_eq!(outcome.document.as_plain_text(), vec![vec!["hello".to_string()]]);
}

/// Round-trip law R1: a document's segmentation, saved and reloaded through
/// a fresh `Pipeline` configured for `init-method = "saved-state"`, rebuilds
/// a document whose score vector equals the original's.
#[test]
fn saved_state_round_trip_preserves_the_documents_score() {
    let dir = tempfile::tempdir().expect("tempdir");
    let phrase_table_path = write_fixture(
        &dir,
        "phrases.json",
        r#"[
            {"source": ["a"], "target": ["A"], "scores": []},
            {"source": ["b"], "target": ["B"], "scores": []}
        ]"#,
    );
    let monotonic_config = format!(
        r#"
        [random]
        seed = 11

        [state-generator]
        init-method = "monotonic"

        [[state-generator.operations]]
        type = "change-phrase-translation"
        weight = 1.0

        [search]
        algorithm = "simulated-annealing"
        parameters = {{ max-steps = 1, schedule = "hill-climbing" }}

        [[models]]
        id = "pt0"
        type = "phrase-table"
        parameters = {{ file = "{}" }}

        [[models]]
        id = "pp"
        type = "phrase-penalty"

        [[weights]]
        model = "pt0"
        score = 0.0

        [[weights]]
        model = "pp"
        score = 1.0
        "#,
        phrase_table_path.display()
    );
    let monotonic_config_path = write_fixture(&dir, "monotonic.toml", &monotonic_config);

    let sentences = vec![vec!["a".to_string(), "b".to_string()]];

    let original_pipeline = Pipeline::load(&monotonic_config_path).expect("pipeline loads");
    let original_initialiser = resolve_initialiser(&original_pipeline, None, &[]).expect("resolves");
    let original_generator = original_pipeline.state_generator(original_initialiser).expect("builds generator");
    let original_doc = original_pipeline.build_document(&sentences, 0, &original_generator).expect("builds document");
    let original_score = original_doc.score();

    let state_path = dir.path().join("state.bin");
    saved_state::save(&[original_doc], &state_path).expect("saves state");

    let saved_state_config = format!(
        r#"
        [random]
        seed = 11

        [state-generator]
        init-method = "saved-state"
        parameters = {{ file = "{}" }}

        [[state-generator.operations]]
        type = "change-phrase-translation"
        weight = 1.0

        [search]
        algorithm = "simulated-annealing"
        parameters = {{ max-steps = 1, schedule = "hill-climbing" }}

        [[models]]
        id = "pt0"
        type = "phrase-table"
        parameters = {{ file = "{}" }}

        [[models]]
        id = "pp"
        type = "phrase-penalty"

        [[weights]]
        model = "pt0"
        score = 0.0

        [[weights]]
        model = "pp"
        score = 1.0
        "#,
        state_path.display(),
        phrase_table_path.display()
    );
    let saved_state_config_path = write_fixture(&dir, "saved-state.toml", &saved_state_config);

    let sentence_lengths = vec![vec![2usize]];
    let reloaded_pipeline = Pipeline::load(&saved_state_config_path).expect("pipeline loads");
    let reloaded_initialiser =
        resolve_initialiser(&reloaded_pipeline, None, &sentence_lengths).expect("resolves saved-state initialiser");
    let reloaded_generator = reloaded_pipeline.state_generator(reloaded_initialiser).expect("builds generator");
    let reloaded_doc = reloaded_pipeline.build_document(&sentences, 0, &reloaded_generator).expect("builds document");

    assert_eq!(reloaded_doc.as_plain_text(), vec![vec!["A".to_string(), "B".to_string()]]);
    assert_eq!(reloaded_doc.score(), original_score);
}
