//! Turns a parsed `docent_core::config::DecoderConfig` plus a phrase table
//! into the pieces a driver binary runs: the shared `DecoderRuntime`, a
//! `StateGenerator`, and a chosen `CoolingSchedule`/search algorithm. The
//! type-name dispatch in every `build_*` function mirrors
//! `StateGenerator::addOperation`/`StateGenerator::StateGenerator`/
//! `SearchAlgorithm::createSearchAlgorithm`/`CoolingSchedule::
//! createCoolingSchedule` in the original: an unrecognised name is always a
//! `ConfigurationError` carrying the offending path, never a panic.

use std::rc::Rc;

use docent_core::config::{DecoderConfig, OperationConfig, Parameters, SearchConfig, StateGeneratorConfig};
use docent_core::cooling::{AartsLaarhovenSchedule, CoolingSchedule, GeometricDecaySchedule, HillClimbingSchedule};
use docent_core::document::DecoderRuntime;
use docent_core::error::{DocentError, DocentResult};
use docent_core::feature::FeatureFunctionInstantiation;
use docent_core::generator::{MonotonicStateInitialiser, SavedStateInitialiser, StateGenerator, StateInitialiser};
use docent_core::operation::{
    ChangePhraseTranslationOperation, LinearisePhrasesOperation, MovePhrasesOperation, PermutePhrasesOperation,
    ResegmentOperation, StateOperation, SwapPhrasesOperation,
};
use docent_core::random::Random;

use docent_features::registry::builtin_with_params;

/// The first model of type `phrase-table`, matching
/// `DecoderConfiguration::DecoderConfiguration`'s `if(type == "phrase-table"
/// && !phraseTable_)`: the phrase table is configured as an ordinary model
/// entry (so its intrinsic scores are weighted like any other feature) and
/// the driver additionally needs its `file` parameter to load the backend.
pub fn phrase_table_model<'a>(config: &'a DecoderConfig, path: &str) -> DocentResult<&'a docent_core::config::ModelConfig> {
    config
        .models
        .iter()
        .find(|m| m.type_name == "phrase-table")
        .ok_or_else(|| DocentError::configuration(path, "no model of type `phrase-table` configured"))
}

pub fn phrase_table_file<'a>(model: &'a docent_core::config::ModelConfig, path: &str) -> DocentResult<&'a str> {
    docent_core::config::require_string(&model.parameters, "file", path)
}

/// Builds the shared, read-only per-run configuration: every configured
/// model resolved to an implementation, in configuration order, with its
/// weight expanded to one slot per score the model occupies (a model always
/// occupies exactly one slot for every feature this crate ships, but the
/// expansion is written generically in case a future feature needs more).
pub fn build_runtime(config: &DecoderConfig, random: Random) -> DocentResult<Rc<DecoderRuntime>> {
    let mut feature_functions = Vec::with_capacity(config.models.len());
    let mut feature_weights = Vec::new();
    let mut score_index = 0usize;

    for model in &config.models {
        let implementation = builtin_with_params(&model.type_name, &model.parameters).ok_or_else(|| {
            DocentError::configuration(format!("models.{}", model.id), format!("unknown model type `{}`", model.type_name))
        })?;
        let n = implementation.number_of_scores();
        let weight = config.weight_for(&model.id);
        feature_weights.extend(std::iter::repeat(weight).take(n));
        feature_functions.push(FeatureFunctionInstantiation::new(model.id.clone(), score_index, implementation));
        score_index += n;
    }

    Ok(Rc::new(DecoderRuntime { feature_functions, feature_weights, random }))
}

/// Builds a `StateGenerator` from the `state-generator` section, using
/// `initialiser` for the `init-method` the config names (the caller resolves
/// `testset`/`saved-state` against parsed files before calling this, since
/// those initialisers need data this crate has no business owning).
pub fn build_state_generator(
    config: &StateGeneratorConfig,
    initialiser: Box<dyn StateInitialiser>,
    random: Random,
) -> DocentResult<StateGenerator> {
    let mut generator = StateGenerator::new(initialiser, random);
    for (i, op) in config.operations.iter().enumerate() {
        let path = format!("state-generator.operations[{i}]");
        let operation = build_operation(op, &path)?;
        generator.add_operation(op.weight, operation);
    }
    Ok(generator)
}

/// Resolves the `init-method` name to the right initialiser for configs
/// that don't need an external file (`monotonic`). `testset`/`saved-state`
/// are assembled by the caller, which has the parsed baseline/archive.
pub fn monotonic_initialiser() -> Box<dyn StateInitialiser> {
    Box::new(MonotonicStateInitialiser)
}

pub fn saved_state_initialiser(segmentations: Vec<Vec<docent_core::phrase::PhraseSegmentation>>) -> Box<dyn StateInitialiser> {
    Box::new(SavedStateInitialiser::new(segmentations))
}

fn build_operation(op: &OperationConfig, path: &str) -> DocentResult<Box<dyn StateOperation>> {
    use docent_core::config::require_f32;

    let p = &op.parameters;
    match op.type_name.as_str() {
        "change-phrase-translation" => Ok(Box::new(ChangePhraseTranslationOperation::new())),
        "permute-phrases" => Ok(Box::new(PermutePhrasesOperation::new(require_f32(p, "phrase-permutation-decay", path)?))),
        "linearise-phrases" => Ok(Box::new(LinearisePhrasesOperation::new(require_f32(
            p,
            "phrase-linearisation-decay",
            path,
        )?))),
        "swap-phrases" => Ok(Box::new(SwapPhrasesOperation::new(require_f32(p, "swap-distance-decay", path)?))),
        "move-phrases" => Ok(Box::new(MovePhrasesOperation::new(
            require_f32(p, "block-size-decay", path)?,
            optional_weight(p, "right-move-preference", 0.5),
            require_f32(p, "right-distance-decay", path)?,
            require_f32(p, "left-distance-decay", path)?,
        ))),
        "resegment" => Ok(Box::new(ResegmentOperation::new(require_f32(p, "phrase-resegmentation-decay", path)?))),
        other => Err(DocentError::configuration(path, format!("unknown operation type `{other}`"))),
    }
}

fn optional_weight(params: &Parameters, key: &str, default: f32) -> f32 {
    docent_core::config::optional_f32(params, key, default)
}

/// Resolves the `search.parameters.schedule` name to a `CoolingSchedule`,
/// matching `CoolingSchedule::createCoolingSchedule`'s dispatch (the
/// `hill-climbing` schedule is consulted by `SimulatedAnnealing::search`
/// exactly like the other two, realizing plain hill climbing without a
/// separate outer loop).
pub fn build_cooling_schedule(search: &SearchConfig, path: &str) -> DocentResult<CoolingSchedule> {
    use docent_core::config::{optional_bool, require_f32, require_string};

    let p = &search.parameters;
    let schedule_name = require_string(p, "schedule", path)?;
    match schedule_name {
        "geometric-decay" => Ok(CoolingSchedule::GeometricDecay(GeometricDecaySchedule::new(
            require_f32(p, "geometric-decay:start-temperature", path)?,
            require_f32(p, "geometric-decay:decay-factor", path)?,
            optional_bool(p, "geometric-decay:step-on-acceptance", false),
        ))),
        "hill-climbing" => Ok(CoolingSchedule::HillClimbing(HillClimbingSchedule::new(
            docent_core::config::optional_u32(p, "hill-climbing:max-rejected", 1000),
        ))),
        "aarts-laarhoven" => Ok(CoolingSchedule::AartsLaarhoven(AartsLaarhovenSchedule::new(
            docent_core::config::optional_f32(p, "aarts-laarhoven:delta", 0.1),
            docent_core::config::optional_f32(p, "aarts-laarhoven:epsilon", 1e-3),
            docent_core::config::optional_f32(p, "aarts-laarhoven:initial-acceptance-ratio", 0.95),
            docent_core::config::optional_u32(p, "aarts-laarhoven:chain-length", 200),
            docent_core::config::optional_u32(p, "aarts-laarhoven:init-steps", 30),
            docent_core::config::optional_u32(p, "aarts-laarhoven:moving-avg-window", 15),
        ))),
        other => Err(DocentError::configuration(path, format!("unknown cooling schedule `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::config::DecoderConfig;

    const SAMPLE: &str = r#"
        [random]
        seed = 42

        [state-generator]
        init-method = "monotonic"

        [[state-generator.operations]]
        type = "change-phrase-translation"
        weight = 1.0

        [[state-generator.operations]]
        type = "permute-phrases"
        weight = 0.5
        parameters = { phrase-permutation-decay = 0.8 }

        [search]
        algorithm = "simulated-annealing"
        parameters = { max-steps = 1000, schedule = "geometric-decay", "geometric-decay:start-temperature" = 10.0, "geometric-decay:decay-factor" = 0.999 }

        [[models]]
        id = "wp"
        type = "word-penalty"

        [[weights]]
        model = "wp"
        score = -1.0
    "#;

    #[test]
    fn builds_a_runtime_with_one_weight_slot_per_model_score() {
        let config = DecoderConfig::from_toml_str(SAMPLE).expect("valid config");
        let random = Random::seeded(config.random.seed);
        let runtime = build_runtime(&config, random).expect("builds");
        assert_eq!(runtime.feature_functions.len(), 1);
        assert_eq!(runtime.feature_weights, vec![-1.0]);
    }

    #[test]
    fn unknown_model_type_is_a_configuration_error() {
        let config = DecoderConfig::from_toml_str(&SAMPLE.replace("word-penalty", "nonexistent-model")).expect("valid config");
        let random = Random::seeded(1);
        let err = build_runtime(&config, random).unwrap_err();
        assert!(matches!(err, DocentError::Configuration { .. }));
    }

    #[test]
    fn builds_a_state_generator_with_both_operations() {
        let config = DecoderConfig::from_toml_str(SAMPLE).expect("valid config");
        let random = Random::seeded(config.random.seed);
        let generator = build_state_generator(&config.state_generator, monotonic_initialiser(), random).expect("builds");
        assert_eq!(generator.operator_description(0), "change-phrase-translation");
    }

    #[test]
    fn unknown_operation_type_is_a_configuration_error() {
        let config = DecoderConfig::from_toml_str(&SAMPLE.replace("permute-phrases", "not-a-real-operation")).expect("valid config");
        let random = Random::seeded(1);
        let err = build_state_generator(&config.state_generator, monotonic_initialiser(), random).unwrap_err();
        assert!(matches!(err, DocentError::Configuration { .. }));
    }

    #[test]
    fn builds_the_configured_cooling_schedule() {
        let config = DecoderConfig::from_toml_str(SAMPLE).expect("valid config");
        let schedule = build_cooling_schedule(&config.search, "search").expect("builds");
        assert!(matches!(schedule, CoolingSchedule::GeometricDecay(_)));
    }

    const SAMPLE_WITH_PHRASE_TABLE: &str = r#"
        [random]
        seed = 42

        [state-generator]
        init-method = "monotonic"

        [[state-generator.operations]]
        type = "change-phrase-translation"
        weight = 1.0

        [search]
        algorithm = "simulated-annealing"
        parameters = { max-steps = 1000, schedule = "hill-climbing" }

        [[models]]
        id = "pt0"
        type = "phrase-table"
        parameters = { file = "fixtures/phrases.json", num-scores = 2 }

        [[models]]
        id = "wp"
        type = "word-penalty"

        [[weights]]
        model = "pt0"
        score = 1.0

        [[weights]]
        model = "wp"
        score = -1.0
    "#;

    #[test]
    fn finds_the_phrase_table_model_and_its_file_parameter() {
        let config = DecoderConfig::from_toml_str(SAMPLE_WITH_PHRASE_TABLE).expect("valid config");
        let model = phrase_table_model(&config, "models").expect("found");
        assert_eq!(model.id, "pt0");
        assert_eq!(phrase_table_file(model, "models.pt0").expect("has file"), "fixtures/phrases.json");
    }

    #[test]
    fn missing_phrase_table_model_is_a_configuration_error() {
        let config = DecoderConfig::from_toml_str(SAMPLE).expect("valid config");
        let err = phrase_table_model(&config, "models").unwrap_err();
        assert!(matches!(err, DocentError::Configuration { .. }));
    }

    #[test]
    fn phrase_table_scores_feature_is_included_in_the_runtime_with_two_score_slots() {
        let config = DecoderConfig::from_toml_str(SAMPLE_WITH_PHRASE_TABLE).expect("valid config");
        let random = Random::seeded(config.random.seed);
        let runtime = build_runtime(&config, random).expect("builds");
        assert_eq!(runtime.feature_weights.len(), 3);
        assert_eq!(runtime.feature_weights[0], 1.0);
        assert_eq!(runtime.feature_weights[1], 1.0);
        assert_eq!(runtime.feature_weights[2], -1.0);
    }
}
