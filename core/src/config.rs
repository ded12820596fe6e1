//! Deserializable configuration mirroring the five-section schema: random
//! seed, state generator (init method + weighted operators), search
//! algorithm, feature models, and their weights.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DocentError, DocentResult};

pub type Parameters = HashMap<String, ParamValue>;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ParamValue::Float(f) => Some(*f as f32),
            ParamValue::Int(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ParamValue::Int(i) if *i >= 0 => Some(*i as u32),
            ParamValue::Float(f) if *f >= 0.0 => Some(*f as u32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Required-parameter lookup; returns `ConfigurationError::MissingParameter`
/// (modelled as `DocentError::Configuration`) if absent or of the wrong kind.
pub fn require_f32(params: &Parameters, key: &str, path: &str) -> DocentResult<f32> {
    params
        .get(key)
        .and_then(ParamValue::as_f32)
        .ok_or_else(|| DocentError::configuration(path, format!("missing or non-numeric parameter `{key}`")))
}

pub fn require_u32(params: &Parameters, key: &str, path: &str) -> DocentResult<u32> {
    params
        .get(key)
        .and_then(ParamValue::as_u32)
        .ok_or_else(|| DocentError::configuration(path, format!("missing or non-numeric parameter `{key}`")))
}

pub fn require_string<'a>(params: &'a Parameters, key: &str, path: &str) -> DocentResult<&'a str> {
    params
        .get(key)
        .and_then(ParamValue::as_str)
        .ok_or_else(|| DocentError::configuration(path, format!("missing or non-string parameter `{key}`")))
}

pub fn optional_f32(params: &Parameters, key: &str, default: f32) -> f32 {
    params.get(key).and_then(ParamValue::as_f32).unwrap_or(default)
}

pub fn optional_u32(params: &Parameters, key: &str, default: u32) -> u32 {
    params.get(key).and_then(ParamValue::as_u32).unwrap_or(default)
}

pub fn optional_bool(params: &Parameters, key: &str, default: bool) -> bool {
    params.get(key).and_then(ParamValue::as_bool).unwrap_or(default)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomConfig {
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    pub weight: f32,
    #[serde(default)]
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateGeneratorConfig {
    #[serde(rename = "init-method")]
    pub init_method: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub algorithm: String,
    #[serde(default)]
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub parameters: Parameters,
}

/// One `<weight model= score=>` entry, kept in its own top-level section
/// (rather than inline on `ModelConfig`) so that "weight for a missing
/// model", "model weighted twice" and "model never weighted" are all
/// detectable as distinct configuration errors at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct WeightConfig {
    pub model: String,
    pub score: f32,
}

/// The full configuration document: the five top-level sections of
/// `spec.md`'s XML schema, isomorphically expressed in TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct DecoderConfig {
    pub random: RandomConfig,
    #[serde(rename = "state-generator")]
    pub state_generator: StateGeneratorConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub weights: Vec<WeightConfig>,
}

impl DecoderConfig {
    pub fn from_toml_str(s: &str) -> DocentResult<Self> {
        let config: DecoderConfig =
            toml::from_str(s).map_err(|e| DocentError::configuration("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_toml<P: AsRef<Path>>(path: P) -> DocentResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| DocentError::configuration(path.display().to_string(), e.to_string()))?;
        let config: DecoderConfig =
            toml::from_str(&text).map_err(|e| DocentError::configuration(path.display().to_string(), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The weight for a model by id. Only meaningful after `validate` has
    /// run (both constructors call it), which guarantees at most one
    /// `WeightConfig` per model id.
    pub fn weight_for(&self, model_id: &str) -> f32 {
        self.weights.iter().find(|w| w.model == model_id).map(|w| w.score).unwrap_or(0.0)
    }

    fn validate(&self) -> DocentResult<()> {
        for w in &self.weights {
            if !self.models.iter().any(|m| m.id == w.model) {
                return Err(DocentError::configuration(
                    "weights",
                    format!("weight specified for missing model `{}`", w.model),
                ));
            }
        }
        for m in &self.models {
            let count = self.weights.iter().filter(|w| w.model == m.id).count();
            if count == 0 {
                return Err(DocentError::configuration("weights", format!("model `{}` has no weight", m.id)));
            }
            if count > 1 {
                return Err(DocentError::configuration(
                    "weights",
                    format!("model `{}` has more than one weight", m.id),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn parses_all_five_sections() {
        let config = DecoderConfig::from_toml_str(SAMPLE).expect("valid config");
        assert_eq!(config.random.seed, 42);
        assert_eq!(config.state_generator.init_method, "monotonic");
        assert_eq!(config.state_generator.operations.len(), 2);
        assert_eq!(config.search.algorithm, "simulated-annealing");
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.models[0].id, "wp");
        assert_eq!(config.weight_for("wp"), -1.0);
    }

    #[test]
    fn missing_parameter_reports_configuration_error() {
        let params = Parameters::new();
        let err = require_f32(&params, "decay", "state-generator.operations[0]").unwrap_err();
        assert!(matches!(err, DocentError::Configuration { .. }));
    }

    fn with_weights(weights_toml: &str) -> String {
        format!(
            r#"
            [random]
            seed = 1

            [state-generator]
            init-method = "monotonic"

            [search]
            algorithm = "simulated-annealing"

            [[models]]
            id = "wp"
            type = "word-penalty"

            {weights_toml}
            "#
        )
    }

    #[test]
    fn weight_for_a_missing_model_is_a_configuration_error() {
        let toml = with_weights("[[weights]]\nmodel = \"nope\"\nscore = 1.0");
        let err = DecoderConfig::from_toml_str(&toml).unwrap_err();
        assert!(matches!(err, DocentError::Configuration { .. }));
    }

    #[test]
    fn a_model_weighted_twice_is_a_configuration_error() {
        let toml = with_weights(
            "[[weights]]\nmodel = \"wp\"\nscore = 1.0\n\n[[weights]]\nmodel = \"wp\"\nscore = 2.0",
        );
        let err = DecoderConfig::from_toml_str(&toml).unwrap_err();
        assert!(matches!(err, DocentError::Configuration { .. }));
    }

    #[test]
    fn a_model_with_no_weight_is_a_configuration_error() {
        let toml = with_weights("");
        let err = DecoderConfig::from_toml_str(&toml).unwrap_err();
        assert!(matches!(err, DocentError::Configuration { .. }));
    }
}
