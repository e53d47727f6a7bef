//! Training-run configuration with fail-fast validation.
//!
//! Defaults mirror the bundled demo (a 3-input MLP with tanh layers of 4,
//! 4 and 1 neurons). Seed, learning rate, step count and the dot-output
//! path can be overridden through `SCALARGRAD_`-prefixed environment
//! variables.

use crate::engine::Scalar;
use crate::error::ScalargradError;
use crate::nn::{Activation, LayerSpec};
use std::path::PathBuf;

const ENV_PREFIX: &str = "SCALARGRAD_";
const ENV_SEED: &str = "SEED";
const ENV_LEARNING_RATE: &str = "LEARNING_RATE";
const ENV_STEPS: &str = "STEPS";
const ENV_DOT_OUTPUT: &str = "DOT_OUTPUT";

#[derive(Clone, Debug)]
pub struct TrainConfig {
    pub seed: u64,
    /// Input width the network expects.
    pub inputs: usize,
    /// Width and activation of each layer, input side first.
    pub layers: Vec<LayerSpec>,
    pub learning_rate: Scalar,
    pub steps: usize,
    /// Where to write a dot rendering of the final loss graph, if anywhere.
    pub dot_output: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            inputs: 3,
            layers: vec![
                LayerSpec {
                    width: 4,
                    activation: Activation::Tanh,
                },
                LayerSpec {
                    width: 4,
                    activation: Activation::Tanh,
                },
                LayerSpec {
                    width: 1,
                    activation: Activation::Tanh,
                },
            ],
            learning_rate: 0.2,
            steps: 1000,
            dot_output: None,
        }
    }
}

impl TrainConfig {
    /// Builds the default configuration with any `SCALARGRAD_*` environment
    /// overrides applied, then validates it.
    pub fn from_env() -> Result<Self, ScalargradError> {
        let mut config = Self::default();
        if let Some(seed) = env_parsed::<u64>(ENV_SEED)? {
            config.seed = seed;
        }
        if let Some(learning_rate) = env_parsed::<Scalar>(ENV_LEARNING_RATE)? {
            config.learning_rate = learning_rate;
        }
        if let Some(steps) = env_parsed::<usize>(ENV_STEPS)? {
            config.steps = steps;
        }
        if let Some(path) = env_parsed::<PathBuf>(ENV_DOT_OUTPUT)? {
            config.dot_output = Some(path);
        }
        config.validate()?;

        Ok(config)
    }

    /// Rejects configurations that would train silently wrong rather than
    /// fail: empty or zero-width architectures, a learning rate that is not
    /// a positive finite number, a zero step count.
    pub fn validate(&self) -> Result<(), ScalargradError> {
        if self.inputs == 0 {
            return Err(configuration("network must accept at least one input"));
        }
        if self.layers.is_empty() {
            return Err(configuration("network must have at least one layer"));
        }
        if self.layers.iter().any(|spec| spec.width == 0) {
            return Err(configuration("every layer needs at least one neuron"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(configuration("learning rate must be positive and finite"));
        }
        if self.steps == 0 {
            return Err(configuration("training needs at least one step"));
        }

        Ok(())
    }
}

fn configuration(message: &str) -> ScalargradError {
    ScalargradError::Configuration(message.to_string())
}

/// Reads `SCALARGRAD_<suffix>` and parses it, treating an unset variable as
/// `None` and a set-but-unparsable one as a configuration error.
fn env_parsed<T>(suffix: &str) -> Result<Option<T>, ScalargradError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{ENV_PREFIX}{suffix}");
    match std::env::var(&key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ScalargradError::Configuration(format!("{key}={raw}: {e}"))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ScalargradError::Configuration(format!("{key}: {e}"))),
    }
}
