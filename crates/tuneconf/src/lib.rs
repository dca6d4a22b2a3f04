//! Configuration loading for tunestep.
//!
//! The `tunestep` library takes every knob as a plain argument; this crate
//! gathers those knobs from files and the environment for the command-line
//! tool.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tuneconf::TuneConfig;
//!
//! let config = TuneConfig::load().expect("Failed to load config");
//! config.validate().expect("Invalid config");
//!
//! println!("dataset: {}", config.paths.dataset_dir.display());
//! println!("window: {}", config.encoding.sequence_length);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/tunestep/config.toml` (system)
//! 2. `~/.config/tunestep/config.toml` (user)
//! 3. `./tunestep.toml` (local override), or the `--config` path if given
//! 4. Environment variables (`TUNESTEP_*`, `RUST_LOG`)
//!
//! A file only overrides the keys it sets.
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! dataset_dir = "~/music/folk"
//! corpus_file = "corpus.txt"
//! vocab_file = "mapping.json"
//! model_file = "ngram.json"
//!
//! [encoding]
//! time_step = 0.25
//! sequence_length = 64
//! acceptable_durations = [0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 4.0]
//!
//! [generation]
//! num_steps = 500
//! max_context_length = 64
//! temperature = 0.8
//! ngram_order = 4
//! tempo_bpm = 120
//! rng_seed = 42
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use sections::{EncodingConfig, GenerationConfig, PathsConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest accepted duration, in time steps; matches the encoder's limit.
const MAX_SLOTS_PER_DURATION: f64 = 65_536.0;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete tunestep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TuneConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub encoding: EncodingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl TuneConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load with `config_path` taking the place of `./tunestep.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and variables contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = TuneConfig::default();

        for path in loader::discover_config_files_with_override(config_path)? {
            loader::load_from_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources)?;

        Ok((config, sources))
    }

    /// Check cross-field constraints the types cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let encoding = &self.encoding;
        let generation = &self.generation;

        if !(encoding.time_step > 0.0) || !encoding.time_step.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "encoding.time_step must be positive, got {}",
                encoding.time_step
            )));
        }
        if encoding.sequence_length == 0 {
            return Err(ConfigError::Invalid(
                "encoding.sequence_length must be at least 1".to_string(),
            ));
        }
        if encoding.acceptable_durations.is_empty() {
            return Err(ConfigError::Invalid(
                "encoding.acceptable_durations is empty".to_string(),
            ));
        }
        for &duration in &encoding.acceptable_durations {
            let slots = duration / encoding.time_step;
            if !(duration > 0.0) || (slots - slots.round()).abs() > 1e-6 {
                return Err(ConfigError::Invalid(format!(
                    "acceptable duration {duration} is not a whole multiple of time_step {}",
                    encoding.time_step
                )));
            }
            if slots.round() > MAX_SLOTS_PER_DURATION {
                return Err(ConfigError::Invalid(format!(
                    "acceptable duration {duration} spans more than {MAX_SLOTS_PER_DURATION} \
                     steps of time_step {}",
                    encoding.time_step
                )));
            }
        }
        if generation.max_context_length == 0
            || generation.max_context_length > encoding.sequence_length
        {
            return Err(ConfigError::Invalid(format!(
                "generation.max_context_length must be in 1..={}, got {}",
                encoding.sequence_length, generation.max_context_length
            )));
        }
        if !(generation.temperature > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "generation.temperature must be positive, got {}",
                generation.temperature
            )));
        }
        if generation.ngram_order == 0 {
            return Err(ConfigError::Invalid(
                "generation.ngram_order must be at least 1".to_string(),
            ));
        }
        if !(generation.tempo_bpm > 0.0) || !generation.tempo_bpm.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "generation.tempo_bpm must be positive, got {}",
                generation.tempo_bpm
            )));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let body = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("cannot render config: {e}")))?;
        Ok(format!("# tunestep configuration\n\n{body}"))
    }
}
