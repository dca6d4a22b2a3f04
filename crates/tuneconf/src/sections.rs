//! Config sections and their compiled defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where training data and artifacts live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory walked for `*.json` scores.
    /// Default: dataset
    #[serde(default = "PathsConfig::default_dataset_dir")]
    pub dataset_dir: PathBuf,

    /// Single-file corpus in token text form.
    /// Default: corpus.txt
    #[serde(default = "PathsConfig::default_corpus_file")]
    pub corpus_file: PathBuf,

    /// Symbol to id mapping.
    /// Default: mapping.json
    #[serde(default = "PathsConfig::default_vocab_file")]
    pub vocab_file: PathBuf,

    /// Fitted n-gram counts.
    /// Default: ngram.json
    #[serde(default = "PathsConfig::default_model_file")]
    pub model_file: PathBuf,
}

impl PathsConfig {
    fn default_dataset_dir() -> PathBuf {
        PathBuf::from("dataset")
    }

    fn default_corpus_file() -> PathBuf {
        PathBuf::from("corpus.txt")
    }

    fn default_vocab_file() -> PathBuf {
        PathBuf::from("mapping.json")
    }

    fn default_model_file() -> PathBuf {
        PathBuf::from("ngram.json")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dataset_dir: Self::default_dataset_dir(),
            corpus_file: Self::default_corpus_file(),
            vocab_file: Self::default_vocab_file(),
            model_file: Self::default_model_file(),
        }
    }
}

/// Time grid and windowing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Quarter-length units per slot.
    /// Default: 0.25
    #[serde(default = "EncodingConfig::default_time_step")]
    pub time_step: f64,

    /// Training window length and separator cushion size.
    /// Default: 64
    #[serde(default = "EncodingConfig::default_sequence_length")]
    pub sequence_length: usize,

    /// Durations a score may use and still be kept.
    #[serde(default = "EncodingConfig::default_acceptable_durations")]
    pub acceptable_durations: Vec<f64>,
}

impl EncodingConfig {
    fn default_time_step() -> f64 {
        0.25
    }

    fn default_sequence_length() -> usize {
        64
    }

    fn default_acceptable_durations() -> Vec<f64> {
        vec![0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 4.0]
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            time_step: Self::default_time_step(),
            sequence_length: Self::default_sequence_length(),
            acceptable_durations: Self::default_acceptable_durations(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Default: 500
    #[serde(default = "GenerationConfig::default_num_steps")]
    pub num_steps: usize,

    /// Default: 64
    #[serde(default = "GenerationConfig::default_max_context_length")]
    pub max_context_length: usize,

    /// Default: 0.8
    #[serde(default = "GenerationConfig::default_temperature")]
    pub temperature: f64,

    /// Longest context the n-gram model counts.
    /// Default: 4
    #[serde(default = "GenerationConfig::default_ngram_order")]
    pub ngram_order: usize,

    /// Default: 120
    #[serde(default = "GenerationConfig::default_tempo_bpm")]
    pub tempo_bpm: f64,

    /// Fixed seed for reproducible runs. Unset means seeded from the OS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl GenerationConfig {
    fn default_num_steps() -> usize {
        500
    }

    fn default_max_context_length() -> usize {
        64
    }

    fn default_temperature() -> f64 {
        0.8
    }

    fn default_ngram_order() -> usize {
        4
    }

    fn default_tempo_bpm() -> f64 {
        120.0
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_steps: Self::default_num_steps(),
            max_context_length: Self::default_max_context_length(),
            temperature: Self::default_temperature(),
            ngram_order: Self::default_ngram_order(),
            tempo_bpm: Self::default_tempo_bpm(),
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or `EnvFilter` directive string.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
