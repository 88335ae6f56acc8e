//! Sub-configuration structs with defaults matching the original tool.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where model weights are cached
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.aperture/models"),
        }
    }
}

/// Vocabulary file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Directory containing vocabulary files (one candidate per line,
    /// optional `.top<N>.` infix in the filename)
    pub dir: String,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            dir: "~/.aperture/interrogate".to_string(),
        }
    }
}

/// Compute device settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeviceConfig {
    /// Force fp32 weights even when an accelerator is available
    pub full_precision: bool,

    /// Evict all unrelated device-resident state before loading models.
    /// For hosts where both models plus other tenants overcommit device memory.
    pub low_memory: bool,
}

/// Interrogation behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterrogateConfig {
    /// Skip model eviction between interrogation calls
    pub keep_models_in_memory: bool,

    /// Rank the built-in artist list and append the best "by <artist>" phrase
    pub use_builtin_artists: bool,

    /// Append `(tag:confidence)` clauses instead of plain tags
    pub return_ranks: bool,

    /// Max candidates scored per category; bounds latency on huge
    /// vocabularies at the cost of recall. 0 = unlimited.
    pub candidate_limit: usize,
}

impl Default for InterrogateConfig {
    fn default() -> Self {
        Self {
            keep_models_in_memory: false,
            use_builtin_artists: true,
            return_ranks: false,
            candidate_limit: 1500,
        }
    }
}

/// Caption generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Beam search width (1 = greedy decoding)
    pub num_beams: usize,

    /// Minimum caption length in tokens
    pub min_length: usize,

    /// Maximum caption length in tokens
    pub max_length: usize,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            num_beams: 1,
            min_length: 24,
            max_length: 48,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
