//! Error types for the Aperture interrogation engine.
//!
//! Errors are organized by subsystem so messages carry the context that
//! matters for each failure (artifact URLs, model file paths, candidate
//! counts) without a grab-bag string type at the top.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Aperture operations.
#[derive(Error, Debug)]
pub enum ApertureError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Model download, load, or inference errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Vocabulary file could not be read
    #[error("Vocabulary error for {path}: {message}")]
    Vocabulary { path: PathBuf, message: String },

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Model-specific errors, organized by lifecycle stage.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Weight download failed
    #[error("Download failed for {url}: {message}")]
    Download { url: String, message: String },

    /// Downloaded file failed checksum verification
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    Checksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Model file could not be loaded into a session
    #[error("Failed to load model {path}: {message}")]
    Load { path: PathBuf, message: String },

    /// Inference call failed
    #[error("Inference failed: {message}")]
    Inference { message: String },

    /// Tokenizer load or encode failed
    #[error("Tokenizer error: {message}")]
    Tokenize { message: String },

    /// I/O error during model management
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Aperture results.
pub type Result<T> = std::result::Result<T, ApertureError>;

/// Convenience type alias for model-subsystem results.
pub type ModelResult<T> = std::result::Result<T, ModelError>;
