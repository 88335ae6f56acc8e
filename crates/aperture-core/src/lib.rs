//! Aperture Core - Embeddable image interrogation library.
//!
//! Aperture turns an image into a text description: a generated caption
//! followed by vocabulary tags ranked by embedding similarity.
//!
//! # Architecture
//!
//! ```text
//! Image → Caption (BLIP) → Embed (CLIP) → Rank vocabulary → Description
//! ```
//!
//! Two ONNX models are driven through an explicit device/host residency
//! lifecycle so their memory never outlives a single interrogation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use aperture_core::models::{NoopMemoryPressure, OnnxModelProvider};
//! use aperture_core::{Config, Interrogator};
//!
//! fn main() -> aperture_core::Result<()> {
//!     let config = Config::load()?;
//!     let provider = OnnxModelProvider::new(config.model_dir());
//!     let mut interrogator =
//!         Interrogator::new(&config, Box::new(provider), Box::new(NoopMemoryPressure))?;
//!
//!     let image = image::open("./image.jpg").map_err(|e| {
//!         aperture_core::ApertureError::Model(aperture_core::ModelError::Inference {
//!             message: e.to_string(),
//!         })
//!     })?;
//!     println!("{}", interrogator.interrogate(&image).into_display_string());
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod artists;
pub mod config;
pub mod error;
pub mod interrogate;
pub mod math;
pub mod models;
pub mod rank;
pub mod types;
pub mod vocabulary;

// Re-exports for convenient access
pub use artists::ArtistList;
pub use config::Config;
pub use error::{ApertureError, ConfigError, ModelError, ModelResult, Result};
pub use interrogate::Interrogator;
pub use types::{EmbeddingBatch, Interrogation, RankedMatch};
pub use vocabulary::{Category, VocabularyStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
