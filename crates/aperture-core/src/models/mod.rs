//! Model capabilities and lifecycle management.
//!
//! The caption and embedding networks are consumed as opaque capabilities
//! behind the [`CaptionModel`] and [`EmbeddingModel`] traits; the shipped
//! backends run ONNX graphs, but the lifecycle and pipeline never look
//! inside them. [`ModelLifecycle`] centralizes every tier transition so the
//! single-caller concurrency contract stays enforceable.

pub mod blip;
pub mod clip;
pub mod installer;
pub mod lifecycle;
pub mod preprocess;
pub mod provider;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use lifecycle::ModelLifecycle;
pub use provider::OnnxModelProvider;

use image::DynamicImage;

use crate::config::CaptionConfig;
use crate::error::ModelError;
use crate::types::EmbeddingBatch;

/// The two model kinds the lifecycle manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Caption,
    Embedding,
}

/// Where a model handle currently lives.
///
/// A handle is either unloaded or resident in exactly one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    Unloaded,
    /// Committed on the compute device (fast tier)
    Device,
    /// Weights retained in host memory only (spill tier)
    Host,
}

/// Numeric precision mode, fixed once a model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Full,
    Half,
}

/// Decoding parameters for caption generation.
#[derive(Debug, Clone)]
pub struct CaptionParams {
    /// Beam search width (1 = greedy)
    pub num_beams: usize,
    /// EOS is suppressed until this many tokens have been generated
    pub min_length: usize,
    /// Hard stop after this many tokens
    pub max_length: usize,
}

impl From<&CaptionConfig> for CaptionParams {
    fn from(config: &CaptionConfig) -> Self {
        Self {
            num_beams: config.num_beams,
            min_length: config.min_length,
            max_length: config.max_length,
        }
    }
}

/// Tier transitions shared by both model kinds.
///
/// Moving to the host tier drops compute-resident state but keeps weights in
/// memory, so a later promotion does not touch the network or disk.
pub trait ModelTier {
    fn to_device(&mut self) -> Result<(), ModelError>;
    fn to_host(&mut self);
    fn is_on_device(&self) -> bool;
}

/// Opaque caption-generation capability.
pub trait CaptionModel: ModelTier {
    /// Generate the best caption for an image.
    fn generate_caption(
        &mut self,
        image: &DynamicImage,
        params: &CaptionParams,
    ) -> Result<String, ModelError>;
}

/// Opaque embedding-similarity capability mapping images and text into a
/// shared vector space.
pub trait EmbeddingModel: ModelTier {
    /// Embed one image; returns one vector per sample/crop of the companion
    /// transform. Vectors are raw (callers normalize).
    fn encode_image(&mut self, image: &DynamicImage) -> Result<EmbeddingBatch, ModelError>;

    /// Embed a batch of candidate strings in one call. Overlong inputs are
    /// truncated at the model's token limit, never an error. Vectors are raw.
    fn encode_text(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;
}

/// Factory for model instances; the ONNX provider downloads weights on first
/// use via the installer.
pub trait ModelProvider {
    fn load_caption(&self, precision: Precision) -> Result<Box<dyn CaptionModel>, ModelError>;
    fn load_embedding(&self, precision: Precision) -> Result<Box<dyn EmbeddingModel>, ModelError>;

    /// Whether a fast compute tier exists on this host. Without one, reduced
    /// precision buys nothing and risks unsupported-operation failures.
    fn has_accelerator(&self) -> bool;
}

/// Hooks into process-wide memory accounting.
///
/// `release_device_memory` is the "everything to CPU" emergency eviction used
/// in constrained-memory mode; `reclaim` is the global memory-reclaim pass
/// run after evictions.
pub trait MemoryPressure {
    fn release_device_memory(&self);
    fn reclaim(&self);
}

/// Default hooks for standalone use, where nothing else holds device memory.
#[derive(Debug, Default)]
pub struct NoopMemoryPressure;

impl MemoryPressure for NoopMemoryPressure {
    fn release_device_memory(&self) {}
    fn reclaim(&self) {}
}
