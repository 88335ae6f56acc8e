//! The ONNX model provider: artifact manifests plus backend construction.
//!
//! Each load call ensures the backend's artifacts are present in the model
//! directory (downloading on first use) and then builds the backend over the
//! cached files.

use std::path::PathBuf;

use super::blip::BlipCaptioner;
use super::clip::ClipEncoder;
use super::installer::{HttpInstaller, ModelArtifact};
use super::runtime;
use super::{CaptionModel, EmbeddingModel, ModelError, ModelProvider, Precision};

const BLIP_REPO: &str = "https://huggingface.co/Xenova/blip-image-captioning-base/resolve/main";
const CLIP_REPO: &str = "https://huggingface.co/Xenova/clip-vit-large-patch14/resolve/main";

/// Weight-file suffix for the given precision.
fn weight_suffix(precision: Precision) -> &'static str {
    match precision {
        Precision::Full => "",
        Precision::Half => "_fp16",
    }
}

fn weight(
    name: &str,
    repo: &str,
    prefix: &str,
    remote_stem: &str,
    precision: Precision,
) -> ModelArtifact {
    let suffix = weight_suffix(precision);
    ModelArtifact {
        name: name.to_string(),
        url: format!("{repo}/onnx/{remote_stem}{suffix}.onnx"),
        // Both backends export a "vision_model"; the prefix keeps their
        // cached files distinct.
        local_name: format!("{prefix}_{remote_stem}{suffix}.onnx"),
        blake3: None,
    }
}

fn tokenizer(name: &str, repo: &str, local_name: &str) -> ModelArtifact {
    ModelArtifact {
        name: name.to_string(),
        url: format!("{repo}/tokenizer.json"),
        local_name: local_name.to_string(),
        blake3: None,
    }
}

/// Artifacts of the caption backend: vision encoder, text decoder, tokenizer.
pub fn caption_artifacts(precision: Precision) -> Vec<ModelArtifact> {
    vec![
        weight("caption vision encoder", BLIP_REPO, "caption", "vision_model", precision),
        weight("caption text decoder", BLIP_REPO, "caption", "decoder_model", precision),
        tokenizer("caption tokenizer", BLIP_REPO, "caption_tokenizer.json"),
    ]
}

/// Artifacts of the embedding backend: visual tower, text tower, tokenizer.
pub fn embedding_artifacts(precision: Precision) -> Vec<ModelArtifact> {
    vec![
        weight("embedding visual tower", CLIP_REPO, "embed", "vision_model", precision),
        weight("embedding text tower", CLIP_REPO, "embed", "text_model", precision),
        tokenizer("embedding tokenizer", CLIP_REPO, "embedding_tokenizer.json"),
    ]
}

/// Provider backed by ONNX Runtime sessions over locally cached weights.
pub struct OnnxModelProvider {
    model_dir: PathBuf,
    installer: HttpInstaller,
}

impl OnnxModelProvider {
    pub fn new(model_dir: PathBuf) -> Self {
        Self {
            model_dir,
            installer: HttpInstaller::new(),
        }
    }

    fn ensure_all(&self, artifacts: &[ModelArtifact]) -> Result<Vec<PathBuf>, ModelError> {
        artifacts
            .iter()
            .map(|artifact| self.installer.ensure(artifact, &self.model_dir))
            .collect()
    }
}

impl ModelProvider for OnnxModelProvider {
    fn load_caption(&self, precision: Precision) -> Result<Box<dyn CaptionModel>, ModelError> {
        let paths = self.ensure_all(&caption_artifacts(precision))?;
        let captioner = BlipCaptioner::new(&paths[0], &paths[1], &paths[2], precision)?;
        Ok(Box::new(captioner))
    }

    fn load_embedding(&self, precision: Precision) -> Result<Box<dyn EmbeddingModel>, ModelError> {
        let paths = self.ensure_all(&embedding_artifacts(precision))?;
        let encoder = ClipEncoder::new(&paths[0], &paths[1], &paths[2], precision)?;
        Ok(Box::new(encoder))
    }

    fn has_accelerator(&self) -> bool {
        runtime::accelerator_available()
    }
}
