//! CLIP-style embedding backend: ONNX visual and text towers projecting
//! into a shared similarity space.
//!
//! Candidate batches are tokenized and embedded in a single text-tower run;
//! overlong candidates are truncated at the context window with the
//! end-of-text token forced into the final slot. All returned vectors are
//! raw projections; callers normalize.

use std::path::Path;

use image::DynamicImage;

use ort::value::Value;

use crate::error::ModelError;
use crate::types::EmbeddingBatch;

use super::runtime::{self, SessionSlot};
use super::{EmbeddingModel, ModelTier, Precision};

/// Fixed input resolution of the visual tower.
pub const EMBED_INPUT_SIZE: u32 = 224;

/// Token context window of the text tower.
pub const CONTEXT_LENGTH: usize = 77;

/// Fallback id for the CLIP end-of-text token.
const FALLBACK_EOT_ID: u32 = 49407;

pub struct ClipEncoder {
    visual: SessionSlot,
    text: SessionSlot,
    tokenizer: tokenizers::Tokenizer,
    eot_id: i64,
    precision: Precision,
}

impl ClipEncoder {
    /// Load the embedding backend from its three artifacts and commit both
    /// towers on the device tier.
    pub fn new(
        visual_path: &Path,
        text_path: &Path,
        tokenizer_path: &Path,
        precision: Precision,
    ) -> Result<Self, ModelError> {
        let visual = SessionSlot::open(visual_path)?;
        let text = SessionSlot::open(text_path)?;
        let tokenizer =
            tokenizers::Tokenizer::from_file(tokenizer_path).map_err(|e| ModelError::Tokenize {
                message: format!("Failed to load embedding tokenizer: {e}"),
            })?;

        let eot_id = tokenizer
            .token_to_id("<|endoftext|>")
            .unwrap_or(FALLBACK_EOT_ID) as i64;

        let mut encoder = Self {
            visual,
            text,
            tokenizer,
            eot_id,
            precision,
        };
        encoder.to_device()?;
        tracing::debug!("Embedding model ready ({:?})", encoder.precision);
        Ok(encoder)
    }

    /// Tokenize one candidate into a fixed-width context row plus its
    /// attention mask.
    fn tokenize(&self, text: &str) -> Result<(Vec<i64>, Vec<i64>), ModelError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ModelError::Tokenize {
                message: format!("Failed to tokenize candidate: {e}"),
            })?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        Ok(fit_context(ids, self.eot_id))
    }
}

impl ModelTier for ClipEncoder {
    fn to_device(&mut self) -> Result<(), ModelError> {
        self.visual.commit()?;
        self.text.commit()
    }

    fn to_host(&mut self) {
        self.visual.release();
        self.text.release();
    }

    fn is_on_device(&self) -> bool {
        self.visual.is_committed() && self.text.is_committed()
    }
}

impl EmbeddingModel for ClipEncoder {
    fn encode_image(&mut self, image: &DynamicImage) -> Result<EmbeddingBatch, ModelError> {
        let tensor = super::preprocess::embed_transform(image, EMBED_INPUT_SIZE);
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let flat: Vec<f32> = tensor.iter().copied().collect();

        let session = self.visual.session()?;
        let input_name = runtime::input_name(session, "pixel_values");
        let value = Value::from_array((shape, flat)).map_err(|e| ModelError::Inference {
            message: format!("Failed to create pixel tensor: {e}"),
        })?;

        let outputs = session
            .run(ort::inputs![input_name.as_str() => value])
            .map_err(|e| ModelError::Inference {
                message: format!("Visual tower inference failed: {e}"),
            })?;

        let embeds = outputs
            .iter()
            .find(|(name, _)| *name == "image_embeds")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| ModelError::Inference {
                message: "Visual tower produced no outputs".to_string(),
            })?;

        let (shape, data) =
            embeds
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::Inference {
                    message: format!("Failed to extract image embedding: {e}"),
                })?;
        if shape.len() != 2 {
            return Err(ModelError::Inference {
                message: format!("Unexpected image embedding rank: {:?}", shape),
            });
        }

        let dim = shape[1] as usize;
        Ok(EmbeddingBatch::new(
            data.chunks_exact(dim).map(|row| row.to_vec()).collect(),
        ))
    }

    fn encode_text(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut ids = Vec::with_capacity(texts.len() * CONTEXT_LENGTH);
        let mut mask = Vec::with_capacity(texts.len() * CONTEXT_LENGTH);
        for text in texts {
            let (row_ids, row_mask) = self.tokenize(text)?;
            ids.extend(row_ids);
            mask.extend(row_mask);
        }

        let batch_shape = vec![texts.len() as i64, CONTEXT_LENGTH as i64];
        let ids = Value::from_array((batch_shape.clone(), ids)).map_err(|e| {
            ModelError::Inference {
                message: format!("Failed to create input_ids tensor: {e}"),
            }
        })?;
        let mask =
            Value::from_array((batch_shape, mask)).map_err(|e| ModelError::Inference {
                message: format!("Failed to create attention mask tensor: {e}"),
            })?;

        let outputs = self
            .text
            .session()?
            .run(ort::inputs![
                "input_ids" => ids,
                "attention_mask" => mask,
            ])
            .map_err(|e| ModelError::Inference {
                message: format!("Text tower inference failed: {e}"),
            })?;

        let embeds = outputs
            .iter()
            .find(|(name, _)| *name == "text_embeds")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| ModelError::Inference {
                message: "Text tower produced no outputs".to_string(),
            })?;

        let (shape, data) =
            embeds
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::Inference {
                    message: format!("Failed to extract text embeddings: {e}"),
                })?;
        if shape.len() != 2 || shape[0] as usize != texts.len() {
            return Err(ModelError::Inference {
                message: format!("Unexpected text embedding shape: {:?}", shape),
            });
        }

        let dim = shape[1] as usize;
        Ok(data.chunks_exact(dim).map(|row| row.to_vec()).collect())
    }
}

/// Fit token ids into the fixed context window.
///
/// Overlong sequences are truncated with the end-of-text id forced into the
/// final slot; short sequences are zero-padded, with the mask marking real
/// tokens.
fn fit_context(mut ids: Vec<i64>, eot: i64) -> (Vec<i64>, Vec<i64>) {
    if ids.len() > CONTEXT_LENGTH {
        ids.truncate(CONTEXT_LENGTH);
        ids[CONTEXT_LENGTH - 1] = eot;
    }
    let mut mask = vec![1i64; ids.len()];
    ids.resize(CONTEXT_LENGTH, 0);
    mask.resize(CONTEXT_LENGTH, 0);
    (ids, mask)
}
