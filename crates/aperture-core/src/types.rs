//! Core data types shared across the interrogation engine.

use serde::Serialize;

use crate::error::ApertureError;
use crate::math;

/// Literal marker appended to partial results in the legacy display format.
pub const ERROR_MARKER: &str = "<error>";

/// Image embeddings for one image: one vector per sample/crop.
///
/// Ephemeral — produced and consumed within a single interrogation call.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    vectors: Vec<Vec<f32>>,
}

impl EmbeddingBatch {
    pub fn new(vectors: Vec<Vec<f32>>) -> Self {
        Self { vectors }
    }

    /// All sample vectors, one per crop/augmentation of the source image.
    pub fn samples(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn sample_count(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// L2-normalize every sample vector in place.
    pub fn normalize(&mut self) {
        for v in &mut self.vectors {
            math::l2_normalize_in_place(v);
        }
    }
}

/// One ranked candidate with its confidence in [0, 100].
#[derive(Debug, Clone, Serialize)]
pub struct RankedMatch {
    pub label: String,
    pub confidence: f32,
}

/// Result of one interrogation call.
///
/// `Partial` carries whatever text was assembled before the failure, so the
/// caller always has something displayable alongside the error.
#[derive(Debug)]
pub enum Interrogation {
    Complete(String),
    Partial {
        text: String,
        error: ApertureError,
    },
}

impl Interrogation {
    /// The assembled text, without any failure marker.
    pub fn text(&self) -> &str {
        match self {
            Interrogation::Complete(text) => text,
            Interrogation::Partial { text, .. } => text,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Interrogation::Partial { .. })
    }

    /// The error behind a partial result, if any.
    pub fn error(&self) -> Option<&ApertureError> {
        match self {
            Interrogation::Complete(_) => None,
            Interrogation::Partial { error, .. } => Some(error),
        }
    }

    /// Render the legacy display contract: partial results are suffixed with
    /// the literal `<error>` marker.
    pub fn into_display_string(self) -> String {
        match self {
            Interrogation::Complete(text) => text,
            Interrogation::Partial { mut text, .. } => {
                text.push_str(ERROR_MARKER);
                text
            }
        }
    }
}
