//! Similarity ranking of image embeddings against candidate tag lists.
//!
//! Scores are the arithmetic mean of per-sample softmax distributions over
//! the candidate axis, at a fixed temperature. The per-sample distributions
//! are normalized before averaging so each image sample votes with equal
//! weight; averaging raw logits first would let a single confident sample
//! dominate.

use std::cmp::Ordering;

use crate::error::ModelError;
use crate::math;
use crate::models::EmbeddingModel;
use crate::types::{EmbeddingBatch, RankedMatch};

/// Temperature applied to raw cosine similarities before softmax.
const LOGIT_SCALE: f32 = 100.0;

/// Rank `candidates` against the image embedding and return the best
/// `top_count` matches in descending confidence order.
///
/// `top_count` saturates at the candidate count, and a nonzero
/// `candidate_limit` truncates the candidate prefix before scoring. Inputs
/// are never mutated.
pub fn rank(
    model: &mut dyn EmbeddingModel,
    image: &EmbeddingBatch,
    candidates: &[String],
    top_count: usize,
    candidate_limit: usize,
) -> Result<Vec<RankedMatch>, ModelError> {
    let candidates = if candidate_limit != 0 && candidates.len() > candidate_limit {
        &candidates[..candidate_limit]
    } else {
        candidates
    };
    let top_count = top_count.min(candidates.len());
    if top_count == 0 {
        return Ok(vec![]);
    }

    let mut text_embeddings = model.encode_text(candidates)?;
    for embedding in &mut text_embeddings {
        math::l2_normalize_in_place(embedding);
    }

    let averaged = average_softmax(image, &text_embeddings);

    // Stable descending sort: ties keep first-occurrence order.
    let mut order: Vec<usize> = (0..averaged.len()).collect();
    order.sort_by(|&a, &b| {
        averaged[b]
            .partial_cmp(&averaged[a])
            .unwrap_or(Ordering::Equal)
    });

    Ok(order
        .into_iter()
        .take(top_count)
        .map(|i| RankedMatch {
            label: candidates[i].clone(),
            confidence: averaged[i] * 100.0,
        })
        .collect())
}

/// Mean of per-sample softmax distributions over the candidate axis.
///
/// Each image sample's cosine similarities are scaled by the temperature,
/// soft-maxed over all candidates, and the resulting distributions averaged.
pub fn average_softmax(image: &EmbeddingBatch, text_embeddings: &[Vec<f32>]) -> Vec<f32> {
    let mut accumulated = vec![0.0f32; text_embeddings.len()];
    let samples = image.samples();

    for sample in samples {
        let mut logits: Vec<f32> = text_embeddings
            .iter()
            .map(|t| LOGIT_SCALE * math::dot(sample, t))
            .collect();
        math::softmax_in_place(&mut logits);
        for (acc, p) in accumulated.iter_mut().zip(&logits) {
            *acc += p;
        }
    }

    if !samples.is_empty() {
        let count = samples.len() as f32;
        for acc in accumulated.iter_mut() {
            *acc /= count;
        }
    }
    accumulated
}
