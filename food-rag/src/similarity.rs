//! Cosine similarity and the distance derived from it.

use crate::error::{RagError, Result};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in `[-1, 1]`. When either vector has zero magnitude the
/// result is exactly `0.0` rather than a division by zero.
///
/// # Errors
///
/// Returns [`RagError::DimensionMismatch`] if the vectors differ in length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RagError::DimensionMismatch { expected: a.len(), actual: b.len() });
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}

/// Convert a cosine similarity into a distance. Lower is more relevant.
pub fn distance_from_similarity(similarity: f32) -> f32 {
    1.0 - similarity
}
