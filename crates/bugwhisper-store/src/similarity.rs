//! Cosine similarity and the JSON embedding encoding used in the `bugs` table.

use ndarray::{Array1, ArrayView1};

use bugwhisper_core::{Error, Result};

/// Slack applied to threshold comparisons so a vector always matches itself
/// despite float rounding in normalization.
pub const SIMILARITY_TOLERANCE: f32 = 1e-6;

const NORM_EPSILON: f32 = 1e-9;

/// Unit-length copy of `v`. Zero vectors stay zero.
pub fn normalize(v: ArrayView1<'_, f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm < NORM_EPSILON {
        Array1::zeros(v.len())
    } else {
        v.to_owned() / norm
    }
}

/// Cosine similarity in [-1, 1]; 0.0 when either vector has zero length.
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a < NORM_EPSILON || norm_b < NORM_EPSILON {
        return 0.0;
    }
    (a.dot(&b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Whether `similarity` meets or exceeds `threshold`.
pub fn meets_threshold(similarity: f32, threshold: f32) -> bool {
    similarity + SIMILARITY_TOLERANCE >= threshold
}

/// Serialize an embedding as a JSON array of floats.
pub fn encode_embedding(embedding: &Array1<f32>) -> Result<String> {
    Ok(serde_json::to_string(&embedding.to_vec())?)
}

pub fn decode_embedding(json: &str) -> Result<Vec<f32>> {
    serde_json::from_str(json)
        .map_err(|e| Error::Storage(format!("Corrupt embedding JSON: {}", e)))
}
