//! Embedding backend trait and the hashing implementation.
//!
//! Implementations:
//! - `OnnxEmbedder`: ONNX Runtime with all-MiniLM-L6-v2 (requires the `onnx` feature)
//! - `HashingEmbedder`: signed feature hashing over lowercase word tokens

use bugwhisper_core::{Error, Result};
use ndarray::Array1;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Trait for embedding backends.
pub trait EmbedderBackend: Send + Sync {
    /// Generate an embedding for a text string.
    fn embed(&self, text: &str) -> Result<Array1<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Short backend name for logs and stats.
    fn name(&self) -> &str;
}

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9]+").expect("valid regex"));

/// Deterministic bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed to a bucket and a sign. Texts
/// sharing no tokens land on (almost always) disjoint buckets and score near 0.
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(word);
        let index = (h % self.dim as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl EmbedderBackend for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Array1<f32>> {
        if self.dim == 0 {
            return Err(Error::Inference("embedding dimension must be positive".into()));
        }
        let mut v: Array1<f32> = Array1::zeros(self.dim);
        for m in TOKEN_RE.find_iter(text) {
            let (index, sign) = self.bucket(&m.as_str().to_lowercase());
            v[index] += sign;
        }
        let norm = v.dot(&v).sqrt();
        if norm > 0.0 {
            v /= norm;
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
        let na = a.dot(a).sqrt();
        let nb = b.dot(b).sqrt();
        if na == 0.0 || nb == 0.0 {
            return 0.0;
        }
        a.dot(b) / (na * nb)
    }

    #[test]
    fn test_dimension_and_determinism() {
        let e = HashingEmbedder::new(384);
        let a = e.embed("ZeroDivisionError: division by zero").unwrap();
        let b = e.embed("ZeroDivisionError: division by zero").unwrap();
        assert_eq!(a.len(), 384);
        assert_eq!(a, b);
        assert!((a.dot(&a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_unrelated_texts_below_default_threshold() {
        let e = HashingEmbedder::new(384);
        let a = e.embed("NameError: name 'x' is not defined").unwrap();
        let b = e.embed("ConnectionError: Failed to connect to database").unwrap();
        assert!(cosine(&a, &b) < 0.8);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let e = HashingEmbedder::new(384);
        let a = e.embed("Division by zero").unwrap();
        let b = e.embed("division, BY zero!").unwrap();
        assert!(cosine(&a, &b) > 0.999);
    }

    #[test]
    fn test_embedding_is_f32_unit_vector() {
        let e = HashingEmbedder::new(8);
        let v: Array1<f32> = e.embed("NameError x").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(16);
        let v = e.embed("  ::  ").unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
    }
}
