//! Bug Whisperer Infer: embedding service boundary.
//!
//! Provides the `EmbedderBackend` trait for turning error text into vectors.
//! When the `onnx` feature is enabled and model files are present,
//! `OnnxEmbedder` loads all-MiniLM-L6-v2 for 384-dim embeddings.
//! Otherwise `HashingEmbedder` gives deterministic lexical vectors.

pub mod cache;
pub mod embedder;
pub mod onnx_embedder;

pub use cache::{CachedEmbedder, EmbeddingCache};
pub use embedder::{EmbedderBackend, HashingEmbedder};

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

/// Create the best available embedder for the given model directory.
///
/// Tries ONNX first (if feature enabled and model files present), falls back
/// to `HashingEmbedder`, and wraps the result in an embedding cache.
pub fn create_embedder(model_dir: &Path, dim: usize) -> Arc<dyn EmbedderBackend> {
    #[cfg(feature = "onnx")]
    {
        match OnnxEmbedder::load(model_dir) {
            Ok(embedder) if embedder.dimension() == dim => {
                tracing::info!("Using ONNX embedder (dim={})", embedder.dimension());
                return Arc::new(CachedEmbedder::with_default_cache(Arc::new(embedder)));
            }
            Ok(embedder) => {
                tracing::warn!(
                    "ONNX embedder dim {} does not match configured {}. Using hashing embedder.",
                    embedder.dimension(),
                    dim
                );
            }
            Err(e) => {
                tracing::warn!("ONNX embedder unavailable: {}. Using hashing embedder.", e);
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        tracing::info!(
            "ONNX feature disabled (model dir {}). Using hashing embedder.",
            model_dir.display()
        );
    }

    Arc::new(CachedEmbedder::with_default_cache(Arc::new(HashingEmbedder::new(dim))))
}
