//! Text and image embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and a local implementation running
//! CLIP ViT-B/32 (512 dimensions, L2-normalized) through ONNX Runtime. Text and
//! images land in the same space, so a text query can be compared with image
//! vectors directly. The provider is created once via [`create_provider`].

pub mod clip;
pub mod preprocess;

use anyhow::Result;
use image::DynamicImage;

/// Number of dimensions in the embedding vectors (CLIP ViT-B/32 projection width).
pub const EMBEDDING_DIM: usize = 512;

/// Trait for embedding text and images into a shared vector space.
///
/// Implementations produce L2-normalized vectors of [`EmbeddingProvider::dimensions`]
/// length. All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// Currently only `"local"` is supported (ONNX Runtime + CLIP ViT-B/32).
/// Returns an error if model files are not found; run `picsearch model download` first.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = clip::ClipEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
