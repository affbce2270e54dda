//! Local ONNX Runtime CLIP provider.
//!
//! Implements [`EmbeddingProvider`] with the CLIP ViT-B/32 text and vision towers
//! exported to ONNX. Handles tokenization, image preprocessing, inference and L2
//! normalization. Both sessions are loaded once and shared.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionOutputs};
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{l2_normalize, preprocess, EmbeddingProvider, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;

/// CLIP's text context length.
const CONTEXT_LEN: usize = 77;

/// `<|endoftext|>`, also used as CLIP's padding token.
const EOT_TOKEN_ID: u32 = 49407;

pub const TEXT_MODEL_FILE: &str = "text_model.onnx";
pub const VISION_MODEL_FILE: &str = "vision_model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Paths of the three model files inside the cache directory.
pub fn model_files(cache_dir: &Path) -> [PathBuf; 3] {
    [
        cache_dir.join(TEXT_MODEL_FILE),
        cache_dir.join(VISION_MODEL_FILE),
        cache_dir.join(TOKENIZER_FILE),
    ]
}

pub struct ClipEmbeddingProvider {
    text: Mutex<Session>,
    vision: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl ClipEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        let [text_path, vision_path, tokenizer_path] = model_files(&cache_dir);

        for path in [&text_path, &vision_path, &tokenizer_path] {
            anyhow::ensure!(
                path.exists(),
                "model file not found at {}. Run `picsearch model download` first.",
                path.display()
            );
        }

        let text = load_session(&text_path).context("failed to load CLIP text model")?;
        let vision = load_session(&vision_path).context("failed to load CLIP vision model")?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: CONTEXT_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::Fixed(CONTEXT_LEN),
            pad_id: EOT_TOKEN_ID,
            pad_token: "<|endoftext|>".into(),
            ..Default::default()
        }));

        tracing::info!(model = %config.model, dir = %cache_dir.display(), "CLIP model loaded");

        Ok(Self {
            text: Mutex::new(text),
            vision: Mutex::new(vision),
            tokenizer,
        })
    }
}

fn load_session(path: &Path) -> Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .commit_from_file(path)?;
    tracing::debug!(model = %path.display(), "ONNX session ready");
    Ok(session)
}

/// Pull the `[1, 512]` projection out of a session's outputs.
fn extract_embedding(outputs: &SessionOutputs, name: &str) -> Result<Vec<f32>> {
    let value = outputs.get(name).unwrap_or_else(|| &outputs[0]);
    let (shape, data) = value
        .try_extract_tensor::<f32>()
        .with_context(|| format!("failed to extract {name} tensor"))?;

    let dims: &[i64] = &shape;
    anyhow::ensure!(
        dims.len() == 2 && dims[1] == EMBEDDING_DIM as i64,
        "unexpected {name} shape: {dims:?}, expected [1, {EMBEDDING_DIM}]"
    );
    Ok(l2_normalize(&data[..EMBEDDING_DIM]))
}

impl EmbeddingProvider for ClipEmbeddingProvider {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let shape = vec![1i64, input_ids.len() as i64];

        let input_ids = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))?;
        let attention_mask = Tensor::from_array((shape, attention_mask.into_boxed_slice()))?;

        let mut session = self
            .text
            .lock()
            .map_err(|e| anyhow::anyhow!("text session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
        })?;

        extract_embedding(&outputs, "text_embeds")
    }

    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        let pixels = preprocess::pixel_values(image);
        let shape: Vec<i64> = std::iter::once(1)
            .chain(pixels.shape().iter().map(|&d| d as i64))
            .collect();
        let data: Vec<f32> = pixels.iter().copied().collect();
        let pixel_values = Tensor::from_array((shape, data.into_boxed_slice()))?;

        let mut session = self
            .vision
            .lock()
            .map_err(|e| anyhow::anyhow!("vision session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs! {
            "pixel_values" => pixel_values,
        })?;

        extract_embedding(&outputs, "image_embeds")
    }
}
