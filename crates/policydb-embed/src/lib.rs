//! Text embedding functions for the vector tier.
//!
//! [`BertEmbedder`] runs a local sentence-transformers BERT checkpoint on
//! candle. [`ByteSumEmbedder`] is the deterministic, model-free substitute
//! used by tests and offline setups.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;
pub use policydb_core::traits::Embedder;

/// Output size of all-MiniLM-L6-v2, the default local model.
pub const DEFAULT_DIM: usize = 384;
const DEFAULT_MAX_LEN: usize = 256;
const BATCH_SIZE: usize = 32;

/// Sums byte values into a fixed-length vector (byte `i` lands in slot
/// `i % dim`), then L2-normalizes. Empty text maps to the zero vector.
#[derive(Debug, Clone)]
pub struct ByteSumEmbedder {
    dim: usize,
}

impl ByteSumEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, b) in text.bytes().enumerate() {
            v[i % self.dim] += f32::from(b);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for ByteSumEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

impl Embedder for ByteSumEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl BertEmbedder {
    /// Load `config.json`, `tokenizer.json` and `model.safetensors` (or
    /// `pytorch_model.bin`) from `model_dir`.
    pub fn from_dir(model_dir: &Path) -> Result<Self> {
        let device = device::select_device();

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let dims: serde_json::Value = serde_json::from_str(&raw_config)?;
        let dim = dims["hidden_size"].as_u64().map_or(DEFAULT_DIM, |d| d as usize);
        let max_len = dims["max_position_embeddings"]
            .as_u64()
            .map_or(DEFAULT_MAX_LEN, |m| (m as usize).min(DEFAULT_MAX_LEN));

        let safetensors = model_dir.join("model.safetensors");
        let vb = if safetensors.exists() {
            // SAFETY: the weights file is not modified while mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DTYPE, &device)? }
        } else {
            let weights_path = model_dir.join("pytorch_model.bin");
            let weights = candle_core::pickle::read_all(&weights_path)
                .with_context(|| format!("Failed to read weights from {}", weights_path.display()))?;
            let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
            VarBuilder::from_tensors(weights_map, DType::F32, &device)
        };
        let model = BertModel::load(vb, &config)?;
        tracing::info!(model_dir = %model_dir.display(), dim, max_len, "loaded BERT embedding model");
        Ok(Self { model, tokenizer, device, dim, max_len })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize::tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_dtype(DType::F32)?.to_device(&Device::Cpu)?.to_vec2()?;
        Ok(rows)
    }
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            out.extend(self.embed_chunk(chunk)?);
        }
        tracing::debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

/// Byte-sum embedder when `APP_USE_FAKE_EMBEDDINGS` is `1`/`true`,
/// otherwise the local BERT model.
pub fn get_default_embedder() -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        tracing::info!(dim = DEFAULT_DIM, "using byte-sum embedder");
        return Ok(Arc::new(ByteSumEmbedder::default()));
    }
    Ok(Arc::new(BertEmbedder::from_dir(&resolve_model_dir()?)?))
}

pub fn resolve_model_dir() -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() {
                tracing::debug!(var, dir = %p.display(), "using model dir from env");
                return Ok(p);
            }
            tracing::warn!(var, dir = %p.display(), "model dir from env does not exist");
        }
    }
    for candidate in ["models/all-MiniLM-L6-v2", "../models/all-MiniLM-L6-v2"] {
        let p = Path::new(candidate);
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }
    Err(anyhow!("Could not locate embedding model directory; set APP_MODEL_DIR"))
}
