//! Sentence embeddings for the question index.
//!
//! Pure-Rust BERT inference via candle: all-MiniLM-L6-v2 from the Hugging
//! Face hub, mean pooling over the attention mask, L2-normalized output.
//! Normalized vectors let the index rank by plain dot product.

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;

const MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DIMENSIONS: usize = 384;

// BERT position-embedding limit.
const MAX_SEQ_LEN: usize = 512;

pub struct Embedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl Embedder {
    /// Download (or reuse the hub cache for) the embedding model and load it
    /// on the CPU. Questions are short; the embedder never needs a GPU.
    pub fn new() -> Result<Self> {
        let device = Device::Cpu;

        let api = ApiBuilder::new()
            .with_progress(false)
            .build()
            .context("failed to create Hugging Face API")?;
        let repo = api.repo(Repo::new(MODEL_ID.to_string(), RepoType::Model));

        let config_path = repo.get("config.json").context("failed to get config.json")?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .context("failed to get tokenizer.json")?;
        let weights_path = repo
            .get("model.safetensors")
            .context("failed to get model.safetensors")?;

        let bert_config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)? };
        let model = BertModel::load(vb, &bert_config)?;

        tracing::info!(model = MODEL_ID, "loaded embedding model");

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    /// Embed a single text.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()])?;
        Ok(embeddings.remove(0))
    }

    /// Embed a batch of texts. Sequences are truncated to the model limit
    /// and padded to the longest member of the batch.
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(MAX_SEQ_LEN))
            .max()
            .unwrap_or(0);

        let mut input_ids = Vec::with_capacity(texts.len() * max_len);
        let mut attention_mask = Vec::with_capacity(texts.len() * max_len);
        for encoding in &encodings {
            let ids = encoding.get_ids().iter().take(MAX_SEQ_LEN);
            let mask = encoding.get_attention_mask().iter().take(MAX_SEQ_LEN);

            let mut row_ids: Vec<u32> = ids.copied().collect();
            let mut row_mask: Vec<u32> = mask.copied().collect();
            row_ids.resize(max_len, 0);
            row_mask.resize(max_len, 0);

            input_ids.extend(row_ids);
            attention_mask.extend(row_mask);
        }

        let batch = texts.len();
        let input_ids = Tensor::from_vec(input_ids, (batch, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(attention_mask, (batch, max_len), &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Mean pooling over non-padding positions.
        let mask = attention_mask.to_dtype(DTYPE)?;
        let mask_expanded = mask.unsqueeze(2)?.broadcast_as(hidden.shape())?;
        let summed = (hidden * mask_expanded)?.sum(1)?;
        let counts = mask.sum(1)?.unsqueeze(1)?;
        let mean = summed.broadcast_div(&counts)?;

        // L2 normalize.
        let norms = mean.sqr()?.sum(1)?.sqrt()?.unsqueeze(1)?;
        let normalized = mean.broadcast_div(&norms)?;

        Ok(normalized.to_vec2()?)
    }

    pub fn dimension(&self) -> usize {
        DIMENSIONS
    }
}
