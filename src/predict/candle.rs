//! Local transformer pipeline backed by candle.
//!
//! Loads a Llama-family safetensors checkpoint and tokenizer from the
//! Hugging Face hub at construction and runs a single sampling pass per
//! prediction. Nothing is unloaded; the model lives for the process.

use super::{Device, Predict};
use crate::error::{Error, Result};
use crate::message::Message;
use anyhow::Context;
use async_trait::async_trait;
use candle_core::{DType, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaConfig, LlamaEosToks};
use hf_hub::api::tokio::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

// Fixed seed so runs over the same dataset are repeatable.
const SAMPLING_SEED: u64 = 299792458;
const TOP_P: f64 = 0.9;

pub struct CandleClient {
    model: Llama,
    config: Config,
    tokenizer: Tokenizer,
    device: candle_core::Device,
}

impl CandleClient {
    /// Fetch and load `model_id` from the hub. Sharded checkpoints are not
    /// supported; the repo must carry a single `model.safetensors`.
    pub async fn load(model_id: &str, device: Device) -> anyhow::Result<Self> {
        let device = device.to_candle()?;

        let api = Api::new().context("failed to create Hugging Face API")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get(CONFIG_FILE)
            .await
            .with_context(|| format!("failed to fetch {CONFIG_FILE} for {model_id}"))?;
        let tokenizer_path = repo
            .get(TOKENIZER_FILE)
            .await
            .with_context(|| format!("failed to fetch {TOKENIZER_FILE} for {model_id}"))?;
        let weights_path = repo.get(WEIGHTS_FILE).await.with_context(|| {
            format!("failed to fetch {WEIGHTS_FILE} for {model_id} (sharded checkpoints are not supported)")
        })?;

        let llama_config: LlamaConfig = serde_json::from_slice(&std::fs::read(&config_path)?)
            .with_context(|| format!("invalid {CONFIG_FILE} for {model_id}"))?;
        let config = llama_config.into_config(false);

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)? };
        let model = Llama::load(vb, &config)?;

        tracing::info!(model = model_id, "loaded local transformer");

        Ok(Self {
            model,
            config,
            tokenizer,
            device,
        })
    }

    fn generate(&self, prompt: &str, max_tokens: usize, temperature: f64) -> anyhow::Result<String> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;
        let mut tokens = encoding.get_ids().to_vec();
        let prompt_len = tokens.len();

        let mut cache = Cache::new(true, DType::F32, &self.config, &self.device)?;
        let mut logits_processor = sampler(temperature);

        let mut index_pos = 0;
        for index in 0..max_tokens {
            // First pass feeds the whole prompt; later passes feed one token
            // against the kv cache.
            let (context_size, context_index) = if index > 0 {
                (1, index_pos)
            } else {
                (tokens.len(), 0)
            };
            let input_ids = &tokens[tokens.len() - context_size..];
            let input = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, context_index, &mut cache)?;
            let logits = logits.squeeze(0)?;
            index_pos += input_ids.len();

            let next = logits_processor.sample(&logits)?;
            tokens.push(next);
            if self.is_eos(next) {
                break;
            }
        }

        let continuation = self
            .tokenizer
            .decode(&tokens[prompt_len..], true)
            .map_err(|e| anyhow::anyhow!("decoding failed: {e}"))?;
        Ok(continuation.trim().to_string())
    }

    fn is_eos(&self, token: u32) -> bool {
        match &self.config.eos_token_id {
            Some(LlamaEosToks::Single(id)) => token == *id,
            Some(LlamaEosToks::Multiple(ids)) => ids.contains(&token),
            None => false,
        }
    }
}

/// Nucleus sampling when temperature is positive, greedy otherwise.
fn sampler(temperature: f64) -> LogitsProcessor {
    if temperature > 0.0 {
        LogitsProcessor::new(SAMPLING_SEED, Some(temperature), Some(TOP_P))
    } else {
        LogitsProcessor::new(SAMPLING_SEED, None, None)
    }
}

#[async_trait]
impl Predict for CandleClient {
    async fn predict(
        &self,
        message: &Message,
        max_tokens: usize,
        temperature: f64,
    ) -> Result<String> {
        let prompt = match message {
            Message::Text(text) => text.clone(),
            Message::Chat(messages) => messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        };
        self.generate(&prompt, max_tokens, temperature)
            .map_err(Error::generation)
    }
}
