//! Local quantized-model runtime backed by candle's GGUF kernels.
//!
//! The model name is a path to a `.gguf` file; a `tokenizer.json` is
//! expected beside it. Weights load once at construction and stay resident
//! for the process lifetime.

use super::{Device, Predict};
use crate::error::{Error, Result};
use crate::message::Message;
use anyhow::Context;
use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::Tensor;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use std::path::Path;
use std::sync::Mutex;
use tokenizers::Tokenizer;

const TOKENIZER_FILE: &str = "tokenizer.json";

// Fixed context window; prompts must fit inside it.
const CONTEXT_SIZE: usize = 2048;

const SAMPLING_SEED: u64 = 299792458;
const TOP_P: f64 = 0.9;

// End-of-sequence markers across the model generations this runtime sees.
const STOP_TOKENS: [&str; 3] = ["<|end_of_text|>", "<|eot_id|>", "</s>"];

pub struct GgufClient {
    // forward() mutates the internal kv cache.
    model: Mutex<ModelWeights>,
    tokenizer: Tokenizer,
    stop_ids: Vec<u32>,
    device: candle_core::Device,
}

impl GgufClient {
    /// Load the GGUF file at `model_path` and the tokenizer beside it.
    pub fn load(model_path: &Path, device: Device) -> anyhow::Result<Self> {
        let device = device.to_candle()?;

        let mut file = std::fs::File::open(model_path)
            .with_context(|| format!("failed to open model file {}", model_path.display()))?;
        let content = gguf_file::Content::read(&mut file)
            .with_context(|| format!("invalid GGUF file {}", model_path.display()))?;
        let model = ModelWeights::from_gguf(content, &mut file, &device)
            .with_context(|| format!("failed to load GGUF weights from {}", model_path.display()))?;

        let tokenizer_path = model_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(TOKENIZER_FILE);
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            anyhow::anyhow!(
                "failed to load {} (expected beside the model file): {e}",
                tokenizer_path.display()
            )
        })?;

        let stop_ids = STOP_TOKENS
            .iter()
            .filter_map(|token| tokenizer.token_to_id(token))
            .collect();

        tracing::info!(model = %model_path.display(), "loaded quantized model");

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            stop_ids,
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

        // Leave room for the prompt inside the fixed context.
        let budget = max_tokens.min(CONTEXT_SIZE.saturating_sub(prompt_len));
        if budget == 0 {
            anyhow::bail!("prompt of {prompt_len} tokens exceeds the {CONTEXT_SIZE}-token context");
        }

        let mut logits_processor = if temperature > 0.0 {
            LogitsProcessor::new(SAMPLING_SEED, Some(temperature), Some(TOP_P))
        } else {
            LogitsProcessor::new(SAMPLING_SEED, None, None)
        };

        let mut model = self.model.lock().expect("model lock poisoned");

        let mut index_pos = 0;
        for index in 0..budget {
            let (context_size, context_index) = if index > 0 {
                (1, index_pos)
            } else {
                (tokens.len(), 0)
            };
            let input_ids = &tokens[tokens.len() - context_size..];
            let input = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
            let logits = model.forward(&input, context_index)?;
            let logits = logits.squeeze(0)?;
            index_pos += input_ids.len();

            let next = logits_processor.sample(&logits)?;
            tokens.push(next);
            if self.stop_ids.contains(&next) {
                break;
            }
        }

        let continuation = self
            .tokenizer
            .decode(&tokens[prompt_len..], true)
            .map_err(|e| anyhow::anyhow!("decoding failed: {e}"))?;
        Ok(continuation.trim().to_string())
    }
}

#[async_trait]
impl Predict for GgufClient {
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
