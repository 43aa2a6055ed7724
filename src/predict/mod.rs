//! Prediction backends.
//!
//! One client per backend, all behind the single-method `Predict` trait:
//! hosted chat APIs (OpenAI, Maritaca), a hosted generation API (Gemini),
//! and two local candle runtimes (safetensors transformer, quantized GGUF).
//! `PredictionManager` picks and constructs the client for a backend name
//! and forwards calls verbatim - no caching, rate limiting, or fan-out.

pub mod candle;
pub mod gemini;
pub mod gguf;
pub mod openai;
pub mod retry;

use crate::error::{Error, Result};
use crate::message::Message;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use candle::CandleClient;
pub use gemini::GeminiClient;
pub use gguf::GgufClient;
pub use openai::OpenAiClient;
pub use retry::RetryPolicy;

/// Base URL for the Maritaca hosted API (OpenAI-compatible wire format).
const MARITACA_BASE_URL: &str = "https://chat.maritaca.ai/api";

/// The capability every backend exposes: one formatted message in, the
/// generated text out.
#[async_trait]
pub trait Predict: Send + Sync {
    async fn predict(&self, message: &Message, max_tokens: usize, temperature: f64)
        -> Result<String>;
}

/// A prediction backend, selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Hosted chat-completions API.
    OpenAi,
    /// Hosted chat API with the OpenAI wire format at the Maritaca base URL.
    Maritaca,
    /// Hosted generation API taking raw text.
    Gemini,
    /// Local safetensors transformer run with candle.
    Candle,
    /// Local quantized GGUF model run with candle.
    Gguf,
}

impl Backend {
    pub const ALL: [Backend; 5] = [
        Self::OpenAi,
        Self::Maritaca,
        Self::Gemini,
        Self::Candle,
        Self::Gguf,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Maritaca => "maritaca",
            Self::Gemini => "gemini",
            Self::Candle => "candle",
            Self::Gguf => "gguf",
        }
    }

    /// Whether this backend calls out over the network.
    pub fn is_hosted(&self) -> bool {
        matches!(self, Self::OpenAi | Self::Maritaca | Self::Gemini)
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "maritaca" => Ok(Self::Maritaca),
            "gemini" => Ok(Self::Gemini),
            "candle" => Ok(Self::Candle),
            "gguf" => Ok(Self::Gguf),
            _ => Err(Error::UnsupportedBackend {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compute device for the local backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    Cpu,
    #[default]
    Gpu,
}

impl Device {
    /// Resolve to a candle device. `gpu` probes CUDA, then Metal, then
    /// falls back to the CPU.
    pub fn to_candle(self) -> anyhow::Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Gpu => {
                if candle_core::utils::cuda_is_available() {
                    Ok(candle_core::Device::new_cuda(0)?)
                } else if candle_core::utils::metal_is_available() {
                    Ok(candle_core::Device::new_metal(0)?)
                } else {
                    tracing::info!("no GPU available, running on CPU");
                    Ok(candle_core::Device::Cpu)
                }
            }
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            _ => Err(Error::InvalidDevice {
                name: s.to_string(),
            }),
        }
    }
}

/// Construction options. Hosted backends need `api_key`; local backends
/// use `device`.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub api_key: Option<String>,
    pub device: Device,
}

impl ClientOptions {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            device: Device::default(),
        }
    }

    pub fn with_device(device: Device) -> Self {
        Self {
            api_key: None,
            device,
        }
    }
}

/// Constructs the client for a backend and forwards prediction calls.
pub struct PredictionManager {
    backend: Backend,
    client: Box<dyn Predict>,
}

impl std::fmt::Debug for PredictionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionManager")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl PredictionManager {
    /// Build the client for `backend`. Hosted clients fail here when no API
    /// key was supplied; local clients load model and tokenizer here, not
    /// lazily.
    pub async fn new(backend: Backend, model_name: &str, options: ClientOptions) -> Result<Self> {
        tracing::info!(backend = backend.name(), model = model_name, "selected backend");

        let require_key = |name: &'static str| -> Result<String> {
            options
                .api_key
                .clone()
                .ok_or(Error::MissingApiKey { backend: name })
        };

        let client: Box<dyn Predict> = match backend {
            Backend::OpenAi => Box::new(OpenAiClient::new(require_key("openai")?, model_name)),
            Backend::Maritaca => Box::new(OpenAiClient::with_base_url(
                require_key("maritaca")?,
                model_name,
                MARITACA_BASE_URL,
            )),
            Backend::Gemini => Box::new(GeminiClient::new(require_key("gemini")?, model_name)),
            Backend::Candle => {
                Box::new(CandleClient::load(model_name, options.device).await.map_err(Error::generation)?)
            }
            Backend::Gguf => Box::new(
                GgufClient::load(Path::new(model_name), options.device).map_err(Error::generation)?,
            ),
        };

        Ok(Self { backend, client })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Forwarded verbatim to the constructed client.
    pub async fn predict(
        &self,
        message: &Message,
        max_tokens: usize,
        temperature: f64,
    ) -> Result<String> {
        self.client.predict(message, max_tokens, temperature).await
    }
}

#[async_trait]
impl Predict for PredictionManager {
    async fn predict(
        &self,
        message: &Message,
        max_tokens: usize,
        temperature: f64,
    ) -> Result<String> {
        self.client.predict(message, max_tokens, temperature).await
    }
}
