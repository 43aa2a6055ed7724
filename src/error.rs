//! Error taxonomy for the harness.
//!
//! Configuration errors (unknown backend, unknown message family, missing
//! credentials or templates) fail immediately and are never retried.
//! Generation errors wrap whatever the underlying client hit after its own
//! retry budget is spent.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Backend name did not match any known client.
    #[error("unsupported backend {name:?} (choose one of: openai, maritaca, gemini, candle, gguf)")]
    UnsupportedBackend { name: String },

    /// Message family name did not match any known formatter.
    #[error("unsupported message family {name:?} (choose one of: chat, plain, llama)")]
    UnsupportedFamily { name: String },

    /// Device selector was neither "cpu" nor "gpu".
    #[error("invalid device {name:?} (choose \"cpu\" or \"gpu\")")]
    InvalidDevice { name: String },

    /// A hosted backend was constructed without a credential.
    #[error("an API key is required for the {backend} backend")]
    MissingApiKey { backend: &'static str },

    /// The message config has no template under this name.
    #[error("no template named {name:?} in the message config")]
    MissingTemplate { name: String },

    /// The persisted vector index does not exist.
    #[error("vector index not found at {path}")]
    IndexNotFound { path: PathBuf },

    /// Anything else that went wrong before a prediction could start.
    #[error("configuration error: {0}")]
    Config(#[source] anyhow::Error),

    /// A prediction failed (network, model loading, empty output, ...).
    #[error("generation failed: {0}")]
    Generation(#[source] anyhow::Error),
}

impl Error {
    pub fn config(err: impl Into<anyhow::Error>) -> Self {
        Self::Config(err.into())
    }

    pub fn generation(err: impl Into<anyhow::Error>) -> Self {
        Self::Generation(err.into())
    }
}
