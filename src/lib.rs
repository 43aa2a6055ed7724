//! hazbench: an experiment harness for evaluating LLM responses to a
//! question dataset across hosted and local backends.
//!
//! - Message formatting per backend family (chat, plain, llama-tagged)
//! - Prediction clients behind one `predict` contract, with bounded retry
//!   for the hosted ones
//! - Second-model evaluation of generated results
//! - Similar-question retrieval over a local embedding index for few-shot
//!   context
//! - Batch runners: translate, zero-shot, few-shot

pub mod dataset;
pub mod embed;
pub mod error;
pub mod evaluate;
pub mod experiment;
pub mod message;
pub mod predict;
pub mod rag;
pub mod templates;

pub use dataset::{load_jsonl, write_jsonl, Column, ErrorLog, Record, ScoredRecord};
pub use embed::Embedder;
pub use error::{Error, Result};
pub use evaluate::Evaluator;
pub use message::{generate, ChatMessage, Message, MessageFamily, Role};
pub use predict::{Backend, ClientOptions, Device, Predict, PredictionManager};
pub use rag::{EmbeddingRetriever, RagIndex, Retrieve, SimilarExample};
pub use templates::Templates;
