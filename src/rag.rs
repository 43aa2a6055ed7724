//! Retrieval of similar prior questions for few-shot context.
//!
//! The index is a flat JSON file of question records with precomputed,
//! normalized embeddings. Ranking is a dot product against the embedded
//! query - the dataset is a few thousand questions, nothing here needs an
//! approximate index.

use crate::dataset::Record;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One indexed question with its stored answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub question: String,
    pub code_answer: String,
    pub text_answer: String,
    pub embedding: Vec<f32>,
}

/// A retrieval hit, most similar first.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarExample {
    pub question: String,
    pub code_answer: String,
    pub text_answer: String,
    pub score: f32,
}

/// The lookup capability the few-shot runner depends on.
pub trait Retrieve {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SimilarExample>>;
}

/// A loaded index paired with the embedder that queries it.
pub struct EmbeddingRetriever {
    index: RagIndex,
    embedder: Embedder,
}

impl EmbeddingRetriever {
    pub fn new(index: RagIndex, embedder: Embedder) -> Self {
        Self { index, embedder }
    }
}

impl Retrieve for EmbeddingRetriever {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SimilarExample>> {
        self.index.retrieve(&self.embedder, query, k)
    }
}

/// The persisted question index.
#[derive(Debug)]
pub struct RagIndex {
    entries: Vec<IndexEntry>,
}

impl RagIndex {
    /// Embed every record's question and build the index.
    pub fn build(records: &[Record], embedder: &Embedder) -> Result<Self> {
        let questions: Vec<String> = records.iter().map(|r| r.question.clone()).collect();
        let embeddings = embedder
            .embed_batch(&questions)
            .context("failed to embed questions")
            .map_err(Error::config)?;

        let entries = records
            .iter()
            .zip(embeddings)
            .map(|(record, embedding)| IndexEntry {
                question: record.question.clone(),
                code_answer: record.code_answer.clone(),
                text_answer: record.text_answer.clone(),
                embedding,
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<IndexEntry>) -> Self {
        Self { entries }
    }

    /// Load a previously saved index. A missing file is an immediate error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::IndexNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read vector index {}", path.display()))
            .map_err(Error::config)?;
        let entries: Vec<IndexEntry> = serde_json::from_str(&text)
            .with_context(|| format!("invalid vector index {}", path.display()))
            .map_err(Error::config)?;
        Ok(Self { entries })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string(&self.entries)
            .context("failed to serialize vector index")
            .map_err(Error::config)?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write vector index {}", path.display()))
            .map_err(Error::config)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retrieve the `k` entries most similar to `query`, best first.
    pub fn retrieve(&self, embedder: &Embedder, query: &str, k: usize) -> Result<Vec<SimilarExample>> {
        let query_embedding = embedder
            .embed(query)
            .context("failed to embed query")
            .map_err(Error::config)?;
        Ok(self.rank(&query_embedding, k))
    }

    /// Rank entries against an already-embedded query.
    pub fn rank(&self, query_embedding: &[f32], k: usize) -> Vec<SimilarExample> {
        let mut scored: Vec<SimilarExample> = self
            .entries
            .iter()
            .map(|entry| SimilarExample {
                question: entry.question.clone(),
                code_answer: entry.code_answer.clone(),
                text_answer: entry.text_answer.clone(),
                score: dot(query_embedding, &entry.embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(question: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            question: question.to_string(),
            code_answer: format!("{question}-code"),
            text_answer: format!("{question}-text"),
            embedding,
        }
    }

    fn fixture() -> RagIndex {
        RagIndex::from_entries(vec![
            entry("north", vec![0.0, 1.0]),
            entry("east", vec![1.0, 0.0]),
            entry("northeast", vec![0.707, 0.707]),
        ])
    }

    #[test]
    fn test_rank_orders_most_similar_first() {
        let hits = fixture().rank(&[0.0, 1.0], 3);
        assert_eq!(hits[0].question, "north");
        assert_eq!(hits[1].question, "northeast");
        assert_eq!(hits[2].question, "east");
    }

    #[test]
    fn test_rank_returns_at_most_k() {
        let hits = fixture().rank(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].question, "east");
    }

    #[test]
    fn test_rank_carries_answers() {
        let hits = fixture().rank(&[1.0, 0.0], 1);
        assert_eq!(hits[0].code_answer, "east-code");
        assert_eq!(hits[0].text_answer, "east-text");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        fixture().save(&path).unwrap();
        let loaded = RagIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);

        let hits = loaded.rank(&[0.0, 1.0], 1);
        assert_eq!(hits[0].question, "north");
    }

    #[test]
    fn test_load_missing_index_is_an_error() {
        let err = RagIndex::load("/nonexistent/index.json").unwrap_err();
        assert!(matches!(err, Error::IndexNotFound { .. }));
    }
}
