//! Gemini generation-API client.
//!
//! The generateContent endpoint takes raw text rather than role-tagged
//! messages; chat-shaped input is flattened before sending. Category
//! filters are disabled: the harness measures raw model behavior on the
//! hazardous-domain questions it scores.

use super::retry::{retry, RetryPolicy};
use super::Predict;
use crate::error::{Error, Result};
use crate::message::Message;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry schedule.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_BASE_URL, self.model, self.api_key
        )
    }

    async fn send(&self, text: &str, max_tokens: usize, temperature: f64) -> anyhow::Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                candidate_count: 1,
                max_output_tokens: max_tokens,
                temperature,
            },
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .context("failed to send generateContent request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("generation API returned {status}: {body}");
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .context("failed to parse generateContent response")?;

        let text = generated
            .candidates
            .first()
            .context("no candidates in generateContent response")?
            .content
            .parts
            .iter()
            .map(|part| part.text.as_str())
            .collect::<String>();
        if text.is_empty() {
            anyhow::bail!("generateContent response was empty");
        }
        Ok(text)
    }
}

#[async_trait]
impl Predict for GeminiClient {
    async fn predict(
        &self,
        message: &Message,
        max_tokens: usize,
        temperature: f64,
    ) -> Result<String> {
        let text = flatten(message);
        retry(&self.retry, || self.send(&text, max_tokens, temperature))
            .await
            .map_err(Error::generation)
    }
}

/// Collapse a message into the single text block the API accepts.
fn flatten(message: &Message) -> String {
    match message {
        Message::Text(text) => text.clone(),
        Message::Chat(messages) => messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

// -----------------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    candidate_count: usize,
    max_output_tokens: usize,
    temperature: f64,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatMessage;

    #[test]
    fn test_flatten_text_passes_through() {
        assert_eq!(flatten(&Message::Text("P".to_string())), "P");
    }

    #[test]
    fn test_flatten_chat_joins_contents() {
        let message = Message::Chat(vec![ChatMessage::system("S"), ChatMessage::user("P")]);
        assert_eq!(flatten(&message), "S\n\nP");
    }

    #[test]
    fn test_request_wire_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "P".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                candidate_count: 1,
                max_output_tokens: 1024,
                temperature: 0.3,
            },
            safety_settings: vec![],
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "P");
        assert_eq!(value["generationConfig"]["candidateCount"], 1);
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 1024);
    }
}
