//! OpenAI-compatible chat-completions client.
//!
//! Serves the `openai` backend and, pointed at the Maritaca base URL, the
//! `maritaca` backend - the wire format is identical.

use super::retry::{retry, RetryPolicy};
use super::Predict;
use crate::error::{Error, Result};
use crate::message::{ChatMessage, Message};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, OPENAI_BASE_URL)
    }

    /// Point the client at an OpenAI-compatible host.
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
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

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        max_tokens: usize,
        temperature: f64,
    ) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(ApiMessage::from).collect(),
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(self.chat_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("failed to send chat completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("chat API returned {status}: {body}");
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("failed to parse chat completion response")?;

        let content = chat_response
            .choices
            .first()
            .context("no choices in chat completion response")?
            .message
            .content
            .clone();
        if content.is_empty() {
            anyhow::bail!("chat completion response was empty");
        }
        Ok(content)
    }
}

#[async_trait]
impl Predict for OpenAiClient {
    async fn predict(
        &self,
        message: &Message,
        max_tokens: usize,
        temperature: f64,
    ) -> Result<String> {
        let messages = match message {
            Message::Chat(messages) => messages.clone(),
            // A raw string still has to cross a role-tagged API.
            Message::Text(text) => vec![ChatMessage::user(text.clone())],
        };

        retry(&self.retry, || self.send(&messages, max_tokens, temperature))
            .await
            .map_err(Error::generation)
    }
}

// -----------------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: usize,
    temperature: f64,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

impl From<&ChatMessage> for ApiMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: match msg.role {
                crate::message::Role::System => "system",
                crate::message::Role::User => "user",
            },
            content: msg.content.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}
