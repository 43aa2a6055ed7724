//! Scoring of generated results by a second model.
//!
//! The evaluator is hard-configured to one hosted backend and model: every
//! generated answer is wrapped in the evaluate-response template, paired
//! with the evaluator persona, and judged in a fresh chat call. The verdict
//! is free text; nothing parses it.

use crate::error::Result;
use crate::message::MessageFamily;
use crate::predict::{Backend, ClientOptions, Predict, PredictionManager};
use crate::templates::Templates;

pub const EVALUATION_BACKEND: Backend = Backend::OpenAi;
pub const EVALUATION_MODEL: &str = "gpt-4o-mini";

const PROMPT_TEMPLATE: &str = "evaluate_response_prompt";
const SPECIALIST_TEMPLATE: &str = "evaluate_response_specialist";

const MAX_TOKENS: usize = 1024;
const TEMPERATURE: f64 = 1.0;

pub struct Evaluator<P: Predict = PredictionManager> {
    predictor: P,
    templates: Templates,
}

impl Evaluator<PredictionManager> {
    /// Build the evaluator against the fixed hosted backend.
    pub async fn new(templates: Templates, api_key: String) -> Result<Self> {
        let predictor = PredictionManager::new(
            EVALUATION_BACKEND,
            EVALUATION_MODEL,
            ClientOptions::with_api_key(api_key),
        )
        .await?;
        Ok(Self {
            predictor,
            templates,
        })
    }
}

impl<P: Predict> Evaluator<P> {
    /// Use a caller-supplied predictor (tests, or a different judge model).
    pub fn with_predictor(predictor: P, templates: Templates) -> Self {
        Self {
            predictor,
            templates,
        }
    }

    /// Judge one generated result. Free-text verdict.
    pub async fn evaluate(&self, result: &str) -> Result<String> {
        let prompt = self.templates.render(PROMPT_TEMPLATE, &[("text", result)])?;
        let specialist = self.templates.get(SPECIALIST_TEMPLATE)?;
        let message = MessageFamily::Chat.format(&prompt, Some(specialist));
        self.predictor.predict(&message, MAX_TOKENS, TEMPERATURE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::message::Message;
    use async_trait::async_trait;

    struct EchoPredictor;

    #[async_trait]
    impl Predict for EchoPredictor {
        async fn predict(
            &self,
            message: &Message,
            _max_tokens: usize,
            _temperature: f64,
        ) -> Result<String> {
            match message {
                Message::Chat(messages) => Ok(messages
                    .iter()
                    .map(|m| m.content.clone())
                    .collect::<Vec<_>>()
                    .join("|")),
                Message::Text(_) => Err(Error::generation(anyhow::anyhow!("expected chat"))),
            }
        }
    }

    fn templates() -> Templates {
        Templates::from_pairs([
            (
                "evaluate_response_prompt".to_string(),
                "Evaluate this response: {text}".to_string(),
            ),
            (
                "evaluate_response_specialist".to_string(),
                "You are a strict evaluator.".to_string(),
            ),
        ])
    }

    #[tokio::test]
    async fn test_evaluate_renders_template_and_persona() {
        let evaluator = Evaluator::with_predictor(EchoPredictor, templates());
        let verdict = evaluator.evaluate("the answer").await.unwrap();
        assert_eq!(
            verdict,
            "You are a strict evaluator.|Evaluate this response: the answer"
        );
    }

    #[tokio::test]
    async fn test_missing_template_is_an_error() {
        let evaluator = Evaluator::with_predictor(EchoPredictor, Templates::from_pairs([]));
        let err = evaluator.evaluate("the answer").await.unwrap_err();
        assert!(err.to_string().contains("evaluate_response_prompt"));
    }
}
