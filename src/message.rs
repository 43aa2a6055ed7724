//! Message types and per-family formatting.
//!
//! A backend's API expects one of three input shapes: a role-tagged message
//! list, a plain string, or a Llama-style delimiter-tagged string. The
//! `MessageFamily` enum names the shape and builds it from a user prompt and
//! an optional specialist (system persona) string.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single role/content pair. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A formatted model input: either raw text or an ordered chat sequence
/// (system first if present, then user).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Chat(Vec<ChatMessage>),
}

// Llama 3 sentinel tokens used by the delimiter-tagged family.
const BEGIN_OF_TEXT: &str = "<|begin_of_text|>";
const START_HEADER: &str = "<|start_header_id|>";
const END_HEADER: &str = "<|end_header_id|>";
const END_OF_TURN: &str = "<|eot_id|>";

/// The input shape expected by a backend's API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFamily {
    /// Role-tagged message list (chat-completions style APIs).
    Chat,
    /// The prompt passed through unchanged; the specialist is ignored.
    Plain,
    /// Llama-style delimiter-tagged single string.
    Llama,
}

impl MessageFamily {
    pub const ALL: [MessageFamily; 3] = [Self::Chat, Self::Plain, Self::Llama];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Plain => "plain",
            Self::Llama => "llama",
        }
    }

    /// Build the message for this family. The specialist segment is omitted
    /// entirely when absent; no empty system entry is ever produced.
    pub fn format(&self, prompt: &str, specialist: Option<&str>) -> Message {
        match self {
            Self::Chat => {
                let mut messages = Vec::with_capacity(2);
                if let Some(specialist) = specialist {
                    messages.push(ChatMessage::system(specialist));
                }
                messages.push(ChatMessage::user(prompt));
                Message::Chat(messages)
            }
            Self::Plain => Message::Text(prompt.to_string()),
            Self::Llama => {
                let mut text = String::from(BEGIN_OF_TEXT);
                if let Some(specialist) = specialist {
                    text.push_str(START_HEADER);
                    text.push_str("system");
                    text.push_str(END_HEADER);
                    text.push_str(specialist);
                    text.push_str(END_OF_TURN);
                }
                text.push_str(START_HEADER);
                text.push_str("user");
                text.push_str(END_HEADER);
                text.push_str(prompt);
                text.push_str(END_OF_TURN);
                text.push_str(START_HEADER);
                text.push_str("assistant");
                text.push_str(END_HEADER);
                Message::Text(text)
            }
        }
    }
}

impl FromStr for MessageFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "plain" => Ok(Self::Plain),
            "llama" => Ok(Self::Llama),
            _ => Err(Error::UnsupportedFamily {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MessageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Format a prompt for the named family. Unknown names fail with a
/// configuration error listing the supported set.
pub fn generate(family: &str, prompt: &str, specialist: Option<&str>) -> Result<Message> {
    Ok(family.parse::<MessageFamily>()?.format(prompt, specialist))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_with_specialist() {
        let message = MessageFamily::Chat.format("P", Some("S"));
        assert_eq!(
            message,
            Message::Chat(vec![ChatMessage::system("S"), ChatMessage::user("P")])
        );
    }

    #[test]
    fn test_chat_without_specialist() {
        let message = MessageFamily::Chat.format("P", None);
        assert_eq!(message, Message::Chat(vec![ChatMessage::user("P")]));
    }

    #[test]
    fn test_plain_ignores_specialist() {
        let message = MessageFamily::Plain.format("P", Some("S"));
        assert_eq!(message, Message::Text("P".to_string()));
    }

    #[test]
    fn test_llama_without_specialist() {
        let message = MessageFamily::Llama.format("P", None);
        assert_eq!(
            message,
            Message::Text(
                "<|begin_of_text|><|start_header_id|>user<|end_header_id|>P<|eot_id|>\
                 <|start_header_id|>assistant<|end_header_id|>"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_llama_with_specialist() {
        let message = MessageFamily::Llama.format("P", Some("S"));
        assert_eq!(
            message,
            Message::Text(
                "<|begin_of_text|><|start_header_id|>system<|end_header_id|>S<|eot_id|>\
                 <|start_header_id|>user<|end_header_id|>P<|eot_id|>\
                 <|start_header_id|>assistant<|end_header_id|>"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_no_empty_system_entry() {
        for family in MessageFamily::ALL {
            if let Message::Chat(messages) = family.format("P", None) {
                assert!(messages.iter().all(|m| m.role != Role::System));
            }
        }
    }

    #[test]
    fn test_unknown_family_names_supported_set() {
        let err = generate("unknown-family", "P", None).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("unknown-family"));
        assert!(text.contains("chat"));
        assert!(text.contains("plain"));
        assert!(text.contains("llama"));
    }

    #[test]
    fn test_family_parse_is_case_insensitive() {
        assert_eq!("Chat".parse::<MessageFamily>().unwrap(), MessageFamily::Chat);
        assert_eq!("LLAMA".parse::<MessageFamily>().unwrap(), MessageFamily::Llama);
    }

    #[test]
    fn test_roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::system("S")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"S"}"#);
    }
}
