//! Chat tutor collaborator.
//!
//! The tutor lives behind an HTTP endpoint that streams its reply as
//! server-sent events. The progression engine never depends on it; the CLI
//! uses it for `codequest ask`.

pub mod frames;
pub mod session;
pub mod transport;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::QuestError;

pub use frames::SseDecoder;
pub use session::ChatSession;
pub use transport::{ChatTransport, HttpTransport, Timeouts};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// What the tutor knows about the learner's situation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
}

/// Body posted to the tutor endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub context: ChatContext,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Please wait a moment before sending another message.")]
    Cooldown,

    #[error("message is empty")]
    EmptyMessage,

    #[error("chat tutor is not configured (set chat.endpoint)")]
    Disabled,

    /// Non-2xx reply; `message` comes from the body's `error` field when present.
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Failed to send message: {0}")]
    Transport(String),
}

impl From<ChatError> for QuestError {
    fn from(err: ChatError) -> Self {
        QuestError::chat(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
            context: ChatContext {
                language: Some("python".to_string()),
                level: Some(2),
                ..Default::default()
            },
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "messages": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"}
                ],
                "context": {"language": "python", "level": 2}
            })
        );
    }

    #[test]
    fn test_chat_error_into_quest_error() {
        let err: QuestError = ChatError::Http {
            status: 429,
            message: "Rate limited".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "chat error: Rate limited");
    }
}
