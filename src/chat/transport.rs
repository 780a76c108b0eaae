//! Transport to the tutor endpoint.

use std::io::Read;
use std::time::Duration;

use serde_json::Value;

use crate::chat::{ChatError, ChatRequest};
use crate::config::ChatConfig;

/// Opens a streamed reply for a chat request.
pub trait ChatTransport {
    /// Post `request` and hand back the event stream body.
    ///
    /// Non-2xx replies are errors.
    fn open_stream(&self, request: &ChatRequest) -> Result<Box<dyn Read + Send>, ChatError>;
}

/// Time limits for talking to the tutor.
///
/// The total limit covers reading the streamed body too, so it is off
/// unless configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub total: Option<Duration>,
}

impl Timeouts {
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            connect: Duration::from_millis(config.connect_timeout_ms),
            total: (config.timeout_ms > 0).then(|| Duration::from_millis(config.timeout_ms)),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}

/// Blocking HTTP transport with bearer auth.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    timeouts: Timeouts,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeouts: Timeouts,
    ) -> Result<Self, ChatError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.total)
            .build()
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            timeouts,
        })
    }

    /// Build from configuration; fails when no endpoint is configured.
    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatError> {
        if !config.is_enabled() {
            return Err(ChatError::Disabled);
        }
        Self::new(
            config.endpoint.clone(),
            config.api_key(),
            Timeouts::from_config(config),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}

impl ChatTransport for HttpTransport {
    fn open_stream(&self, request: &ChatRequest) -> Result<Box<dyn Read + Send>, ChatError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ChatError::Http {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &body),
            });
        }

        tracing::debug!(endpoint = %self.endpoint, "chat stream opened");
        Ok(Box::new(response))
    }
}

/// The body's `error` field, or a generic message with the status.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Request failed: {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_endpoint() {
        let config = ChatConfig::default();
        assert!(matches!(
            HttpTransport::from_config(&config),
            Err(ChatError::Disabled)
        ));

        let config = ChatConfig {
            endpoint: "http://127.0.0.1:9/chat".to_string(),
            ..Default::default()
        };
        let transport = HttpTransport::from_config(&config).unwrap();
        assert_eq!(transport.endpoint(), "http://127.0.0.1:9/chat");
    }

    #[test]
    fn test_streamed_replies_have_no_total_limit_by_default() {
        let config = ChatConfig {
            endpoint: "http://127.0.0.1:9/chat".to_string(),
            ..Default::default()
        };
        let transport = HttpTransport::from_config(&config).unwrap();
        assert_eq!(transport.timeouts().total, None);
        assert_eq!(transport.timeouts().connect, Duration::from_secs(10));

        let config = ChatConfig {
            timeout_ms: 90_000,
            ..config
        };
        let transport = HttpTransport::from_config(&config).unwrap();
        assert_eq!(transport.timeouts().total, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_error_message_prefers_body_field() {
        assert_eq!(
            error_message(429, r#"{"error": "Rate limit exceeded"}"#),
            "Rate limit exceeded"
        );
        assert_eq!(error_message(500, "<html>oops</html>"), "Request failed: 500");
        assert_eq!(error_message(402, r#"{"error": ""}"#), "Request failed: 402");
        assert_eq!(error_message(503, ""), "Request failed: 503");
    }
}
