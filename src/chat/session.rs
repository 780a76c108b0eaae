//! Conversation state for the chat tutor.

use std::io::Read;
use std::time::{Duration, Instant};

use crate::chat::{ChatContext, ChatError, ChatMessage, ChatRequest, ChatTransport, SseDecoder};

const READ_CHUNK: usize = 4096;

/// A running conversation.
///
/// The user message is added before the request goes out and removed
/// again if anything fails, together with any partial reply.
#[derive(Debug)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    cooldown: Duration,
    last_sent: Option<Instant>,
    last_error: Option<String>,
}

impl ChatSession {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            messages: Vec::new(),
            cooldown,
            last_sent: None,
            last_error: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Message of the last failed send.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_error = None;
    }

    /// Send a message and stream the reply, calling `on_delta` per fragment.
    pub fn send<T: ChatTransport + ?Sized>(
        &mut self,
        transport: &T,
        input: &str,
        context: ChatContext,
        on_delta: impl FnMut(&str),
    ) -> Result<String, ChatError> {
        self.send_at(Instant::now(), transport, input, context, on_delta)
    }

    /// [`ChatSession::send`] with an explicit clock reading.
    pub fn send_at<T: ChatTransport + ?Sized>(
        &mut self,
        now: Instant,
        transport: &T,
        input: &str,
        context: ChatContext,
        mut on_delta: impl FnMut(&str),
    ) -> Result<String, ChatError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < self.cooldown {
                self.last_error = Some(ChatError::Cooldown.to_string());
                return Err(ChatError::Cooldown);
            }
        }
        self.last_sent = Some(now);
        self.last_error = None;

        let history_len = self.messages.len();
        self.messages.push(ChatMessage::user(input));
        let request = ChatRequest {
            messages: self.messages.clone(),
            context,
        };

        let result = transport
            .open_stream(&request)
            .and_then(|body| read_reply(body, &mut on_delta));

        match result {
            Ok(reply) => {
                if !reply.is_empty() {
                    self.messages.push(ChatMessage::assistant(reply.clone()));
                }
                Ok(reply)
            }
            Err(err) => {
                tracing::warn!(error = %err, "chat request failed");
                self.messages.truncate(history_len);
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

fn read_reply(
    mut body: Box<dyn Read + Send>,
    on_delta: &mut impl FnMut(&str),
) -> Result<String, ChatError> {
    let mut decoder = SseDecoder::new();
    let mut reply = String::new();
    let mut chunk = [0u8; READ_CHUNK];

    while !decoder.is_done() {
        let read = body
            .read(&mut chunk)
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        let deltas = if read == 0 {
            decoder.finish()
        } else {
            decoder.push(&chunk[..read])
        };
        for delta in deltas {
            on_delta(&delta);
            reply.push_str(&delta);
        }
        if read == 0 {
            break;
        }
    }

    Ok(reply)
}
