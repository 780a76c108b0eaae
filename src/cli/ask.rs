//! Ask command for CodeQuest.
//!
//! Talks to the chat tutor. With a message it sends one question; without
//! one it opens a small prompt loop. Replies are streamed to the writer as
//! they arrive.

use std::io::{BufRead, Write};
use std::time::Duration;

use serde::Serialize;

use crate::chat::{ChatContext, ChatError, ChatSession, ChatTransport};
use crate::cli::{render, OutputOptions};
use crate::error::Result;
use crate::progress::GameStore;
use crate::storage::StateStore;

/// Output format for the ask command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskOutput {
    pub success: bool,
    /// Replies received, one per message sent.
    pub replies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The ask command implementation.
pub struct AskCommand<'a, T: ChatTransport + ?Sized> {
    transport: &'a T,
    session: ChatSession,
    context: ChatContext,
}

impl<'a, T: ChatTransport + ?Sized> AskCommand<'a, T> {
    pub fn new(transport: &'a T, cooldown: Duration, context: ChatContext) -> Self {
        Self {
            transport,
            session: ChatSession::new(cooldown),
            context,
        }
    }

    /// Build with the learner's language and level as tutor context.
    pub fn for_game<S: StateStore>(transport: &'a T, game: &GameStore<S>) -> Self {
        let context = ChatContext {
            language: Some(game.course().language.as_str().to_string()),
            level: Some(game.state().current_level),
            ..Default::default()
        };
        let cooldown = Duration::from_millis(game.config().chat.cooldown_ms);
        Self::new(transport, cooldown, context)
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Send one message, streaming the reply into `out`.
    pub fn run<W: Write>(&mut self, message: &str, out: &mut W) -> AskOutput {
        let (replies, error) = match self.send(message, out) {
            Ok(Ok(reply)) => (vec![reply], None),
            Ok(Err(e)) => (Vec::new(), Some(e.to_string())),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };
        AskOutput {
            success: error.is_none(),
            replies,
            error,
        }
    }

    /// Prompt loop; ends at end of input or `:q`.
    ///
    /// A failed message is reported and the loop carries on.
    pub fn interactive<R: BufRead, W: Write>(&mut self, input: &mut R, out: &mut W) -> AskOutput {
        let mut replies = Vec::new();
        let mut last_error = None;

        loop {
            if let Err(e) = write!(out, "you> ").and_then(|_| out.flush()) {
                last_error = Some(e.to_string());
                break;
            }
            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    last_error = Some(e.to_string());
                    break;
                }
            }
            let line = line.trim();
            if line == ":q" {
                break;
            }
            if line.is_empty() {
                continue;
            }

            match self.send(line, out) {
                Ok(Ok(reply)) => {
                    replies.push(reply);
                    last_error = None;
                }
                Ok(Err(e)) => {
                    let _ = writeln!(out, "! {}", e);
                    last_error = Some(e.to_string());
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    break;
                }
            }
        }

        AskOutput {
            success: last_error.is_none(),
            replies,
            error: last_error,
        }
    }

    /// Send and stream one message.
    ///
    /// The outer error is a failure to write to `out`; the inner one is the
    /// tutor's, kept as is so it can be shown inline.
    fn send<W: Write>(
        &mut self,
        message: &str,
        out: &mut W,
    ) -> Result<std::result::Result<String, ChatError>> {
        write!(out, "tutor> ")?;
        let mut write_error = None;
        let result = self.session.send(
            self.transport,
            message,
            self.context.clone(),
            |delta| {
                if write_error.is_none() {
                    if let Err(e) = write!(out, "{}", delta).and_then(|_| out.flush()) {
                        write_error = Some(e);
                    }
                }
            },
        );
        writeln!(out)?;
        if let Some(e) = write_error {
            return Err(e.into());
        }
        match result {
            Err(ChatError::EmptyMessage) => Ok(Ok(String::new())),
            other => Ok(other),
        }
    }

    pub fn format_output(&self, output: &AskOutput, options: &OutputOptions) -> String {
        render(output, options, Self::format_human_readable)
    }

    // Replies were already streamed; only the failure is left to show.
    fn format_human_readable(output: &AskOutput) -> String {
        match &output.error {
            Some(error) => format!("{}\n", error),
            None => String::new(),
        }
    }
}
