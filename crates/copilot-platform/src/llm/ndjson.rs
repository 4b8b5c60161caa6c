//! Newline-delimited JSON framing for the runtime's streaming endpoints.
//!
//! Response bodies arrive as arbitrary byte chunks. Lines are reassembled
//! here, then decoded into chat events or pull progress.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use copilot_core::ports::{ChunkStream, LlmStreamEvent};
use copilot_types::{model::PullStatus, CopilotError, Result};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>>>>;
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>>>>;

/// Reassembles complete lines from byte chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes; returns every line completed by them. Blank lines are dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(text) = decode(&line) {
                lines.push(text);
            }
        }
        lines
    }

    /// Whatever trails the last newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        decode(&rest)
    }
}

fn decode(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Split a byte stream into lines. A transport error ends the stream after
/// being yielded.
pub fn lines(bytes: ByteStream) -> LineStream {
    let state = (bytes, LineBuffer::new(), VecDeque::<String>::new(), false);
    Box::pin(stream::unfold(
        state,
        |(mut bytes, mut buffer, mut ready, mut ended)| async move {
            loop {
                if let Some(line) = ready.pop_front() {
                    return Some((Ok(line), (bytes, buffer, ready, ended)));
                }
                if ended {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => ready.extend(buffer.push(&chunk)),
                    Some(Err(e)) => {
                        ended = true;
                        return Some((Err(e), (bytes, buffer, ready, ended)));
                    }
                    None => {
                        ended = true;
                        ready.extend(buffer.finish());
                    }
                }
            }
        },
    ))
}

// ─── /api/chat lines ─────────────────────────────────────────

#[derive(Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
}

/// Events carried by one line of a streaming chat response.
pub fn chat_events(line: &str) -> Vec<LlmStreamEvent> {
    let parsed: ChatLine = match serde_json::from_str(line) {
        Ok(parsed) => parsed,
        Err(e) => return vec![LlmStreamEvent::Error(format!("malformed stream line: {}", e))],
    };
    if let Some(error) = parsed.error {
        return vec![LlmStreamEvent::Error(error)];
    }

    let mut events = Vec::new();
    if let Some(message) = parsed.message {
        if !message.content.is_empty() {
            events.push(LlmStreamEvent::Delta(message.content));
        }
    }
    if parsed.done {
        events.push(LlmStreamEvent::Done);
    }
    events
}

/// Chat events for a whole response body. The stream ends at the first
/// `Done` or error; a body that stops before its `done` line ends with an
/// error, so a cut-off answer is never taken as complete.
pub fn chat_stream(lines: LineStream) -> ChunkStream {
    let state = (lines, VecDeque::<LlmStreamEvent>::new(), false);
    Box::pin(stream::unfold(
        state,
        |(mut lines, mut ready, mut ended)| async move {
            loop {
                if let Some(event) = ready.pop_front() {
                    if matches!(event, LlmStreamEvent::Done | LlmStreamEvent::Error(_)) {
                        ended = true;
                        ready.clear();
                    }
                    return Some((event, (lines, ready, ended)));
                }
                if ended {
                    return None;
                }
                match lines.next().await {
                    Some(Ok(line)) => ready.extend(chat_events(&line)),
                    Some(Err(e)) => ready.push_back(LlmStreamEvent::Error(e.to_string())),
                    None => {
                        log::warn!("chat stream closed without a done line");
                        ready.push_back(LlmStreamEvent::Error(
                            "stream ended before completion".to_string(),
                        ));
                    }
                }
            }
        },
    ))
}

// ─── /api/pull lines ─────────────────────────────────────────

pub fn pull_status(line: &str) -> Result<PullStatus> {
    let value: Value = serde_json::from_str(line)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(CopilotError::Llm(error.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}
