//! Coalesces streamed chunks into fixed-size UI updates.
//!
//! Generation collaborators tend to yield many tiny chunks. Text is
//! accumulated in `pending` and moved into `committed` once at least
//! `threshold` characters are waiting; whatever remains when the stream
//! ends is flushed regardless of size.

use futures::{Stream, StreamExt};
use copilot_types::{CopilotError, Result};

use crate::ports::LlmStreamEvent;

/// Per-turn assembly buffer for streamed assistant output
#[derive(Debug, Clone)]
pub struct StreamBuffer {
    threshold: usize,
    committed: String,
    pending: String,
    pending_chars: usize,
    flushes: usize,
}

impl StreamBuffer {
    /// A threshold of 0 behaves like 1: every non-empty chunk flushes.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            committed: String::new(),
            pending: String::new(),
            pending_chars: 0,
            flushes: 0,
        }
    }

    /// Append a chunk. Returns the committed text when this push triggered a flush.
    pub fn push(&mut self, chunk: &str) -> Option<&str> {
        self.pending.push_str(chunk);
        self.pending_chars += chunk.chars().count();
        if self.pending_chars >= self.threshold {
            self.flush()
        } else {
            None
        }
    }

    /// Flush any remainder, however short.
    pub fn finish(&mut self) -> Option<&str> {
        if self.pending.is_empty() {
            None
        } else {
            self.flush()
        }
    }

    fn flush(&mut self) -> Option<&str> {
        self.committed.push_str(&self.pending);
        self.pending.clear();
        self.pending_chars = 0;
        self.flushes += 1;
        Some(&self.committed)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Number of flushes so far (one UI update each)
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    pub fn into_committed(self) -> String {
        self.committed
    }
}

/// Run the flush protocol over a chunk stream until it ends or fails.
///
/// `on_flush` receives the full committed text after every flush. On a
/// stream error the remainder is flushed first, so everything received
/// stays on screen, and the error is returned.
pub async fn drain_stream<S, F>(
    mut stream: S,
    buffer: &mut StreamBuffer,
    mut on_flush: F,
) -> Result<()>
where
    S: Stream<Item = LlmStreamEvent> + Unpin,
    F: FnMut(&str),
{
    while let Some(event) = stream.next().await {
        match event {
            LlmStreamEvent::Delta(chunk) => {
                if let Some(committed) = buffer.push(&chunk) {
                    on_flush(committed);
                }
            }
            LlmStreamEvent::Done => break,
            LlmStreamEvent::Error(message) => {
                if let Some(committed) = buffer.finish() {
                    on_flush(committed);
                }
                return Err(CopilotError::GenerationStream(message));
            }
        }
    }

    if let Some(committed) = buffer.finish() {
        on_flush(committed);
    }
    log::debug!(
        "stream drained: {} chars in {} flushes",
        buffer.committed().chars().count(),
        buffer.flush_count()
    );
    Ok(())
}
