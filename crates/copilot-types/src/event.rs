use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Events emitted by the chat session and the app handlers.
/// UI subscribes to these for reactive updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Session started processing a user message
    TurnStart { turn_id: u64 },

    /// A message was appended to the transcript
    MessageAppended { message: Message },

    /// Buffered output was flushed; carries everything committed so far this turn
    Flush { committed: String },

    /// The generation stream broke mid-turn; `committed` stays on screen
    TurnFailed { committed: String },

    /// Session finished the current turn (successfully or not)
    TurnEnd { turn_id: u64 },

    /// Transcript was reset to the greeting
    Reset { greeting: Message },

    /// The context prompt was edited
    ContextPromptUpdated,

    /// Uploaded documents were added to the session
    DocumentsAdded { added: usize, total: usize },

    /// Progress of a model download
    PullProgress {
        model: String,
        status: String,
        fraction: Option<f32>,
    },

    /// Something finished that the user should hear about
    Notice { message: String },

    /// An error occurred
    Error { message: String },
}
