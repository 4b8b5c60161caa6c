//! UI-level state that drives rendering.
//! A read-only projection of the chat session, updated each frame by
//! draining the EventBus. Panels never touch the session directly.

use copilot_types::event::SessionEvent;
use copilot_types::index::BuildMode;
use copilot_types::message::{Avatar, Message, Role};
use copilot_types::model::ModelEntry;

const MAX_NOTICES: usize = 5;

/// Which page fills the central panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Chat,
    Models,
    IndexBuilder,
}

/// A transcript line as displayed
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
    pub avatar: Option<Avatar>,
}

impl From<&Message> for ChatEntry {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role,
            content: m.content.clone(),
            avatar: m.avatar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub level: NoticeLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PullProgressView {
    pub model: String,
    pub status: String,
    pub fraction: Option<f32>,
}

/// Form fields of the index builder page
#[derive(Debug, Clone)]
pub struct IndexForm {
    pub mode: BuildMode,
    pub name: String,
    pub embedding_model: String,
    /// Files dropped while the builder page is open
    pub files: Vec<String>,
    /// Pages to fetch, one URL per line
    pub urls: String,
}

impl Default for IndexForm {
    fn default() -> Self {
        Self {
            mode: BuildMode::Create,
            name: String::new(),
            embedding_model: String::new(),
            files: Vec::new(),
            urls: String::new(),
        }
    }
}

/// State visible to UI panels
pub struct UiState {
    /// Transcript as last reported by the session
    pub messages: Vec<ChatEntry>,
    /// Committed text of the turn in flight
    pub streaming_text: String,
    /// Output of a turn whose stream broke; shown until the next turn
    pub interrupted_text: Option<String>,
    pub input_text: String,
    /// Editable copy of the context prompt
    pub prompt_draft: String,
    pub busy: bool,
    pub status_text: String,
    pub last_error: Option<String>,
    pub notices: Vec<Notice>,
    pub uploaded_count: usize,
    pub pull_progress: Option<PullProgressView>,
    pub pull_name: String,
    pub models: Vec<ModelEntry>,
    pub indexes: Vec<String>,
    pub view: View,
    pub index_form: IndexForm,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            streaming_text: String::new(),
            interrupted_text: None,
            input_text: String::new(),
            prompt_draft: String::new(),
            busy: false,
            status_text: "Ready".to_string(),
            last_error: None,
            notices: Vec::new(),
            uploaded_count: 0,
            pull_progress: None,
            pull_name: String::new(),
            models: Vec::new(),
            indexes: Vec::new(),
            view: View::Chat,
            index_form: IndexForm::default(),
        }
    }

    /// Replace the displayed transcript wholesale.
    pub fn sync_transcript(&mut self, transcript: &[Message]) {
        self.messages = transcript.iter().map(ChatEntry::from).collect();
    }

    /// Process events from the EventBus and update UI state
    pub fn process_events(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            match event {
                SessionEvent::TurnStart { .. } => {
                    self.busy = true;
                    self.streaming_text.clear();
                    self.interrupted_text = None;
                    self.last_error = None;
                    self.status_text = "Thinking...".to_string();
                }
                SessionEvent::MessageAppended { message } => {
                    if message.role == Role::Assistant {
                        self.streaming_text.clear();
                    }
                    self.messages.push(ChatEntry::from(&message));
                }
                SessionEvent::Flush { committed } => {
                    self.streaming_text = committed;
                }
                SessionEvent::TurnFailed { committed } => {
                    self.streaming_text.clear();
                    if !committed.is_empty() {
                        self.interrupted_text = Some(committed);
                    }
                }
                SessionEvent::TurnEnd { .. } => {
                    self.busy = false;
                    self.status_text = match &self.last_error {
                        Some(e) => format!("Error: {}", e),
                        None => "Ready".to_string(),
                    };
                }
                SessionEvent::Reset { greeting } => {
                    self.messages = vec![ChatEntry::from(&greeting)];
                    self.streaming_text.clear();
                    self.interrupted_text = None;
                    self.last_error = None;
                    self.uploaded_count = 0;
                    self.busy = false;
                    self.status_text = "Ready".to_string();
                    self.notify("Chat history cleared", NoticeLevel::Info);
                }
                SessionEvent::ContextPromptUpdated => {
                    self.notify("Context prompt updated!", NoticeLevel::Success);
                }
                SessionEvent::DocumentsAdded { added, total } => {
                    self.uploaded_count = total;
                    self.notify(
                        format!("Added {} document(s), {} in this session", added, total),
                        NoticeLevel::Success,
                    );
                }
                SessionEvent::PullProgress {
                    model,
                    status,
                    fraction,
                } => {
                    if status == "success" {
                        self.pull_progress = None;
                        self.notify(format!("Model '{}' downloaded", model), NoticeLevel::Success);
                    } else {
                        self.pull_progress = Some(PullProgressView {
                            model,
                            status,
                            fraction,
                        });
                    }
                }
                SessionEvent::Notice { message } => {
                    self.notify(message, NoticeLevel::Info);
                }
                SessionEvent::Error { message } => {
                    self.pull_progress = None;
                    self.status_text = format!("Error: {}", message);
                    self.notify(message.clone(), NoticeLevel::Error);
                    self.last_error = Some(message);
                }
            }
        }
    }

    pub fn notify(&mut self, text: impl Into<String>, level: NoticeLevel) {
        self.notices.push(Notice {
            text: text.into(),
            level,
        });
        if self.notices.len() > MAX_NOTICES {
            let excess = self.notices.len() - MAX_NOTICES;
            self.notices.drain(..excess);
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_pulling(&self) -> bool {
        self.pull_progress.is_some()
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}
