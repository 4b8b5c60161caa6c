//! Chat session: per-user conversational state.
//!
//! One turn:
//! 1. `submit` appends the user message to the transcript
//! 2. `generate_response` obtains a chunk stream (plain chat or retrieval engine)
//! 3. the stream is drained through a `StreamBuffer`, publishing `Flush` events
//! 4. the committed text is appended as the assistant message
//!
//! A stream failure abandons the turn: flushed text stays on screen, nothing
//! is appended, the error is published. There is no retry.

use std::rc::Rc;

use copilot_types::{
    CopilotError, Result,
    config::ChatConfig,
    document::{Document, UploadedDocumentSet},
    event::SessionEvent,
    message::{Message, Role},
};

use crate::event_bus::EventBus;
use crate::memory::RollingMemory;
use crate::ports::*;
use crate::stream_buffer::{drain_stream, StreamBuffer};

/// How the assistant response is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Plain,
    RetrievalAugmented,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Generating,
    Error(String),
}

/// The collaborators a turn may call on
#[derive(Clone, Copy)]
pub struct Generators<'a> {
    pub chat: &'a dyn ChatPort,
    pub retrieval: Option<&'a dyn RetrievalPort>,
}

pub struct ChatSession {
    config: ChatConfig,
    model: String,
    transcript: Vec<Message>,
    memory: RollingMemory,
    context_prompt: String,
    uploaded: UploadedDocumentSet,
    index_name: Option<String>,
    /// Merged retrieval engine, rebuilt only when its inputs change
    engine: Option<Rc<dyn ChatEngine>>,
    pub event_bus: EventBus,
    pub state: SessionState,
    turn_counter: u64,
}

impl ChatSession {
    pub fn new(config: ChatConfig, model: impl Into<String>, event_bus: EventBus) -> Self {
        Self {
            transcript: vec![Message::assistant(&config.greeting)],
            memory: RollingMemory::new(config.memory_token_limit),
            context_prompt: config.context_prompt.clone(),
            config,
            model: model.into(),
            uploaded: UploadedDocumentSet::new(),
            index_name: None,
            engine: None,
            event_bus,
            state: SessionState::Idle,
            turn_counter: 0,
        }
    }

    // ─── Accessors ───────────────────────────────────────────

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn memory(&self) -> &RollingMemory {
        &self.memory
    }

    pub fn context_prompt(&self) -> &str {
        &self.context_prompt
    }

    pub fn uploaded(&self) -> &UploadedDocumentSet {
        &self.uploaded
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn flush_threshold(&self) -> usize {
        self.config.flush_threshold
    }

    pub fn has_cached_engine(&self) -> bool {
        self.engine.is_some()
    }

    // ─── Configuration handlers ──────────────────────────────

    /// Replace the context prompt. Returns whether it changed.
    pub fn set_context_prompt(&mut self, prompt: impl Into<String>) -> bool {
        let prompt = prompt.into();
        if prompt == self.context_prompt {
            return false;
        }
        self.context_prompt = prompt;
        self.event_bus.emit(SessionEvent::ContextPromptUpdated);
        true
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        if model != self.model {
            log::info!("chat model -> {}", model);
            self.model = model;
            self.engine = None;
        }
    }

    /// Adopt restored chat settings. The memory budget applies now and on
    /// every reset; a new greeting replaces the seed of an untouched transcript.
    /// The context prompt has its own handler.
    pub fn apply_config(&mut self, config: &ChatConfig) {
        if config.greeting != self.config.greeting && self.transcript.len() == 1 {
            self.transcript = vec![Message::assistant(&config.greeting)];
        }
        self.memory.set_token_limit(config.memory_token_limit);
        self.config = ChatConfig {
            context_prompt: self.config.context_prompt.clone(),
            ..config.clone()
        };
    }

    pub fn set_flush_threshold(&mut self, threshold: usize) {
        self.config.flush_threshold = threshold;
    }

    pub fn select_index(&mut self, index_name: Option<String>) {
        if index_name != self.index_name {
            self.index_name = index_name;
            self.engine = None;
        }
    }

    /// Drop the cached retrieval engine, e.g. after its index was rebuilt.
    pub fn invalidate_engine(&mut self) {
        self.engine = None;
    }

    /// Add parsed uploads to this session's document set.
    pub fn add_documents(&mut self, docs: Vec<Document>) -> usize {
        let added = self.uploaded.extend(docs);
        if added > 0 {
            self.engine = None;
            self.event_bus.emit(SessionEvent::DocumentsAdded {
                added,
                total: self.uploaded.len(),
            });
        }
        added
    }

    // ─── Turn handling ───────────────────────────────────────

    /// Append a user message as typed. Blank input is rejected without touching state.
    pub fn submit(&mut self, user_text: &str) -> Result<()> {
        if user_text.trim().is_empty() {
            return Err(CopilotError::EmptySubmission);
        }
        let message = Message::user(user_text);
        self.transcript.push(message.clone());
        self.event_bus.emit(SessionEvent::MessageAppended { message });
        Ok(())
    }

    /// Plain-path request: the context prompt, then every user/assistant turn.
    pub fn build_request(&self) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.transcript.len() + 1);
        messages.push(Message::system(&self.context_prompt));
        messages.extend(
            self.transcript
                .iter()
                .filter(|m| m.role.is_conversational())
                .map(Message::without_avatar),
        );
        ChatRequest {
            model: self.model.clone(),
            messages,
        }
    }

    /// Produce, stream and commit the assistant response for the latest user message.
    pub async fn generate_response(
        &mut self,
        mode: GenerationMode,
        generators: Generators<'_>,
    ) -> Result<String> {
        self.state = SessionState::Generating;

        let stream = match self.open_stream(mode, generators).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(e)),
        };

        let mut buffer = StreamBuffer::new(self.config.flush_threshold);
        let bus = self.event_bus.clone();
        let outcome = drain_stream(stream, &mut buffer, |committed| {
            bus.emit(SessionEvent::Flush {
                committed: committed.to_string(),
            });
        })
        .await;

        match outcome {
            Ok(()) => {
                let text = buffer.into_committed();
                let message = Message::assistant(text.clone());
                self.transcript.push(message.clone());
                self.event_bus.emit(SessionEvent::MessageAppended { message });
                self.state = SessionState::Idle;
                Ok(text)
            }
            Err(e) => {
                self.event_bus.emit(SessionEvent::TurnFailed {
                    committed: buffer.into_committed(),
                });
                Err(self.fail(e))
            }
        }
    }

    /// `submit` followed by `generate_response`, bracketed by turn events.
    pub async fn run_turn(
        &mut self,
        user_text: &str,
        mode: GenerationMode,
        generators: Generators<'_>,
    ) -> Result<String> {
        self.submit(user_text)?;

        self.turn_counter += 1;
        let turn_id = self.turn_counter;
        log::info!("turn {} ({:?})", turn_id, mode);
        self.event_bus.emit(SessionEvent::TurnStart { turn_id });

        let result = self.generate_response(mode, generators).await;

        self.event_bus.emit(SessionEvent::TurnEnd { turn_id });
        result
    }

    async fn open_stream(
        &mut self,
        mode: GenerationMode,
        generators: Generators<'_>,
    ) -> Result<ChunkStream> {
        match mode {
            GenerationMode::Plain => Ok(generators.chat.stream_chat(self.build_request())),
            GenerationMode::RetrievalAugmented => {
                let query = self
                    .transcript
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.clone())
                    .ok_or(CopilotError::EmptySubmission)?;
                let retrieval = generators.retrieval.ok_or_else(|| {
                    CopilotError::CollaboratorUnavailable("retrieval is not configured".to_string())
                })?;
                let engine = self.retrieval_engine(retrieval).await?;
                engine
                    .stream_chat(&query, &self.memory, &self.context_prompt)
                    .await
                    .map_err(unavailable)
            }
        }
    }

    async fn retrieval_engine(&mut self, port: &dyn RetrievalPort) -> Result<Rc<dyn ChatEngine>> {
        if let Some(engine) = &self.engine {
            return Ok(engine.clone());
        }
        let engine = port
            .build_engine(&self.model, self.index_name.as_deref(), self.uploaded.as_slice())
            .await
            .map_err(unavailable)?;
        self.engine = Some(engine.clone());
        Ok(engine)
    }

    fn fail(&mut self, e: CopilotError) -> CopilotError {
        log::error!("turn failed: {}", e);
        self.state = SessionState::Error(e.to_string());
        self.event_bus.emit(SessionEvent::Error {
            message: e.to_string(),
        });
        e
    }

    // ─── Reset & export ──────────────────────────────────────

    /// Back to the greeting, with fresh memory and no uploads.
    pub fn reset(&mut self) {
        let greeting = Message::assistant(&self.config.greeting);
        self.transcript = vec![greeting.clone()];
        self.memory = RollingMemory::new(self.config.memory_token_limit);
        self.uploaded.clear();
        self.engine = None;
        self.state = SessionState::Idle;
        self.turn_counter = 0;
        self.event_bus.emit(SessionEvent::Reset { greeting });
    }

    /// `"<Role>: <content>"` per user/assistant message, blank line between turns.
    pub fn export_transcript(&self) -> String {
        self.transcript
            .iter()
            .filter(|m| m.role.is_conversational())
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Setup failures of a collaborator are reported as unavailability.
fn unavailable(e: CopilotError) -> CopilotError {
    match e {
        CopilotError::CollaboratorUnavailable(_) | CopilotError::GenerationStream(_) => e,
        other => CopilotError::CollaboratorUnavailable(other.to_string()),
    }
}
