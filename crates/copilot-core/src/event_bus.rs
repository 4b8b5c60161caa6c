//! Event bus between the chat session and the UI.
//!
//! Single-threaded (WASM constraint), shared through `Rc<RefCell<_>>`.
//! The session and app handlers publish; the UI drains once per frame.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use copilot_types::event::SessionEvent;

/// Shared event bus: clone-cheap via Rc.
#[derive(Clone, Default)]
pub struct EventBus {
    queue: Rc<RefCell<VecDeque<SessionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: SessionEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    /// Take everything published since the last drain, oldest first.
    pub fn drain(&self) -> Vec<SessionEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.borrow().len()
    }
}
