//! Token-budgeted conversational memory handed to the retrieval engine.

use std::cell::RefCell;
use std::rc::Rc;

use copilot_types::message::{Message, Role};

/// Rough token count: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Shared handle to a bounded message buffer. Clones see the same buffer,
/// so an engine can record an exchange after its stream completes.
#[derive(Clone, Debug)]
pub struct RollingMemory {
    inner: Rc<RefCell<MemoryBuffer>>,
}

#[derive(Debug)]
struct MemoryBuffer {
    token_limit: usize,
    messages: Vec<Message>,
}

impl RollingMemory {
    pub fn new(token_limit: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryBuffer {
                token_limit,
                messages: Vec::new(),
            })),
        }
    }

    pub fn token_limit(&self) -> usize {
        self.inner.borrow().token_limit
    }

    pub fn set_token_limit(&self, token_limit: usize) {
        self.inner.borrow_mut().token_limit = token_limit;
    }

    pub fn put(&self, message: Message) {
        self.inner.borrow_mut().messages.push(message.without_avatar());
    }

    /// The most recent messages that fit in the token budget. The window never
    /// opens on an assistant message.
    pub fn get(&self) -> Vec<Message> {
        let buffer = self.inner.borrow();
        let mut used = 0;
        let mut start = buffer.messages.len();
        for (i, msg) in buffer.messages.iter().enumerate().rev() {
            let cost = estimate_tokens(&msg.content);
            if used + cost > buffer.token_limit {
                break;
            }
            used += cost;
            start = i;
        }

        buffer.messages[start..]
            .iter()
            .skip_while(|m| m.role == Role::Assistant)
            .cloned()
            .collect()
    }

    /// Everything stored, regardless of budget
    pub fn all(&self) -> Vec<Message> {
        self.inner.borrow().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().messages.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.inner
            .borrow()
            .messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum()
    }
}
