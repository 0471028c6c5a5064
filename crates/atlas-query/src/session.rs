//! Conversational session state
//!
//! Follow-up context is an explicit object keyed by an opaque id and passed
//! by reference into the query call; nothing conversational is ambient or
//! global, so sessions test cleanly and shard across processes.

use atlas_core::LlmMessage;
use serde::{Deserialize, Serialize};

/// Whether a query starts a fresh conversation or continues one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    New,
    Continue,
}

/// Conversation history for one session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub id: String,
    history: Vec<LlmMessage>,
}

impl SessionContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[LlmMessage] {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub(crate) fn reset(&mut self) {
        self.history.clear();
    }

    pub(crate) fn record_turn(&mut self, question: &str, answer: &str) {
        self.history.push(LlmMessage::user(question));
        self.history.push(LlmMessage::assistant(answer));
    }
}
