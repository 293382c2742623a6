//! Per-session conversation context for the text-generation collaborator.
//!
//! Each session owns its own bounded history; nothing is shared between
//! sessions, so two concurrent requests never see each other's prompts.

use crate::config::DEFAULT_MAX_TURNS;
use crate::llm::ChatMessage;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct SessionContext {
    history: VecDeque<ChatMessage>,
    max_turns: usize,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl SessionContext {
    pub fn new(max_turns: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(max_turns * 2),
            max_turns,
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// One turn is a user message plus the assistant reply.
    fn capacity(&self) -> usize {
        self.max_turns * 2
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.history.push_back(message);
        while self.history.len() > self.capacity() {
            self.history.pop_front();
        }
    }

    /// Messages to send with the next request, oldest first
    pub fn window(&self) -> Vec<ChatMessage> {
        self.history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Forget all prior turns. Call between unrelated user sessions.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}
