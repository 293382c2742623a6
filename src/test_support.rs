//! Scripted text generator for unit tests.

use crate::conversation::SessionContext;
use crate::error::{Nl2SqlError, Result};
use crate::llm::{ChatMessage, TextGenerator};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        let mut responses = VecDeque::new();
        responses.push_back(Err(Nl2SqlError::Llm(message.to_string())));
        Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, ctx: &mut SessionContext) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        ctx.push(ChatMessage::user(prompt));
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Nl2SqlError::Llm("script exhausted".to_string())));
        if let Ok(text) = &next {
            ctx.push(ChatMessage::assistant(text.clone()));
        }
        next
    }
}
