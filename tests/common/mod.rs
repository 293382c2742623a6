#![allow(dead_code)]

use async_trait::async_trait;
use nl2sql_refiner::llm::{ChatMessage, TextGenerator};
use nl2sql_refiner::{Nl2SqlError, Result, SessionContext, SqliteSource};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned LLM responses in order and records every prompt.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedLlm {
    async fn generate(&self, prompt: &str, ctx: &mut SessionContext) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        ctx.push(ChatMessage::user(prompt));
        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Nl2SqlError::Llm("no scripted response left".to_string()))?;
        ctx.push(ChatMessage::assistant(text.clone()));
        Ok(text)
    }
}

/// Districts and learners, mirroring a small education dataset
pub fn education_db() -> SqliteSource {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE districts (id INTEGER PRIMARY KEY, district_uid TEXT, name TEXT);
         INSERT INTO districts (district_uid, name) VALUES ('209', 'Howrah'), ('217', 'Hooghly'), ('220', 'Nadia');
         CREATE TABLE Learner (id INTEGER PRIMARY KEY, name TEXT, district_id INTEGER);
         INSERT INTO Learner (name, district_id) VALUES ('John Hancock', 3), ('Jane Austen', 1), (NULL, 2);
         CREATE TABLE customer_update_log (id INTEGER, note TEXT);
         INSERT INTO customer_update_log VALUES (1, 'first');",
    )
    .unwrap();
    SqliteSource::from_connection(conn).unwrap()
}
