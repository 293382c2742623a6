use crate::config::LlmConfig;
use crate::conversation::SessionContext;
use crate::error::{Nl2SqlError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Opaque text-generation collaborator: prompt + session context in, text out.
///
/// Output carries no guaranteed structure; every caller validates it.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, ctx: &mut SessionContext) -> Result<String>;
}

/// Chat-completions client (DeepSeek / OpenAI compatible)
#[derive(Clone)]
pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Nl2SqlError::Llm(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn call_llm(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens
        });

        let response = self
            .http
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Nl2SqlError::Llm(format!(
                        "LLM API call timed out after {}s",
                        self.config.timeout.as_secs()
                    ))
                } else {
                    Nl2SqlError::Llm(format!("LLM API call failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Nl2SqlError::Llm(format!("{} - {}", status.as_u16(), text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Nl2SqlError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| Nl2SqlError::Llm("No content in LLM response".to_string()))?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str, ctx: &mut SessionContext) -> Result<String> {
        // The prompt stays in history even if the call fails.
        ctx.push(ChatMessage::user(prompt));
        let messages = ctx.window();
        debug!("Calling LLM with {} message(s)", messages.len());

        match self.call_llm(&messages).await {
            Ok(text) => {
                ctx.push(ChatMessage::assistant(text.clone()));
                Ok(text)
            }
            Err(e) => {
                warn!("LLM call failed: {}", e);
                Err(e)
            }
        }
    }
}

/// Remove markdown code fences (```sql, ```python, ```) and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```sql", "")
        .replace("```python", "")
        .replace("```", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sql_fences() {
        let raw = "```sql\nSELECT * FROM Learner WHERE name = 'John Hancock';\n```";
        assert_eq!(
            strip_code_fences(raw),
            "SELECT * FROM Learner WHERE name = 'John Hancock';"
        );
    }

    #[test]
    fn strips_bare_and_python_fences() {
        assert_eq!(strip_code_fences("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fences("```python\nprint(1)\n```"), "print(1)");
        assert_eq!(strip_code_fences("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn chat_message_serializes_as_api_shape() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }
}
