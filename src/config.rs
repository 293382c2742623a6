//! Configuration
//!
//! Everything is read from the process environment after `.env` has been
//! loaded. Callers may override the LLM key explicitly (e.g. from a CLI flag).

use crate::error::{Nl2SqlError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LLM_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "deepseek-chat";
pub const DEFAULT_MAX_TURNS: usize = 5;

/// Settings for the text-generation collaborator
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Deadline for a single completion request
    pub timeout: Duration,
    /// Number of request/response turns kept in a session context
    pub max_turns: usize,
}

impl LlmConfig {
    /// Build from the environment. `api_key` takes precedence over `DEEPSEEK_API_KEY`.
    pub fn from_env(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env::var("DEEPSEEK_API_KEY").ok())
            .ok_or_else(|| {
                Nl2SqlError::Config(
                    "No LLM API key provided (pass --api-key or set DEEPSEEK_API_KEY)".to_string(),
                )
            })?;

        Ok(Self {
            api_key,
            api_url: env::var("LLM_API_URL").unwrap_or_else(|_| DEFAULT_LLM_API_URL.to_string()),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            temperature: parse_var("LLM_TEMPERATURE", 0.0)?,
            max_tokens: parse_var("LLM_MAX_TOKENS", 1024)?,
            timeout: Duration::from_secs(parse_var("LLM_TIMEOUT_SECS", 60)?),
            max_turns: parse_var("LLM_MAX_TURNS", DEFAULT_MAX_TURNS)?,
        })
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_LLM_API_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

/// Connection settings for a networked (Postgres) data source
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub client: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DbConfig {
    pub fn from_env() -> Result<Self> {
        let required = ["DB_HOST", "DB_NAME", "DB_USER", "DB_PASSWORD"];
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| env::var(name).map(|v| v.is_empty()).unwrap_or(true))
            .collect();
        if !missing.is_empty() {
            return Err(Nl2SqlError::Config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let client = env::var("DB_CLIENT").unwrap_or_else(|_| "postgres".to_string());
        if client != "postgres" {
            return Err(Nl2SqlError::Config(format!(
                "Unsupported DB_CLIENT '{}': only postgres is supported",
                client
            )));
        }

        Ok(Self {
            client,
            host: env::var("DB_HOST").unwrap_or_default(),
            port: parse_var("DB_PORT", 5432)?,
            database: env::var("DB_NAME").unwrap_or_default(),
            username: env::var("DB_USER").unwrap_or_default(),
            password: env::var("DB_PASSWORD").unwrap_or_default(),
        })
    }
}

/// Executor limits
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// `None` disables the deadline
    pub query_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            query_timeout: Some(Duration::from_secs(30)),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| Nl2SqlError::Config(format!("Invalid value for {}: '{}'", name, raw))),
        _ => Ok(default),
    }
}
