//! Remote dialogue client.
//!
//! The dialogue service is an opaque HTTP capability: it receives the user
//! input, a bounded history window, and context (system instructions, affect
//! label), and returns response text. Any non-success status is surfaced as
//! a `Dialogue` error carrying the status code; the session keeps running.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::defaults;
use crate::dialogue::affect::Affect;
use crate::dialogue::{Message, Role};
use crate::error::{Result, VoxloopError};

/// Per-turn context sent alongside the input.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub system_instructions: Option<String>,
    pub affect: Option<Affect>,
    pub user_id: Option<String>,
}

/// Trait for the remote dialogue capability.
pub trait DialogueClient: Send + Sync {
    /// Generate a response for one user turn.
    fn respond(&self, input: &str, history: &[Message], context: &TurnContext) -> Result<String>;

    /// Name of the backing service, for session summaries.
    fn provider_name(&self) -> &str;
}

/// Configuration for the remote dialogue service.
#[derive(Debug, Clone)]
pub struct HttpDialogueClientConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for HttpDialogueClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(defaults::DIALOGUE_TIMEOUT_SECS),
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

pub struct HttpDialogueClient {
    config: HttpDialogueClientConfig,
    client: reqwest::blocking::Client,
}

impl HttpDialogueClient {
    pub fn new(config: HttpDialogueClientConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VoxloopError::Other(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn system_prompt(context: &TurnContext) -> String {
        let mut prompt = context
            .system_instructions
            .clone()
            .unwrap_or_else(|| "You are a warm, attentive voice companion.".to_string());
        if let Some(affect) = context.affect {
            prompt.push_str(&format!("\nThe speaker currently sounds {}.", affect));
        }
        prompt
    }
}

impl DialogueClient for HttpDialogueClient {
    fn respond(&self, input: &str, history: &[Message], context: &TurnContext) -> Result<String> {
        let system = Self::system_prompt(context);
        let mut messages = vec![WireMessage {
            role: "system",
            content: &system,
        }];
        for message in history {
            messages.push(WireMessage {
                role: match message.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &message.text,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: input,
        });

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "user": context.user_id,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| VoxloopError::Dialogue {
                status: 0,
                message: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoxloopError::Dialogue {
                status: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }

        let body: serde_json::Value = response.json().map_err(|e| VoxloopError::Dialogue {
            status: status.as_u16(),
            message: format!("malformed response: {}", e),
        })?;

        let text = body
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        Ok(text)
    }

    fn provider_name(&self) -> &str {
        &self.config.model
    }
}

/// Recorded arguments of one mock call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub input: String,
    pub history_len: usize,
    pub affect: Option<Affect>,
}

/// Mock dialogue client for testing.
pub struct MockDialogueClient {
    response: String,
    failure_status: Option<u16>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockDialogueClient {
    pub fn new() -> Self {
        Self {
            response: "mock response".to_string(),
            failure_status: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Configure the mock to return a specific response.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail with the given HTTP status.
    pub fn with_failure_status(mut self, status: u16) -> Self {
        self.failure_status = Some(status);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for MockDialogueClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogueClient for MockDialogueClient {
    fn respond(&self, input: &str, history: &[Message], context: &TurnContext) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                input: input.to_string(),
                history_len: history.len(),
                affect: context.affect,
            });
        }
        match self.failure_status {
            Some(status) => Err(VoxloopError::Dialogue {
                status,
                message: "mock dialogue failure".to_string(),
            }),
            None => Ok(self.response.clone()),
        }
    }

    fn provider_name(&self) -> &str {
        "mock-dialogue"
    }
}
