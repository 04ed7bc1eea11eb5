use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::CopilotConfig;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("endpoint {endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("endpoint {endpoint} returned an unreadable body: {message}")]
    InvalidBody { endpoint: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

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

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(system_prompt: &str, user_prompt: &str) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
        }
    }
}

pub trait LlmClient {
    /// Returns the raw reply text for `prompt`.
    fn complete(&self, prompt: &str) -> Result<String, NetworkError>;
}

#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    system_prompt: String,
}

impl HttpLlmClient {
    pub fn new(
        endpoint: impl Into<String>,
        system_prompt: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, NetworkError> {
        let endpoint = endpoint.into();
        // reqwest's blocking client applies a 30s default unless told otherwise
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| NetworkError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        Ok(Self {
            client,
            endpoint,
            system_prompt: system_prompt.into(),
        })
    }

    pub fn from_config(config: &CopilotConfig) -> Result<Self, NetworkError> {
        Self::new(
            config.endpoint.clone(),
            config.system_prompt.clone(),
            config.timeout_ms.map(Duration::from_millis),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LlmClient for HttpLlmClient {
    fn complete(&self, prompt: &str) -> Result<String, NetworkError> {
        let request = ChatRequest::new(&self.system_prompt, prompt);
        debug!(endpoint = %self.endpoint, prompt_len = prompt.len(), "copilot_llm_request");

        let transport = |source| NetworkError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(transport)?;
        let content = reply_content(&body).map_err(|message| NetworkError::InvalidBody {
            endpoint: self.endpoint.clone(),
            message,
        })?;
        info!(
            endpoint = %self.endpoint,
            reply_len = content.len(),
            "copilot_llm_reply"
        );
        Ok(content)
    }
}

/// Extracts `content` from the endpoint's JSON body. A missing or null field
/// reads as an empty reply; non-string values are rendered as JSON text.
fn reply_content(body: &str) -> Result<String, String> {
    let wrapper = serde_json::from_str::<Value>(body).map_err(|error| error.to_string())?;
    Ok(match wrapper.get("content") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    })
}
