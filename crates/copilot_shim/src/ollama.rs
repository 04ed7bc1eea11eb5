use std::time::Duration;

use copilot::ChatMessage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} returned a reply without message content")]
    MissingContent { url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaOptions {
    pub format: &'static str,
    pub temperature: f32,
    pub num_predict: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub options: OllamaOptions,
}

impl OllamaRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, num_predict: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            options: OllamaOptions {
                format: "json",
                temperature: 0.1,
                num_predict,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaReply {
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OllamaError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| OllamaError::Transport {
                url: url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            url,
            model: model.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends one non-streaming chat and returns the assistant's text.
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        num_predict: u32,
    ) -> Result<String, OllamaError> {
        let request = OllamaRequest::new(self.model.clone(), messages, num_predict);
        debug!(
            url = %self.url,
            model = %self.model,
            message_count = request.messages.len(),
            "copilot_shim_ollama_request"
        );

        let transport = |source| OllamaError::Transport {
            url: self.url.clone(),
            source,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(OllamaError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let reply = response.json::<OllamaReply>().await.map_err(transport)?;
        let content = reply
            .message
            .and_then(|message| message.content)
            .ok_or_else(|| OllamaError::MissingContent {
                url: self.url.clone(),
            })?;
        info!(url = %self.url, reply_len = content.len(), "copilot_shim_ollama_reply");
        Ok(content)
    }
}
