//! Local HTTP shim between the copilot client and an Ollama chat model.
//!
//! `POST /chat` takes `{"messages": [...], "max_tokens"?}`, prepends the
//! system header and worked examples, forwards the conversation to Ollama and
//! answers `{"content": "<reply>"}` with the reply repaired into a single JSON
//! object where possible. `GET /health` answers `{"ok": true}`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

pub mod config;
pub mod ollama;
pub mod prompt;
pub mod repair;
pub mod server;

pub use config::{ShimConfig, ShimConfigError, BIND_ENV_VAR, MODEL_ENV_VAR, OLLAMA_URL_ENV_VAR};
pub use ollama::{OllamaClient, OllamaError, OllamaOptions, OllamaRequest};
pub use prompt::{assemble_messages, few_shots, SYSTEM_HEADER};
pub use repair::{validated_json, RepairError};
pub use server::{build_router, ChatBody, ChatReply, ShimState};

#[derive(Debug, Error)]
pub enum ShimError {
    #[error(transparent)]
    Ollama(#[from] OllamaError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("server stopped: {0}")]
    Serve(#[source] io::Error),
}

pub async fn serve(config: ShimConfig) -> Result<(), ShimError> {
    let ollama = OllamaClient::new(
        config.ollama_url.clone(),
        config.model.clone(),
        config.ollama_timeout,
    )?;
    let router = build_router(Arc::new(ShimState {
        ollama,
        default_max_tokens: config.default_max_tokens,
    }));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|source| ShimError::Bind {
            addr: config.bind_addr,
            source,
        })?;
    info!(
        addr = %config.bind_addr,
        model = %config.model,
        ollama_url = %config.ollama_url,
        "copilot_shim_listening"
    );
    axum::serve(listener, router).await.map_err(ShimError::Serve)
}
