use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub const MODEL_ENV_VAR: &str = "OLLAMA_MODEL";
pub const OLLAMA_URL_ENV_VAR: &str = "OLLAMA_URL";
pub const BIND_ENV_VAR: &str = "COPILOT_SHIM_ADDR";

pub const DEFAULT_MODEL: &str = "codellama:13b-instruct-q4_K_M";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/api/chat";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_MAX_TOKENS: u32 = 512;
const OLLAMA_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct ShimConfig {
    pub model: String,
    pub ollama_url: String,
    pub bind_addr: SocketAddr,
    pub ollama_timeout: Duration,
    pub default_max_tokens: u32,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            ollama_timeout: OLLAMA_TIMEOUT,
            default_max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShimConfigError {
    #[error("invalid {var} value '{value}' (expected host:port)")]
    InvalidBindAddr { var: &'static str, value: String },
}

impl ShimConfig {
    pub fn from_env() -> Result<Self, ShimConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ShimConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_blank = |var: &str| {
            lookup(var)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(model) = non_blank(MODEL_ENV_VAR) {
            config.model = model;
        }
        if let Some(url) = non_blank(OLLAMA_URL_ENV_VAR) {
            config.ollama_url = url;
        }
        if let Some(raw) = non_blank(BIND_ENV_VAR) {
            config.bind_addr = raw
                .parse::<SocketAddr>()
                .map_err(|_| ShimConfigError::InvalidBindAddr {
                    var: BIND_ENV_VAR,
                    value: raw.clone(),
                })?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_match_local_ollama_and_client_endpoint() {
        let config = ShimConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.default_max_tokens, 512);
    }

    #[test]
    fn env_overrides_are_trimmed_and_blank_values_ignored() {
        let config = ShimConfig::from_lookup(lookup(&[
            (MODEL_ENV_VAR, " llama3 "),
            (OLLAMA_URL_ENV_VAR, "   "),
            (BIND_ENV_VAR, "0.0.0.0:9000"),
        ]))
        .expect("config");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn bad_bind_addr_is_rejected() {
        let error = ShimConfig::from_lookup(lookup(&[(BIND_ENV_VAR, "localhost")]))
            .expect_err("must fail");
        assert_eq!(
            error,
            ShimConfigError::InvalidBindAddr {
                var: BIND_ENV_VAR,
                value: "localhost".to_string()
            }
        );
    }
}
