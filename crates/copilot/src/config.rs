use std::env;

use thiserror::Error;

use crate::files::SourceRules;
use crate::salvage::SalvageOptions;
use crate::scene::MaterialMode;

pub const ENDPOINT_ENV_VAR: &str = "COPILOT_ENDPOINT";
pub const TIMEOUT_ENV_VAR: &str = "COPILOT_TIMEOUT_MS";
pub const LENIENT_JSON_ENV_VAR: &str = "COPILOT_LENIENT_JSON";

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/chat";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are UnityCopilot. Reply with JSON (files, actions, explanation).";

#[derive(Debug, Clone)]
pub struct CopilotConfig {
    pub endpoint: String,
    /// `None` waits on the endpoint indefinitely.
    pub timeout_ms: Option<u64>,
    pub system_prompt: String,
    pub salvage: SalvageOptions,
    pub source_rules: SourceRules,
    pub material_mode: MaterialMode,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_ms: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            salvage: SalvageOptions::default(),
            source_rules: SourceRules::default(),
            material_mode: MaterialMode::Editor,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {var} value '{value}' (expected u64 milliseconds)")]
    InvalidTimeout { var: &'static str, value: String },
    #[error("invalid {var} value '{value}' (expected 0, 1, true or false)")]
    InvalidFlag { var: &'static str, value: String },
}

impl CopilotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup(ENDPOINT_ENV_VAR).filter(|raw| !raw.trim().is_empty()) {
            config.endpoint = endpoint.trim().to_string();
        }

        if let Some(raw) = lookup(TIMEOUT_ENV_VAR) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                let timeout = trimmed
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidTimeout {
                        var: TIMEOUT_ENV_VAR,
                        value: raw.clone(),
                    })?;
                config.timeout_ms = Some(timeout);
            }
        }

        if let Some(raw) = lookup(LENIENT_JSON_ENV_VAR) {
            let lenient = parse_flag(&raw).ok_or_else(|| ConfigError::InvalidFlag {
                var: LENIENT_JSON_ENV_VAR,
                value: raw.clone(),
            })?;
            config.salvage = if lenient {
                SalvageOptions::lenient()
            } else {
                SalvageOptions::default()
            };
        }

        Ok(config)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
