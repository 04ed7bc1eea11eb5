use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const CREATE_GAMEOBJECT: &str = "create_gameobject";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GenFile {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl GenFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            content: Some(content.into()),
        }
    }

    /// Path and content, or `None` when either is missing or whitespace.
    pub fn non_blank(&self) -> Option<(&str, &str)> {
        let path = self.path.as_deref().filter(|p| !p.trim().is_empty())?;
        let content = self.content.as_deref().filter(|c| !c.trim().is_empty())?;
        Some((path, content))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ComponentEntry {
    Name(String),
    Object(Map<String, Value>),
    Other(Value),
}

impl ComponentEntry {
    pub fn primitive_name(&self) -> Option<&str> {
        match self {
            Self::Object(map) => map.get("primitive").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn is_primitive_helper(&self) -> bool {
        matches!(self, Self::Object(map) if map.contains_key("primitive"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ActionRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub components: Vec<ComponentEntry>,
}

impl ActionRequest {
    pub fn create_gameobject(name: impl Into<String>, components: Vec<ComponentEntry>) -> Self {
        Self {
            kind: Some(CREATE_GAMEOBJECT.to_string()),
            name: Some(name.into()),
            components,
        }
    }

    pub fn is_create_gameobject(&self) -> bool {
        self.kind.as_deref() == Some(CREATE_GAMEOBJECT)
    }

    pub fn requested_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LlmReply {
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<GenFile>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: Vec<ActionRequest>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub explanation: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("JSON parse error{}: {message}", at_path(.path))]
pub struct DecodeError {
    pub path: Option<String>,
    pub message: String,
}

fn at_path(path: &Option<String>) -> String {
    path.as_ref()
        .map(|path| format!(" at {path}"))
        .unwrap_or_default()
}

pub fn decode_reply(text: &str) -> Result<LlmReply, DecodeError> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let reply = serde_path_to_error::deserialize::<_, LlmReply>(&mut deserializer).map_err(
        |error| {
            let path = error.path().to_string();
            let source = error.into_inner();
            DecodeError {
                path: (!path.is_empty() && path != ".").then_some(path),
                message: source.to_string(),
            }
        },
    )?;
    deserializer.end().map_err(|error| DecodeError {
        path: None,
        message: error.to_string(),
    })?;
    Ok(reply)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
