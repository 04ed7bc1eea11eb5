use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::files::write_text_atomic;

#[derive(Debug, Error)]
pub enum SessionStateError {
    #[error("failed to read session state {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write session state {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session state {path} is not a JSON string map: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// String key/value storage that outlives a host reload.
pub trait SessionState {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStateError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionStateError>;
    fn erase(&mut self, key: &str) -> Result<(), SessionStateError>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemorySessionState {
    values: BTreeMap<String, String>,
}

impl SessionState for InMemorySessionState {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStateError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionStateError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn erase(&mut self, key: &str) -> Result<(), SessionStateError> {
        self.values.remove(key);
        Ok(())
    }
}

/// Session state backed by a JSON object file. Every call goes to disk, so a
/// fresh instance after a reload sees what the previous one wrote.
#[derive(Debug, Clone)]
pub struct FileSessionState {
    path: PathBuf,
}

impl FileSessionState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, SessionStateError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(SessionStateError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|error| SessionStateError::Corrupt {
            path: self.path.clone(),
            message: error.to_string(),
        })
    }

    fn store(&self, values: &BTreeMap<String, String>) -> Result<(), SessionStateError> {
        let text = serde_json::to_string_pretty(values).map_err(|error| {
            SessionStateError::Corrupt {
                path: self.path.clone(),
                message: error.to_string(),
            }
        })?;
        write_text_atomic(&self.path, &text).map_err(|source| SessionStateError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl SessionState for FileSessionState {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStateError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionStateError> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.store(&values)
    }

    fn erase(&mut self, key: &str) -> Result<(), SessionStateError> {
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.store(&values)?;
        }
        Ok(())
    }
}
