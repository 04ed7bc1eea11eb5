use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::diagnostics::CompiledAssembly;

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("failed to read compiled assemblies {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("compiled assemblies file {path} is invalid: {message}")]
    Parse { path: PathBuf, message: String },
}

/// What the host build produced in its most recent compile.
pub trait CompilationEnvironment {
    fn compiled_assemblies(&self) -> Result<Vec<CompiledAssembly>, EnvironmentError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCompilationEnvironment {
    assemblies: Vec<CompiledAssembly>,
}

impl InMemoryCompilationEnvironment {
    pub fn new(assemblies: Vec<CompiledAssembly>) -> Self {
        Self { assemblies }
    }

    pub fn push(&mut self, assembly: CompiledAssembly) {
        self.assemblies.push(assembly);
    }
}

impl CompilationEnvironment for InMemoryCompilationEnvironment {
    fn compiled_assemblies(&self) -> Result<Vec<CompiledAssembly>, EnvironmentError> {
        Ok(self.assemblies.clone())
    }
}

/// Reads a JSON array of assemblies written by the host build. A missing file
/// means nothing was compiled.
#[derive(Debug, Clone)]
pub struct FileCompilationEnvironment {
    path: PathBuf,
}

impl FileCompilationEnvironment {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CompilationEnvironment for FileCompilationEnvironment {
    fn compiled_assemblies(&self) -> Result<Vec<CompiledAssembly>, EnvironmentError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(EnvironmentError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|error| EnvironmentError::Parse {
            path: self.path.clone(),
            message: error.to_string(),
        })
    }
}
