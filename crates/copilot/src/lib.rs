use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod config;
pub mod files;
pub mod flow;
pub mod gate;
pub mod llm;
pub mod reply;
pub mod salvage;
pub mod scene;
pub mod session;

pub use config::{ConfigError, CopilotConfig, ENDPOINT_ENV_VAR, LENIENT_JSON_ENV_VAR, TIMEOUT_ENV_VAR};
pub use files::{
    ensure_prelude, format_best_effort, resolve_project_path, write_files, FileWriteError,
    FormatError, SourceFormatter, SourceRule, SourceRules, WhitespaceFormatter,
};
pub use flow::{CopilotFlow, FlowError, PromptOutcome};
pub use gate::{
    has_compile_errors, CompilationEnvironment, CompileGate, CompiledAssembly,
    CompilerDiagnostic, DiagnosticSeverity, EnvironmentError, FileCompilationEnvironment,
    GateError, GatePhase, InMemoryCompilationEnvironment, ReplayOutcome,
};
pub use llm::{ChatMessage, ChatRequest, HttpLlmClient, LlmClient, NetworkError};
pub use reply::{decode_reply, ActionRequest, ComponentEntry, DecodeError, GenFile, LlmReply};
pub use salvage::{
    extract_json_block, patch_commas, quote_property_names, salvage, strip_code_fence,
    SalvageOptions,
};
pub use scene::{
    Behaviour, Capability, CapabilityKind, CapabilityRegistry, ColliderShape, Color, Material,
    MaterialAssetError, MaterialLibrary, MaterialMode, NodeId, PrimitiveKind, SceneActionExecutor,
    SceneGraph, SceneNode, SpinningCube, Transform, UndoEntry,
};
pub use session::{
    FileSessionState, InMemorySessionState, PendingActionStore, SessionState, SessionStateError,
    StoreError, PENDING_ACTIONS_KEY,
};

pub const ROOT_ENV_VAR: &str = "COPILOT_ROOT";
pub const SOURCE_ROOT_DIR: &str = "Assets";

#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub source_root: PathBuf,
    pub cache_dir: PathBuf,
}

impl ProjectPaths {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            source_root: root.join(SOURCE_ROOT_DIR),
            cache_dir: root.join("Library").join("Copilot"),
            root,
        }
    }

    pub fn session_state_path(&self) -> PathBuf {
        self.cache_dir.join("session_state.json")
    }

    pub fn compiled_assemblies_path(&self) -> PathBuf {
        self.cache_dir.join("compiled_assemblies.json")
    }

    pub fn materials_dir(&self) -> PathBuf {
        self.source_root.join("Materials")
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("failed to create cache directory at {path}: {source}")]
    CreateCacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "COPILOT_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain an Assets/ directory."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from: {start_dir}\n\
Expected a directory containing Assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/project\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_project_paths() -> Result<ProjectPaths, StartupError> {
    let root = resolve_root()?;
    project_paths_at(root)
}

pub fn project_paths_at(root: PathBuf) -> Result<ProjectPaths, StartupError> {
    let paths = ProjectPaths::from_root(normalize_path(&root));
    fs::create_dir_all(&paths.cache_dir).map_err(|source| StartupError::CreateCacheDir {
        path: paths.cache_dir.clone(),
        source,
    })?;
    Ok(paths)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(&PathBuf::from(value));
            if is_project_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let cwd = env::current_dir().map_err(StartupError::CurrentDir)?;
            for candidate in cwd.ancestors() {
                if is_project_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&cwd),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_project_marker(path: &Path) -> bool {
    path.join(SOURCE_ROOT_DIR).is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
