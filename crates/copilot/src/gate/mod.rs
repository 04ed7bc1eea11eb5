mod diagnostics;
mod environment;
mod replay;

pub use diagnostics::{
    has_compile_errors, CompiledAssembly, CompilerDiagnostic, DiagnosticSeverity, LOG_MODE_ERROR,
    LOG_MODE_FATAL, LOG_MODE_SCRIPTING_ERROR, LOG_MODE_SCRIPT_COMPILE_ERROR,
};
pub use environment::{
    CompilationEnvironment, EnvironmentError, FileCompilationEnvironment,
    InMemoryCompilationEnvironment,
};
pub use replay::{CompileGate, GateError, GatePhase, ReplayOutcome};
