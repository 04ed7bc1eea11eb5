use serde::{Deserialize, Serialize};
use tracing::error;

/// Mode bits carried by each line of the legacy compiler log.
pub const LOG_MODE_ERROR: u32 = 1 << 0;
pub const LOG_MODE_FATAL: u32 = 1 << 4;
pub const LOG_MODE_SCRIPTING_ERROR: u32 = 1 << 8;
pub const LOG_MODE_SCRIPT_COMPILE_ERROR: u32 = 1 << 11;

const LOG_MODE_ANY_ERROR: u32 =
    LOG_MODE_ERROR | LOG_MODE_FATAL | LOG_MODE_SCRIPTING_ERROR | LOG_MODE_SCRIPT_COMPILE_ERROR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerDiagnostic {
    pub severity: DiagnosticSeverity,
    #[serde(default)]
    pub message: String,
}

impl CompilerDiagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            message: message.into(),
        }
    }
}

/// One assembly produced by the host build. `diagnostics` is `None` when the
/// host could not report structured messages for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledAssembly {
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<CompilerDiagnostic>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_log: Option<String>,
}

impl CompiledAssembly {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<CompilerDiagnostic>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn with_legacy_log(mut self, log: impl Into<String>) -> Self {
        self.legacy_log = Some(log.into());
        self
    }
}

/// True as soon as any assembly reports an error. Structured diagnostics are
/// consulted first; the legacy log is scanned only for assemblies without them.
pub fn has_compile_errors(assemblies: &[CompiledAssembly]) -> bool {
    assemblies.iter().any(|assembly| match &assembly.diagnostics {
        Some(diagnostics) => structured_error(assembly, diagnostics),
        None => assembly
            .legacy_log
            .as_deref()
            .is_some_and(|log| legacy_log_error(assembly, log)),
    })
}

fn structured_error(assembly: &CompiledAssembly, diagnostics: &[CompilerDiagnostic]) -> bool {
    match diagnostics
        .iter()
        .find(|diagnostic| diagnostic.severity == DiagnosticSeverity::Error)
    {
        Some(diagnostic) => {
            error!(
                assembly = %assembly.name,
                message = %diagnostic.message,
                "copilot_compile_error"
            );
            true
        }
        None => false,
    }
}

fn legacy_log_error(assembly: &CompiledAssembly, log: &str) -> bool {
    for line in log.lines() {
        let Some((bits, message)) = line.split_once('\t') else {
            continue;
        };
        let Ok(mode) = bits.trim().parse::<u32>() else {
            continue;
        };
        if mode & LOG_MODE_ANY_ERROR != 0 {
            error!(
                assembly = %assembly.name,
                mode,
                message = message.trim(),
                "copilot_compile_error_legacy"
            );
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_assemblies_have_no_errors() {
        let assemblies = vec![
            CompiledAssembly::new("Game").with_diagnostics(vec![CompilerDiagnostic::warning(
                "unused variable",
            )]),
            CompiledAssembly::new("Editor").with_legacy_log("4\tCompilation succeeded\n"),
            CompiledAssembly::new("Plugins"),
        ];
        assert!(!has_compile_errors(&assemblies));
        assert!(!has_compile_errors(&[]));
    }

    #[test]
    fn structured_error_is_detected() {
        let assemblies = vec![CompiledAssembly::new("Game").with_diagnostics(vec![
            CompilerDiagnostic::warning("w"),
            CompilerDiagnostic::error("CS1002: ; expected"),
        ])];
        assert!(has_compile_errors(&assemblies));
    }

    #[test]
    fn structured_diagnostics_take_precedence_over_legacy_log() {
        let assembly = CompiledAssembly::new("Game")
            .with_diagnostics(Vec::new())
            .with_legacy_log("1\tstale error from a previous build");
        assert!(!has_compile_errors(&[assembly]));
    }

    #[test]
    fn each_legacy_error_bit_is_detected() {
        for bit in [
            LOG_MODE_ERROR,
            LOG_MODE_FATAL,
            LOG_MODE_SCRIPTING_ERROR,
            LOG_MODE_SCRIPT_COMPILE_ERROR,
        ] {
            let log = format!("4\tinfo\n{}\tAssets/Foo.cs(3,1): error", bit | 4);
            let assembly = CompiledAssembly::new("Game").with_legacy_log(log);
            assert!(has_compile_errors(&[assembly]), "bit {bit}");
        }
    }

    #[test]
    fn malformed_legacy_lines_are_skipped() {
        let assembly = CompiledAssembly::new("Game")
            .with_legacy_log("no tab here\nabc\tnot a number\n\n2\tassert only");
        assert!(!has_compile_errors(&[assembly]));
    }

    #[test]
    fn assembly_json_uses_lowercase_severity() {
        let parsed = serde_json::from_str::<CompiledAssembly>(
            r#"{"name":"Game","types":["Foo"],"diagnostics":[{"severity":"error","message":"boom"}]}"#,
        )
        .expect("parse");
        assert_eq!(parsed.types, vec!["Foo".to_string()]);
        assert_eq!(
            parsed.diagnostics,
            Some(vec![CompilerDiagnostic::error("boom")])
        );
        assert_eq!(parsed.legacy_log, None);
    }
}
