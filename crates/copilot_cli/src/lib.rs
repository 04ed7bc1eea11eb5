use std::fs;
use std::io::Write;
use std::path::PathBuf;

use copilot::{
    decode_reply, project_paths_at, resolve_project_paths, salvage, CapabilityRegistry,
    CompileGate, CopilotConfig, CopilotFlow, FileCompilationEnvironment, FileSessionState,
    FlowError, HttpLlmClient, LlmClient, ProjectPaths, ReplayOutcome, SceneActionExecutor,
    SceneGraph, SceneNode, SOURCE_ROOT_DIR,
};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct CommonOptions {
    pub root: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Generate { prompt: String },
    CompileFinished,
    Replay,
    Pending,
    Salvage { path: String },
    Clear,
}

pub fn run<W: Write>(kind: CommandKind, opts: CommonOptions, stdout: &mut W) -> Result<(), String> {
    let config = load_config(&opts)?;

    match kind {
        CommandKind::Salvage { path } => salvage_file(&path, &config, stdout),
        CommandKind::Generate { prompt } => {
            let (paths, mut gate) = open_project(&opts)?;
            let client = HttpLlmClient::from_config(&config).map_err(|error| error.to_string())?;
            generate(&client, &mut gate, &paths, &config, &prompt, stdout)
        }
        CommandKind::CompileFinished => {
            let paths = resolve_paths(&opts)?;
            let mut gate = CompileGate::resume(FileSessionState::new(paths.session_state_path()))
                .map_err(|error| error.to_string())?;
            let pending = gate
                .store()
                .peek()
                .map_err(|error| error.to_string())?
                .map_or(0, |actions| actions.len());
            gate.compile_finished();
            emit(stdout, &format!("compile finished; {pending} pending action(s) await reload"))
        }
        CommandKind::Replay => {
            let (paths, mut gate) = open_project(&opts)?;
            replay(&mut gate, &paths, &config, stdout)
        }
        CommandKind::Pending => {
            let (_, gate) = open_project(&opts)?;
            match gate.store().peek().map_err(|error| error.to_string())? {
                Some(actions) => {
                    let json = serde_json::to_string_pretty(&actions)
                        .map_err(|error| format!("failed to render pending actions: {error}"))?;
                    emit(stdout, &json)
                }
                None => emit(stdout, "no pending actions"),
            }
        }
        CommandKind::Clear => {
            let (_, mut gate) = open_project(&opts)?;
            gate.store_mut()
                .clear()
                .map_err(|error| error.to_string())?;
            emit(stdout, "pending actions cleared")
        }
    }
}

fn open_project(
    opts: &CommonOptions,
) -> Result<(ProjectPaths, CompileGate<FileSessionState>), String> {
    let paths = resolve_paths(opts)?;
    let gate = CompileGate::new(FileSessionState::new(paths.session_state_path()));
    Ok((paths, gate))
}

fn load_config(opts: &CommonOptions) -> Result<CopilotConfig, String> {
    let mut config = CopilotConfig::from_env().map_err(|error| error.to_string())?;
    if let Some(endpoint) = &opts.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(timeout_ms) = opts.timeout_ms {
        config.timeout_ms = Some(timeout_ms);
    }
    Ok(config)
}

fn resolve_paths(opts: &CommonOptions) -> Result<ProjectPaths, String> {
    match &opts.root {
        Some(root) => {
            if !root.join(SOURCE_ROOT_DIR).is_dir() {
                return Err(format!(
                    "--root '{}' is not a project root (missing {SOURCE_ROOT_DIR}/)",
                    root.display()
                ));
            }
            project_paths_at(root.clone()).map_err(|error| error.to_string())
        }
        None => resolve_project_paths().map_err(|error| error.to_string()),
    }
}

fn generate<C: LlmClient, W: Write>(
    client: &C,
    gate: &mut CompileGate<FileSessionState>,
    paths: &ProjectPaths,
    config: &CopilotConfig,
    prompt: &str,
    stdout: &mut W,
) -> Result<(), String> {
    let outcome = match CopilotFlow::new(client, gate, paths, config).handle_prompt(prompt) {
        Ok(outcome) => outcome,
        Err(FlowError::Decode { raw, source }) => {
            emit(stdout, "raw response:")?;
            emit(stdout, &raw)?;
            return Err(source.to_string());
        }
        Err(error) => return Err(error.to_string()),
    };

    emit(stdout, "raw response:")?;
    emit(stdout, &outcome.raw)?;
    for path in &outcome.written_files {
        emit(stdout, &format!("wrote {}", path.display()))?;
    }
    emit(
        stdout,
        &format!("{} action(s) pending until reload", outcome.pending_actions.len()),
    )?;
    if !outcome.explanation.is_empty() {
        emit(stdout, &format!("explanation: {}", outcome.explanation))?;
    }
    Ok(())
}

fn replay<W: Write>(
    gate: &mut CompileGate<FileSessionState>,
    paths: &ProjectPaths,
    config: &CopilotConfig,
    stdout: &mut W,
) -> Result<(), String> {
    let environment = FileCompilationEnvironment::new(paths.compiled_assemblies_path());
    let mut executor = SceneActionExecutor::new(
        CapabilityRegistry::with_engine_builtins(),
        config.material_mode,
        paths.materials_dir(),
    );
    let mut scene = SceneGraph::default();
    let outcome = gate
        .reload_completed(&environment, &mut executor, &mut scene)
        .map_err(|error| error.to_string())?;
    info!(outcome = ?outcome, "copilot_cli_replay_finished");

    match outcome {
        ReplayOutcome::NothingPending => emit(stdout, "no pending actions"),
        ReplayOutcome::CompileErrors => {
            Err("compile errors detected; pending actions discarded".to_string())
        }
        ReplayOutcome::DecodeFailed(message) => {
            Err(format!("pending actions could not be decoded: {message}"))
        }
        ReplayOutcome::Replayed { created } => {
            for id in created {
                let Some(node) = scene.find(id) else {
                    continue;
                };
                emit(stdout, &describe_node(node))?;
            }
            Ok(())
        }
    }
}

fn describe_node(node: &SceneNode) -> String {
    let capabilities = node
        .capabilities()
        .iter()
        .map(|capability| match capability.material() {
            Some(material) => format!("{}({})", capability.type_name(), material.name),
            None => capability.type_name().to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("created {} [{capabilities}]", node.name)
}

fn salvage_file<W: Write>(path: &str, config: &CopilotConfig, stdout: &mut W) -> Result<(), String> {
    let text = fs::read_to_string(path)
        .map_err(|error| format!("failed to read reply file '{path}': {error}"))?;
    let salvaged = salvage(&text, config.salvage);
    emit(stdout, &salvaged)?;
    let reply = decode_reply(&salvaged).map_err(|error| error.to_string())?;
    let actions = reply
        .actions
        .iter()
        .filter(|action| action.is_create_gameobject())
        .count();
    emit(
        stdout,
        &format!(
            "decoded: {} file(s), {} action(s) ({actions} create_gameobject)",
            reply.files.len(),
            reply.actions.len()
        ),
    )
}

fn emit<W: Write>(stdout: &mut W, line: &str) -> Result<(), String> {
    writeln!(stdout, "{line}").map_err(|error| format!("failed to write output: {error}"))
}

#[cfg(test)]
mod tests {
    use copilot::NetworkError;
    use tempfile::TempDir;

    use super::*;

    struct CannedClient(&'static str);

    impl LlmClient for CannedClient {
        fn complete(&self, _prompt: &str) -> Result<String, NetworkError> {
            Ok(self.0.to_string())
        }
    }

    fn project() -> (TempDir, CommonOptions) {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("Assets")).expect("assets");
        let opts = CommonOptions {
            root: Some(temp.path().to_path_buf()),
            ..CommonOptions::default()
        };
        (temp, opts)
    }

    fn output(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).expect("utf8")
    }

    fn generate_into(opts: &CommonOptions, reply: &'static str) -> Result<String, String> {
        let paths = resolve_paths(opts)?;
        let config = CopilotConfig::default();
        let mut gate = CompileGate::new(FileSessionState::new(paths.session_state_path()));
        let mut stdout = Vec::new();
        generate(&CannedClient(reply), &mut gate, &paths, &config, "prompt", &mut stdout)?;
        Ok(output(stdout))
    }

    #[test]
    fn root_without_assets_is_rejected() {
        let temp = TempDir::new().expect("temp");
        let opts = CommonOptions {
            root: Some(temp.path().to_path_buf()),
            ..CommonOptions::default()
        };
        let error = run(CommandKind::Pending, opts, &mut Vec::new()).expect_err("no assets");
        assert!(error.contains("missing Assets/"));
    }

    #[test]
    fn generate_then_pending_then_replay() {
        let (_temp, opts) = project();
        let printed = generate_into(
            &opts,
            r#"{"actions":[{"type":"create_gameobject","name":"Ball","components":[{"primitive":"Sphere"}]}],"explanation":"ball"}"#,
        )
        .expect("generate");
        assert!(printed.contains("1 action(s) pending until reload"));
        assert!(printed.contains("explanation: ball"));

        let mut pending = Vec::new();
        run(CommandKind::Pending, opts.clone(), &mut pending).expect("pending");
        assert!(output(pending).contains("\"name\": \"Ball\""));

        let mut replayed = Vec::new();
        run(CommandKind::Replay, opts.clone(), &mut replayed).expect("replay");
        let replayed = output(replayed);
        assert!(replayed.starts_with("created Ball [MeshFilter, MeshRenderer(Default-Material), SphereCollider]"));

        let mut again = Vec::new();
        run(CommandKind::Replay, opts, &mut again).expect("replay again");
        assert_eq!(output(again), "no pending actions\n");
    }

    #[test]
    fn decode_failure_prints_raw_and_fails() {
        let (_temp, opts) = project();
        let error = generate_into(&opts, "I cannot do that.").expect_err("decode");
        assert!(error.starts_with("JSON parse error"));
    }

    #[test]
    fn compile_finished_reports_pending_count() {
        let (_temp, opts) = project();
        generate_into(&opts, r#"{"actions":[{"type":"create_gameobject","name":"X"}]}"#)
            .expect("generate");
        let mut stdout = Vec::new();
        run(CommandKind::CompileFinished, opts, &mut stdout).expect("compile finished");
        assert_eq!(
            output(stdout),
            "compile finished; 1 pending action(s) await reload\n"
        );
    }

    #[test]
    fn clear_drops_pending_actions() {
        let (_temp, opts) = project();
        generate_into(&opts, r#"{"actions":[{"type":"create_gameobject","name":"X"}]}"#)
            .expect("generate");

        let mut cleared = Vec::new();
        run(CommandKind::Clear, opts.clone(), &mut cleared).expect("clear");
        assert_eq!(output(cleared), "pending actions cleared\n");

        let mut pending = Vec::new();
        run(CommandKind::Pending, opts, &mut pending).expect("pending");
        assert_eq!(output(pending), "no pending actions\n");
    }

    #[test]
    fn replay_with_compile_errors_reports_failure() {
        let (temp, opts) = project();
        generate_into(&opts, r#"{"actions":[{"type":"create_gameobject","name":"X"}]}"#)
            .expect("generate");
        let paths = resolve_paths(&opts).expect("paths");
        fs::write(
            paths.compiled_assemblies_path(),
            r#"[{"name":"Game","diagnostics":[{"severity":"error","message":"CS0246"}]}]"#,
        )
        .expect("write");

        let error = run(CommandKind::Replay, opts, &mut Vec::new()).expect_err("errors");
        assert!(error.contains("compile errors"));
        drop(temp);
    }

    #[test]
    fn salvage_command_prints_repaired_json() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("reply.txt");
        fs::write(&path, r#"Sure! {explanation: "hi", files: []} bye"#).expect("write");

        let mut stdout = Vec::new();
        run(
            CommandKind::Salvage {
                path: path.display().to_string(),
            },
            CommonOptions::default(),
            &mut stdout,
        )
        .expect("salvage");
        assert_eq!(
            output(stdout),
            "{\"explanation\": \"hi\", \"files\": []}\ndecoded: 0 file(s), 0 action(s) (0 create_gameobject)\n"
        );
    }
}
