use std::fs;

use copilot::{
    project_paths_at, Capability, CapabilityRegistry, Color, CompileGate, CopilotConfig,
    CopilotFlow, FileCompilationEnvironment, FileSessionState, LlmClient, MaterialMode,
    NetworkError, ProjectPaths, ReplayOutcome, SceneActionExecutor, SceneGraph,
};
use tempfile::TempDir;

struct CannedClient(&'static str);

impl LlmClient for CannedClient {
    fn complete(&self, _prompt: &str) -> Result<String, NetworkError> {
        Ok(self.0.to_string())
    }
}

const BALL_REPLY: &str = r##"Sure, here is your ball.
{"files":[{"path":"Scripts/Bouncy.cs","content":"public class Bouncy : MonoBehaviour {\nvoid Update() {}\n}"}],
 "actions":[{"type":"create_gameobject","name":"Ball",
             "components":[{"primitive":"Sphere"},{"Renderer":{"materialColor":"#00ff00"}},"Bouncy"]}],
 "explanation":"A green ball with a script."}
Let me know if you need anything else."##;

fn project() -> (TempDir, ProjectPaths) {
    let temp = TempDir::new().expect("temp");
    fs::create_dir_all(temp.path().join("Assets")).expect("assets");
    let paths = project_paths_at(temp.path().to_path_buf()).expect("paths");
    (temp, paths)
}

/// Everything before the host reload: prompt, files, parked actions.
fn generate(paths: &ProjectPaths) {
    let client = CannedClient(BALL_REPLY);
    let config = CopilotConfig::default();
    let mut gate = CompileGate::new(FileSessionState::new(paths.session_state_path()));
    let outcome = CopilotFlow::new(&client, &mut gate, paths, &config)
        .handle_prompt("make a green ball that bounces")
        .expect("flow");

    assert_eq!(outcome.explanation, "A green ball with a script.");
    assert_eq!(outcome.pending_actions.len(), 1);
    let script = paths.source_root.join("Scripts").join("Bouncy.cs");
    assert_eq!(outcome.written_files, vec![script.clone()]);
    let source = fs::read_to_string(script).expect("script");
    assert!(source.starts_with("using UnityEngine;\n"));
    assert!(source.contains("    void Update() {}\n"));
    gate.compile_finished();
}

fn reload(paths: &ProjectPaths, scene: &mut SceneGraph) -> ReplayOutcome {
    let mut gate = CompileGate::new(FileSessionState::new(paths.session_state_path()));
    let mut executor = SceneActionExecutor::new(
        CapabilityRegistry::with_engine_builtins(),
        MaterialMode::Editor,
        paths.materials_dir(),
    );
    let environment = FileCompilationEnvironment::new(paths.compiled_assemblies_path());
    gate.reload_completed(&environment, &mut executor, scene)
        .expect("reload")
}

#[test]
fn clean_compile_replays_actions_after_reload() {
    let (_temp, paths) = project();
    generate(&paths);
    fs::write(
        paths.compiled_assemblies_path(),
        r#"[{"name":"Assembly-CSharp","types":["Bouncy"],"diagnostics":[]}]"#,
    )
    .expect("compiled assemblies");

    let mut scene = SceneGraph::default();
    let ReplayOutcome::Replayed { created } = reload(&paths, &mut scene) else {
        panic!("expected replay");
    };
    assert_eq!(created.len(), 1);

    let ball = scene.find_by_name("Ball").expect("ball");
    assert_eq!(ball.count_named("MeshFilter"), 1);
    assert_eq!(ball.count_named("Bouncy"), 1);
    let material = ball
        .renderer()
        .and_then(Capability::material)
        .expect("material");
    assert_eq!(material.color, Color::rgba(0.0, 1.0, 0.0, 1.0));
    assert!(material
        .asset_path
        .as_ref()
        .is_some_and(|path| path.starts_with(paths.materials_dir()) && path.exists()));

    let mut again = SceneGraph::default();
    assert_eq!(reload(&paths, &mut again), ReplayOutcome::NothingPending);
    assert_eq!(again.node_count(), 0);
}

#[test]
fn compile_errors_discard_actions_after_reload() {
    let (_temp, paths) = project();
    generate(&paths);
    fs::write(
        paths.compiled_assemblies_path(),
        "[{\"name\":\"Assembly-CSharp\",\"legacy_log\":\"2048\\tAssets/Scripts/Bouncy.cs(2,1): error CS1513\"}]",
    )
    .expect("compiled assemblies");

    let mut scene = SceneGraph::default();
    assert_eq!(reload(&paths, &mut scene), ReplayOutcome::CompileErrors);
    assert_eq!(scene.node_count(), 0);

    fs::remove_file(paths.compiled_assemblies_path()).expect("remove");
    assert_eq!(reload(&paths, &mut scene), ReplayOutcome::NothingPending);
}
