use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::CopilotConfig;
use crate::files::{write_files, FileWriteError, SourceFormatter, WhitespaceFormatter};
use crate::gate::CompileGate;
use crate::llm::{LlmClient, NetworkError};
use crate::reply::{decode_reply, ActionRequest, DecodeError};
use crate::salvage::salvage;
use crate::session::{SessionState, StoreError};
use crate::ProjectPaths;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// Carries the raw reply so callers can still show it.
    #[error("{source}")]
    Decode {
        raw: String,
        #[source]
        source: DecodeError,
    },
    #[error(transparent)]
    Files(#[from] FileWriteError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptOutcome {
    pub raw: String,
    pub explanation: String,
    pub written_files: Vec<PathBuf>,
    pub pending_actions: Vec<ActionRequest>,
}

/// Prompt → reply → files on disk → actions parked behind the compile gate.
pub struct CopilotFlow<'a, C, S> {
    client: &'a C,
    gate: &'a mut CompileGate<S>,
    paths: &'a ProjectPaths,
    config: &'a CopilotConfig,
    formatter: Box<dyn SourceFormatter + 'a>,
}

impl<'a, C: LlmClient, S: SessionState> CopilotFlow<'a, C, S> {
    pub fn new(
        client: &'a C,
        gate: &'a mut CompileGate<S>,
        paths: &'a ProjectPaths,
        config: &'a CopilotConfig,
    ) -> Self {
        Self {
            client,
            gate,
            paths,
            config,
            formatter: Box::new(WhitespaceFormatter),
        }
    }

    pub fn with_formatter(mut self, formatter: impl SourceFormatter + 'a) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    pub fn handle_prompt(&mut self, prompt: &str) -> Result<PromptOutcome, FlowError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(FlowError::EmptyPrompt);
        }

        let raw = self.client.complete(prompt)?;
        let salvaged = salvage(&raw, self.config.salvage);
        let reply = match decode_reply(&salvaged) {
            Ok(reply) => reply,
            Err(source) => {
                warn!(error = %source, raw_len = raw.len(), "copilot_reply_decode_failed");
                return Err(FlowError::Decode { raw, source });
            }
        };

        let written_files = write_files(
            self.paths,
            &reply.files,
            &self.config.source_rules,
            self.formatter.as_ref(),
        )?;
        self.gate.submit(&reply.actions)?;

        info!(
            files = written_files.len(),
            actions = reply.actions.len(),
            "copilot_prompt_handled"
        );
        Ok(PromptOutcome {
            raw,
            explanation: reply.explanation,
            written_files,
            pending_actions: reply.actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::gate::GatePhase;
    use crate::session::InMemorySessionState;

    struct ScriptedClient {
        reply: Result<String, u16>,
        prompts: RefCell<Vec<String>>,
    }

    impl ScriptedClient {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl LlmClient for ScriptedClient {
        fn complete(&self, prompt: &str) -> Result<String, NetworkError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.reply.clone().map_err(|status| NetworkError::Status {
                endpoint: "test".to_string(),
                status,
            })
        }
    }

    fn project() -> (TempDir, ProjectPaths) {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("Assets")).expect("assets");
        let paths = ProjectPaths::from_root(temp.path());
        (temp, paths)
    }

    #[test]
    fn file_only_reply_writes_file_and_parks_no_actions() {
        let (_temp, paths) = project();
        let client = ScriptedClient::replying(
            r#"Here you go: {"files":[{"path":"Assets/Scripts/Foo.cs","content":"class Foo{}"}],"actions":[],"explanation":"Added Foo"}"#,
        );
        let mut gate = CompileGate::new(InMemorySessionState::default());
        let config = CopilotConfig::default();

        let outcome = CopilotFlow::new(&client, &mut gate, &paths, &config)
            .handle_prompt("  add Foo  ")
            .expect("flow");

        let target = paths.root.join("Assets").join("Scripts").join("Foo.cs");
        assert_eq!(outcome.written_files, vec![target.clone()]);
        assert_eq!(outcome.explanation, "Added Foo");
        assert!(outcome.pending_actions.is_empty());
        assert!(outcome.raw.starts_with("Here you go"));
        let written = fs::read_to_string(target).expect("read");
        assert!(written.starts_with("using UnityEngine;\n"));
        assert!(written.contains("class Foo{}"));
        assert_eq!(client.prompts.borrow().as_slice(), ["add Foo"]);
        assert_eq!(gate.phase(), GatePhase::Pending);
        assert_eq!(gate.store().peek().expect("peek"), Some(Vec::new()));
    }

    #[test]
    fn unquoted_keys_are_repaired_and_actions_parked() {
        let (_temp, paths) = project();
        let client = ScriptedClient::replying(
            r#"{actions: [{type: "create_gameobject", name: "Ball", components: [{primitive: "Sphere"}]}], explanation: "ball"}"#,
        );
        let mut gate = CompileGate::new(InMemorySessionState::default());
        let config = CopilotConfig::default();

        let outcome = CopilotFlow::new(&client, &mut gate, &paths, &config)
            .handle_prompt("ball")
            .expect("flow");
        assert_eq!(outcome.pending_actions.len(), 1);
        assert_eq!(outcome.pending_actions[0].requested_name(), Some("Ball"));
        assert_eq!(gate.store().peek().expect("peek"), Some(outcome.pending_actions));
    }

    #[test]
    fn decode_failure_writes_nothing_and_keeps_raw() {
        let (temp, paths) = project();
        let client = ScriptedClient::replying(r#"Sure! {type: "create_gameobject" name:"X"}"#);
        let mut gate = CompileGate::new(InMemorySessionState::default());
        let config = CopilotConfig::default();

        let error = CopilotFlow::new(&client, &mut gate, &paths, &config)
            .handle_prompt("x")
            .expect_err("decode");
        let FlowError::Decode { raw, source } = error else {
            panic!("expected decode error, got {error:?}");
        };
        assert!(raw.starts_with("Sure!"));
        assert!(source.to_string().starts_with("JSON parse error"));
        assert_eq!(gate.phase(), GatePhase::Idle);
        assert_eq!(gate.store().peek().expect("peek"), None);
        assert_eq!(
            fs::read_dir(temp.path().join("Assets")).expect("dir").count(),
            0
        );
    }

    #[test]
    fn network_failure_and_blank_prompt_abort_early() {
        let (_temp, paths) = project();
        let client = ScriptedClient {
            reply: Err(503),
            prompts: RefCell::new(Vec::new()),
        };
        let mut gate = CompileGate::new(InMemorySessionState::default());
        let config = CopilotConfig::default();
        let mut flow = CopilotFlow::new(&client, &mut gate, &paths, &config);

        assert!(matches!(flow.handle_prompt("   "), Err(FlowError::EmptyPrompt)));
        assert!(matches!(
            flow.handle_prompt("go"),
            Err(FlowError::Network(NetworkError::Status { status: 503, .. }))
        ));
        assert_eq!(client.prompts.borrow().len(), 1);
    }

    #[test]
    fn lenient_config_accepts_fenced_reply() {
        let (_temp, paths) = project();
        let client = ScriptedClient::replying("```json\n{\"explanation\": \"ok\",}\n```");
        let mut gate = CompileGate::new(InMemorySessionState::default());
        let config = CopilotConfig {
            salvage: crate::salvage::SalvageOptions::lenient(),
            ..CopilotConfig::default()
        };
        let outcome = CopilotFlow::new(&client, &mut gate, &paths, &config)
            .handle_prompt("x")
            .expect("flow");
        assert_eq!(outcome.explanation, "ok");
    }
}
