use thiserror::Error;
use tracing::{error, info, warn};

use crate::reply::ActionRequest;
use crate::scene::{NodeId, SceneActionExecutor, SceneGraph};
use crate::session::{PendingActionStore, SessionState, StoreError};

use super::diagnostics::has_compile_errors;
use super::environment::{CompilationEnvironment, EnvironmentError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Idle,
    Pending,
    AwaitingReload,
    Replaying,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    NothingPending,
    /// Pending actions were discarded without touching the scene.
    CompileErrors,
    Replayed { created: Vec<NodeId> },
    /// The stored blob could not be decoded; it has already been erased.
    DecodeFailed(String),
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

/// Parks decoded actions until the host has recompiled and reloaded, then
/// replays them only when the build was clean.
#[derive(Debug)]
pub struct CompileGate<S> {
    store: PendingActionStore<S>,
    phase: GatePhase,
}

impl<S: SessionState> CompileGate<S> {
    pub fn new(state: S) -> Self {
        Self {
            store: PendingActionStore::new(state),
            phase: GatePhase::Idle,
        }
    }

    /// Rebuilds a gate over state written earlier in the same session, so a
    /// stored blob puts it back in `Pending`.
    pub fn resume(state: S) -> Result<Self, StoreError> {
        let mut gate = Self::new(state);
        if gate.store.has_pending()? {
            gate.phase = GatePhase::Pending;
        }
        Ok(gate)
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    pub fn store(&self) -> &PendingActionStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PendingActionStore<S> {
        &mut self.store
    }

    pub fn into_state(self) -> S {
        self.store.into_state()
    }

    pub fn submit(&mut self, actions: &[ActionRequest]) -> Result<(), StoreError> {
        self.store.save(actions)?;
        self.phase = GatePhase::Pending;
        Ok(())
    }

    pub fn compile_finished(&mut self) {
        if self.phase != GatePhase::Pending {
            warn!(phase = ?self.phase, "copilot_compile_finished_without_pending");
        }
        self.phase = GatePhase::AwaitingReload;
        info!("copilot_awaiting_reload");
    }

    /// Runs after every host reload, whatever phase this gate was in. Session
    /// and environment I/O failures are returned; everything else is an
    /// outcome. The pending blob never survives this call, even when the
    /// environment cannot be read.
    pub fn reload_completed(
        &mut self,
        environment: &dyn CompilationEnvironment,
        executor: &mut SceneActionExecutor,
        scene: &mut SceneGraph,
    ) -> Result<ReplayOutcome, GateError> {
        self.phase = GatePhase::Replaying;
        let outcome = self.replay(environment, executor, scene);
        self.phase = GatePhase::Idle;
        outcome
    }

    fn replay(
        &mut self,
        environment: &dyn CompilationEnvironment,
        executor: &mut SceneActionExecutor,
        scene: &mut SceneGraph,
    ) -> Result<ReplayOutcome, GateError> {
        let assemblies = match environment.compiled_assemblies() {
            Ok(assemblies) => assemblies,
            Err(environment_error) => {
                self.store.clear()?;
                error!(error = %environment_error, "copilot_replay_environment_unreadable");
                return Err(environment_error.into());
            }
        };
        if has_compile_errors(&assemblies) {
            if !self.store.has_pending()? {
                warn!("copilot_compile_errors_nothing_pending");
                return Ok(ReplayOutcome::NothingPending);
            }
            let discarded = self.store.peek().ok().flatten().map(|actions| actions.len());
            self.store.clear()?;
            error!(
                discarded_actions = ?discarded,
                "copilot_replay_cancelled_compile_errors"
            );
            return Ok(ReplayOutcome::CompileErrors);
        }

        let mut registered = 0usize;
        for assembly in &assemblies {
            for type_name in &assembly.types {
                if executor.registry_mut().register_script_type(type_name) {
                    registered += 1;
                }
            }
        }

        let actions = match self.store.take_if_present() {
            Ok(Some(actions)) => actions,
            Ok(None) => return Ok(ReplayOutcome::NothingPending),
            Err(error @ StoreError::State(_)) => return Err(error.into()),
            Err(decode) => {
                error!(error = %decode, "copilot_replay_decode_failed");
                return Ok(ReplayOutcome::DecodeFailed(decode.to_string()));
            }
        };

        let created = executor.execute_all(scene, &actions);
        info!(
            action_count = actions.len(),
            created = created.len(),
            registered_types = registered,
            "copilot_replay_completed"
        );
        Ok(ReplayOutcome::Replayed { created })
    }
}
