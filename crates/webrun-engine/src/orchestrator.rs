//! Run orchestration.
//!
//! Creates the artifact tree, acquires a session, dispatches steps in order
//! until the first failure, then flushes console logs and releases the
//! session. Release happens on every exit path. A panic during a step fails
//! that step; a panic anywhere else is reported as a run-level fault.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info, info_span, warn, Instrument};

use crate::artifacts::{ArtifactLayout, ArtifactManager};
use crate::dispatcher::ActionDispatcher;
use crate::error::{panic_message, ArtifactError, EngineError};
use crate::result::RunResult;
use crate::script::ScriptConfig;
use crate::session::{BrowserSession, SessionManager};

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_id: u64,
    /// Base directory for all runs.
    pub artifacts_base: PathBuf,
    /// Persisted browser storage state, if any.
    pub auth_state: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(run_id: u64, artifacts_base: impl Into<PathBuf>) -> Self {
        Self {
            run_id,
            artifacts_base: artifacts_base.into(),
            auth_state: None,
        }
    }

    pub fn with_auth_state(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth_state = Some(path.into());
        self
    }
}

/// Drives a script from start to finished [`RunResult`].
pub struct RunOrchestrator {
    sessions: Arc<dyn SessionManager>,
    dispatcher: ActionDispatcher,
}

impl RunOrchestrator {
    pub fn new(sessions: Arc<dyn SessionManager>, dispatcher: ActionDispatcher) -> Self {
        Self {
            sessions,
            dispatcher,
        }
    }

    /// Execute `script`. Faults are reported inside the returned result.
    pub async fn run(&self, script: &ScriptConfig, request: &RunRequest) -> RunResult {
        let span = info_span!("run", run_id = request.run_id);
        self.run_inner(script, request).instrument(span).await
    }

    async fn run_inner(&self, script: &ScriptConfig, request: &RunRequest) -> RunResult {
        info!(
            browser = %script.browser,
            steps = script.steps.len(),
            "Starting run"
        );

        let artifacts = match ArtifactManager::new(&request.artifacts_base, request.run_id) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                let fallback = fallback_run_dir(&request.artifacts_base, request.run_id);
                let mut result = RunResult::new(fallback.to_string_lossy());
                self.fault(&mut result, EngineError::from(e));
                self.sessions.release(None).await;
                return result.finalize();
            }
        };

        let mut result = RunResult::new(artifacts.layout().run_dir.to_string_lossy());
        let mut session: Option<Box<dyn BrowserSession>> = None;

        let body = AssertUnwindSafe(self.drive(script, request, &artifacts, &mut session, &mut result))
            .catch_unwind()
            .await;
        match body {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.fault(&mut result, e),
            Err(panic) => self.fault(&mut result, EngineError::Panic(panic_message(&*panic))),
        }

        if let Some(ref live) = session {
            if let Err(e) = self.flush_console(live.as_ref(), &artifacts, &mut result).await {
                self.fault(&mut result, EngineError::from(e));
            }
        }

        self.sessions.release(session).await;

        let result = result.finalize();
        info!(
            success = result.success(),
            executed = result.steps().len(),
            "Run finished"
        );
        result
    }

    async fn drive(
        &self,
        script: &ScriptConfig,
        request: &RunRequest,
        artifacts: &ArtifactManager,
        session: &mut Option<Box<dyn BrowserSession>>,
        result: &mut RunResult,
    ) -> Result<(), EngineError> {
        artifacts.prepare().await?;

        let acquired = self
            .sessions
            .acquire(script.browser, script.viewport, request.auth_state.as_deref())
            .await
            .map_err(EngineError::Session)?;
        let live: &dyn BrowserSession = &**session.insert(acquired);

        for step in &script.steps {
            let step_result = self.dispatcher.execute(live, step, artifacts).await;
            let failed = !step_result.is_success();
            result.push_step(step_result);

            if failed {
                warn!(index = step.index, "Halting run after failed step");
                break;
            }
        }

        Ok(())
    }

    async fn flush_console(
        &self,
        session: &dyn BrowserSession,
        artifacts: &ArtifactManager,
        result: &mut RunResult,
    ) -> Result<(), ArtifactError> {
        let lines: Vec<String> = session
            .drain_console()
            .into_iter()
            .map(|msg| msg.to_string())
            .collect();
        let written = artifacts.write_console_log(&lines).await;
        result.set_console_logs(lines);
        written.map(|_| ())
    }

    fn fault(&self, result: &mut RunResult, e: EngineError) {
        error!(error = %e, "Run-level fault");
        result.record_fault(e.to_string());
    }
}

/// Run directory reported when the base could not be resolved. Anchored at
/// the working directory so the reported path stays absolute.
fn fallback_run_dir(base: &Path, run_id: u64) -> PathBuf {
    let base = if base.is_absolute() {
        base.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(base),
            Err(_) => base.to_path_buf(),
        }
    };
    ArtifactLayout::for_run(&base, run_id).run_dir
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
