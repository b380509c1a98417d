//! Action dispatch for a single step.
//!
//! `pending → running → {success, failed}`. Every [`DriverError`] raised
//! while performing the action or capturing its screenshot is caught here
//! and sealed into the step's [`StepResult`]. A panic inside the backend
//! fails the step instead of unwinding into the run.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::artifacts::ArtifactManager;
use crate::error::{panic_message, DriverError, EngineError};
use crate::result::{PendingStep, StepResult};
use crate::script::{ActionKind, Step};
use crate::session::BrowserSession;

/// Dispatcher timing knobs.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Pause between an action and its automatic screenshot.
    pub settle_delay: Duration,
    /// `waitTime` duration when the step has none.
    pub default_wait: Duration,
    /// Added to a step's timeout before the engine abandons a deterministic
    /// action, so the backend's own timeout message wins when it fires.
    pub timeout_grace: Duration,
    /// Upper bound for one AI agent call.
    pub ai_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(3000),
            default_wait: Duration::from_millis(1000),
            timeout_grace: Duration::from_millis(1000),
            ai_timeout: Duration::from_millis(300_000),
        }
    }
}

/// Executes steps against a session.
#[derive(Debug, Clone, Default)]
pub struct ActionDispatcher {
    config: DispatchConfig,
}

impl ActionDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run one step to a sealed result. Never returns an error.
    pub async fn execute(
        &self,
        session: &dyn BrowserSession,
        step: &Step,
        artifacts: &ArtifactManager,
    ) -> StepResult {
        let span = info_span!("step", index = step.index, action = %step.action);
        async {
            let pending = PendingStep::begin(step);
            debug!("Step started: {}", step.description);

            let outcome = AssertUnwindSafe(self.run(session, step, artifacts))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(screenshot)) => {
                    info!("Step succeeded");
                    pending.succeed(screenshot)
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Step failed");
                    pending.fail(e.to_string(), None)
                }
                Err(panic) => {
                    let e = EngineError::Panic(panic_message(&*panic));
                    error!(error = %e, "Backend panicked during step");
                    pending.fail(e.to_string(), None)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        session: &dyn BrowserSession,
        step: &Step,
        artifacts: &ArtifactManager,
    ) -> Result<Option<String>, DriverError> {
        let explicit = self.perform(session, step, artifacts).await?;

        if step.wants_default_screenshot() {
            tokio::time::sleep(self.config.settle_delay).await;
            let path = self.capture(session, step, artifacts).await?;
            return Ok(Some(path));
        }

        Ok(explicit)
    }

    /// Perform the action. Returns the screenshot path for the explicit
    /// screenshot action.
    async fn perform(
        &self,
        session: &dyn BrowserSession,
        step: &Step,
        artifacts: &ArtifactManager,
    ) -> Result<Option<String>, DriverError> {
        let timeout_ms = step.timeout_ms();
        let page = session.page();
        let agent = session.agent();

        match &step.action {
            ActionKind::Goto => {
                let url = required(step, step.value.as_deref(), "value")?;
                self.bounded(step, page.goto(url, timeout_ms)).await?;
            }
            ActionKind::AiTap => {
                let target = ai_target(
                    step,
                    &[
                        Some(step.description.as_str()),
                        step.selector.as_deref(),
                        step.value.as_deref(),
                    ],
                )?;
                self.ai_bounded(self.config.ai_timeout, agent.ai_tap(target)).await?;
            }
            ActionKind::AiInput => {
                let target = ai_target(
                    step,
                    &[Some(step.description.as_str()), step.selector.as_deref()],
                )?;
                let value = step.value.as_deref().unwrap_or("");
                self.ai_bounded(self.config.ai_timeout, agent.ai_input(value, target)).await?;
            }
            ActionKind::AiAction => {
                let instruction = ai_target(step, &[Some(step.description.as_str())])?;
                self.ai_bounded(self.config.ai_timeout, agent.ai_action(instruction)).await?;
            }
            ActionKind::AiAssert => {
                let assertion = ai_target(step, &[Some(step.description.as_str())])?;
                self.ai_bounded(self.config.ai_timeout, agent.ai_assert(assertion)).await?;
            }
            ActionKind::AiWaitFor => {
                let condition = ai_target(step, &[Some(step.description.as_str())])?;
                // The agent polls for up to the step timeout on its own.
                let limit = self.config.ai_timeout.max(Duration::from_millis(timeout_ms));
                self.ai_bounded(limit, agent.ai_wait_for(condition, timeout_ms))
                    .await?;
            }
            ActionKind::AiQuery => {
                let query = ai_target(step, &[Some(step.description.as_str())])?;
                let data = self.ai_bounded(self.config.ai_timeout, agent.ai_query(query)).await?;
                info!(result = %data, "AI query result");
            }
            ActionKind::Screenshot => {
                let path = self.capture(session, step, artifacts).await?;
                return Ok(Some(path));
            }
            ActionKind::WaitTime => {
                let duration = step
                    .duration
                    .filter(|ms| *ms > 0)
                    .map(Duration::from_millis)
                    .unwrap_or(self.config.default_wait);
                tokio::time::sleep(duration).await;
            }
            ActionKind::Select => {
                let selector = required(step, step.selector.as_deref(), "selector")?;
                let value = step.value.as_deref().unwrap_or("");
                self.bounded(step, page.select_option(selector, value, timeout_ms))
                    .await?;
            }
            ActionKind::WaitForSelector => {
                let selector = required(step, step.selector.as_deref(), "selector")?;
                self.bounded(step, page.wait_for_selector(selector, timeout_ms))
                    .await?;
            }
            ActionKind::AssertText => {
                let selector = required(step, step.selector.as_deref(), "selector")?;
                let expected = step.expected.as_deref().unwrap_or("");
                let text = self
                    .bounded(step, page.inner_text(selector, timeout_ms))
                    .await?;
                if !text.contains(expected) {
                    return Err(DriverError::Assertion(format!(
                        "Text assertion failed: expected '{}' in '{}'",
                        expected, text
                    )));
                }
            }
            ActionKind::AssertVisible => {
                let selector = required(step, step.selector.as_deref(), "selector")?;
                let visible = self
                    .bounded(step, page.is_visible(selector, timeout_ms))
                    .await?;
                if !visible {
                    return Err(DriverError::Assertion(format!(
                        "Element not visible: {}",
                        selector
                    )));
                }
            }
            ActionKind::Unrecognized(tag) => {
                // Lenient: unknown actions are recorded, not rejected.
                warn!("No handler for action '{}', nothing performed", tag);
            }
        }

        Ok(None)
    }

    /// Full-page screenshot written as `step_<index>.png`; returns the path
    /// relative to the artifacts base.
    async fn capture(
        &self,
        session: &dyn BrowserSession,
        step: &Step,
        artifacts: &ArtifactManager,
    ) -> Result<String, DriverError> {
        let png = session.page().screenshot(true).await?;
        let path = artifacts.write_screenshot(step.index, &png).await?;
        Ok(artifacts.relativize(&path))
    }

    /// Bound a deterministic action by the step timeout plus grace.
    async fn bounded<T, F>(&self, step: &Step, action: F) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        let timeout_ms = step.timeout_ms();
        let limit = Duration::from_millis(timeout_ms) + self.config.timeout_grace;
        match tokio::time::timeout(limit, action).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout(format!(
                "Step {} timed out after {}ms",
                step.index, timeout_ms
            ))),
        }
    }

    async fn ai_bounded<T, F>(&self, limit: Duration, action: F) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        match tokio::time::timeout(limit, action).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout(format!(
                "AI agent did not respond within {}ms",
                limit.as_millis()
            ))),
        }
    }
}

fn required<'a>(
    step: &Step,
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, DriverError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DriverError::MissingField {
            action: step.action.tag().to_string(),
            field,
        })
}

fn ai_target<'a>(step: &Step, candidates: &[Option<&'a str>]) -> Result<&'a str, DriverError> {
    required(step, Some(Step::first_of(candidates)), "description")
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
