//! Step and run results.
//!
//! A [`StepResult`] is opened with [`PendingStep::begin`] and sealed exactly
//! once by [`PendingStep::succeed`] or [`PendingStep::fail`]; there is no
//! way to change it afterwards. A [`RunResult`] is assembled by the
//! orchestrator and handed out by value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::script::Step;

/// Terminal status of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

/// A step that has started but not yet finished.
#[derive(Debug)]
pub struct PendingStep {
    index: i64,
    description: String,
    start_time: DateTime<Utc>,
}

impl PendingStep {
    /// Open a step, stamping its start time.
    pub fn begin(step: &Step) -> Self {
        Self {
            index: step.index,
            description: step.description.clone(),
            start_time: Utc::now(),
        }
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    /// Seal as successful.
    pub fn succeed(self, screenshot_path: Option<String>) -> StepResult {
        self.seal(StepStatus::Success, screenshot_path, None)
    }

    /// Seal as failed.
    pub fn fail(self, error: impl Into<String>, screenshot_path: Option<String>) -> StepResult {
        self.seal(StepStatus::Failed, screenshot_path, Some(error.into()))
    }

    fn seal(
        self,
        status: StepStatus,
        screenshot_path: Option<String>,
        error_message: Option<String>,
    ) -> StepResult {
        StepResult {
            index: self.index,
            description: self.description,
            status,
            screenshot_path,
            error_message,
            start_time: self.start_time,
            end_time: Utc::now(),
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    index: i64,
    description: String,
    status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    screenshot_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl StepResult {
    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    /// Path relative to the artifacts base, forward slashes only.
    pub fn screenshot_path(&self) -> Option<&str> {
        self.screenshot_path.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    success: bool,
    steps: Vec<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    artifacts_path: String,
    console_logs: Vec<String>,
}

impl RunResult {
    /// An empty, not yet successful result for the given run directory.
    pub(crate) fn new(artifacts_path: impl Into<String>) -> Self {
        Self {
            success: false,
            steps: Vec::new(),
            error_message: None,
            artifacts_path: artifacts_path.into(),
            console_logs: Vec::new(),
        }
    }

    pub(crate) fn push_step(&mut self, step: StepResult) {
        self.steps.push(step);
    }

    /// Record a run-level fault. The first fault wins.
    pub(crate) fn record_fault(&mut self, message: impl Into<String>) {
        if self.error_message.is_none() {
            self.error_message = Some(message.into());
        }
    }

    pub(crate) fn set_console_logs(&mut self, lines: Vec<String>) {
        self.console_logs = lines;
    }

    /// Compute `success` and close the result.
    pub(crate) fn finalize(mut self) -> Self {
        self.success = self.error_message.is_none() && self.steps.iter().all(StepResult::is_success);
        self
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Absolute run directory.
    pub fn artifacts_path(&self) -> &str {
        &self.artifacts_path
    }

    pub fn console_logs(&self) -> &[String] {
        &self.console_logs
    }

    /// The first failed step, if any.
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ActionKind;

    fn step(index: i64) -> Step {
        Step::new(index, ActionKind::Goto).with_description(format!("step {index}"))
    }

    #[test]
    fn test_seal_success() {
        let result = PendingStep::begin(&step(3)).succeed(Some("runs/1/screenshots/step_3.png".into()));
        assert_eq!(result.index(), 3);
        assert_eq!(result.description(), "step 3");
        assert!(result.is_success());
        assert!(result.error_message().is_none());
        assert!(result.end_time() >= result.start_time());
    }

    #[test]
    fn test_seal_failure() {
        let result = PendingStep::begin(&step(1)).fail("boom", None);
        assert_eq!(result.status(), StepStatus::Failed);
        assert_eq!(result.error_message(), Some("boom"));
        assert!(result.screenshot_path().is_none());
    }

    #[test]
    fn test_step_result_wire_format() {
        let result = PendingStep::begin(&step(2)).succeed(None);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["index"], 2);
        assert!(json.get("screenshot_path").is_none());
        assert!(json.get("error_message").is_none());
        assert!(json["start_time"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_finalize_all_success() {
        let mut run = RunResult::new("/tmp/artifacts/runs/1");
        run.push_step(PendingStep::begin(&step(1)).succeed(None));
        run.push_step(PendingStep::begin(&step(2)).succeed(None));
        let run = run.finalize();
        assert!(run.success());
        assert!(run.first_failure().is_none());
    }

    #[test]
    fn test_finalize_with_failure() {
        let mut run = RunResult::new("/tmp/artifacts/runs/1");
        run.push_step(PendingStep::begin(&step(1)).succeed(None));
        run.push_step(PendingStep::begin(&step(2)).fail("nope", None));
        let run = run.finalize();
        assert!(!run.success());
        assert_eq!(run.first_failure().map(StepResult::index), Some(2));
    }

    #[test]
    fn test_finalize_empty_run_succeeds() {
        let run = RunResult::new("/tmp/a").finalize();
        assert!(run.success());
    }

    #[test]
    fn test_run_fault_forces_failure_and_first_wins() {
        let mut run = RunResult::new("/tmp/a");
        run.record_fault("browser did not start");
        run.record_fault("later fault");
        let run = run.finalize();
        assert!(!run.success());
        assert_eq!(run.error_message(), Some("browser did not start"));
    }

    #[test]
    fn test_run_result_wire_format() {
        let mut run = RunResult::new("/tmp/a/runs/7");
        run.set_console_logs(vec!["[log] hello".to_string()]);
        let json = serde_json::to_value(run.finalize()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["artifacts_path"], "/tmp/a/runs/7");
        assert_eq!(json["console_logs"][0], "[log] hello");
        assert!(json["steps"].as_array().unwrap().is_empty());
        assert!(json.get("error_message").is_none());
    }
}
