//! Engine errors.
//!
//! [`DriverError`] is a step-level fault: it never leaves the dispatcher and
//! ends up in `StepResult::error_message`. [`EngineError`] is a run-level
//! fault and ends up in `RunResult::error_message`.

use std::path::PathBuf;

use thiserror::Error;

/// Artifact filesystem errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid artifacts base path {path:?}: {source}")]
    InvalidBase {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a browser backend or while executing one step.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The step (or a backend call) ran out of time.
    #[error("{0}")]
    Timeout(String),

    /// An assertion step evaluated to false.
    #[error("{0}")]
    Assertion(String),

    /// The step lacks a field its action needs.
    #[error("Action '{action}' requires '{field}'")]
    MissingField { action: String, field: &'static str },

    /// The AI agent rejected or failed the instruction.
    #[error("AI agent error: {0}")]
    Agent(String),

    /// Any other backend failure (navigation, selector, bridge I/O).
    #[error("{0}")]
    Backend(String),

    /// The backend could not be started.
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Run-level faults.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid script: {0}")]
    Script(#[from] serde_json::Error),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("Failed to start browser session: {0}")]
    Session(#[source] DriverError),

    #[error("Run aborted: {0}")]
    Panic(String),
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in browser backend".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_messages_are_verbatim() {
        let err = DriverError::Assertion("Element not visible: #missing".to_string());
        assert_eq!(err.to_string(), "Element not visible: #missing");

        let err = DriverError::Timeout("Timeout 5000ms exceeded".to_string());
        assert_eq!(err.to_string(), "Timeout 5000ms exceeded");
    }

    #[test]
    fn test_missing_field_message() {
        let err = DriverError::MissingField {
            action: "assertVisible".to_string(),
            field: "selector",
        };
        assert_eq!(err.to_string(), "Action 'assertVisible' requires 'selector'");
    }

    #[test]
    fn test_session_error_wraps_launch() {
        let err = EngineError::Session(DriverError::Launch("webkit not installed".to_string()));
        let display = err.to_string();
        assert!(display.contains("Failed to start browser session"));
        assert!(display.contains("webkit not installed"));
    }

    #[test]
    fn test_panic_message_payloads() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static crash");
        assert_eq!(panic_message(&*payload), "static crash");

        let payload: Box<dyn std::any::Any + Send> = Box::new(format!("crash on {}", "#boom"));
        assert_eq!(panic_message(&*payload), "crash on #boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*payload), "panic in browser backend");
    }

    #[test]
    fn test_artifact_error_includes_path() {
        let err = ArtifactError::Write {
            path: PathBuf::from("/tmp/runs/1/logs/console.log"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let display = err.to_string();
        assert!(display.contains("console.log"));
        assert!(display.contains("denied"));
    }
}
