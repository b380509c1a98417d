//! Playwright backend errors.

use thiserror::Error;
use webrun_engine::DriverError;

/// Playwright backend errors.
#[derive(Debug, Error)]
pub enum PlaywrightError {
    /// Bridge process failed to start.
    #[error("Bridge failed to start: {0}")]
    BridgeStartFailed(String),

    /// Bridge process exited while requests were in flight.
    #[error("Bridge process died: {0}")]
    BridgeDied(String),

    #[error("Bridge communication error: {0}")]
    CommunicationError(String),

    /// Error raised inside the bridge (Playwright or Midscene message).
    #[error("{0}")]
    BridgeError(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    /// Timeout waiting for a bridge response.
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Bridge not started")]
    NotInitialized,

    #[error("Node.js not found. Please install Node.js >= 18")]
    NodeNotFound,

    /// A session is already open on this manager.
    #[error("Browser session already active")]
    SessionActive,
}

impl From<std::io::Error> for PlaywrightError {
    fn from(e: std::io::Error) -> Self {
        PlaywrightError::CommunicationError(e.to_string())
    }
}

impl From<serde_json::Error> for PlaywrightError {
    fn from(e: serde_json::Error) -> Self {
        PlaywrightError::CommunicationError(format!("JSON error: {}", e))
    }
}

impl From<PlaywrightError> for DriverError {
    fn from(e: PlaywrightError) -> Self {
        match e {
            PlaywrightError::Timeout(msg) => DriverError::Timeout(msg),
            PlaywrightError::BrowserLaunchFailed(msg) => DriverError::Launch(msg),
            PlaywrightError::NodeNotFound | PlaywrightError::BridgeStartFailed(_) => {
                DriverError::Launch(e.to_string())
            }
            other => DriverError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_keeps_message() {
        let err: DriverError =
            PlaywrightError::BridgeError("Timeout 5000ms exceeded.".to_string()).into();
        assert_eq!(err.to_string(), "Timeout 5000ms exceeded.");
    }

    #[test]
    fn test_timeout_maps_to_timeout() {
        let err: DriverError = PlaywrightError::Timeout("Method goto timed out".to_string()).into();
        assert!(matches!(err, DriverError::Timeout(_)));
    }

    #[test]
    fn test_launch_errors_map_to_launch() {
        let err: DriverError = PlaywrightError::NodeNotFound.into();
        assert!(matches!(err, DriverError::Launch(_)));
        assert!(err.to_string().contains("Node.js not found"));

        let err: DriverError =
            PlaywrightError::BrowserLaunchFailed("webkit executable doesn't exist".to_string())
                .into();
        assert_eq!(
            err.to_string(),
            "Browser launch failed: webkit executable doesn't exist"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: PlaywrightError = io.into();
        assert!(err.to_string().contains("pipe closed"));
    }
}
