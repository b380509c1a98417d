//! Browser session seams.
//!
//! A backend provides a [`SessionManager`] that hands out
//! [`BrowserSession`]s. A session bundles the page driver used by navigation
//! and DOM actions, the AI agent used by natural-language actions, and the
//! console sink that collects browser console messages for the run.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::script::{BrowserKind, Viewport};

/// A browser console message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Severity as reported by the browser (`log`, `warning`, `error`, ...).
    #[serde(rename = "type")]
    pub level: String,
    pub text: String,
}

impl ConsoleMessage {
    pub fn new(level: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            text: text.into(),
        }
    }
}

impl std::fmt::Display for ConsoleMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.text)
    }
}

/// Deterministic page operations. Timeouts are milliseconds.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load `url` and wait for network idle.
    async fn goto(&self, url: &str, timeout_ms: u64) -> Result<(), DriverError>;

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        timeout_ms: u64,
    ) -> Result<(), DriverError>;

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<(), DriverError>;

    async fn inner_text(&self, selector: &str, timeout_ms: u64) -> Result<String, DriverError>;

    async fn is_visible(&self, selector: &str, timeout_ms: u64) -> Result<bool, DriverError>;

    /// PNG bytes of the page.
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, DriverError>;
}

/// Natural-language actions resolved by a visual-grounding agent.
#[async_trait]
pub trait AiAgent: Send + Sync {
    async fn ai_tap(&self, target: &str) -> Result<(), DriverError>;

    async fn ai_input(&self, value: &str, target: &str) -> Result<(), DriverError>;

    async fn ai_action(&self, instruction: &str) -> Result<(), DriverError>;

    async fn ai_assert(&self, assertion: &str) -> Result<(), DriverError>;

    async fn ai_wait_for(&self, condition: &str, timeout_ms: u64) -> Result<(), DriverError>;

    async fn ai_query(&self, query: &str) -> Result<serde_json::Value, DriverError>;
}

/// A live browser, context and page.
pub trait BrowserSession: Send + Sync {
    fn page(&self) -> &dyn PageDriver;

    fn agent(&self) -> &dyn AiAgent;

    /// Take every console message received so far, in arrival order.
    fn drain_console(&self) -> Vec<ConsoleMessage>;
}

/// Owns browser process lifecycle.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Launch `kind`, open a context with `viewport` and a page.
    ///
    /// When `auth_state` names an existing storage-state file the context is
    /// restored from it; a missing path or file yields a fresh context. On
    /// error, partially created resources are already torn down.
    async fn acquire(
        &self,
        kind: BrowserKind,
        viewport: Viewport,
        auth_state: Option<&Path>,
    ) -> Result<Box<dyn BrowserSession>, DriverError>;

    /// Close page and browser. Called exactly once per run; `None` when
    /// acquisition failed, in which case this is a no-op.
    async fn release(&self, session: Option<Box<dyn BrowserSession>>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_message_display() {
        let msg = ConsoleMessage::new("error", "Uncaught TypeError");
        assert_eq!(msg.to_string(), "[error] Uncaught TypeError");
    }

    #[test]
    fn test_console_message_wire_format() {
        let msg: ConsoleMessage =
            serde_json::from_str(r#"{"type": "warning", "text": "deprecated"}"#).unwrap();
        assert_eq!(msg.level, "warning");
        assert_eq!(msg.text, "deprecated");
    }
}
