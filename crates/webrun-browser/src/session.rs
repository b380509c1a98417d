//! Engine session traits over the Playwright bridge.
//!
//! One [`PlaywrightSessionManager`] owns at most one live bridge. `acquire`
//! brings up bridge, browser, context, page and agent in that order; any
//! failure tears down what was started. `release` closes page, then
//! browser, then the bridge.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};
use webrun_config::{AiConfig, BrowserConfig};
use webrun_engine::{
    AiAgent, BrowserKind, BrowserSession, ConsoleMessage, DriverError, PageDriver, SessionManager,
    Viewport,
};

use crate::bridge::{PlaywrightBridge, PlaywrightBridgeConfig};
use crate::error::PlaywrightError;

/// A live page plus its Midscene agent.
pub struct PlaywrightSession {
    bridge: Arc<PlaywrightBridge>,
    ai_timeout: Duration,
}

impl PlaywrightSession {
    pub fn new(bridge: Arc<PlaywrightBridge>, ai_timeout: Duration) -> Self {
        Self { bridge, ai_timeout }
    }
}

/// Agent failures keep the agent's own message.
fn agent_error(e: PlaywrightError) -> DriverError {
    match e {
        PlaywrightError::BridgeError(msg) => DriverError::Agent(msg),
        other => other.into(),
    }
}

#[async_trait]
impl PageDriver for PlaywrightSession {
    async fn goto(&self, url: &str, timeout_ms: u64) -> Result<(), DriverError> {
        Ok(self.bridge.goto(url, timeout_ms).await?)
    }

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        timeout_ms: u64,
    ) -> Result<(), DriverError> {
        Ok(self.bridge.select_option(selector, value, timeout_ms).await?)
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<(), DriverError> {
        Ok(self.bridge.wait_for_selector(selector, timeout_ms).await?)
    }

    async fn inner_text(&self, selector: &str, timeout_ms: u64) -> Result<String, DriverError> {
        Ok(self.bridge.inner_text(selector, timeout_ms).await?)
    }

    async fn is_visible(&self, selector: &str, timeout_ms: u64) -> Result<bool, DriverError> {
        Ok(self.bridge.is_visible(selector, timeout_ms).await?)
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, DriverError> {
        Ok(self.bridge.screenshot(full_page).await?)
    }
}

#[async_trait]
impl AiAgent for PlaywrightSession {
    async fn ai_tap(&self, target: &str) -> Result<(), DriverError> {
        self.bridge
            .ai_tap(target, self.ai_timeout)
            .await
            .map_err(agent_error)
    }

    async fn ai_input(&self, value: &str, target: &str) -> Result<(), DriverError> {
        self.bridge
            .ai_input(value, target, self.ai_timeout)
            .await
            .map_err(agent_error)
    }

    async fn ai_action(&self, instruction: &str) -> Result<(), DriverError> {
        self.bridge
            .ai_action(instruction, self.ai_timeout)
            .await
            .map_err(agent_error)
    }

    async fn ai_assert(&self, assertion: &str) -> Result<(), DriverError> {
        self.bridge
            .ai_assert(assertion, self.ai_timeout)
            .await
            .map_err(agent_error)
    }

    async fn ai_wait_for(&self, condition: &str, timeout_ms: u64) -> Result<(), DriverError> {
        let bound = self.ai_timeout.max(Duration::from_millis(timeout_ms));
        self.bridge
            .ai_wait_for(condition, timeout_ms, bound)
            .await
            .map_err(agent_error)
    }

    async fn ai_query(&self, query: &str) -> Result<serde_json::Value, DriverError> {
        self.bridge
            .ai_query(query, self.ai_timeout)
            .await
            .map_err(agent_error)
    }
}

impl BrowserSession for PlaywrightSession {
    fn page(&self) -> &dyn PageDriver {
        self
    }

    fn agent(&self) -> &dyn AiAgent {
        self
    }

    fn drain_console(&self) -> Vec<ConsoleMessage> {
        self.bridge.drain_console()
    }
}

/// Launches and tears down Playwright sessions.
pub struct PlaywrightSessionManager {
    bridge_config: PlaywrightBridgeConfig,
    headless: bool,
    browser_args: Vec<String>,
    ai_timeout: Duration,
    active: Mutex<Option<Arc<PlaywrightBridge>>>,
}

impl PlaywrightSessionManager {
    pub fn new(browser: &BrowserConfig, ai: &AiConfig) -> Self {
        Self {
            bridge_config: PlaywrightBridgeConfig::from_config(browser, ai),
            headless: browser.headless,
            browser_args: browser.args.clone(),
            ai_timeout: Duration::from_millis(ai.action_timeout_ms),
            active: Mutex::new(None),
        }
    }

    pub fn bridge_config(&self) -> &PlaywrightBridgeConfig {
        &self.bridge_config
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    /// Whether a session is currently open.
    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    async fn open(
        &self,
        bridge: &PlaywrightBridge,
        kind: BrowserKind,
        viewport: Viewport,
        auth_state: Option<&Path>,
    ) -> Result<(), PlaywrightError> {
        bridge.start().await?;

        info!(browser = %kind, headless = self.headless, "Launching browser");
        bridge
            .launch_browser(kind.as_str(), self.headless, &self.browser_args)
            .await?;

        let storage_state = usable_auth_state(auth_state);
        match (auth_state, storage_state) {
            (_, Some(path)) => info!("Restoring auth state from {:?}", path),
            (Some(path), None) => info!("Auth state {:?} not found, using a fresh context", path),
            (None, None) => {}
        }
        bridge.new_context(viewport, storage_state).await?;
        bridge.new_page().await?;
        bridge.create_agent().await?;
        Ok(())
    }
}

/// The storage-state file to restore, if it exists.
pub(crate) fn usable_auth_state(auth_state: Option<&Path>) -> Option<&Path> {
    auth_state.filter(|path| path.is_file())
}

#[async_trait]
impl SessionManager for PlaywrightSessionManager {
    async fn acquire(
        &self,
        kind: BrowserKind,
        viewport: Viewport,
        auth_state: Option<&Path>,
    ) -> Result<Box<dyn BrowserSession>, DriverError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(PlaywrightError::SessionActive.into());
        }

        let bridge = Arc::new(PlaywrightBridge::new(self.bridge_config.clone()));
        if let Err(e) = self.open(&bridge, kind, viewport, auth_state).await {
            warn!(error = %e, "Session start failed, stopping bridge");
            bridge.stop().await;
            return Err(e.into());
        }

        *active = Some(bridge.clone());
        Ok(Box::new(PlaywrightSession::new(bridge, self.ai_timeout)))
    }

    async fn release(&self, session: Option<Box<dyn BrowserSession>>) {
        drop(session);

        let Some(bridge) = self.active.lock().await.take() else {
            return;
        };

        if let Err(e) = bridge.close_page().await {
            warn!(error = %e, "Failed to close page");
        }
        if let Err(e) = bridge.close_browser().await {
            warn!(error = %e, "Failed to close browser");
        }
        bridge.stop().await;
        info!("Browser session released");
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
