//! Browser, page and agent methods for PlaywrightBridge.
//!
//! A cross-file impl block: one bridge hosts one browser, one context, one
//! page and one agent, so methods carry no handles.

use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use webrun_engine::Viewport;

use crate::bridge::PlaywrightBridge;
use crate::error::PlaywrightError;

impl PlaywrightBridge {
    // ============================================================================
    // Browser Methods
    // ============================================================================

    /// Launch `browser` (`chromium`, `firefox` or `webkit`).
    pub async fn launch_browser(
        &self,
        browser: &str,
        headless: bool,
        args: &[String],
    ) -> Result<(), PlaywrightError> {
        self.call(
            "launchBrowser",
            serde_json::json!({
                "browser": browser,
                "headless": headless,
                "args": args
            }),
        )
        .await
        .map_err(|e| match e {
            PlaywrightError::BridgeError(msg) => PlaywrightError::BrowserLaunchFailed(msg),
            other => other,
        })?;
        Ok(())
    }

    /// Open a context, restoring cookies and storage from `storage_state`.
    pub async fn new_context(
        &self,
        viewport: Viewport,
        storage_state: Option<&Path>,
    ) -> Result<(), PlaywrightError> {
        self.call(
            "newContext",
            serde_json::json!({
                "viewport": { "width": viewport.width, "height": viewport.height },
                "storageState": storage_state.map(|p| p.to_string_lossy().to_string())
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn new_page(&self) -> Result<(), PlaywrightError> {
        self.call("newPage", serde_json::json!({})).await?;
        Ok(())
    }

    /// Close the context and browser.
    pub async fn close_browser(&self) -> Result<(), PlaywrightError> {
        self.call("closeBrowser", serde_json::json!({})).await?;
        Ok(())
    }

    // ============================================================================
    // Page Methods
    // ============================================================================

    /// Navigate and wait for network idle.
    pub async fn goto(&self, url: &str, timeout_ms: u64) -> Result<(), PlaywrightError> {
        self.call_with_timeout(
            "goto",
            serde_json::json!({ "url": url, "timeout": timeout_ms }),
            self.page_timeout(timeout_ms),
        )
        .await?;
        Ok(())
    }

    pub async fn select_option(
        &self,
        selector: &str,
        value: &str,
        timeout_ms: u64,
    ) -> Result<(), PlaywrightError> {
        self.call_with_timeout(
            "selectOption",
            serde_json::json!({ "selector": selector, "value": value, "timeout": timeout_ms }),
            self.page_timeout(timeout_ms),
        )
        .await?;
        Ok(())
    }

    pub async fn wait_for_selector(
        &self,
        selector: &str,
        timeout_ms: u64,
    ) -> Result<(), PlaywrightError> {
        self.call_with_timeout(
            "waitForSelector",
            serde_json::json!({ "selector": selector, "timeout": timeout_ms }),
            self.page_timeout(timeout_ms),
        )
        .await?;
        Ok(())
    }

    pub async fn inner_text(&self, selector: &str, timeout_ms: u64) -> Result<String, PlaywrightError> {
        let result = self
            .call_with_timeout(
                "innerText",
                serde_json::json!({ "selector": selector, "timeout": timeout_ms }),
                self.page_timeout(timeout_ms),
            )
            .await?;

        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| PlaywrightError::CommunicationError("Invalid innerText response".to_string()))
    }

    pub async fn is_visible(&self, selector: &str, timeout_ms: u64) -> Result<bool, PlaywrightError> {
        let result = self
            .call_with_timeout(
                "isVisible",
                serde_json::json!({ "selector": selector, "timeout": timeout_ms }),
                self.page_timeout(timeout_ms),
            )
            .await?;

        result
            .as_bool()
            .ok_or_else(|| PlaywrightError::CommunicationError("Invalid isVisible response".to_string()))
    }

    /// PNG screenshot, decoded from the bridge's base64 payload.
    pub async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, PlaywrightError> {
        let result = self
            .call("screenshot", serde_json::json!({ "fullPage": full_page }))
            .await
            .map_err(|e| match e {
                PlaywrightError::BridgeError(msg) => PlaywrightError::ScreenshotFailed(msg),
                other => other,
            })?;

        let encoded = result
            .as_str()
            .ok_or_else(|| PlaywrightError::ScreenshotFailed("Invalid response".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| PlaywrightError::ScreenshotFailed(format!("Invalid base64: {}", e)))
    }

    pub async fn close_page(&self) -> Result<(), PlaywrightError> {
        self.call("closePage", serde_json::json!({})).await?;
        Ok(())
    }

    // ============================================================================
    // AI Agent Methods
    // ============================================================================

    /// Attach a Midscene agent to the open page.
    pub async fn create_agent(&self) -> Result<(), PlaywrightError> {
        self.call("createAgent", serde_json::json!({})).await?;
        Ok(())
    }

    pub async fn ai_tap(&self, target: &str, timeout: Duration) -> Result<(), PlaywrightError> {
        self.call_with_timeout("aiTap", serde_json::json!({ "target": target }), timeout)
            .await?;
        Ok(())
    }

    pub async fn ai_input(
        &self,
        value: &str,
        target: &str,
        timeout: Duration,
    ) -> Result<(), PlaywrightError> {
        self.call_with_timeout(
            "aiInput",
            serde_json::json!({ "value": value, "target": target }),
            timeout,
        )
        .await?;
        Ok(())
    }

    pub async fn ai_action(&self, instruction: &str, timeout: Duration) -> Result<(), PlaywrightError> {
        self.call_with_timeout(
            "aiAction",
            serde_json::json!({ "instruction": instruction }),
            timeout,
        )
        .await?;
        Ok(())
    }

    pub async fn ai_assert(&self, assertion: &str, timeout: Duration) -> Result<(), PlaywrightError> {
        self.call_with_timeout(
            "aiAssert",
            serde_json::json!({ "assertion": assertion }),
            timeout,
        )
        .await?;
        Ok(())
    }

    /// `timeout_ms` is the agent's own polling budget; `timeout` bounds the
    /// bridge call.
    pub async fn ai_wait_for(
        &self,
        condition: &str,
        timeout_ms: u64,
        timeout: Duration,
    ) -> Result<(), PlaywrightError> {
        self.call_with_timeout(
            "aiWaitFor",
            serde_json::json!({ "condition": condition, "timeoutMs": timeout_ms }),
            timeout,
        )
        .await?;
        Ok(())
    }

    pub async fn ai_query(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value, PlaywrightError> {
        self.call_with_timeout("aiQuery", serde_json::json!({ "query": query }), timeout)
            .await
    }

    /// Bridge-side bound for a page call: Playwright's own timeout plus the
    /// configured response margin.
    fn page_timeout(&self, timeout_ms: u64) -> Duration {
        Duration::from_millis(timeout_ms.saturating_add(self.config.response_timeout_ms))
    }
}
