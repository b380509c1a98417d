//! In-memory session doubles for engine tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::DriverError;
use crate::script::{BrowserKind, Viewport};
use crate::session::{AiAgent, BrowserSession, ConsoleMessage, PageDriver, SessionManager};

/// Scripted page behavior plus a log of every call.
#[derive(Default)]
pub(crate) struct FakeBrowser {
    /// Selectors that exist, with their inner text.
    pub elements: Mutex<HashMap<String, String>>,
    /// Selectors whose waits never resolve.
    pub hanging: Mutex<HashSet<String>>,
    /// AI instructions that fail.
    pub ai_failures: Mutex<HashSet<String>>,
    /// How long an AI wait takes before answering.
    pub ai_latency: Mutex<Duration>,
    /// Selectors whose driver call panics.
    pub panicking: Mutex<HashSet<String>>,
    pub fail_screenshots: std::sync::atomic::AtomicBool,
    pub console: Mutex<Vec<ConsoleMessage>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_element(self: Arc<Self>, selector: &str, text: &str) -> Arc<Self> {
        self.elements
            .lock()
            .insert(selector.to_string(), text.to_string());
        self
    }

    pub fn with_hanging(self: Arc<Self>, selector: &str) -> Arc<Self> {
        self.hanging.lock().insert(selector.to_string());
        self
    }

    pub fn with_ai_failure(self: Arc<Self>, instruction: &str) -> Arc<Self> {
        self.ai_failures.lock().insert(instruction.to_string());
        self
    }

    pub fn with_ai_latency(self: Arc<Self>, latency: Duration) -> Arc<Self> {
        *self.ai_latency.lock() = latency;
        self
    }

    pub fn with_panic(self: Arc<Self>, selector: &str) -> Arc<Self> {
        self.panicking.lock().insert(selector.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn emit_console(&self, level: &str, text: &str) {
        self.console.lock().push(ConsoleMessage::new(level, text));
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    async fn resolve(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let panics = self.panicking.lock().contains(selector);
        let hangs = self.hanging.lock().contains(selector);
        if panics {
            panic!("driver crashed on {selector}");
        }
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(self.elements.lock().get(selector).cloned())
    }

    fn ai(&self, call: String, instruction: &str) -> Result<(), DriverError> {
        self.record(call);
        if self.ai_failures.lock().contains(instruction) {
            return Err(DriverError::Agent(format!(
                "Element not found: {}",
                instruction
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakeBrowser {
    async fn goto(&self, url: &str, timeout_ms: u64) -> Result<(), DriverError> {
        self.record(format!("goto:{url}:{timeout_ms}"));
        Ok(())
    }

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        _timeout_ms: u64,
    ) -> Result<(), DriverError> {
        self.record(format!("select:{selector}:{value}"));
        match self.resolve(selector).await? {
            Some(_) => Ok(()),
            None => Err(DriverError::Backend(format!("No element matches {selector}"))),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<(), DriverError> {
        self.record(format!("wait_for_selector:{selector}"));
        match self.resolve(selector).await? {
            Some(_) => Ok(()),
            None => Err(DriverError::Timeout(format!(
                "Timeout {timeout_ms}ms exceeded waiting for {selector}"
            ))),
        }
    }

    async fn inner_text(&self, selector: &str, timeout_ms: u64) -> Result<String, DriverError> {
        self.record(format!("inner_text:{selector}"));
        self.resolve(selector).await?.ok_or_else(|| {
            DriverError::Timeout(format!("Timeout {timeout_ms}ms exceeded waiting for {selector}"))
        })
    }

    async fn is_visible(&self, selector: &str, _timeout_ms: u64) -> Result<bool, DriverError> {
        self.record(format!("is_visible:{selector}"));
        Ok(self.resolve(selector).await?.is_some())
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, DriverError> {
        self.record(format!("screenshot:{full_page}"));
        if self.fail_screenshots.load(Ordering::SeqCst) {
            return Err(DriverError::Backend("Screenshot failed: page crashed".to_string()));
        }
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }
}

#[async_trait]
impl AiAgent for FakeBrowser {
    async fn ai_tap(&self, target: &str) -> Result<(), DriverError> {
        self.ai(format!("ai_tap:{target}"), target)
    }

    async fn ai_input(&self, value: &str, target: &str) -> Result<(), DriverError> {
        self.ai(format!("ai_input:{value}:{target}"), target)
    }

    async fn ai_action(&self, instruction: &str) -> Result<(), DriverError> {
        self.ai(format!("ai_action:{instruction}"), instruction)
    }

    async fn ai_assert(&self, assertion: &str) -> Result<(), DriverError> {
        self.ai(format!("ai_assert:{assertion}"), assertion)
    }

    async fn ai_wait_for(&self, condition: &str, timeout_ms: u64) -> Result<(), DriverError> {
        let latency = *self.ai_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.ai(format!("ai_wait_for:{condition}:{timeout_ms}"), condition)
    }

    async fn ai_query(&self, query: &str) -> Result<serde_json::Value, DriverError> {
        self.ai(format!("ai_query:{query}"), query)?;
        Ok(serde_json::json!({ "items": ["a", "b"] }))
    }
}

/// Session handle over a shared [`FakeBrowser`].
pub(crate) struct FakeSession {
    pub browser: Arc<FakeBrowser>,
}

impl BrowserSession for FakeSession {
    fn page(&self) -> &dyn PageDriver {
        self.browser.as_ref()
    }

    fn agent(&self) -> &dyn AiAgent {
        self.browser.as_ref()
    }

    fn drain_console(&self) -> Vec<ConsoleMessage> {
        std::mem::take(&mut *self.browser.console.lock())
    }
}

/// Session manager that records acquisitions and releases.
pub(crate) struct FakeSessionManager {
    pub browser: Arc<FakeBrowser>,
    pub fail_launch: bool,
    pub acquired: Mutex<Vec<(BrowserKind, Viewport, Option<PathBuf>)>>,
    pub releases: AtomicUsize,
    pub released_some: AtomicUsize,
}

impl FakeSessionManager {
    pub fn new(browser: Arc<FakeBrowser>) -> Self {
        Self {
            browser,
            fail_launch: false,
            acquired: Mutex::new(Vec::new()),
            releases: AtomicUsize::new(0),
            released_some: AtomicUsize::new(0),
        }
    }

    pub fn failing(browser: Arc<FakeBrowser>) -> Self {
        Self {
            fail_launch: true,
            ..Self::new(browser)
        }
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionManager for FakeSessionManager {
    async fn acquire(
        &self,
        kind: BrowserKind,
        viewport: Viewport,
        auth_state: Option<&Path>,
    ) -> Result<Box<dyn BrowserSession>, DriverError> {
        self.acquired
            .lock()
            .push((kind, viewport, auth_state.map(Path::to_path_buf)));
        if self.fail_launch {
            return Err(DriverError::Launch(format!("{} executable doesn't exist", kind)));
        }
        Ok(Box::new(FakeSession {
            browser: self.browser.clone(),
        }))
    }

    async fn release(&self, session: Option<Box<dyn BrowserSession>>) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if session.is_some() {
            self.released_some.fetch_add(1, Ordering::SeqCst);
        }
    }
}
