//! Node.js Playwright bridge.
//!
//! Manages the Node.js child process that hosts Playwright and the Midscene
//! agent. Requests and responses are JSON lines over stdin/stdout; the
//! bridge also pushes unsolicited `console` events that land in a shared
//! sink until the session drains them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use webrun_config::{AiConfig, BrowserConfig};
use webrun_engine::ConsoleMessage;

use crate::error::PlaywrightError;

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct PlaywrightBridgeConfig {
    /// Path to Node.js executable.
    pub node_path: Option<PathBuf>,
    /// Path to the bridge script (embedded script written to temp if None).
    pub bridge_script_path: Option<PathBuf>,
    /// Directory the bridge runs in; `playwright` and `@midscene/web` are
    /// resolved from its `node_modules`.
    pub working_dir: Option<PathBuf>,
    /// Timeout for ordinary bridge responses in milliseconds.
    pub response_timeout_ms: u64,
    /// Extra environment for the child process.
    pub env: Vec<(String, String)>,
}

impl Default for PlaywrightBridgeConfig {
    fn default() -> Self {
        Self {
            node_path: None,
            bridge_script_path: None,
            working_dir: None,
            response_timeout_ms: 30000,
            env: Vec::new(),
        }
    }
}

impl PlaywrightBridgeConfig {
    pub fn from_config(browser: &BrowserConfig, ai: &AiConfig) -> Self {
        Self {
            node_path: browser.node_path.clone(),
            bridge_script_path: browser.bridge_script_path.clone(),
            working_dir: browser.bridge_workdir.clone(),
            response_timeout_ms: browser.response_timeout_ms,
            env: ai.env_vars(),
        }
    }
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BridgeResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<BridgeErrorResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BridgeErrorResponse {
    pub message: String,
}

/// One stdout line from the bridge.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum BridgeMessage {
    Event {
        event: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    Response(BridgeResponse),
}

pub(crate) type PendingRequests = HashMap<u64, oneshot::Sender<Result<serde_json::Value, PlaywrightError>>>;
pub(crate) type ConsoleSink = Arc<parking_lot::Mutex<Vec<ConsoleMessage>>>;

/// Drops the pending entry of one request.
pub(crate) struct PendingGuard {
    pub(crate) id: u64,
    pub(crate) pending: Arc<RwLock<PendingRequests>>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.try_write() {
            pending.remove(&self.id);
            return;
        }
        // Lock is busy; finish the removal on the runtime.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let pending = self.pending.clone();
            let id = self.id;
            handle.spawn(async move {
                pending.write().await.remove(&id);
            });
        }
    }
}

/// Node.js Playwright bridge.
pub struct PlaywrightBridge {
    pub(crate) config: PlaywrightBridgeConfig,
    process: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    request_id: AtomicU64,
    pending_requests: Arc<RwLock<PendingRequests>>,
    console: ConsoleSink,
    bridge_script: &'static str,
}

impl PlaywrightBridge {
    pub fn new(config: PlaywrightBridgeConfig) -> Self {
        Self {
            config,
            process: Mutex::new(None),
            stdin: Mutex::new(None),
            request_id: AtomicU64::new(1),
            pending_requests: Arc::new(RwLock::new(HashMap::new())),
            console: Arc::new(parking_lot::Mutex::new(Vec::new())),
            bridge_script: crate::bridge_script::BRIDGE_SCRIPT,
        }
    }

    /// Start the bridge process and wait for its `pong`.
    pub async fn start(&self) -> Result<(), PlaywrightError> {
        let node_path = find_node(self.config.node_path.as_ref())?;
        let script_path = self.script_path().await?;

        info!("Starting Playwright bridge at {:?}", script_path);

        let mut command = Command::new(&node_path);
        command
            .arg(&script_path)
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| PlaywrightError::BridgeStartFailed(e.to_string()))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            PlaywrightError::BridgeStartFailed("Failed to get stdin".to_string())
        })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let reader = BufReader::new(stderr);
                let mut lines = reader.lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[Playwright Bridge] {}", line);
                }
            });
        }

        let stdout = child.stdout.take().ok_or_else(|| {
            PlaywrightError::BridgeStartFailed("Failed to get stdout".to_string())
        })?;

        let pending = self.pending_requests.clone();
        let console = self.console.clone();
        tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                debug!("Bridge message: {}", truncate(&line, 200));

                match serde_json::from_str::<BridgeMessage>(&line) {
                    Ok(BridgeMessage::Event { event, params }) => {
                        route_event(&console, &event, params);
                    }
                    Ok(BridgeMessage::Response(response)) => {
                        let mut pending = pending.write().await;
                        if let Some(sender) = pending.remove(&response.id) {
                            let _ = sender.send(into_result(response));
                        }
                    }
                    Err(e) => {
                        error!("Failed to parse bridge message: {} - {}", e, line);
                    }
                }
            }

            // Stdout closed: nobody will answer what is still in flight.
            let mut pending = pending.write().await;
            for (_, sender) in pending.drain() {
                let _ = sender.send(Err(PlaywrightError::BridgeDied(
                    "stdout closed".to_string(),
                )));
            }
        });

        *self.process.lock().await = Some(child);
        *self.stdin.lock().await = Some(stdin);

        let ready = self.call("ping", serde_json::json!({})).await?;
        if ready.as_str() != Some("pong") {
            return Err(PlaywrightError::BridgeStartFailed(
                "Bridge did not respond correctly to ping".to_string(),
            ));
        }

        info!("Playwright bridge started");
        Ok(())
    }

    /// Stop the bridge process. Safe to call when it never started.
    pub async fn stop(&self) {
        if self.stdin.lock().await.is_some() {
            let _ = self
                .call_with_timeout("shutdown", serde_json::json!({}), Duration::from_secs(5))
                .await;
        }
        self.stdin.lock().await.take();

        if let Some(mut child) = self.process.lock().await.take() {
            let _ = child.kill().await;
        }

        info!("Playwright bridge stopped");
    }

    /// Call a bridge method with the configured response timeout.
    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, PlaywrightError> {
        let timeout = Duration::from_millis(self.config.response_timeout_ms);
        self.call_with_timeout(method, params, timeout).await
    }

    /// Call a bridge method, waiting at most `timeout` for the response.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, PlaywrightError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request_json = serde_json::to_string(&BridgeRequest { id, method, params })?;

        debug!("Bridge request: {}", truncate(&request_json, 200));

        let (tx, rx) = oneshot::channel();
        self.pending_requests.write().await.insert(id, tx);
        // Removes the entry however this call ends, including when the
        // caller drops the future before a response arrives.
        let _pending = PendingGuard {
            id,
            pending: self.pending_requests.clone(),
        };

        self.send_line(&request_json).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PlaywrightError::CommunicationError(
                "Response channel closed".to_string(),
            )),
            Err(_) => Err(PlaywrightError::Timeout(format!(
                "Method {} timed out after {}ms",
                method,
                timeout.as_millis()
            ))),
        }
    }

    /// Take every console message received so far.
    pub fn drain_console(&self) -> Vec<ConsoleMessage> {
        std::mem::take(&mut *self.console.lock())
    }

    async fn send_line(&self, line: &str) -> Result<(), PlaywrightError> {
        let mut stdin_guard = self.stdin.lock().await;
        let stdin = stdin_guard.as_mut().ok_or(PlaywrightError::NotInitialized)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn script_path(&self) -> Result<PathBuf, PlaywrightError> {
        if let Some(ref path) = self.config.bridge_script_path {
            return Ok(path.clone());
        }

        let path = std::env::temp_dir().join(format!(
            "webrun_playwright_bridge_{}.js",
            std::process::id()
        ));
        tokio::fs::write(&path, self.bridge_script).await.map_err(|e| {
            PlaywrightError::BridgeStartFailed(format!("Failed to write bridge script: {}", e))
        })?;
        Ok(path)
    }
}

pub(crate) fn route_event(console: &ConsoleSink, event: &str, params: serde_json::Value) {
    match event {
        "console" => match serde_json::from_value::<ConsoleMessage>(params) {
            Ok(message) => console.lock().push(message),
            Err(e) => warn!("Malformed console event: {}", e),
        },
        other => debug!("Ignoring bridge event '{}'", other),
    }
}

pub(crate) fn into_result(response: BridgeResponse) -> Result<serde_json::Value, PlaywrightError> {
    match response.error {
        Some(err) => Err(PlaywrightError::BridgeError(err.message)),
        None => Ok(response.result.unwrap_or(serde_json::Value::Null)),
    }
}

/// Find the Node.js executable, preferring the configured path.
pub(crate) fn find_node(configured: Option<&PathBuf>) -> Result<PathBuf, PlaywrightError> {
    if let Some(path) = configured {
        return Ok(path.clone());
    }

    let candidates = [
        "node",
        "/usr/local/bin/node",
        "/usr/bin/node",
        "/opt/homebrew/bin/node",
    ];

    candidates
        .iter()
        .find_map(|candidate| which::which(candidate).ok())
        .ok_or(PlaywrightError::NodeNotFound)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
