//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment variable carrying the model API key.
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable carrying the model API base URL.
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
/// Environment variable naming the vision model.
pub const ENV_MODEL_NAME: &str = "MIDSCENE_MODEL_NAME";
/// Environment variable switching the agent to Qwen-VL grounding.
pub const ENV_USE_QWEN_VL: &str = "MIDSCENE_USE_QWEN_VL";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RunnerConfig {
    /// Overlay the recognized AI environment variables on top of file values.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
            self.ai.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.ai.base_url = Some(url);
        }
        if let Some(model) = lookup(ENV_MODEL_NAME).filter(|v| !v.is_empty()) {
            self.ai.model_name = Some(model);
        }
        if let Some(flag) = lookup(ENV_USE_QWEN_VL) {
            self.ai.use_qwen_vl = matches!(flag.trim(), "1" | "true" | "TRUE" | "yes");
        }
    }
}

/// Browser and bridge process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Launch the browser without a visible window.
    #[serde(default)]
    pub headless: bool,

    /// Path to the Node.js executable. Searched on PATH when unset.
    #[serde(default)]
    pub node_path: Option<PathBuf>,

    /// Use this bridge script instead of the embedded one.
    #[serde(default)]
    pub bridge_script_path: Option<PathBuf>,

    /// Directory the bridge runs in; `playwright` and `@midscene/web`
    /// are resolved from its `node_modules`.
    #[serde(default)]
    pub bridge_workdir: Option<PathBuf>,

    /// Timeout for bridge housekeeping calls (launch, close, screenshot).
    #[serde(default = "default_response_timeout")]
    pub response_timeout_ms: u64,

    /// Extra browser launch arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            node_path: None,
            bridge_script_path: None,
            bridge_workdir: None,
            response_timeout_ms: default_response_timeout(),
            args: Vec::new(),
        }
    }
}

fn default_response_timeout() -> u64 {
    30_000
}

/// AI agent configuration, handed to the bridge process as environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub model_name: Option<String>,

    #[serde(default)]
    pub use_qwen_vl: bool,

    /// Upper bound for a single AI call (tap, input, assert, ...).
    #[serde(default = "default_action_timeout")]
    pub action_timeout_ms: u64,

    /// Additional variables passed through verbatim.
    #[serde(default)]
    pub extra_env: HashMap<String, String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model_name: None,
            use_qwen_vl: false,
            action_timeout_ms: default_action_timeout(),
            extra_env: HashMap::new(),
        }
    }
}

fn default_action_timeout() -> u64 {
    300_000
}

impl AiConfig {
    /// The environment the AI agent expects, as key/value pairs.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars = Vec::new();
        if let Some(ref key) = self.api_key {
            vars.push((ENV_API_KEY.to_string(), key.clone()));
        }
        if let Some(ref url) = self.base_url {
            vars.push((ENV_BASE_URL.to_string(), url.clone()));
        }
        if let Some(ref model) = self.model_name {
            vars.push((ENV_MODEL_NAME.to_string(), model.clone()));
        }
        if self.use_qwen_vl {
            vars.push((ENV_USE_QWEN_VL.to_string(), "1".to_string()));
        }
        let mut extra: Vec<_> = self
            .extra_env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        extra.sort();
        vars.extend(extra);
        vars
    }

    /// API key safe for logs.
    pub fn masked_api_key(&self) -> String {
        match self.api_key.as_deref() {
            None | Some("") => "<unset>".to_string(),
            Some(key) => {
                let prefix: String = key.chars().take(6).collect();
                format!("{}...", prefix)
            }
        }
    }
}

/// Step execution tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Pause before the automatic post-step screenshot.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Duration of a `waitTime` step without an explicit `duration`.
    #[serde(default = "default_wait")]
    pub default_wait_ms: u64,

    /// Slack added on top of a step's own timeout before the engine gives up.
    #[serde(default = "default_grace")]
    pub timeout_grace_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            default_wait_ms: default_wait(),
            timeout_grace_ms: default_grace(),
        }
    }
}

fn default_settle_delay() -> u64 {
    3_000
}

fn default_wait() -> u64 {
    1_000
}

fn default_grace() -> u64 {
    1_000
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Log directory with `~` expanded.
    pub fn resolved_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.dir).to_string())
    }
}

fn default_log_dir() -> String {
    dirs::home_dir()
        .map(|h| h.join(".webrun").join("logs").to_string_lossy().to_string())
        .unwrap_or_else(|| ".webrun/logs".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert!(!config.browser.headless);
        assert_eq!(config.browser.response_timeout_ms, 30_000);
        assert_eq!(config.run.settle_delay_ms, 3_000);
        assert_eq!(config.run.default_wait_ms, 1_000);
        assert_eq!(config.ai.action_timeout_ms, 300_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RunnerConfig::default();
        config.apply_env_overrides(|key| match key {
            ENV_API_KEY => Some("sk-abcdef123456".to_string()),
            ENV_MODEL_NAME => Some("qwen-vl-max".to_string()),
            ENV_USE_QWEN_VL => Some("1".to_string()),
            _ => None,
        });
        assert_eq!(config.ai.api_key.as_deref(), Some("sk-abcdef123456"));
        assert_eq!(config.ai.model_name.as_deref(), Some("qwen-vl-max"));
        assert!(config.ai.use_qwen_vl);
        assert!(config.ai.base_url.is_none());
    }

    #[test]
    fn test_empty_env_does_not_clear_file_value() {
        let mut config = RunnerConfig::default();
        config.ai.api_key = Some("from-file".to_string());
        config.apply_env_overrides(|key| (key == ENV_API_KEY).then(String::new));
        assert_eq!(config.ai.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_env_vars_order() {
        let mut ai = AiConfig {
            api_key: Some("k".to_string()),
            base_url: Some("https://llm.local/v1".to_string()),
            use_qwen_vl: true,
            ..Default::default()
        };
        ai.extra_env.insert("MIDSCENE_DEBUG".to_string(), "1".to_string());

        let keys: Vec<_> = ai.env_vars().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![ENV_API_KEY, ENV_BASE_URL, ENV_USE_QWEN_VL, "MIDSCENE_DEBUG"]
        );
    }

    #[test]
    fn test_masked_api_key() {
        let mut ai = AiConfig::default();
        assert_eq!(ai.masked_api_key(), "<unset>");
        ai.api_key = Some("sk-1234567890".to_string());
        assert_eq!(ai.masked_api_key(), "sk-123...");
    }

    #[test]
    fn test_resolved_log_dir_expands_tilde() {
        let logging = LoggingConfig {
            dir: "~/webrun-logs".to_string(),
            level: "debug".to_string(),
        };
        let dir = logging.resolved_dir();
        assert!(!dir.to_string_lossy().starts_with('~'));
        assert!(dir.ends_with("webrun-logs"));
    }
}
