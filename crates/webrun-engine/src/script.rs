//! Step script model.
//!
//! The wire format is the JSON produced by the script generator:
//!
//! ```json
//! {
//!   "browser": "chromium",
//!   "viewport": { "width": 1280, "height": 720 },
//!   "steps": [
//!     { "index": 1, "action": "goto", "description": "open home", "value": "https://x" },
//!     { "index": 2, "action": "aiTap", "description": "login button" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EngineError;

/// Per-step timeout used when a step does not carry one.
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;

/// Browser engine to launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl From<String> for BrowserKind {
    /// Unknown engine names fall back to Chromium.
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "firefox" => BrowserKind::Firefox,
            "webkit" => BrowserKind::Webkit,
            _ => BrowserKind::Chromium,
        }
    }
}

impl std::fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Browser viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// What a step does.
///
/// Every recognized tag has its own variant. `Unrecognized` is only produced
/// by [`ActionKind::from_tag`] for tags outside the table below, so the
/// dispatcher's match stays exhaustive when new kinds are added.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ActionKind {
    Goto,
    AiTap,
    AiInput,
    AiAction,
    AiAssert,
    AiWaitFor,
    AiQuery,
    Screenshot,
    WaitTime,
    Select,
    WaitForSelector,
    AssertText,
    AssertVisible,
    Unrecognized(String),
}

impl ActionKind {
    /// Map a wire tag to an action. `click` and `fill` are legacy aliases of
    /// the AI tap and input actions.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "goto" => ActionKind::Goto,
            "aiTap" | "click" => ActionKind::AiTap,
            "aiInput" | "fill" => ActionKind::AiInput,
            "aiAction" => ActionKind::AiAction,
            "aiAssert" => ActionKind::AiAssert,
            "aiWaitFor" => ActionKind::AiWaitFor,
            "aiQuery" => ActionKind::AiQuery,
            "screenshot" => ActionKind::Screenshot,
            "waitTime" => ActionKind::WaitTime,
            "select" => ActionKind::Select,
            "waitForSelector" => ActionKind::WaitForSelector,
            "assertText" => ActionKind::AssertText,
            "assertVisible" => ActionKind::AssertVisible,
            other => ActionKind::Unrecognized(other.to_string()),
        }
    }

    /// Canonical wire tag.
    pub fn tag(&self) -> &str {
        match self {
            ActionKind::Goto => "goto",
            ActionKind::AiTap => "aiTap",
            ActionKind::AiInput => "aiInput",
            ActionKind::AiAction => "aiAction",
            ActionKind::AiAssert => "aiAssert",
            ActionKind::AiWaitFor => "aiWaitFor",
            ActionKind::AiQuery => "aiQuery",
            ActionKind::Screenshot => "screenshot",
            ActionKind::WaitTime => "waitTime",
            ActionKind::Select => "select",
            ActionKind::WaitForSelector => "waitForSelector",
            ActionKind::AssertText => "assertText",
            ActionKind::AssertVisible => "assertVisible",
            ActionKind::Unrecognized(tag) => tag,
        }
    }

    /// Whether the action is resolved by the AI agent.
    pub fn is_ai(&self) -> bool {
        matches!(
            self,
            ActionKind::AiTap
                | ActionKind::AiInput
                | ActionKind::AiAction
                | ActionKind::AiAssert
                | ActionKind::AiWaitFor
                | ActionKind::AiQuery
        )
    }
}

impl From<String> for ActionKind {
    fn from(tag: String) -> Self {
        ActionKind::from_tag(&tag)
    }
}

impl Default for ActionKind {
    fn default() -> Self {
        ActionKind::Unrecognized(String::new())
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One instruction of a script.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Step {
    /// Ordinal used to name artifacts. Not necessarily contiguous.
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: i64,

    #[serde(default)]
    pub action: ActionKind,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default)]
    pub selector: Option<String>,

    #[serde(default, deserialize_with = "scalar_as_string")]
    pub value: Option<String>,

    #[serde(default, deserialize_with = "scalar_as_string")]
    pub expected: Option<String>,

    /// Milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub screenshot: Option<bool>,

    /// Milliseconds, for `waitTime`.
    #[serde(default)]
    pub duration: Option<u64>,
}

impl Step {
    pub fn new(index: i64, action: ActionKind) -> Self {
        Self {
            index,
            action,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn with_screenshot(mut self, enabled: bool) -> Self {
        self.screenshot = Some(enabled);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    /// Effective timeout; zero counts as unset.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_STEP_TIMEOUT_MS)
    }

    /// Whether the automatic post-step screenshot applies.
    pub fn wants_default_screenshot(&self) -> bool {
        self.screenshot != Some(false) && self.action != ActionKind::Screenshot
    }

    /// First non-empty of the given optional fields.
    pub(crate) fn first_of<'a>(candidates: &[Option<&'a str>]) -> &'a str {
        candidates
            .iter()
            .flatten()
            .find(|s| !s.is_empty())
            .copied()
            .unwrap_or("")
    }
}

/// A complete script.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub browser: BrowserKind,

    #[serde(default, deserialize_with = "null_as_default")]
    pub viewport: Viewport,

    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<Step>,
}

impl ScriptConfig {
    /// Parse the serialized script passed on the command line.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept strings, numbers and booleans for free-text fields.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
