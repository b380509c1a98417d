//! # webrun Engine
//!
//! Executes a parsed step script against a browser session and builds the
//! run report.
//!
//! ```text
//! ScriptConfig ──► RunOrchestrator ──► SessionManager::acquire
//!                        │
//!                        ├─► ActionDispatcher::execute (per step)
//!                        │        ├─► PageDriver / AiAgent
//!                        │        └─► ArtifactManager (screenshots)
//!                        │
//!                        └─► console.log flush, SessionManager::release
//! ```
//!
//! Browser backends implement the traits in [`session`]; this crate never
//! talks to a browser directly.

pub mod artifacts;
pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod result;
pub mod script;
pub mod session;

#[cfg(test)]
mod fakes;

pub use artifacts::{relativize, ArtifactLayout, ArtifactManager};
pub use dispatcher::{ActionDispatcher, DispatchConfig};
pub use error::{ArtifactError, DriverError, EngineError};
pub use orchestrator::{RunOrchestrator, RunRequest};
pub use result::{PendingStep, RunResult, StepResult, StepStatus};
pub use script::{ActionKind, BrowserKind, ScriptConfig, Step, Viewport};
pub use session::{AiAgent, BrowserSession, ConsoleMessage, PageDriver, SessionManager};
