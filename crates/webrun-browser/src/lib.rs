//! # webrun Browser
//!
//! Browser backend for the webrun engine. A Node.js child process runs
//! Playwright and the Midscene `PlaywrightAgent`; this crate talks to it
//! over JSON lines and exposes the engine's session traits on top.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐  JSON lines   ┌──────────────────┐
//! │ PlaywrightSession    │ ◄───────────► │ Node.js bridge   │
//! │ (PageDriver/AiAgent) │   + console   │ (playwright +    │
//! └──────────────────────┘    events     │  @midscene/web)  │
//!                                        └──────────────────┘
//!                                                 │
//!                                          ┌──────────────┐
//!                                          │   Browser    │
//!                                          └──────────────┘
//! ```

mod bridge;
mod bridge_script;
mod browser_api;
mod error;
mod install;
mod session;

pub use bridge::{PlaywrightBridge, PlaywrightBridgeConfig};
pub use error::PlaywrightError;
pub use install::{check_installation, InstallationReport};
pub use session::{PlaywrightSession, PlaywrightSessionManager};
