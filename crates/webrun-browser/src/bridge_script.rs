//! Embedded bridge JavaScript.
//!
//! Loaded with `include_str!` so the binary carries the script and writes it
//! out at bridge start.

pub(crate) const BRIDGE_SCRIPT: &str = include_str!("bridge_script.js");
