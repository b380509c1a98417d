//! CLI definitions for webrun.

use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use webrun_config::RunnerConfig;
use webrun_engine::{DispatchConfig, RunResult};

/// Sentinel lines around the result payload on stdout.
pub(crate) const RESULT_START: &str = "===MIDSCENE_RESULT_START===";
pub(crate) const RESULT_END: &str = "===MIDSCENE_RESULT_END===";

/// webrun CLI.
#[derive(Parser, Debug)]
#[command(name = "webrun")]
#[command(about = "Execute an AI-assisted browser test script and report the result")]
#[command(version)]
pub(crate) struct Cli {
    /// Script configuration as JSON
    #[arg(required_unless_present = "check_install")]
    pub script_json: Option<String>,

    /// Numeric run identifier, used to name the artifact directory
    #[arg(required_unless_present = "check_install")]
    pub run_id: Option<u64>,

    /// Base directory for run artifacts
    #[arg(required_unless_present = "check_install")]
    pub artifacts_path: Option<PathBuf>,

    /// Expected outcome description (informational)
    #[arg(required_unless_present = "check_install")]
    pub expected_result: Option<String>,

    /// Persisted browser storage state to start authenticated
    pub auth_state_path: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "config/webrun.toml")]
    pub config: PathBuf,

    /// Force headless browser
    #[arg(long)]
    pub headless: bool,

    /// Report whether Node.js, Playwright and Midscene are installed, then exit
    #[arg(long, conflicts_with_all = ["script_json", "run_id", "artifacts_path", "expected_result", "auth_state_path"])]
    pub check_install: bool,
}

/// What the invocation asks for.
#[derive(Debug)]
pub(crate) enum Command {
    CheckInstall,
    Run(RunArgs),
}

#[derive(Debug)]
pub(crate) struct RunArgs {
    pub script_json: String,
    pub run_id: u64,
    pub artifacts_path: PathBuf,
    pub expected_result: String,
    pub auth_state: Option<PathBuf>,
}

impl Cli {
    /// `None` when a required positional is missing.
    pub fn into_command(self) -> Option<Command> {
        if self.check_install {
            return Some(Command::CheckInstall);
        }

        Some(Command::Run(RunArgs {
            script_json: self.script_json?,
            run_id: self.run_id?,
            artifacts_path: self.artifacts_path?,
            expected_result: self.expected_result?,
            auth_state: self
                .auth_state_path
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }))
    }
}

/// Help and version requests succeed; every other parse error is a usage
/// fault.
pub(crate) fn parse_exit_code(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
        _ => 1,
    }
}

pub(crate) fn dispatch_config(config: &RunnerConfig) -> DispatchConfig {
    DispatchConfig {
        settle_delay: Duration::from_millis(config.run.settle_delay_ms),
        default_wait: Duration::from_millis(config.run.default_wait_ms),
        timeout_grace: Duration::from_millis(config.run.timeout_grace_ms),
        ai_timeout: Duration::from_millis(config.ai.action_timeout_ms),
    }
}

/// The stdout payload: pretty JSON between the sentinel lines.
pub(crate) fn render_result(result: &RunResult) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string_pretty(result)?;
    Ok(format!("{}\n{}\n{}", RESULT_START, json, RESULT_END))
}

pub(crate) fn exit_code(result: &RunResult) -> u8 {
    if result.success() { 0 } else { 1 }
}
