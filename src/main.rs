//! webrun - AI-assisted browser test step executor
//!
//! Runs one test script against a real browser and prints the run result
//! between sentinel lines on stdout. Diagnostics go to stderr and to a
//! daily log file.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webrun_browser::{check_installation, PlaywrightSessionManager};
use webrun_config::{ConfigLoader, ConfigValidator, LoggingConfig, RunnerConfig};
use webrun_engine::{ActionDispatcher, RunOrchestrator, RunRequest, ScriptConfig};

use cli::{Cli, Command, RunArgs};

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let log_dir = logging.resolved_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("webrun")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes the file writer on exit.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        // stdout carries the result payload only
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .try_init()?;

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<RunnerConfig> {
    let mut config = ConfigLoader::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config {:?}", cli.config))?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    if cli.headless {
        config.browser.headless = true;
    }
    Ok(config)
}

fn validate(config: &RunnerConfig) -> anyhow::Result<()> {
    let validation = ConfigValidator::validate(config);
    for warning in &validation.warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }
    if !validation.is_valid() {
        let messages: Vec<String> = validation
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect();
        bail!("Invalid configuration: {}", messages.join("; "));
    }
    Ok(())
}

fn check_install(config: &RunnerConfig) -> anyhow::Result<ExitCode> {
    let report = check_installation(&config.browser);
    for problem in report.problems() {
        warn!("{}", problem);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.is_ready() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn execute(config: RunnerConfig, args: RunArgs) -> anyhow::Result<ExitCode> {
    let script = ScriptConfig::from_json(&args.script_json).context("Failed to parse script")?;

    info!(
        run_id = args.run_id,
        artifacts = ?args.artifacts_path,
        browser = %script.browser,
        headless = config.browser.headless,
        api_key = %config.ai.masked_api_key(),
        model = config.ai.model_name.as_deref().unwrap_or("<default>"),
        "Starting webrun"
    );
    debug!(expected_result = %args.expected_result, "Expected result");

    let sessions = Arc::new(PlaywrightSessionManager::new(&config.browser, &config.ai));
    let orchestrator = RunOrchestrator::new(
        sessions,
        ActionDispatcher::new(cli::dispatch_config(&config)),
    );

    let mut request = RunRequest::new(args.run_id, &args.artifacts_path);
    if let Some(auth_state) = args.auth_state {
        request = request.with_auth_state(auth_state);
    }

    let result = orchestrator.run(&script, &request).await;
    if let Some(failed) = result.first_failure() {
        warn!(
            index = failed.index(),
            error = failed.error_message().unwrap_or(""),
            "Run failed at step"
        );
    }

    println!("{}", cli::render_result(&result)?);
    Ok(ExitCode::from(cli::exit_code(&result)))
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli)?;

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("webrun: logging disabled: {:#}", e);
    }

    validate(&config)?;

    match cli.into_command() {
        Some(Command::CheckInstall) => check_install(&config),
        Some(Command::Run(args)) => execute(config, args).await,
        None => bail!("Missing required arguments"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = cli::parse_exit_code(&e);
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("webrun error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
