use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Builds the level filter for `config`. `RUST_LOG` wins when set.
pub fn env_filter(config: &Config) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("Invalid log level in config: {}", config.log_level))
}

/// Installs console and daily rolling file logging as configured.
///
/// Files go to `config.log_dir` as `<log_file_prefix>.<date>.log`; only the
/// newest `config.log_max_files` are kept. Fails if called twice.
pub fn init(config: &Config) -> Result<()> {
    if LOG_GUARD.get().is_some() {
        return Err(anyhow!("Logging already initialized"));
    }

    let env_filter = env_filter(config)?;

    std::fs::create_dir_all(&config.log_dir).with_context(|| {
        format!(
            "Failed to create log directory {}",
            config.log_dir.display()
        )
    })?;

    let file_appender = rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.log_file_prefix)
        .filename_suffix("log")
        .max_log_files(config.log_max_files)
        .build(&config.log_dir)
        .context("Failed to create log file appender")?;

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD
        .set(guard)
        .map_err(|_| anyhow!("Logging already initialized"))?;

    // warnings and errors also go to stderr so they survive a redirected stdout
    let console_writer = std::io::stdout.and(std::io::stderr.with_min_level(Level::WARN));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_writer(console_writer);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_thread_names(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Logger initialization failed")?;

    tracing::info!(
        level = %config.log_level,
        dir = %config.log_dir.display(),
        "logging initialized"
    );

    Ok(())
}
