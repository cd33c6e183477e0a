use std::backtrace::Backtrace;

use anyhow::Context;
use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt::{self, writer::MakeWriterExt},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Keeps the background log writers alive. Dropping it flushes and stops them.
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Console output plus two daily-rotated JSON files: `app.*.log` with every
/// event and `error.*.log` with errors only.
pub fn init(config: &LoggingConfig) -> anyhow::Result<LogGuards> {
    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("create log directory {}", config.directory))?;

    let (app_writer, app_guard) = tracing_appender::non_blocking(rolling_file(config, "app")?);
    let (error_writer, error_guard) =
        tracing_appender::non_blocking(rolling_file(config, "error")?);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(&config.level)))
        .context("build log filter")?;

    let json_console = config.json_console;
    tracing_subscriber::registry()
        .with(filter)
        .with(json_console.then(|| fmt::layer().json().with_target(false)))
        .with((!json_console).then(|| fmt::layer()))
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(app_writer),
        )
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(error_writer.with_max_level(Level::ERROR)),
        )
        .try_init()
        .context("install tracing subscriber")?;

    Ok(LogGuards {
        _guards: vec![app_guard, error_guard],
    })
}

fn rolling_file(config: &LoggingConfig, prefix: &str) -> anyhow::Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(config.retention_days.max(1))
        .build(&config.directory)
        .with_context(|| format!("open {prefix} log in {}", config.directory))
}

fn default_directives(level: &str) -> String {
    format!("orderdesk={level},tower_http={level},axum=info,sqlx=warn")
}

/// Routes panics through tracing so they land in the error log with a trace.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        tracing::error!(
            panic = %info,
            location = %location,
            backtrace = %backtrace,
            "panic"
        );
    }));
}
