/*!
 * Logging Module
 * Subscriber setup: console plus daily rolling files
 */
pub mod config;

pub use config::{LogLevel, LoggingConfig};

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the global subscriber. The returned guards flush the
/// background writers and must outlive all logging.
pub fn init(config: &LoggingConfig) -> Vec<WorkerGuard> {
    std::fs::create_dir_all(&config.dir).ok();

    // All logs
    let file_appender = rolling::daily(&config.dir, "app.log");
    let (file_writer, file_guard) = non_blocking(file_appender);

    // Errors only
    let error_appender = rolling::daily(&config.dir, "error.log");
    let (error_writer, error_guard) = non_blocking(error_appender);

    let (console_writer, console_guard) = non_blocking(io::stdout());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("cms_engine={},sqlx=warn", config.level))
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.is_production() {
        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .try_init()
            .ok();
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let error_layer = fmt::layer()
            .with_writer(error_writer)
            .with_ansi(false)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .try_init()
            .ok();
    }

    tracing::info!(
        environment = %config.environment,
        level = %config.level,
        dir = %config.dir,
        "Logging initialized"
    );

    vec![file_guard, error_guard, console_guard]
}
