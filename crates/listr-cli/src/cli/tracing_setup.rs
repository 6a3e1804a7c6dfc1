use std::fs::OpenOptions;

use anyhow::{Context, Result};
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Env var naming an optional debug log file
pub const LOG_FILE_ENV: &str = "LISTR_LOG_FILE";

/// Install the global subscriber: INFO to stderr, plus DEBUG to the file
/// named by `LISTR_LOG_FILE` when set.
pub fn init_tracing() -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(LevelFilter::INFO);
    let registry = tracing_subscriber::registry().with(stderr_layer);

    match std::env::var(LOG_FILE_ENV).ok() {
        Some(log_path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("Failed to open log file {}", log_path))?;

            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(LevelFilter::DEBUG);

            registry.with(file_layer).try_init()?;
            tracing::info!(path = %log_path, "File logging enabled");
        }
        None => registry.try_init()?,
    }
    Ok(())
}
