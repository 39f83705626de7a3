use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tokio::task;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Keeps the non-blocking file writer alive; drop it last
#[allow(dead_code)]
pub struct LoggerGuard(WorkerGuard);

/// Console plus daily-rotated file logging. `RUST_LOG` overrides the
/// configured level. Must be called from within a tokio runtime.
pub fn init_logging(config: &LoggingConfig, prefix: &str) -> Result<LoggerGuard> {
    let log_dir = PathBuf::from(&config.dir);
    let level = normalize_level(&config.level);

    let builder = EnvFilter::builder().with_default_directive(
        level
            .parse()
            .with_context(|| format!("Invalid log directive '{}'", level))?,
    );
    let rust_log = std::env::var("RUST_LOG").unwrap_or_default();
    let console_filter = builder.clone().parse_lossy(&rust_log);
    let file_filter = builder.parse_lossy(&rust_log);

    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create file appender")?;
    let (non_blocking, guard) = NonBlocking::new(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(file_filter);
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if level != config.level.trim().to_lowercase() {
        tracing::warn!("Invalid log level '{}', defaulting to 'info'", config.level);
    }

    let max_age = Duration::from_secs(60 * 60 * 24 * config.retention_days.max(1));
    start_log_cleanup_task(log_dir, prefix.to_string(), max_age);

    Ok(LoggerGuard(guard))
}

fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn start_log_cleanup_task(log_dir: PathBuf, prefix: String, max_age: Duration) {
    task::spawn(async move {
        loop {
            match cleanup_old_logs(&log_dir, &prefix, max_age) {
                Ok(0) => {}
                Ok(deleted) => tracing::info!("Deleted {} old log files", deleted),
                Err(e) => tracing::warn!("Failed to delete old log file: {}", e),
            }
            tokio::time::sleep(CLEANUP_INTERVAL).await;
        }
    });
}

/// Remove `<prefix>*.log` files older than `max_age`, returning how many went
fn cleanup_old_logs(log_dir: &Path, prefix: &str, max_age: Duration) -> std::io::Result<usize> {
    let now = SystemTime::now();
    let mut deleted = 0;

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
            if file_name.starts_with(prefix) && file_name.ends_with(".log") {
                let metadata = fs::metadata(&path)?;
                if let Ok(modified) = metadata.modified() {
                    if now.duration_since(modified).unwrap_or_default() >= max_age {
                        fs::remove_file(&path)?;
                        tracing::debug!("Old log file deleted: {}", file_name);
                        deleted += 1;
                    }
                }
            }
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("DEBUG"), "debug");
        assert_eq!(normalize_level(" warn "), "warn");
        assert_eq!(normalize_level("verbose"), "info");
    }

    #[test]
    fn test_cleanup_only_touches_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tourhub-engine.2026-03-01.log"), "old").unwrap();
        fs::write(dir.path().join("other.2026-03-01.log"), "keep").unwrap();
        fs::write(dir.path().join("tourhub-engine.txt"), "keep").unwrap();

        // Zero max age: every matching file counts as old
        let deleted = cleanup_old_logs(dir.path(), "tourhub-engine", Duration::ZERO).unwrap();
        assert_eq!(deleted, 1);
        assert!(dir.path().join("other.2026-03-01.log").exists());
        assert!(dir.path().join("tourhub-engine.txt").exists());

        let deleted = cleanup_old_logs(dir.path(), "other", Duration::from_secs(3600)).unwrap();
        assert_eq!(deleted, 0);
    }
}
