use std::path::Path;

use acctswap_core::api::{AppConfig, LoggingConfig};
use acctswap_core::config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

pub const LOG_ENV: &str = "ACCTSWAP_LOG";
const DEFAULT_FILTER: &str = "warn";

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, CliError> {
    let cfg = match path {
        Some(p) => config::load_from(p)?,
        None => config::load_default()?,
    };
    Ok(cfg)
}

/// Filter from `ACCTSWAP_LOG`, then `logging.level`, then `warn`.
fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    if let Ok(f) = EnvFilter::try_from_env(LOG_ENV) {
        return f;
    }
    logging
        .level
        .as_deref()
        .and_then(|l| EnvFilter::try_new(l).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// With `logging.file` set, events go to a daily-rolled file so they never
/// interleave with the child's terminal output; otherwise to stderr. The
/// returned guard flushes the file writer and must live until exit.
pub fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = env_filter(logging);
    if let Some(file) = logging.file_path() {
        let dir = file
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "acctswap.log".to_string());
        if std::fs::create_dir_all(dir).is_ok() {
            let appender = tracing_appender::rolling::daily(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            return Some(guard);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    None
}
