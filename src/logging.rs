//! Tracing setup. The terminal belongs to the line editor, so every event goes
//! to the log file in the config directory.

use std::{fs::File, path::Path, sync::Arc};

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter source, checked before `RUST_LOG`.
pub const LOG_ENV: &str = "KRILL_LOG";

/// Installs the global subscriber. Returns false when the log file cannot be
/// created or a subscriber is already set; the shell keeps running either way.
pub fn init(log_file_path: &Path) -> bool {
    if log_file_path.as_os_str().is_empty() {
        return false;
    }
    let log_file = match File::create(log_file_path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    build_subscriber(log_file, env_filter()).try_init().is_ok()
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn build_subscriber(
    log_file: File,
    filter: EnvFilter,
) -> impl tracing::Subscriber + Send + Sync {
    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry().with(fmt_layer).with(filter)
}
