//! Logging Infrastructure
//!
//! Structured logging via `tracing`. The filter comes from `RUST_LOG` when
//! set, otherwise from the configured level; an optional directory adds a
//! daily rolling log file.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the logger with the default level
pub fn init_logger() {
    init_logger_with_file(None, false, None);
}

/// Initialize the logger with optional JSON output and file output
pub fn init_logger_with_file(log_level: Option<&str>, json: bool, log_dir: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("order_server={level},shared={level},tower_http={level}").into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    // File output only when the directory exists
    if let Some(dir) = log_dir {
        let log_path = Path::new(dir);
        if log_path.is_dir() {
            let file_appender = tracing_appender::rolling::daily(log_path, "order-server");
            let builder = builder.with_ansi(false).with_writer(file_appender);
            if json {
                builder.json().init();
            } else {
                builder.init();
            }
            return;
        }
    }

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
