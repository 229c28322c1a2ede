//! Logging Infrastructure
//!
//! `RUST_LOG` wins when set; otherwise `level` applies to this crate and the
//! HTTP trace layer.

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initialize the logger (stdout)
pub fn init_logger(log_level: Option<&str>) {
    init_logger_with_file(log_level, None);
}

/// Initialize the logger with optional daily-rolling file output
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("order_hub={level},tower_http={level}").into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir {
        let log_path = Path::new(dir);
        if log_path.is_dir() {
            let file_appender = tracing_appender::rolling::daily(log_path, "order-hub");
            subscriber.with_writer(file_appender).with_ansi(false).init();
            return;
        }
        eprintln!("LOG_DIR {} is not a directory, logging to stdout", dir);
    }

    subscriber.init();
}
