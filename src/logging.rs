/// Tracing setup for hosts and the demo binary
use std::path::PathBuf;

use sysinfo::System;

const LOG_TARGET_STARTUP: &str = "sfx_bridge::startup";

/// Directory holding the rolling log files
pub fn log_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("sfx-bridge").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Install the global subscriber: daily rolling file, plus the console in
/// debug builds. `RUST_LOG` overrides `default_filter`.
///
/// Does nothing if a subscriber is already installed.
pub fn initialize_tracing(default_filter: &str) {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "sfx-bridge.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    let result = {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .try_init()
    };

    #[cfg(not(debug_assertions))]
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init();

    match result {
        Ok(()) => tracing::info!("Log directory: {}", log_dir.display()),
        Err(e) => eprintln!("Warning: tracing already initialized: {}", e),
    }
}

pub fn log_runtime_environment() {
    let mut system = System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting sfx-bridge v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
    tracing::debug!(
        target: LOG_TARGET_STARTUP,
        "CPUs: {}, memory: {} MiB",
        system.cpus().len(),
        system.total_memory() / (1024 * 1024)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_is_app_scoped() {
        let dir = log_dir();
        assert!(dir.ends_with("logs"));
    }
}
