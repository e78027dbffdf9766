//! Logger bootstrap and plain-string log wrappers.
//!
//! The receive path logs through `log` macros directly (with throttling,
//! see [`crate::util::logging`]); these wrappers exist for callers that
//! hold a message in a variable already, such as the CLI.

use log::{debug, error, info, log_enabled, warn, Level};

/// Initializes the logger with the `env_logger` crate.
///
/// Respects `RUST_LOG` for level selection.
pub fn init_logger() {
    env_logger::init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}
