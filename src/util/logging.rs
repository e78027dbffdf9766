//! # Logging Utilities
//!
//! Rate-limited logging and hex dump helpers for the HAN receive path.
//! A meter pushes a message every few seconds and a broken link can push
//! garbage much faster, so the hot paths throttle their warnings instead
//! of flooding the journal.
//!
//! ## Usage
//!
//! ```rust
//! use han_rs::util::logging::LogThrottle;
//!
//! // Allow 5 messages per second
//! let mut throttle = LogThrottle::new(1000, 5);
//! if throttle.allow() {
//!     log::warn!("checksum error detected");
//! }
//! ```

use std::time::Instant;

/// Rate limiter for log messages.
///
/// Counts messages inside a rolling window; once the cap is hit the rest
/// of the window stays silent.
#[derive(Debug)]
pub struct LogThrottle {
    /// Window length in milliseconds
    window_ms: u64,
    /// Messages allowed per window
    cap: u32,
    /// Messages seen in the current window
    count: u32,
    /// When the current window opened
    t0: Instant,
}

impl LogThrottle {
    /// New throttle allowing `cap` messages per `window_ms` milliseconds.
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            t0: Instant::now(),
        }
    }

    /// Whether the next message may be logged.
    ///
    /// Opens a fresh window when the current one has expired.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.t0).as_millis() as u64;

        if elapsed_ms > self.window_ms {
            self.t0 = now;
            self.count = 0;
        }

        self.count += 1;
        self.count <= self.cap
    }

    /// Drop the counter and start a new window now.
    pub fn reset(&mut self) {
        self.t0 = Instant::now();
        self.count = 0;
    }
}

/// Log a warning with throttling
#[macro_export]
macro_rules! log_warn_throttled {
    ($throttle:expr, $($arg:tt)*) => {
        if $throttle.allow() {
            log::warn!($($arg)*);
        }
    };
}

/// Debug-log a payload as hex, truncated to keep log lines readable.
pub fn log_payload_hex(prefix: &str, data: &[u8]) {
    const MAX_LOG_BYTES: usize = 64;

    let display_data = if data.len() > MAX_LOG_BYTES {
        &data[..MAX_LOG_BYTES]
    } else {
        data
    };

    let hex_str = crate::util::hex::format_hex_compact(display_data);
    let suffix = if data.len() > MAX_LOG_BYTES {
        format!(" ... ({} bytes total)", data.len())
    } else {
        String::new()
    };

    log::debug!("{prefix}: {hex_str}{suffix}");
}
