//! # Utility Modules
//!
//! This module provides common utility functions and types used throughout
//! the han-rs crate, including hex encoding/decoding and rate-limited
//! logging patterns.

pub mod hex;
pub mod logging;

// Re-export commonly used types and functions
pub use hex::{encode_hex, format_hex_compact, hex_to_binary, is_hex_string};
pub use logging::{log_payload_hex, LogThrottle};
