//! # Hex Encoding/Decoding Utilities
//!
//! Hex helpers used throughout the HAN implementation for payload
//! classification, data visualization and test frame construction.
//! Meters and MQTT bridges sometimes publish frames as hex text, so the
//! detection pipeline needs a strict test for "is this payload hex?"
//! before attempting a decode.
//!
//! ## Features
//!
//! - Strict hex detection (`is_hex_string`) with no whitespace tolerance
//! - Efficient encoding/decoding using the `hex` crate
//! - Compact formatting for log lines
//!
//! ## Usage
//!
//! ```rust
//! use han_rs::util::hex::{encode_hex, hex_to_binary, is_hex_string};
//!
//! let data = [0x7e, 0xa0, 0x2a, 0x7e];
//! let hex_str = encode_hex(&data);
//! assert_eq!(hex_str, "7ea02a7e");
//! assert!(is_hex_string(hex_str.as_bytes()));
//!
//! let decoded = hex_to_binary(hex_str.as_bytes()).unwrap();
//! assert_eq!(decoded, data);
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Invalid hex byte 0x{byte:02x} at offset {offset}")]
    InvalidByte { byte: u8, offset: usize },

    #[error("Odd number of hex digits: {0}")]
    OddLength(usize),
}

/// Test whether a payload is entirely ASCII hex text.
///
/// True iff the length is even and every byte is an ASCII hex digit
/// (case-insensitive). Deliberately strict: no whitespace, sign or
/// `0x` prefix tolerance, since a false positive here would hex-decode
/// a payload that was never hex. The empty payload is vacuously hex;
/// callers handle empty payloads before reaching this test.
pub fn is_hex_string(payload: &[u8]) -> bool {
    payload.len() % 2 == 0 && payload.iter().all(|b| b.is_ascii_hexdigit())
}

/// Decode an ASCII hex payload to raw bytes.
///
/// Accepts both uppercase and lowercase digits. Unlike lenient hex
/// parsers this rejects any non-digit byte, mirroring `is_hex_string`:
/// a payload that passes the test always decodes.
pub fn hex_to_binary(payload: &[u8]) -> Result<Vec<u8>, HexError> {
    hex::decode(payload).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { c, index } => HexError::InvalidByte {
            byte: c as u8,
            offset: index,
        },
        hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
            HexError::OddLength(payload.len())
        }
    })
}

/// Encode bytes to lowercase hex string
///
/// This is the primary encoding function used throughout the codebase
/// for consistent hex representation in logs and diagnostics.
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Format hex data for compact display (useful for logs)
///
/// Formats data as "7e a0 2a 7e" with spaces between bytes.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
