//! # HAN Error Handling
//!
//! This module defines the HanError enum, which represents the different error
//! types that can occur in the han-rs crate. Payload-level problems (bad
//! checksums, unframed garbage) are not errors; they are handled by the
//! message gate. HanError covers transport setup and teardown.

use thiserror::Error;

/// Represents the different error types that can occur in the HAN crate.
#[derive(Debug, Error)]
pub enum HanError {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// Indicates an error establishing or reading a network connection.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Indicates an error talking to the MQTT broker.
    #[error("MQTT error: {0}")]
    MqttError(String),

    /// Indicates an invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
