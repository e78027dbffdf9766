//! # Configuration
//!
//! Flat configuration for one meter connection, read once at setup. A
//! JSON document deserializes straight into [`Config`]; unknown keys are
//! ignored so configs written for newer versions still load.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::HanError;
use crate::mqtt::{topic_set, MqttSettings};

/// Which kind of source the connection uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Serial,
    Tcp,
    Mqtt,
}

/// Parity for serial ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Flow control for serial ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}

/// Settings for the direct-stream sources. HAN ports commonly run
/// 2400 8N1, which the defaults match.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default)]
    pub tcp_host: Option<String>,
    #[serde(default)]
    pub tcp_port: Option<u16>,
    #[serde(default)]
    pub serial_port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub flow_control: FlowControl,
}

fn default_baud_rate() -> u32 {
    2400
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            tcp_host: None,
            tcp_port: None,
            serial_port: None,
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: Parity::None,
            stop_bits: default_stop_bits(),
            flow_control: FlowControl::None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub settings: ConnectionSettings,
    #[serde(default)]
    pub mqtt: Option<MqttSettings>,
}

impl Config {
    /// Load and validate a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Config, HanError> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            HanError::ConfigError(format!("Cannot read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json_str(text: &str) -> Result<Config, HanError> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| HanError::ConfigError(format!("Malformed configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the active mode has the settings it needs
    pub fn validate(&self) -> Result<(), HanError> {
        match self.connection_type {
            ConnectionType::Mqtt => {
                let mqtt = self.mqtt.as_ref().ok_or_else(|| {
                    HanError::ConfigError("MQTT mode requires mqtt settings".to_string())
                })?;
                if topic_set(&mqtt.topics).is_empty() {
                    return Err(HanError::ConfigError(
                        "MQTT mode requires at least one topic".to_string(),
                    ));
                }
            }
            ConnectionType::Tcp => {
                if self.settings.tcp_host.is_none() || self.settings.tcp_port.is_none() {
                    return Err(HanError::ConfigError(
                        "TCP mode requires tcp_host and tcp_port".to_string(),
                    ));
                }
            }
            ConnectionType::Serial => {
                if self.settings.serial_port.is_none() {
                    return Err(HanError::ConfigError(
                        "Serial mode requires serial_port".to_string(),
                    ));
                }
                if self.settings.tcp_host.is_some() {
                    return Err(HanError::ConfigError(
                        "Serial mode does not take a TCP host".to_string(),
                    ));
                }
                self.settings.validate_serial()?;
            }
        }
        Ok(())
    }
}

impl ConnectionSettings {
    /// Check the serial line parameters for values the port can take
    pub fn validate_serial(&self) -> Result<(), HanError> {
        if !(5..=8).contains(&self.data_bits) {
            return Err(HanError::ConfigError(format!(
                "Unsupported data bits: {}",
                self.data_bits
            )));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(HanError::ConfigError(format!(
                "Unsupported stop bits: {}",
                self.stop_bits
            )));
        }
        Ok(())
    }
}
