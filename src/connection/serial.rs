//! # Serial HAN Port
//!
//! Opens the meter's HAN serial port with the configured line
//! parameters. The port is read only; nothing is ever sent to a meter.

use async_trait::async_trait;
use tokio_serial::SerialPortBuilderExt;

use crate::config::{ConnectionSettings, FlowControl, Parity};
use crate::connection::{ConnectionFactory, MeterStream};
use crate::error::HanError;

/// Opens the HAN serial port
#[derive(Debug, Clone)]
pub struct SerialFactory {
    path: String,
    baud_rate: u32,
    data_bits: tokio_serial::DataBits,
    parity: tokio_serial::Parity,
    stop_bits: tokio_serial::StopBits,
    flow_control: tokio_serial::FlowControl,
}

impl SerialFactory {
    /// Build a factory from the configured line parameters
    pub fn new(path: String, settings: &ConnectionSettings) -> Result<SerialFactory, HanError> {
        Ok(SerialFactory {
            path,
            baud_rate: settings.baud_rate,
            data_bits: map_data_bits(settings.data_bits)?,
            parity: map_parity(settings.parity),
            stop_bits: map_stop_bits(settings.stop_bits)?,
            flow_control: map_flow_control(settings.flow_control),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl ConnectionFactory for SerialFactory {
    async fn connect(&self) -> Result<MeterStream, HanError> {
        let port = tokio_serial::new(self.path.as_str(), self.baud_rate)
            .data_bits(self.data_bits)
            .parity(self.parity)
            .stop_bits(self.stop_bits)
            .flow_control(self.flow_control)
            .open_native_async()
            .map_err(|e| HanError::SerialPortError(e.to_string()))?;
        Ok(Box::new(port))
    }

    fn describe(&self) -> String {
        format!("serial port {} at {} baud", self.path, self.baud_rate)
    }
}

fn map_data_bits(bits: u8) -> Result<tokio_serial::DataBits, HanError> {
    match bits {
        5 => Ok(tokio_serial::DataBits::Five),
        6 => Ok(tokio_serial::DataBits::Six),
        7 => Ok(tokio_serial::DataBits::Seven),
        8 => Ok(tokio_serial::DataBits::Eight),
        other => Err(HanError::ConfigError(format!(
            "Unsupported data bits: {other}"
        ))),
    }
}

fn map_stop_bits(bits: u8) -> Result<tokio_serial::StopBits, HanError> {
    match bits {
        1 => Ok(tokio_serial::StopBits::One),
        2 => Ok(tokio_serial::StopBits::Two),
        other => Err(HanError::ConfigError(format!(
            "Unsupported stop bits: {other}"
        ))),
    }
}

fn map_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
    }
}

fn map_flow_control(flow: FlowControl) -> tokio_serial::FlowControl {
    match flow {
        FlowControl::None => tokio_serial::FlowControl::None,
        FlowControl::Software => tokio_serial::FlowControl::Software,
        FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
    }
}
