//! # Meter Connections
//!
//! Direct-stream sources for HAN ports: a serial port on the meter
//! itself or a TCP bridge in front of one. Both yield a plain byte
//! stream; [`stream::MeterStreamReader`] turns the stream into gated
//! meter messages and [`manager::ConnectionManager`] keeps the
//! connection alive.
//!
//! HAN ports are broadcast only. Nothing is ever written to the meter,
//! and the stream type is read only by construction.

pub mod manager;
pub mod serial;
pub mod stream;
pub mod tcp;

pub use manager::ConnectionManager;
pub use serial::SerialFactory;
pub use stream::{MeterStreamReader, StreamStats};
pub use tcp::TcpFactory;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::config::ConnectionSettings;
use crate::error::HanError;

/// A byte stream from a HAN port
pub type MeterStream = Box<dyn AsyncRead + Send + Unpin>;

/// Opens a fresh stream for every (re)connection attempt
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<MeterStream, HanError>;

    /// Short description of the endpoint for log lines
    fn describe(&self) -> String;
}

/// Which direct transport was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Serial,
    Tcp,
}

/// Factory over either direct transport
pub enum TransportFactory {
    Serial(SerialFactory),
    Tcp(TcpFactory),
}

impl TransportFactory {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportFactory::Serial(_) => TransportKind::Serial,
            TransportFactory::Tcp(_) => TransportKind::Tcp,
        }
    }
}

#[async_trait]
impl ConnectionFactory for TransportFactory {
    async fn connect(&self) -> Result<MeterStream, HanError> {
        match self {
            TransportFactory::Serial(factory) => factory.connect().await,
            TransportFactory::Tcp(factory) => factory.connect().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            TransportFactory::Serial(factory) => factory.describe(),
            TransportFactory::Tcp(factory) => factory.describe(),
        }
    }
}

/// Select the direct transport: TCP when a host is configured,
/// otherwise the serial port.
pub fn transport_factory(settings: &ConnectionSettings) -> Result<TransportFactory, HanError> {
    if let Some(host) = &settings.tcp_host {
        let port = settings.tcp_port.ok_or_else(|| {
            HanError::ConfigError("TCP host configured without tcp_port".to_string())
        })?;
        return Ok(TransportFactory::Tcp(TcpFactory::new(host.clone(), port)));
    }
    let path = settings.serial_port.as_ref().ok_or_else(|| {
        HanError::ConfigError("Neither tcp_host nor serial_port configured".to_string())
    })?;
    Ok(TransportFactory::Serial(SerialFactory::new(
        path.clone(),
        settings,
    )?))
}
