//! # TCP HAN Bridge
//!
//! Connects to a TCP endpoint that forwards a meter's HAN port, such as
//! a ser2net bridge next to the meter cabinet.

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::connection::{ConnectionFactory, MeterStream};
use crate::error::HanError;

/// Connects to the bridge in front of the HAN port
#[derive(Debug, Clone)]
pub struct TcpFactory {
    host: String,
    port: u16,
}

impl TcpFactory {
    pub fn new(host: String, port: u16) -> TcpFactory {
        TcpFactory { host, port }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl ConnectionFactory for TcpFactory {
    async fn connect(&self) -> Result<MeterStream, HanError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| HanError::ConnectionError(e.to_string()))?;
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("tcp {}:{}", self.host, self.port)
    }
}
