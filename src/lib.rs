//! # han-rs - A Rust Crate for Reading HAN Smart Meter Messages
//!
//! The han-rs crate reads and detects messages from the HAN (Home Area
//! Network) port of utility meters. Payloads arrive either over MQTT (one
//! payload per publish) or over a direct serial/TCP byte stream; each one is
//! classified as an HDLC-framed DLMS message, a P1 plaintext readout, a
//! hex-encoded rendition of either, or a raw DLMS payload, gated on its
//! checksums, and pushed onto a shared async queue for downstream decoding.
//!
//! ## Features
//!
//! - Classify arbitrary payloads: HDLC frame, P1 readout, hex rendition, raw DLMS
//! - Validate FCS-16 frame checksums and P1 CRC-16 telegram checksums
//! - Subscribe to MQTT meter topics, all-or-nothing with idempotent teardown
//! - Read a serial HAN port or a TCP bridge with reconnect and backoff
//! - Auto-detect the message format on direct streams
//! - Support for logging and error handling
//!
//! ## Usage
//!
//! To use the han-rs crate in your Rust project, add the following to your
//! Cargo.toml file:
//!
//! ```toml
//! [dependencies]
//! han-rs = "1.0.0"
//! ```
//!
//! Then, in your Rust code, you can import the necessary modules and
//! functions:
//!
//! ```rust
//! use han_rs::{
//!     init_logger, message_channel, read_meter_message, setup_meter_connection,
//!     Config, HanError, MeterConnection, MeterMessage, MeterMessageType,
//! };
//! ```

pub mod classify;
pub mod config;
pub mod connection;
pub mod error;
pub mod hdlc;
pub mod logging;
pub mod message;
pub mod mqtt;
pub mod p1;
pub mod util;

pub use crate::error::HanError;
pub use crate::logging::{init_logger, log_info};

// Classification and message types
pub use classify::{read_meter_message, try_read_framed};
pub use hdlc::{HdlcFrame, HdlcFrameReader};
pub use message::{
    message_channel, MessageReceiver, MessageSender, MeterMessage, MeterMessageType,
};
pub use p1::DataReadout;

// Configuration
pub use config::{Config, ConnectionSettings, ConnectionType};

// Connection surfaces
pub use connection::{transport_factory, ConnectionManager, MeterStreamReader, TransportKind};
pub use mqtt::{subscribe_meter_topics, topic_set, MqttSettings, MqttSubscription};

use std::sync::Arc;
use tokio::task::JoinHandle;

/// A running meter connection of either kind, as set up by
/// [`setup_meter_connection`]
pub enum MeterConnection {
    /// A serial or TCP stream with its reconnect task
    Direct {
        manager: Arc<ConnectionManager>,
        task: JoinHandle<()>,
    },
    /// Live MQTT subscriptions
    Mqtt(MqttSubscription),
}

impl MeterConnection {
    /// Stop the connection and wait for its tasks to end
    pub async fn stop(self) {
        match self {
            MeterConnection::Direct { manager, task } => {
                manager.close();
                let _ = task.await;
            }
            MeterConnection::Mqtt(subscription) => subscription.unsubscribe_all().await,
        }
    }
}

/// Set up the configured meter connection and start feeding `sender`.
///
/// # Arguments
/// * `config` - Validated connection configuration
/// * `sender` - Queue side that receives every accepted meter message
///
/// # Returns
/// * `Ok(MeterConnection)` - Running connection; stop it with [`MeterConnection::stop`]
/// * `Err(HanError)` - Invalid configuration or setup failure
pub async fn setup_meter_connection(
    config: &Config,
    sender: MessageSender,
) -> Result<MeterConnection, HanError> {
    config.validate()?;
    match config.connection_type {
        ConnectionType::Mqtt => {
            let settings = config.mqtt.as_ref().ok_or_else(|| {
                HanError::ConfigError("MQTT mode requires mqtt settings".to_string())
            })?;
            let subscription = mqtt::subscribe_meter_topics(settings, sender).await?;
            Ok(MeterConnection::Mqtt(subscription))
        }
        ConnectionType::Serial | ConnectionType::Tcp => {
            let factory = connection::transport_factory(&config.settings)?;
            let manager = Arc::new(ConnectionManager::new(factory, sender));
            let task = {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.connect_loop().await })
            };
            Ok(MeterConnection::Direct { manager, task })
        }
    }
}
