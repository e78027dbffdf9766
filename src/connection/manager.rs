//! # Connection Manager
//!
//! Keeps a direct meter connection alive: connect, read, enqueue, and
//! on any failure reconnect with exponential backoff. Meters reboot,
//! bridges restart and serial adapters get replugged; the manager turns
//! all of that into log lines and a brief gap in the message stream.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::watch;

use crate::connection::{ConnectionFactory, MeterStream, MeterStreamReader};
use crate::message::MessageSender;

/// First reconnect delay; doubles per failed attempt
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Ceiling for the reconnect delay
const MAX_BACKOFF: Duration = Duration::from_secs(60);

const READ_BUF_LEN: usize = 1024;

/// Owns one meter connection and its reconnect policy
pub struct ConnectionManager {
    factory: Box<dyn ConnectionFactory>,
    sender: MessageSender,
    close_tx: watch::Sender<bool>,
    close_rx: watch::Receiver<bool>,
}

impl ConnectionManager {
    pub fn new<F>(factory: F, sender: MessageSender) -> ConnectionManager
    where
        F: ConnectionFactory + 'static,
    {
        let (close_tx, close_rx) = watch::channel(false);
        ConnectionManager {
            factory: Box::new(factory),
            sender,
            close_tx,
            close_rx,
        }
    }

    /// Ask the connect loop to stop at its next await point. Idempotent;
    /// safe from any task.
    pub fn close(&self) {
        let _ = self.close_tx.send(true);
    }

    /// Connect and read until [`close`](Self::close) is called.
    ///
    /// Every connection failure, read error or clean EOF leads to a
    /// reconnect: 1 s after the first failure, doubling up to 60 s, and
    /// reset once a connect succeeds.
    pub async fn connect_loop(&self) {
        let mut close_rx = self.close_rx.clone();
        let mut backoff = INITIAL_BACKOFF;

        while !*close_rx.borrow() {
            let connected = tokio::select! {
                result = self.factory.connect() => result,
                _ = close_rx.changed() => break,
            };
            match connected {
                Ok(stream) => {
                    log::info!("Connected to {}", self.factory.describe());
                    backoff = INITIAL_BACKOFF;
                    if !self.read_stream(stream, &mut close_rx).await {
                        break;
                    }
                }
                Err(err) => {
                    log::warn!("Connect to {} failed: {err}", self.factory.describe());
                }
            }
            if *close_rx.borrow() {
                break;
            }
            log::info!(
                "Reconnecting to {} in {:?}",
                self.factory.describe(),
                backoff
            );
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = close_rx.changed() => break,
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
        log::debug!("Connection loop for {} stopped", self.factory.describe());
    }

    /// Read one connection to its end. Returns false when the loop
    /// should stop instead of reconnecting.
    async fn read_stream(
        &self,
        mut stream: MeterStream,
        close_rx: &mut watch::Receiver<bool>,
    ) -> bool {
        let mut reader = MeterStreamReader::new();
        let mut buf = [0u8; READ_BUF_LEN];
        loop {
            let read = tokio::select! {
                result = stream.read(&mut buf) => result,
                _ = close_rx.changed() => return false,
            };
            match read {
                Ok(0) => {
                    log::warn!("Stream from {} ended", self.factory.describe());
                    return true;
                }
                Ok(n) => {
                    for message in reader.read(&buf[..n]) {
                        if self.sender.send(message).is_err() {
                            log::info!(
                                "Meter message consumer is gone, closing {}",
                                self.factory.describe()
                            );
                            self.close();
                            return false;
                        }
                    }
                }
                Err(err) => {
                    log::warn!("Read from {} failed: {err}", self.factory.describe());
                    return true;
                }
            }
        }
    }
}
