//! # MQTT Meter Subscriptions
//!
//! Subscribes to the MQTT topics a meter bridge publishes on and feeds
//! every payload through the classification gate. Accepted messages go
//! onto the shared output queue; everything else becomes at most a debug
//! log line.
//!
//! ## Behaviors
//!
//! - Topics come as one comma-separated string and are subscribed at
//!   QoS 1, all or nothing: if one subscribe fails, the ones already
//!   made are rolled back and setup fails
//! - The broker session is clean, so the event-loop task re-issues every
//!   subscription when a connection acknowledgement arrives
//! - Connection errors are logged (throttled) and polling continues;
//!   `rumqttc` reconnects on the next poll
//! - Teardown through [`MqttSubscription::unsubscribe_all`] is
//!   idempotent; dropping the handle without calling it aborts the task
//!
//! Payloads are handled as bytes end to end. Nothing here assumes UTF-8
//! before classification.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::classify::read_meter_message;
use crate::error::HanError;
use crate::log_warn_throttled;
use crate::message::MessageSender;
use crate::util::logging::LogThrottle;

/// Delay before polling again after a connection error, so a broker
/// outage does not turn the event loop into a busy loop
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// MQTT broker and subscription settings
#[derive(Debug, Clone, Deserialize)]
pub struct MqttSettings {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Client id; generated from the process epoch millis when unset
    #[serde(default)]
    pub client_id: Option<String>,
    /// Comma-separated list of topics carrying meter payloads
    pub topics: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    60
}

/// Split a comma-separated topic string into the set of topics to
/// subscribe. Entries are trimmed, empty entries are dropped, and
/// duplicates collapse.
pub fn topic_set(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(str::to_string)
        .collect()
}

fn generated_client_id() -> String {
    let epoch_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("han-rs-{epoch_ms}")
}

/// Subscribe to every meter topic and spawn the event-loop task.
///
/// The returned handle keeps the subscriptions alive; tear them down
/// with [`MqttSubscription::unsubscribe_all`].
pub async fn subscribe_meter_topics(
    settings: &MqttSettings,
    sender: MessageSender,
) -> Result<MqttSubscription, HanError> {
    let topics = topic_set(&settings.topics);
    if topics.is_empty() {
        return Err(HanError::MqttError("No topics to subscribe".to_string()));
    }

    let client_id = settings
        .client_id
        .clone()
        .unwrap_or_else(generated_client_id);
    let mut options = MqttOptions::new(client_id, settings.host.clone(), settings.port);
    options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs));
    if let (Some(username), Some(password)) =
        (settings.username.as_ref(), settings.password.as_ref())
    {
        options.set_credentials(username, password);
    }

    let (client, eventloop) = AsyncClient::new(options, 10);

    // All or nothing: a half-subscribed manager would silently drop
    // whole meters
    let mut subscribed: Vec<String> = Vec::new();
    for topic in &topics {
        if let Err(err) = client.subscribe(topic.clone(), QoS::AtLeastOnce).await {
            for done in &subscribed {
                if let Err(undo_err) = client.unsubscribe(done.clone()).await {
                    log::warn!("Rollback unsubscribe of {done} failed: {undo_err}");
                }
            }
            return Err(HanError::MqttError(format!(
                "Subscribe to {topic} failed: {err}"
            )));
        }
        subscribed.push(topic.clone());
    }

    let task = tokio::spawn(run_event_loop(
        eventloop,
        client.clone(),
        topics.clone(),
        sender,
    ));
    log::info!("Subscribed to {} meter topic(s)", topics.len());

    Ok(MqttSubscription {
        client,
        topics,
        task,
        closed: AtomicBool::new(false),
    })
}

/// Handle to a set of live meter subscriptions
pub struct MqttSubscription {
    client: AsyncClient,
    topics: BTreeSet<String>,
    task: JoinHandle<()>,
    closed: AtomicBool,
}

impl MqttSubscription {
    /// The topics this subscription covers
    pub fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }

    /// Unsubscribe every topic, disconnect, and stop the event-loop
    /// task. Safe to call more than once; concurrent calls collapse to
    /// one.
    pub async fn unsubscribe_all(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for topic in &self.topics {
            if let Err(err) = self.client.unsubscribe(topic.clone()).await {
                log::warn!("Unsubscribe of {topic} failed: {err}");
            }
        }
        if let Err(err) = self.client.disconnect().await {
            log::debug!("MQTT disconnect failed: {err}");
        }
        self.task.abort();
    }
}

impl Drop for MqttSubscription {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            self.task.abort();
        }
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: BTreeSet<String>,
    sender: MessageSender,
) {
    let mut error_throttle = LogThrottle::new(5_000, 3); // 3 warnings per 5 s
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_publish(&publish.topic, &publish.payload, &sender);
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                // Clean session: the broker forgot the subscriptions
                log::info!(
                    "MQTT connected, subscribing {} meter topic(s)",
                    topics.len()
                );
                for topic in &topics {
                    if let Err(err) = client.subscribe(topic.clone(), QoS::AtLeastOnce).await {
                        log_warn_throttled!(
                            error_throttle,
                            "Resubscribe to {topic} failed: {err}"
                        );
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                log_warn_throttled!(error_throttle, "MQTT connection error: {err}");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Run one publish through the gate and enqueue the result
fn handle_publish(topic: &str, payload: &[u8], sender: &MessageSender) {
    if let Some(message) = read_meter_message(topic, payload) {
        if sender.send(message).is_err() {
            log::debug!("Meter message consumer is gone, dropping message from {topic}");
        }
    }
}
