// ── MQTT telemetry transport ──
//
// Connects to the broker legacy devices report to, applies the fleet's
// subscription requests, and feeds every publish back into the fleet.
// Subscriptions are replayed on each ConnAck since sessions are clean.

use std::collections::BTreeSet;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use twinkly_api::BrokerAddress;

use super::{SubscriptionRequest, TelemetryMessage};
use crate::error::CoreError;
use crate::fleet::Fleet;

const REQUEST_CAPACITY: usize = 16;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub broker: BrokerAddress,
    pub client_id: String,
    pub keep_alive: Duration,
}

impl MqttSettings {
    pub fn new(broker: BrokerAddress, client_id: impl Into<String>) -> Self {
        Self {
            broker,
            client_id: client_id.into(),
            keep_alive: Duration::from_secs(30),
        }
    }
}

/// Drives one broker connection on behalf of a `Fleet`.
pub struct TelemetryPump {
    fleet: Fleet,
    settings: MqttSettings,
}

impl TelemetryPump {
    pub fn new(fleet: Fleet, settings: MqttSettings) -> Self {
        Self { fleet, settings }
    }

    /// Run until `cancel` fires.
    ///
    /// Only one pump can be attached to a fleet; a second one fails with
    /// `CoreError::Telemetry`.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), CoreError> {
        let mut requests =
            self.fleet
                .take_subscription_requests()
                .await
                .ok_or_else(|| CoreError::Telemetry {
                    message: "a telemetry transport is already attached".into(),
                })?;

        let broker = &self.settings.broker;
        let mut options = MqttOptions::new(
            self.settings.client_id.clone(),
            broker.host.clone(),
            broker.port_or_default(),
        );
        options.set_keep_alive(self.settings.keep_alive);

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let mut topics = BTreeSet::new();
        info!(broker = %broker, client_id = %self.settings.client_id, "telemetry connecting");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                request = requests.recv() => {
                    let Some(request) = request else { break };
                    apply(&client, &mut topics, request);
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = TelemetryMessage::new(publish.topic, publish.payload.to_vec());
                        self.fleet.ingest(&message);
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(broker = %broker, topics = topics.len(), "telemetry connected");
                        self.fleet.set_cloud_connected(true);
                        for topic in &topics {
                            subscribe(&client, topic);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(broker = %broker, error = %e, "telemetry connection lost");
                        self.fleet.set_cloud_connected(false);
                        tokio::select! {
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(RECONNECT_DELAY) => {}
                        }
                    }
                },
            }
        }

        if let Err(e) = client.try_disconnect() {
            debug!(error = %e, "telemetry disconnect not delivered");
        }
        self.fleet.set_cloud_connected(false);
        Ok(())
    }
}

fn apply(client: &AsyncClient, topics: &mut BTreeSet<String>, request: SubscriptionRequest) {
    match request {
        SubscriptionRequest::Subscribe { topic } => {
            subscribe(client, &topic);
            topics.insert(topic);
        }
        SubscriptionRequest::Unsubscribe { topic } => {
            if let Err(e) = client.try_unsubscribe(topic.clone()) {
                warn!(%topic, error = %e, "unsubscribe not queued");
            }
            topics.remove(&topic);
        }
    }
}

fn subscribe(client: &AsyncClient, topic: &str) {
    match client.try_subscribe(topic, QoS::AtMostOnce) {
        Ok(()) => debug!(%topic, "subscribed"),
        Err(e) => warn!(%topic, error = %e, "subscribe not queued"),
    }
}
