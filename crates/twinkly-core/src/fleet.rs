// ── Fleet lifecycle manager ──
//
// Owns the registry, the device HTTP client, the event bus and the
// telemetry subscription channel. Adds and removes devices, drives
// commands through per-chain sessions, and turns status messages into
// events.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use twinkly_api::{
    BrokerAddress, DeviceClient, DeviceDescriptor, DeviceRequest, Generation, Session,
};

use crate::command::{LadderStep, ModeLadder, initial_mode};
use crate::config::FleetConfig;
use crate::error::CoreError;
use crate::event::FleetEvent;
use crate::registry::{DeviceRecord, RecordStore, Registry};
use crate::telemetry::{self, SubscriptionRequest, TelemetryMessage};

const EVENT_CHANNEL_SIZE: usize = 256;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<FleetInner>`.
#[derive(Clone)]
pub struct Fleet {
    inner: Arc<FleetInner>,
}

struct FleetInner {
    config: FleetConfig,
    client: DeviceClient,
    registry: Registry,
    event_tx: broadcast::Sender<FleetEvent>,
    cloud: watch::Sender<bool>,
    subscription_tx: mpsc::UnboundedSender<SubscriptionRequest>,
    subscription_rx: Mutex<Option<mpsc::UnboundedReceiver<SubscriptionRequest>>>,
    /// Fire-and-forget exchanges still in flight.
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Fleet {
    /// Load the registry from `store` and build the device client.
    ///
    /// Does not touch the network; call [`init()`](Self::init) to
    /// resubscribe registered devices.
    pub fn new(config: FleetConfig, store: Box<dyn RecordStore>) -> Result<Self, CoreError> {
        let client = DeviceClient::new(&config.transport)?;
        let registry = Registry::open(store)?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (cloud, _) = watch::channel(false);
        let (subscription_tx, subscription_rx) = mpsc::unbounded_channel();

        Ok(Self {
            inner: Arc::new(FleetInner {
                config,
                client,
                registry,
                event_tx,
                cloud,
                subscription_tx,
                subscription_rx: Mutex::new(Some(subscription_rx)),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Subscribe every registered legacy device and announce readiness.
    /// Returns the device count.
    pub fn init(&self) -> usize {
        if self.inner.config.local_broker.is_none() {
            debug!("no local broker configured, legacy devices stay unsubscribed");
        }
        let mut visit = |_: usize, record: &DeviceRecord| {
            if self.follows_telemetry(record) {
                self.subscribe_device(record);
            }
            true
        };
        let devices = self.inner.registry.iterate(Some(&mut visit));
        info!(devices, "fleet initialized");
        self.emit(FleetEvent::initialized(devices));
        devices
    }

    /// Wait for every fire-and-forget exchange still in flight.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        debug!(pending = handles.len(), "waiting for background exchanges");
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background exchange panicked");
            }
        }
    }

    // ── Registry operations ──────────────────────────────────────────

    pub fn count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Walk registered devices; see [`Registry::iterate`].
    pub fn iterate(&self, visitor: Option<&mut dyn FnMut(usize, &DeviceRecord) -> bool>) -> usize {
        self.inner.registry.iterate(visitor)
    }

    pub fn records(&self) -> Vec<DeviceRecord> {
        self.inner.registry.snapshot().values().cloned().collect()
    }

    /// Fetch a device's self-description without registering it.
    pub async fn info(&self, address: &str) -> Result<DeviceDescriptor, CoreError> {
        let descriptor = self
            .inner
            .client
            .gestalt(address)
            .await
            .map_err(|e| CoreError::from_api(e, address))?;

        if descriptor.mac().is_none() {
            return Err(CoreError::InvalidResponse {
                address: address.to_owned(),
                reason: "descriptor carries no hardware address".into(),
            });
        }
        Ok(descriptor)
    }

    /// Register the device at `address`. Returns its registry index.
    ///
    /// Legacy devices are additionally pointed at the local broker and
    /// subscribed for telemetry. Without a local broker both steps are
    /// skipped with a warning.
    pub async fn add(&self, address: &str) -> Result<usize, CoreError> {
        let descriptor = self.info(address).await?;
        let generation = descriptor.generation();
        let record = DeviceRecord::new(address, descriptor);

        let index = self.inner.registry.insert(record.clone())?;
        info!(address, index, %generation, "device added");
        self.emit(FleetEvent::added(index));

        if generation == Generation::Legacy {
            match self.inner.config.local_broker.clone() {
                Some(broker) => {
                    self.spawn_broker_config(address, broker).await;
                    self.subscribe_device(&record);
                }
                None => {
                    warn!(address, "no local broker configured, legacy device left without telemetry");
                }
            }
        }
        Ok(index)
    }

    /// Deregister the device at `address`. Returns its former index.
    ///
    /// The device is pointed back at the cloud broker; that exchange is
    /// not awaited.
    pub async fn remove(&self, address: &str) -> Result<usize, CoreError> {
        let (index, record) = self.inner.registry.remove(address)?;
        info!(address, index, "device removed");

        self.spawn_broker_config(address, self.inner.config.cloud_broker.clone())
            .await;
        if self.follows_telemetry(&record) {
            self.unsubscribe_device(&record);
        }
        self.emit(FleetEvent::removed(index));
        Ok(index)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Route an arbitrary method through an authenticated session.
    ///
    /// A 200 reply is returned as JSON (or as a string if it is not JSON);
    /// anything else becomes `CoreError::Device` with status and body
    /// preserved. A token the device keeps refusing surfaces as status 401.
    pub async fn invoke_raw(
        &self,
        address: &str,
        method: &str,
        payload: Option<Value>,
    ) -> Result<Value, CoreError> {
        let request = DeviceRequest::new(method, payload);
        let resp = match self.session(address).execute(&request).await {
            Ok(resp) => resp,
            // Keep the device's own verdict on the raw path.
            Err(twinkly_api::Error::SessionExpired) => {
                return Err(CoreError::Device {
                    status: 401,
                    body: twinkly_api::Error::SessionExpired.to_string(),
                });
            }
            Err(e) => return Err(CoreError::from_api(e, address)),
        };

        if !resp.is_ok() {
            return Err(CoreError::Device {
                status: resp.status,
                body: resp.body,
            });
        }
        Ok(serde_json::from_str(&resp.body).unwrap_or(Value::String(resp.body)))
    }

    /// Switch the device at `index` on or off.
    ///
    /// The "on" literal depends on the device generation. Hint codes in the
    /// reply walk the retry ladder until the device accepts a literal or
    /// the configured resends run out.
    pub async fn set_mode(&self, index: usize, on: bool) -> Result<(), CoreError> {
        let record = self.record_at(index)?;
        let generation = record.descriptor.generation();
        let mut ladder = ModeLadder::new(
            initial_mode(generation, on),
            self.inner.config.max_mode_retries,
        );

        // One session for the whole ladder: one login, one re-login budget.
        let mut session = self.session(&record.address);
        let result = loop {
            let mode = ladder.mode();
            debug!(address = %record.address, %mode, attempt = ladder.attempts() + 1, "setting mode");

            let resp = match session.send(&DeviceRequest::mode(mode)).await {
                Ok(resp) => resp,
                Err(e) => break Err(CoreError::from_api(e, &record.address)),
            };

            let Some(code) = resp.code() else {
                break Err(CoreError::InvalidResponse {
                    address: record.address.clone(),
                    reason: format!("mode reply carried no code (HTTP {})", resp.status),
                });
            };

            match ladder.next(code) {
                LadderStep::Done => {
                    info!(address = %record.address, %mode, "mode set");
                    break Ok(());
                }
                LadderStep::Retry(next) => {
                    debug!(address = %record.address, code, %next, "mode rejected, retrying");
                }
                LadderStep::Exhausted {
                    attempts,
                    last_code,
                } => {
                    warn!(address = %record.address, attempts, last_code, "mode retries exhausted");
                    break Err(CoreError::ModeRejected {
                        attempts,
                        last_code,
                    });
                }
            }
        };
        session.finish();
        result
    }

    /// Send an absolute brightness to the device at `index`.
    ///
    /// The exchange runs in the background; its outcome is only logged.
    /// `percent` is forwarded unchecked.
    pub async fn set_brightness(&self, index: usize, percent: i64) -> Result<(), CoreError> {
        let record = self.record_at(index)?;
        let session = self.session(&record.address);

        let handle = tokio::spawn(async move {
            match session.execute(&DeviceRequest::brightness(percent)).await {
                Ok(resp) => {
                    debug!(address = %record.address, percent, status = resp.status, "brightness sent");
                }
                Err(e) => warn!(address = %record.address, error = %e, "brightness not delivered"),
            }
        });
        self.track(handle).await;
        Ok(())
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn events(&self) -> broadcast::Receiver<FleetEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Events as a stream; lagged receivers skip what they missed.
    pub fn event_stream(&self) -> impl Stream<Item = FleetEvent> + Send + 'static {
        BroadcastStream::new(self.events()).filter_map(Result::ok)
    }

    fn emit(&self, event: FleetEvent) {
        debug!(%event, "fleet event");
        // No subscribers is fine.
        let _ = self.inner.event_tx.send(event);
    }

    // ── Cloud connectivity ───────────────────────────────────────────

    /// Record an upstream broker connect/disconnect notification.
    pub fn set_cloud_connected(&self, connected: bool) {
        let changed = self.inner.cloud.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
        if changed {
            info!(connected, "cloud connectivity changed");
        }
    }

    pub fn is_cloud_connected(&self) -> bool {
        *self.inner.cloud.borrow()
    }

    pub fn cloud_connectivity(&self) -> watch::Receiver<bool> {
        self.inner.cloud.subscribe()
    }

    // ── Telemetry ────────────────────────────────────────────────────

    /// Hand out the subscription request channel. Only the first caller
    /// gets it; requests queue until then.
    pub async fn take_subscription_requests(
        &self,
    ) -> Option<mpsc::UnboundedReceiver<SubscriptionRequest>> {
        self.inner.subscription_rx.lock().await.take()
    }

    /// Turn one status message into events. Returns how many were emitted.
    ///
    /// The device is resolved by the hardware address in the topic at
    /// message time; messages from unregistered devices are dropped.
    pub fn ingest(&self, message: &TelemetryMessage) -> usize {
        let Some(mac) = telemetry::topic_hardware_address(&message.topic) else {
            debug!(topic = %message.topic, "telemetry topic carries no hardware address");
            return 0;
        };
        let Some((index, _)) = self.inner.registry.find_by_hardware_address(&mac) else {
            debug!(%mac, "telemetry from unregistered device");
            return 0;
        };

        let readings = telemetry::readings(&message.payload);
        for &(kind, value) in &readings {
            self.emit(FleetEvent::new(kind, index, value));
        }
        readings.len()
    }

    /// Legacy devices publish status only once pointed at the local
    /// broker, so without one there is nothing to follow.
    fn follows_telemetry(&self, record: &DeviceRecord) -> bool {
        record.descriptor.generation() == Generation::Legacy
            && self.inner.config.local_broker.is_some()
    }

    fn subscribe_device(&self, record: &DeviceRecord) {
        self.request_subscription(record, |topic| SubscriptionRequest::Subscribe { topic });
    }

    fn unsubscribe_device(&self, record: &DeviceRecord) {
        self.request_subscription(record, |topic| SubscriptionRequest::Unsubscribe { topic });
    }

    fn request_subscription(
        &self,
        record: &DeviceRecord,
        request: impl FnOnce(String) -> SubscriptionRequest,
    ) {
        let mac = record.descriptor.mac().unwrap_or_default();
        match telemetry::device_topic(&self.inner.config.namespace, mac) {
            Ok(topic) => {
                debug!(address = %record.address, %topic, "telemetry subscription change");
                if self.inner.subscription_tx.send(request(topic)).is_err() {
                    warn!(address = %record.address, "telemetry transport has shut down");
                }
            }
            Err(e) => warn!(address = %record.address, error = %e, "telemetry subscription refused"),
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn session(&self, address: &str) -> Session {
        Session::new(self.inner.client.clone(), address)
    }

    fn record_at(&self, index: usize) -> Result<DeviceRecord, CoreError> {
        self.inner
            .registry
            .get_by_index(index)
            .ok_or(CoreError::UnknownIndex { index })
    }

    async fn spawn_broker_config(&self, address: &str, broker: BrokerAddress) {
        let session = self.session(address);
        let address = address.to_owned();
        let handle = tokio::spawn(async move {
            match session.execute(&DeviceRequest::broker(&broker)).await {
                Ok(resp) if resp.is_ok() => {
                    info!(%address, %broker, "telemetry broker reconfigured");
                }
                Ok(resp) => {
                    warn!(%address, %broker, status = resp.status, body = %resp.body, "broker reconfiguration rejected");
                }
                Err(e) => warn!(%address, %broker, error = %e, "broker reconfiguration failed"),
            }
        });
        self.track(handle).await;
    }

    async fn track(&self, handle: JoinHandle<()>) {
        let mut handles = self.inner.task_handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }
}

impl std::fmt::Debug for Fleet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fleet")
            .field("devices", &self.count())
            .field("cloud_connected", &self.is_cloud_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::event::EventKind;
    use crate::registry::MemoryStore;

    fn fleet_with(records: Vec<DeviceRecord>) -> Fleet {
        let config = FleetConfig {
            local_broker: Some("192.168.1.10".parse().unwrap()),
            ..FleetConfig::default()
        };
        let store = MemoryStore::with_records(records);
        Fleet::new(config, Box::new(store)).unwrap()
    }

    fn legacy(address: &str, mac: &str) -> DeviceRecord {
        DeviceRecord::new(
            address,
            DeviceDescriptor::new(json!({"mac": mac, "fw_family": "D"})),
        )
    }

    #[tokio::test]
    async fn ingest_brightness_only_emits_one_event() {
        let fleet = fleet_with(vec![legacy("10.0.0.1", "98:cd:ac:00:00:01")]);
        let mut events = fleet.events();

        let emitted = fleet.ingest(&TelemetryMessage::new(
            "xled/params/98CDAC000001",
            br#"{"brightness": 42}"#.to_vec(),
        ));

        assert_eq!(emitted, 1);
        assert_eq!(
            events.try_recv().unwrap(),
            FleetEvent::new(EventKind::Brightness, 0, 42)
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn ingest_resolves_index_at_message_time() {
        let fleet = fleet_with(vec![
            legacy("10.0.0.1", "98:cd:ac:00:00:01"),
            legacy("10.0.0.2", "98:cd:ac:00:00:02"),
        ]);
        fleet.inner.registry.remove("10.0.0.1").unwrap();
        let mut events = fleet.events();

        fleet.ingest(&TelemetryMessage::new(
            "xled/status/98CDAC000002",
            br#"{"status": "offline"}"#.to_vec(),
        ));
        assert_eq!(
            events.try_recv().unwrap(),
            FleetEvent::new(EventKind::Status, 0, 0)
        );

        let dropped = fleet.ingest(&TelemetryMessage::new(
            "xled/status/98CDAC000001",
            br#"{"status": "online"}"#.to_vec(),
        ));
        assert_eq!(dropped, 0);
    }

    #[tokio::test]
    async fn init_subscribes_legacy_devices_only() {
        let fleet = fleet_with(vec![
            legacy("10.0.0.1", "98:cd:ac:00:00:01"),
            DeviceRecord::new(
                "10.0.0.2",
                DeviceDescriptor::new(json!({"mac": "98:cd:ac:00:00:02", "fw_family": "G"})),
            ),
        ]);
        let mut requests = fleet.take_subscription_requests().await.unwrap();
        let mut events = fleet.events();

        assert_eq!(fleet.init(), 2);

        assert_eq!(
            requests.try_recv().unwrap(),
            SubscriptionRequest::Subscribe {
                topic: "xled/+/98CDAC000001".into()
            }
        );
        assert!(requests.try_recv().is_err());
        assert_eq!(events.try_recv().unwrap(), FleetEvent::initialized(2));
        assert!(fleet.take_subscription_requests().await.is_none());
    }

    #[tokio::test]
    async fn init_without_local_broker_subscribes_nothing() {
        let store = MemoryStore::with_records(vec![legacy("10.0.0.1", "98:cd:ac:00:00:01")]);
        let fleet = Fleet::new(FleetConfig::default(), Box::new(store)).unwrap();
        let mut requests = fleet.take_subscription_requests().await.unwrap();

        assert_eq!(fleet.init(), 1);
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn cloud_flag_tracks_notifications() {
        let fleet = fleet_with(Vec::new());
        let rx = fleet.cloud_connectivity();
        assert!(!fleet.is_cloud_connected());

        fleet.set_cloud_connected(true);
        assert!(fleet.is_cloud_connected());
        assert!(rx.has_changed().unwrap());

        let fleet2 = Fleet::clone(&fleet);
        fleet2.set_cloud_connected(false);
        assert!(!fleet.is_cloud_connected());
        assert_eq!(Arc::strong_count(&fleet.inner), 2);
    }

    #[tokio::test]
    async fn commands_on_unknown_index_fail() {
        let fleet = fleet_with(Vec::new());
        assert!(matches!(
            fleet.set_mode(3, true).await,
            Err(CoreError::UnknownIndex { index: 3 })
        ));
        assert!(matches!(
            fleet.set_brightness(0, 10).await,
            Err(CoreError::UnknownIndex { index: 0 })
        ));
    }
}
