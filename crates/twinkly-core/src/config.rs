// ── Runtime fleet configuration ──
//
// Describes how the fleet talks to devices and which brokers it points
// them at. The CLI builds a `FleetConfig` and hands it in; core never
// reads config files.

use twinkly_api::{BrokerAddress, TransportConfig};

/// Broker that shipping firmware reports to out of the box.
pub const CLOUD_BROKER_HOST: &str = "mqtt.twinkly.com";

/// Topic namespace devices publish telemetry under.
pub const DEFAULT_NAMESPACE: &str = "xled";

/// Resends allowed after the first `led/mode` attempt.
pub const DEFAULT_MAX_MODE_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Scheme and per-leg deadline for device exchanges.
    pub transport: TransportConfig,
    /// Broker legacy devices are pointed at on registration. `None` leaves
    /// their broker alone.
    pub local_broker: Option<BrokerAddress>,
    /// Broker restored on removal.
    pub cloud_broker: BrokerAddress,
    pub namespace: String,
    pub max_mode_retries: u32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            local_broker: None,
            cloud_broker: BrokerAddress {
                host: CLOUD_BROKER_HOST.into(),
                port: None,
            },
            namespace: DEFAULT_NAMESPACE.into(),
            max_mode_retries: DEFAULT_MAX_MODE_RETRIES,
        }
    }
}
