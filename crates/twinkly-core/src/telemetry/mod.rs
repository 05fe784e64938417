// ── Status ingestion ──
//
// Legacy devices publish JSON status messages under
// `<namespace>/<category>/<MAC>`. Each message may carry any of three
// fields; every field found becomes one fleet event.

mod mqtt;

pub use mqtt::{MqttSettings, TelemetryPump};

use serde_json::Value;
use tracing::debug;
use twinkly_api::{HardwareAddress, InvalidHardwareAddress};

use crate::event::EventKind;

/// Topic filter covering every status category of one device.
pub fn device_topic(namespace: &str, mac: &str) -> Result<String, InvalidHardwareAddress> {
    let mac: HardwareAddress = mac.parse()?;
    Ok(format!("{namespace}/+/{}", mac.compact_upper()))
}

/// The hardware address a concrete topic belongs to.
pub fn topic_hardware_address(topic: &str) -> Option<HardwareAddress> {
    let compact = topic.rsplit('/').next()?;
    if compact.len() != 12 {
        return None;
    }
    let octets: Vec<&str> = (0..6).filter_map(|i| compact.get(i * 2..i * 2 + 2)).collect();
    octets.join(":").parse().ok()
}

/// Subscription changes requested by the fleet, consumed by the telemetry
/// transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionRequest {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
}

/// One inbound status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl TelemetryMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Fields found in a status payload, in the order they are reported.
pub fn readings(payload: &[u8]) -> Vec<(EventKind, i64)> {
    let json: Value = match serde_json::from_slice(payload) {
        Ok(json) => json,
        Err(e) => {
            debug!(error = %e, "ignoring non-JSON telemetry payload");
            return Vec::new();
        }
    };

    let mut found = Vec::with_capacity(3);
    if let Some(app) = json.get("appstatus") {
        let off = app.as_str() == Some("off");
        found.push((EventKind::Mode, i64::from(!off)));
    }
    if let Some(status) = json.get("status") {
        let offline = status.as_str() == Some("offline");
        found.push((EventKind::Status, i64::from(!offline)));
    }
    if let Some(brightness) = json.get("brightness").and_then(Value::as_i64) {
        found.push((EventKind::Brightness, brightness));
    }
    found
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn brightness_alone_is_one_reading() {
        assert_eq!(
            readings(br#"{"brightness": 42}"#),
            vec![(EventKind::Brightness, 42)]
        );
    }

    #[test]
    fn all_three_fields() {
        let payload = br#"{"appstatus":"off","status":"online","brightness":7}"#;
        assert_eq!(
            readings(payload),
            vec![
                (EventKind::Mode, 0),
                (EventKind::Status, 1),
                (EventKind::Brightness, 7),
            ]
        );
    }

    #[test]
    fn non_off_values_map_to_one() {
        assert_eq!(
            readings(br#"{"appstatus":"movie","status":"offline"}"#),
            vec![(EventKind::Mode, 1), (EventKind::Status, 0)]
        );
        assert_eq!(readings(br#"{"appstatus":3}"#), vec![(EventKind::Mode, 1)]);
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(readings(b"not json").is_empty());
        assert!(readings(br#"{"brightness":"high"}"#).is_empty());
        assert!(readings(b"{}").is_empty());
    }

    #[test]
    fn topics_use_compact_upper_mac() {
        assert_eq!(
            device_topic("xled", "98:cd:ac:1a:2b:3c").unwrap(),
            "xled/+/98CDAC1A2B3C"
        );
        assert!(device_topic("xled", "98cdac1a2b3c").is_err());
        assert!(device_topic("xled", "").is_err());
    }

    #[test]
    fn topic_resolves_back_to_mac() {
        let mac = topic_hardware_address("xled/appstatus/98CDAC1A2B3C").unwrap();
        assert_eq!(mac.to_string(), "98:cd:ac:1a:2b:3c");
        assert!(topic_hardware_address("xled/status/98CDAC").is_none());
        assert!(topic_hardware_address("xled/status/ZZCDAC1A2B3C").is_none());
    }
}
