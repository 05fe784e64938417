// ── Wire models for the xled/v1 control API ──
//
// Request payloads, the raw response wrapper, and the typed views over a
// device's self-description (`gestalt`) that the rest of the workspace
// needs: hardware address and firmware family.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Error;

/// Application-level success sentinel embedded in every JSON reply.
pub const CODE_OK: i64 = 1000;

/// Method names under the `/xled/v1/` prefix.
pub mod methods {
    pub const GESTALT: &str = "gestalt";
    pub const LOGIN: &str = "login";
    pub const VERIFY: &str = "verify";
    pub const LOGOUT: &str = "logout";
    pub const LED_MODE: &str = "led/mode";
    pub const LED_OUT_BRIGHTNESS: &str = "led/out/brightness";
    pub const MQTT_CONFIG: &str = "mqtt/config";
}

// ── DeviceRequest ───────────────────────────────────────────────────

/// One authenticated call: method path plus optional JSON body.
///
/// A request without a payload is sent as GET, with a payload as POST.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRequest {
    pub method: String,
    pub payload: Option<Value>,
}

impl DeviceRequest {
    pub fn new(method: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            method: method.into(),
            payload,
        }
    }

    /// `led/mode` with the given mode literal.
    pub fn mode(mode: LedMode) -> Self {
        Self::new(methods::LED_MODE, Some(mode.payload()))
    }

    /// `led/out/brightness` with an absolute percentage. The value is
    /// forwarded as-is; the firmware does its own clamping.
    pub fn brightness(percent: i64) -> Self {
        Self::new(
            methods::LED_OUT_BRIGHTNESS,
            Some(json!({ "type": "A", "value": percent })),
        )
    }

    /// `mqtt/config` pointing the device at `broker`.
    pub fn broker(broker: &BrokerAddress) -> Self {
        Self::new(methods::MQTT_CONFIG, Some(broker.payload()))
    }
}

// ── DeviceResponse ──────────────────────────────────────────────────

/// Raw reply from a device: transport status plus the unparsed body.
///
/// Kept verbatim so the raw-invoke path can hand device codes back
/// to callers untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceResponse {
    pub status: u16,
    pub body: String,
}

impl DeviceResponse {
    /// Transport-level success (HTTP 200).
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value, Error> {
        serde_json::from_str(&self.body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: self.body.clone(),
        })
    }

    /// The embedded application status code, if the body carries one.
    pub fn code(&self) -> Option<i64> {
        self.json().ok()?.get("code")?.as_i64()
    }
}

// ── LedMode ─────────────────────────────────────────────────────────

/// Literal values accepted by `led/mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LedMode {
    Off,
    Movie,
    Playlist,
    Effect,
}

impl LedMode {
    /// `{"mode": "<literal>"}`
    pub fn payload(self) -> Value {
        json!({ "mode": self.to_string() })
    }
}

// ── Generation ──────────────────────────────────────────────────────

/// Hardware/firmware class of a device, derived from `fw_family`.
///
/// The two classes differ in which `led/mode` literal means "on" and in
/// whether they publish telemetry to a configurable broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Generation {
    /// Families A B C D E H J K.
    Legacy,
    /// Families F G L M N P.
    Newer,
    /// Missing or unrecognised family code.
    Unknown,
}

impl Generation {
    pub fn from_family(family: Option<&str>) -> Self {
        match family {
            Some("A" | "B" | "C" | "D" | "E" | "H" | "J" | "K") => Self::Legacy,
            Some("F" | "G" | "L" | "M" | "N" | "P") => Self::Newer,
            _ => Self::Unknown,
        }
    }

    /// The `led/mode` literal that turns a device of this class on.
    pub fn on_mode(self) -> LedMode {
        match self {
            Self::Legacy => LedMode::Movie,
            Self::Newer => LedMode::Playlist,
            Self::Unknown => LedMode::Effect,
        }
    }
}

// ── HardwareAddress ─────────────────────────────────────────────────

/// A strictly parsed `aa:bb:cc:dd:ee:ff` hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Twelve upper-case hex digits, as used in telemetry topics.
    pub fn compact_upper(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Rejected hardware address text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hardware address: {0}")]
pub struct InvalidHardwareAddress(pub String);

impl FromStr for HardwareAddress {
    type Err = InvalidHardwareAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidHardwareAddress(s.to_owned());
        if s.len() != 17 {
            return Err(invalid());
        }
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for slot in &mut octets {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

// ── DeviceDescriptor ────────────────────────────────────────────────

/// A device's self-description as returned by `gestalt`.
///
/// Stored verbatim in the registry; only the fields the workspace
/// reasons about get typed accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceDescriptor(Value);

impl DeviceDescriptor {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// The `mac` field, verbatim.
    pub fn mac(&self) -> Option<&str> {
        self.0.get("mac")?.as_str()
    }

    /// The `mac` field, parsed.
    pub fn hardware_address(&self) -> Option<Result<HardwareAddress, InvalidHardwareAddress>> {
        self.mac().map(str::parse)
    }

    /// The `fw_family` letter.
    pub fn fw_family(&self) -> Option<&str> {
        self.0.get("fw_family")?.as_str()
    }

    pub fn generation(&self) -> Generation {
        Generation::from_family(self.fw_family())
    }

    pub fn device_name(&self) -> Option<&str> {
        self.0.get("device_name")?.as_str()
    }

    pub fn product_code(&self) -> Option<&str> {
        self.0.get("product_code")?.as_str()
    }
}

impl From<Value> for DeviceDescriptor {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

// ── BrokerAddress ───────────────────────────────────────────────────

/// A telemetry broker as `host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerAddress {
    pub host: String,
    pub port: Option<u16>,
}

impl BrokerAddress {
    /// Port used when none is configured.
    pub const DEFAULT_PORT: u16 = 1883;

    /// `{"broker_host": ..}` plus `broker_port` when one was given.
    pub fn payload(&self) -> Value {
        match self.port {
            Some(port) => json!({ "broker_host": self.host, "broker_port": port }),
            None => json!({ "broker_host": self.host }),
        }
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(Self::DEFAULT_PORT)
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{port}", self.host),
            None => f.write_str(&self.host),
        }
    }
}

/// Rejected broker address text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid broker address: {0}")]
pub struct InvalidBrokerAddress(pub String);

impl FromStr for BrokerAddress {
    type Err = InvalidBrokerAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidBrokerAddress(s.to_owned());
        let end = s.find([' ', ':']).unwrap_or(s.len());
        let host = &s[..end];
        if host.is_empty() {
            return Err(invalid());
        }
        let port = match s[end..].strip_prefix(':') {
            Some(rest) => {
                let digits: &str = rest
                    .find(|c: char| !c.is_ascii_digit())
                    .map_or(rest, |i| &rest[..i]);
                if digits.is_empty() {
                    None
                } else {
                    Some(digits.parse().map_err(|_| invalid())?)
                }
            }
            None => None,
        };
        Ok(Self {
            host: host.to_owned(),
            port,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_every_family_letter() {
        for family in ["A", "B", "C", "D", "E", "H", "J", "K"] {
            assert_eq!(Generation::from_family(Some(family)), Generation::Legacy);
        }
        for family in ["F", "G", "L", "M", "N", "P"] {
            assert_eq!(Generation::from_family(Some(family)), Generation::Newer);
        }
        assert_eq!(Generation::from_family(Some("Z")), Generation::Unknown);
        assert_eq!(Generation::from_family(Some("a")), Generation::Unknown);
        assert_eq!(Generation::from_family(None), Generation::Unknown);
    }

    #[test]
    fn on_mode_depends_on_generation() {
        assert_eq!(Generation::Legacy.on_mode(), LedMode::Movie);
        assert_eq!(Generation::Newer.on_mode(), LedMode::Playlist);
        assert_eq!(Generation::Unknown.on_mode(), LedMode::Effect);
    }

    #[test]
    fn mode_payload_literals() {
        assert_eq!(LedMode::Off.payload(), json!({"mode": "off"}));
        assert_eq!(LedMode::Movie.payload(), json!({"mode": "movie"}));
        assert_eq!(LedMode::Playlist.payload(), json!({"mode": "playlist"}));
        assert_eq!(LedMode::Effect.payload(), json!({"mode": "effect"}));
    }

    #[test]
    fn brightness_payload_shape() {
        let req = DeviceRequest::brightness(42);
        assert_eq!(req.method, "led/out/brightness");
        assert_eq!(req.payload, Some(json!({"type": "A", "value": 42})));
    }

    #[test]
    fn hardware_address_parses_strictly() {
        let mac: HardwareAddress = "98:cd:ac:1a:2b:3c".parse().unwrap();
        assert_eq!(mac.compact_upper(), "98CDAC1A2B3C");
        assert_eq!(mac.to_string(), "98:cd:ac:1a:2b:3c");

        assert!("98:cd:ac:1a:2b".parse::<HardwareAddress>().is_err());
        assert!("98-cd-ac-1a-2b-3c".parse::<HardwareAddress>().is_err());
        assert!("98:cd:ac:1a:2b:zz".parse::<HardwareAddress>().is_err());
        assert!("98:cd:ac:1a:2b:3c:".parse::<HardwareAddress>().is_err());
    }

    #[test]
    fn descriptor_accessors() {
        let desc = DeviceDescriptor::new(json!({
            "mac": "98:cd:ac:1a:2b:3c",
            "fw_family": "F",
            "device_name": "Twinkly_1A2B3C",
            "code": 1000
        }));
        assert_eq!(desc.mac(), Some("98:cd:ac:1a:2b:3c"));
        assert_eq!(desc.generation(), Generation::Newer);
        assert_eq!(desc.device_name(), Some("Twinkly_1A2B3C"));
        assert!(desc.hardware_address().unwrap().is_ok());

        let bare = DeviceDescriptor::new(json!({}));
        assert_eq!(bare.generation(), Generation::Unknown);
        assert!(bare.hardware_address().is_none());
    }

    #[test]
    fn broker_address_with_and_without_port() {
        let with_port: BrokerAddress = "192.168.1.5:1884".parse().unwrap();
        assert_eq!(with_port.host, "192.168.1.5");
        assert_eq!(with_port.port, Some(1884));
        assert_eq!(
            with_port.payload(),
            json!({"broker_host": "192.168.1.5", "broker_port": 1884})
        );

        let bare: BrokerAddress = "mqtt.twinkly.com".parse().unwrap();
        assert_eq!(bare.port, None);
        assert_eq!(bare.port_or_default(), 1883);
        assert_eq!(bare.payload(), json!({"broker_host": "mqtt.twinkly.com"}));

        assert!("".parse::<BrokerAddress>().is_err());
        assert!(":1883".parse::<BrokerAddress>().is_err());
    }

    #[test]
    fn response_code_extraction() {
        let resp = DeviceResponse {
            status: 200,
            body: r#"{"code":1105}"#.into(),
        };
        assert_eq!(resp.code(), Some(1105));

        let garbage = DeviceResponse {
            status: 200,
            body: "not json".into(),
        };
        assert_eq!(garbage.code(), None);
        assert!(garbage.json().is_err());
    }
}
