//! Device registry, command execution and status ingestion for a fleet of
//! Twinkly LED controllers.
//!
//! - **[`Fleet`]**: central facade. Registers and deregisters devices,
//!   drives commands through per-chain [`twinkly_api::Session`]s, and
//!   broadcasts [`FleetEvent`]s.
//!
//! - **[`Registry`]**: ordered, address-keyed device set backed by a
//!   [`RecordStore`]. Mutations persist before they become visible.
//!
//! - **[`command`]**: generation-aware `led/mode` literals and the bounded
//!   retry ladder.
//!
//! - **[`telemetry`]**: status topic naming, payload parsing and the MQTT
//!   transport ([`TelemetryPump`]).

pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod fleet;
pub mod registry;
pub mod telemetry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::FleetConfig;
pub use error::{CoreError, ErrorCode};
pub use event::{EventKind, FleetEvent};
pub use fleet::Fleet;
pub use registry::{DeviceRecord, JsonFileStore, MemoryStore, RecordStore, Registry, StoreError};
pub use telemetry::{MqttSettings, SubscriptionRequest, TelemetryMessage, TelemetryPump};
