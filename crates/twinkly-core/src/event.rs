// ── Fleet events ──
//
// Broadcast to every subscriber of a `Fleet`. Each event names a kind, the
// registry index it concerns, and an integer value.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// Startup finished; value is the device count.
    Initialized,
    /// Connectivity: 0 offline, 1 online.
    Status,
    /// Application state: 0 off, 1 on.
    Mode,
    /// Brightness as reported by the device.
    Brightness,
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FleetEvent {
    pub kind: EventKind,
    pub index: usize,
    pub value: i64,
}

impl FleetEvent {
    pub fn new(kind: EventKind, index: usize, value: i64) -> Self {
        Self { kind, index, value }
    }

    pub fn initialized(devices: usize) -> Self {
        Self::new(
            EventKind::Initialized,
            0,
            i64::try_from(devices).unwrap_or(i64::MAX),
        )
    }

    pub fn added(index: usize) -> Self {
        Self::new(EventKind::Added, index, 0)
    }

    pub fn removed(index: usize) -> Self {
        Self::new(EventKind::Removed, index, 0)
    }
}

impl std::fmt::Display for FleetEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{} = {}", self.kind, self.index, self.value)
    }
}
