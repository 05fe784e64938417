// ── Core error types ──
//
// Registry-level failures plus the translation of device exchange errors.
// Every variant maps onto the compact wire taxonomy (`ErrorCode`) that the
// management surface reports back as `{code, message}`.

use serde_json::{Value, json};
use thiserror::Error;

/// Compact status taxonomy reported to management clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Ok,
    Exists,
    Timeout,
    Mem,
    Response,
    Jstore,
}

impl ErrorCode {
    /// Numeric value on the wire.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Ok => 0,
            Self::Exists => 1,
            Self::Timeout => 2,
            Self::Mem => 3,
            Self::Response => 4,
            Self::Jstore => 5,
        }
    }

    /// Human-readable message for a code.
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Exists => "already exists",
            Self::Timeout => "device connection timed out",
            Self::Mem => "out of memory",
            Self::Response => "invalid response, not a twinkly device",
            Self::Jstore => "internal storage error",
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Registry ─────────────────────────────────────────────────────
    #[error("Device {address} is already registered")]
    AlreadyExists { address: String },

    #[error("Device {address} is not registered")]
    NotFound { address: String },

    #[error("No device at registry index {index}")]
    UnknownIndex { index: usize },

    #[error("Registry storage failed: {message}")]
    Storage { message: String },

    // ── Device exchanges ─────────────────────────────────────────────
    #[error("Device {address} did not answer within {timeout_secs}s")]
    Timeout { address: String, timeout_secs: u64 },

    #[error("Cannot connect to device at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Invalid response from {address}: {reason}")]
    InvalidResponse { address: String, reason: String },

    #[error("Device answered HTTP {status}")]
    Device { status: u16, body: String },

    #[error("Device kept rejecting mode change after {attempts} attempts (last code {last_code})")]
    ModeRejected { attempts: u32, last_code: i64 },

    #[error("Session failed: {message}")]
    Session { message: String },

    // ── Telemetry ────────────────────────────────────────────────────
    #[error("Telemetry error: {message}")]
    Telemetry { message: String },
}

impl CoreError {
    /// Translate a device exchange error, tagging it with the device address.
    pub fn from_api(err: twinkly_api::Error, address: &str) -> Self {
        let address = address.to_owned();
        match err {
            twinkly_api::Error::Timeout { timeout_secs } => Self::Timeout {
                address,
                timeout_secs,
            },
            twinkly_api::Error::Transport(ref e) if e.is_timeout() => Self::Timeout {
                address,
                timeout_secs: 0,
            },
            twinkly_api::Error::Transport(e) => Self::ConnectionFailed {
                address,
                reason: e.to_string(),
            },
            twinkly_api::Error::InvalidUrl(e) => Self::ConnectionFailed {
                address,
                reason: format!("invalid device address: {e}"),
            },
            twinkly_api::Error::Deserialization { message, .. } => Self::InvalidResponse {
                address,
                reason: message,
            },
            e @ (twinkly_api::Error::Authentication { .. }
            | twinkly_api::Error::Verification { .. }
            | twinkly_api::Error::MissingToken
            | twinkly_api::Error::SessionExpired) => Self::Session {
                message: e.to_string(),
            },
        }
    }

    /// Position in the wire taxonomy.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyExists { .. } | Self::NotFound { .. } | Self::UnknownIndex { .. } => {
                ErrorCode::Exists
            }
            Self::Timeout { .. } | Self::ConnectionFailed { .. } | Self::Session { .. } => {
                ErrorCode::Timeout
            }
            Self::Storage { .. } => ErrorCode::Jstore,
            Self::InvalidResponse { .. }
            | Self::Device { .. }
            | Self::ModeRejected { .. }
            | Self::Telemetry { .. } => ErrorCode::Response,
        }
    }

    /// Structured `{code, message}` failure body.
    ///
    /// Device rejections keep the raw HTTP status and body so callers can
    /// interpret them.
    pub fn to_payload(&self) -> Value {
        match self {
            Self::Device { status, body } => json!({ "code": status, "message": body }),
            Self::NotFound { .. } | Self::UnknownIndex { .. } => {
                json!({ "code": self.code().as_i64(), "message": "not exists" })
            }
            Self::ConnectionFailed { .. } | Self::Session { .. } => {
                json!({ "code": self.code().as_i64(), "message": "Error connecting device" })
            }
            _ => json!({ "code": self.code().as_i64(), "message": self.code().message() }),
        }
    }
}

impl From<twinkly_api::Error> for CoreError {
    fn from(err: twinkly_api::Error) -> Self {
        let address = match &err {
            twinkly_api::Error::Transport(e) => e
                .url()
                .and_then(|u| u.host_str().map(str::to_owned))
                .unwrap_or_else(|| "<unknown>".into()),
            _ => "<unknown>".into(),
        };
        Self::from_api(err, &address)
    }
}
