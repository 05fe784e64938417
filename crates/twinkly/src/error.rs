//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use twinkly_config::ConfigError;
use twinkly_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const STORAGE: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device reachability ──────────────────────────────────────────

    #[error("Could not connect to device at {address}")]
    #[diagnostic(
        code(twinkly::connection_failed),
        help("Check that the device is powered and on the same network.\nReason: {reason}")
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("Device at {address} did not answer within {seconds}s")]
    #[diagnostic(
        code(twinkly::timeout),
        help("Increase the deadline with --timeout or check the device's Wi-Fi link.")
    )]
    Timeout { address: String, seconds: u64 },

    #[error("Session with the device failed: {message}")]
    #[diagnostic(
        code(twinkly::auth_failed),
        help("The device rejected the login handshake. Power-cycling it usually clears stale sessions.")
    )]
    AuthFailed { message: String },

    #[error("Invalid response from {address}")]
    #[diagnostic(
        code(twinkly::invalid_response),
        help("Is this a Twinkly device?\nReason: {reason}")
    )]
    InvalidResponse { address: String, reason: String },

    #[error("Device answered HTTP {status}: {body}")]
    #[diagnostic(code(twinkly::device_error))]
    Device { status: u16, body: String },

    #[error("Device rejected every mode literal ({attempts} attempts, last code {last_code})")]
    #[diagnostic(
        code(twinkly::mode_rejected),
        help("Raise max_mode_retries in the config, or inspect the device with: twinkly call <address> led/mode")
    )]
    ModeRejected { attempts: u32, last_code: i64 },

    // ── Registry ─────────────────────────────────────────────────────

    #[error("Device '{identifier}' is not registered")]
    #[diagnostic(code(twinkly::not_found), help("Run: twinkly list"))]
    NotFound { identifier: String },

    #[error("Device '{address}' is already registered")]
    #[diagnostic(code(twinkly::conflict))]
    Conflict { address: String },

    #[error("Registry storage failed: {message}")]
    #[diagnostic(
        code(twinkly::storage),
        help("Check permissions on the registry file, or point --registry elsewhere.")
    )]
    Storage { message: String },

    // ── Telemetry ────────────────────────────────────────────────────

    #[error("Telemetry failed: {message}")]
    #[diagnostic(code(twinkly::telemetry))]
    Telemetry { message: String },

    // ── Validation / configuration ───────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(twinkly::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(twinkly::config),
        help("Check the config file and any TWINKLY_* environment variables.")
    )]
    Config(Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(twinkly::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Storage { .. } => exit_code::STORAGE,
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AlreadyExists { address } => Self::Conflict { address },
            CoreError::NotFound { address } => Self::NotFound {
                identifier: address,
            },
            CoreError::UnknownIndex { index } => Self::NotFound {
                identifier: index.to_string(),
            },
            CoreError::Storage { message } => Self::Storage { message },
            CoreError::Timeout {
                address,
                timeout_secs,
            } => Self::Timeout {
                address,
                seconds: timeout_secs,
            },
            CoreError::ConnectionFailed { address, reason } => {
                Self::ConnectionFailed { address, reason }
            }
            CoreError::InvalidResponse { address, reason } => {
                Self::InvalidResponse { address, reason }
            }
            CoreError::Device { status, body } => Self::Device { status, body },
            CoreError::ModeRejected {
                attempts,
                last_code,
            } => Self::ModeRejected {
                attempts,
                last_code,
            },
            CoreError::Session { message } => Self::AuthFailed { message },
            CoreError::Telemetry { message } => Self::Telemetry { message },
        }
    }
}
