// Shared transport configuration for building reqwest::Client instances.
//
// Every device exchange (descriptor fetch, login, verify, command) goes
// through a client built here, so the per-leg deadline and URL scheme
// live in one place.

use std::time::Duration;

/// Per-leg deadline used by the device firmware's own HTTP clients.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// URL scheme used to reach devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP; what shipping firmware speaks on the LAN.
    #[default]
    Http,
    /// HTTPS, for devices reached through a TLS-terminating proxy.
    Https,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub scheme: Scheme,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// The timeout covers the whole exchange (connect + send + receive),
    /// which is exactly the per-leg deadline the session machine needs.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("twinkly-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(crate::error::Error::Transport)
    }

    /// Deadline in whole seconds, for error reporting.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}
