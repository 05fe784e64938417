// Device HTTP client
//
// Wraps `reqwest::Client` with xled-specific URL construction, the
// GET-vs-POST rule, auth header injection, and timeout mapping. The
// session state machine in `session.rs` drives authenticated exchanges
// through `send`; the descriptor fetch is unauthenticated.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{DeviceDescriptor, DeviceResponse, methods};
use crate::transport::{Scheme, TransportConfig};

/// Path prefix of the control API.
pub const API_PREFIX: &str = "xled/v1";

/// Header carrying the session token on authenticated requests.
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Raw HTTP client for the xled/v1 control API.
///
/// Cheap to clone (the inner `reqwest::Client` is reference counted), so
/// every session chain can own its own handle.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    scheme: Scheme,
    timeout: Duration,
}

impl DeviceClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            scheme: transport.scheme,
            timeout: transport.timeout,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    ///
    /// `timeout` is applied per request, so it still bounds every leg.
    pub fn with_client(http: reqwest::Client, scheme: Scheme, timeout: Duration) -> Self {
        Self {
            http,
            scheme,
            timeout,
        }
    }

    /// The per-leg deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `<scheme>://<address>/xled/v1/<method>`
    pub fn method_url(&self, address: &str, method: &str) -> Result<Url, Error> {
        let full = format!(
            "{}://{}/{API_PREFIX}/{}",
            self.scheme,
            address,
            method.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }

    // ── Exchanges ────────────────────────────────────────────────────

    /// Issue one exchange and return the raw reply.
    ///
    /// No payload means GET, a payload means POST with a JSON body. The
    /// token, when given, travels in the `X-Auth-Token` header. Any HTTP
    /// status is returned as a `DeviceResponse`; only transport failures
    /// and deadline expiry are errors.
    pub async fn send(
        &self,
        address: &str,
        method: &str,
        token: Option<&SecretString>,
        payload: Option<&Value>,
    ) -> Result<DeviceResponse, Error> {
        let url = self.method_url(address, method)?;
        debug!(%url, authenticated = token.is_some(), "device request");

        let mut req = match payload {
            Some(body) => self.http.post(url).json(body),
            None => self.http.get(url),
        };
        req = req.timeout(self.timeout);
        if let Some(token) = token {
            req = req.header(AUTH_HEADER, token.expose_secret());
        }

        let resp = req.send().await.map_err(|e| self.map_transport(e))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| self.map_transport(e))?;

        debug!(address, method, status, body = %body, "device response");
        Ok(DeviceResponse { status, body })
    }

    /// Fetch the device's self-description (`gestalt`), unauthenticated.
    ///
    /// Fails if the device does not answer or the body is not JSON.
    /// Field validation is left to the caller.
    pub async fn gestalt(&self, address: &str) -> Result<DeviceDescriptor, Error> {
        let resp = self.send(address, methods::GESTALT, None, None).await?;
        Ok(DeviceDescriptor::new(resp.json()?))
    }

    fn map_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}
