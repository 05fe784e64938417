use thiserror::Error;

/// Top-level error type for the `twinkly-api` crate.
///
/// Covers every failure mode of a device exchange: transport, the
/// login/verify handshake, and response decoding. `twinkly-core` maps
/// these into the registry-level error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (non-200 status or a code other than 1000).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Challenge-response verification rejected by the device.
    #[error("Verification failed: {message}")]
    Verification { message: String },

    /// Login answered 1000 but carried no `authentication_token`.
    #[error("Login response carried no authentication token")]
    MissingToken,

    /// The device kept answering 401 after the single re-login.
    #[error("Session expired -- device rejected the token after re-authentication")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The exchange did not complete within its deadline.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the exchange never got an answer in time.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if the device could not be reached at all.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect())
    }

    /// Returns `true` if the failure came from the auth handshake.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. }
                | Self::Verification { .. }
                | Self::MissingToken
                | Self::SessionExpired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_classified() {
        let err = Error::Timeout { timeout_secs: 10 };
        assert!(err.is_timeout());
        assert!(!err.is_auth_failure());
        assert_eq!(err.to_string(), "Request timed out after 10s");
    }

    #[test]
    fn handshake_errors_are_auth_failures() {
        assert!(Error::MissingToken.is_auth_failure());
        assert!(Error::SessionExpired.is_auth_failure());
        assert!(
            Error::Verification {
                message: "code 1103".into()
            }
            .is_auth_failure()
        );
        assert!(
            !Error::Deserialization {
                message: "eof".into(),
                body: String::new()
            }
            .is_auth_failure()
        );
    }
}
