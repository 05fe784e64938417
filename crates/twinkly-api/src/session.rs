// Authenticated exchange chain
//
// Every control command rides on a short-lived session: login, an
// optional challenge-response verify, then the command itself. A 401 on
// the command leg drops the token and re-runs the handshake once; a
// second rejection ends the chain.

use secrecy::SecretString;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::client::DeviceClient;
use crate::error::Error;
use crate::models::{CODE_OK, DeviceRequest, DeviceResponse, methods};

/// Fixed challenge sent on login. The device echoes a derived
/// `challenge-response` which is handed back on verify.
pub const LOGIN_CHALLENGE: &str = "sT/f+2z8HvEkP3topBoJL83eWNZZtpAb1v+tcfY4E3s=";

/// Re-logins allowed per chain after the device rejects a token.
pub const MAX_RELOGINS: u8 = 1;

/// Where a chain currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    LoginPending,
    VerifyPending,
    Authenticated,
    CommandPending,
    Done,
}

/// One operation chain against one device.
///
/// A chain may send several commands with [`Session::send`]; the token
/// and the re-login budget carry across them. It ends when consumed by
/// [`Session::execute`], [`Session::finish`] or [`Session::logout`], so
/// the session is released exactly once whichever way the chain ends.
pub struct Session {
    client: DeviceClient,
    address: String,
    token: Option<SecretString>,
    state: SessionState,
    relogins: u8,
}

impl Session {
    pub fn new(client: DeviceClient, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
            token: None,
            state: SessionState::Unauthenticated,
            relogins: 0,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the chain for `request` and return the command leg's reply.
    ///
    /// Any HTTP status other than 401 on the command leg is handed back
    /// as-is; interpreting it is the caller's business.
    pub async fn execute(mut self, request: &DeviceRequest) -> Result<DeviceResponse, Error> {
        let result = self.send(request).await;
        self.finish();
        result
    }

    /// Send one command within the chain, keeping the session open.
    ///
    /// Logs in only when no token is held. A 401 spends the chain's single
    /// re-login, not a per-command one.
    pub async fn send(&mut self, request: &DeviceRequest) -> Result<DeviceResponse, Error> {
        let resp = self.run(request).await?;
        self.transition(SessionState::Authenticated);
        Ok(resp)
    }

    /// End the chain without further exchanges.
    pub fn finish(mut self) {
        self.transition(SessionState::Done);
    }

    /// Log in, then end the session on the device.
    pub async fn logout(mut self) -> Result<(), Error> {
        let request = DeviceRequest::new(methods::LOGOUT, Some(json!({})));
        let result = self.run(&request).await;
        self.token = None;
        self.transition(SessionState::Done);

        let resp = result?;
        match resp.code() {
            Some(CODE_OK) if resp.is_ok() => Ok(()),
            code => Err(Error::Authentication {
                message: format!(
                    "logout rejected (HTTP {}, code {})",
                    resp.status,
                    code.map_or_else(|| "none".to_owned(), |c| c.to_string())
                ),
            }),
        }
    }

    // ── Chain ────────────────────────────────────────────────────────

    async fn run(&mut self, request: &DeviceRequest) -> Result<DeviceResponse, Error> {
        loop {
            if self.token.is_none() {
                self.authenticate().await?;
            }

            self.transition(SessionState::CommandPending);
            let resp = self
                .client
                .send(
                    &self.address,
                    &request.method,
                    self.token.as_ref(),
                    request.payload.as_ref(),
                )
                .await?;

            if resp.status != 401 {
                return Ok(resp);
            }

            self.token = None;
            if self.relogins >= MAX_RELOGINS {
                warn!(address = %self.address, method = %request.method, "token rejected after re-login");
                return Err(Error::SessionExpired);
            }
            self.relogins += 1;
            debug!(address = %self.address, "token rejected, logging in again");
            self.transition(SessionState::Unauthenticated);
        }
    }

    async fn authenticate(&mut self) -> Result<(), Error> {
        if let Some(challenge_response) = self.login().await? {
            self.verify(&challenge_response).await?;
        }
        self.transition(SessionState::Authenticated);
        Ok(())
    }

    /// Returns the `challenge-response` to verify, if the device sent one.
    async fn login(&mut self) -> Result<Option<String>, Error> {
        self.transition(SessionState::LoginPending);

        let body = json!({ "challenge": LOGIN_CHALLENGE });
        let resp = self
            .client
            .send(&self.address, methods::LOGIN, None, Some(&body))
            .await?;

        if !resp.is_ok() {
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {}): {}", resp.status, resp.body),
            });
        }

        let json = resp.json()?;
        match json.get("code").and_then(Value::as_i64) {
            Some(CODE_OK) => {}
            Some(code) => {
                return Err(Error::Authentication {
                    message: format!("login rejected with code {code}"),
                });
            }
            None => {
                return Err(Error::Authentication {
                    message: "login response carried no code".into(),
                });
            }
        }

        let token = json
            .get("authentication_token")
            .and_then(Value::as_str)
            .ok_or(Error::MissingToken)?;
        self.token = Some(SecretString::from(token.to_owned()));

        Ok(json
            .get("challenge-response")
            .and_then(Value::as_str)
            .map(str::to_owned))
    }

    async fn verify(&mut self, challenge_response: &str) -> Result<(), Error> {
        self.transition(SessionState::VerifyPending);

        let body = json!({ "challenge-response": challenge_response });
        let resp = self
            .client
            .send(&self.address, methods::VERIFY, self.token.as_ref(), Some(&body))
            .await?;

        if !resp.is_ok() {
            return Err(Error::Verification {
                message: format!("verify failed (HTTP {}): {}", resp.status, resp.body),
            });
        }
        match resp.code() {
            Some(CODE_OK) => Ok(()),
            Some(code) => Err(Error::Verification {
                message: format!("verify rejected with code {code}"),
            }),
            None => Err(Error::Verification {
                message: "verify response carried no code".into(),
            }),
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(address = %self.address, from = %self.state, to = %next, "session");
        self.state = next;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("authenticated", &self.token.is_some())
            .field("relogins", &self.relogins)
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(address = %self.address, state = %self.state, "session released");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::Scheme;

    #[test]
    fn new_session_starts_unauthenticated() {
        let client = DeviceClient::with_client(
            reqwest::Client::new(),
            Scheme::Http,
            Duration::from_secs(1),
        );
        let session = Session::new(client, "10.0.0.7");
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.address(), "10.0.0.7");
        assert!(format!("{session:?}").contains("authenticated: false"));
    }

    #[test]
    fn states_render_in_snake_case() {
        assert_eq!(SessionState::LoginPending.to_string(), "login_pending");
        assert_eq!(SessionState::Done.to_string(), "done");
    }
}
