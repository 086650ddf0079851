// ── Gateway session ──
//
// Host-side token holder around a `TelemetrySource`:
//
//   Unauthenticated --authenticate()--> Authenticated(token)
//   Authenticated   --fetch() ok-----> Authenticated(token)
//   Authenticated   --TokenExpired---> Unauthenticated
//
// `poll` adds the one policy the library ships: on `TokenExpired`,
// re-authenticate once and retry once, when the credential can mint. The
// source itself never retries. `resume` enters `Authenticated` with a token
// the host kept from an earlier run.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::CoreError;
use crate::profile::{AccessToken, Credential, GatewayProfile};
use crate::reading::{MetricCategory, TelemetryReading};
use crate::source::TelemetrySource;

/// Where a session stands.
#[derive(Debug, Clone)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(AccessToken),
}

/// One gateway, one credential, at most one token.
///
/// Methods take `&mut self`, so a session has at most one call in flight.
pub struct GatewaySession {
    source: Arc<dyn TelemetrySource>,
    profile: GatewayProfile,
    credential: Credential,
    state: SessionState,
}

impl GatewaySession {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        profile: GatewayProfile,
        credential: Credential,
    ) -> Self {
        Self {
            source,
            profile,
            credential,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    pub fn token(&self) -> Option<&AccessToken> {
        match &self.state {
            SessionState::Authenticated(token) => Some(token),
            SessionState::Unauthenticated => None,
        }
    }

    pub fn profile(&self) -> &GatewayProfile {
        &self.profile
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Replace the profile (e.g. after an address change). A token bound
    /// to a different serial is dropped.
    pub fn set_profile(&mut self, profile: GatewayProfile) {
        if profile.serial_number != self.profile.serial_number {
            self.state = SessionState::Unauthenticated;
        }
        self.profile = profile;
    }

    /// Adopt a previously obtained token without contacting anything.
    /// Returns `false`, leaving the state alone, when the token belongs to
    /// another serial.
    pub fn resume(&mut self, token: AccessToken) -> bool {
        if token.serial_number() != self.profile.serial_number {
            debug!(
                token_serial = token.serial_number(),
                serial = %self.profile.serial_number,
                "stored token is for another gateway"
            );
            return false;
        }
        self.state = SessionState::Authenticated(token);
        true
    }

    /// Mint a fresh token, replacing any held one.
    pub async fn authenticate(&mut self) -> Result<AccessToken, CoreError> {
        let token = self
            .source
            .authenticate(&self.profile, &self.credential)
            .await?;
        info!(
            serial = %self.profile.serial_number,
            local = token.is_local(),
            expires_at = ?token.expires_at(),
            "authenticated"
        );
        self.state = SessionState::Authenticated(token.clone());
        Ok(token)
    }

    /// Read one category with the held token.
    ///
    /// `TokenExpired` moves the session back to `Unauthenticated`.
    pub async fn fetch(&mut self, category: MetricCategory) -> Result<TelemetryReading, CoreError> {
        let Some(token) = self.token() else {
            return Err(CoreError::NotAuthenticated);
        };

        let result = self.source.fetch(&self.profile, Some(token), category).await;
        if matches!(result, Err(CoreError::TokenExpired)) {
            debug!(%category, "token rejected, session unauthenticated");
            self.state = SessionState::Unauthenticated;
        }
        result
    }

    /// Fetch, authenticating first if needed. On `TokenExpired`,
    /// re-authenticate once and retry once if the credential can mint.
    pub async fn poll(&mut self, category: MetricCategory) -> Result<TelemetryReading, CoreError> {
        if !self.is_authenticated() {
            self.authenticate().await?;
        }

        match self.fetch(category).await {
            Err(CoreError::TokenExpired) if self.credential.can_mint() => {
                info!(%category, "token expired, re-authenticating");
                self.authenticate().await?;
                self.fetch(category).await
            }
            other => other,
        }
    }
}
