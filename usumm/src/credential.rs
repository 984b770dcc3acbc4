//! The per-session OAuth credential.

use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use std::time::{Duration, SystemTime};

/// Safety margin subtracted from the provider's `expires_in`.
const EXPIRY_BUFFER: Duration = Duration::from_secs(300);

/// Assumed lifetime when the provider does not say (one hour minus the buffer).
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3300);

/// An access/refresh token pair issued by the identity provider for one browser session.
///
/// The credential is replaced wholesale when the OAuth callback completes or when an expired
/// access token is refreshed, and dropped on logout.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    refresh_token: Option<String>,
    /// When the access token should be considered expired (with safety buffer).
    expires_at: SystemTime,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[redacted]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credential {
    /// Creates a credential that is assumed valid for the default lifetime.
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: SystemTime::now() + DEFAULT_LIFETIME,
        }
    }

    /// Creates a credential from a token endpoint response.
    ///
    /// The expiry time is calculated from the token's `expires_in` field minus
    /// a 5-minute safety buffer to prevent edge-case failures.
    pub fn from_token_response(token: &BasicTokenResponse) -> Self {
        Self {
            access_token: token.access_token().secret().clone(),
            refresh_token: token.refresh_token().map(|t| t.secret().clone()),
            expires_at: calculate_expiry(token.expires_in()),
        }
    }

    /// Returns a copy of this credential that is already expired, forcing a refresh on next use.
    pub fn expired(mut self) -> Self {
        self.expires_at = SystemTime::UNIX_EPOCH;
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// Applies a refreshed token response.
    ///
    /// Google usually omits the refresh token from refresh responses, in which case the
    /// original one is preserved.
    pub fn refreshed(&self, token: &BasicTokenResponse) -> Self {
        let mut next = Self::from_token_response(token);
        if next.refresh_token.is_none() {
            tracing::trace!("new token lacks refresh token, preserving original");
            next.refresh_token = self.refresh_token.clone();
        }
        next
    }
}

fn calculate_expiry(expires_in: Option<Duration>) -> SystemTime {
    let now = SystemTime::now();
    match expires_in {
        Some(expires_in) => now + expires_in.saturating_sub(EXPIRY_BUFFER),
        None => now + DEFAULT_LIFETIME,
    }
}
