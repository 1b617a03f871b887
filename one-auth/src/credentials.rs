//! Credentials returned by the token endpoint.

use chrono::{DateTime, Duration, TimeZone, Utc};
use secrecy::SecretString;
use serde::Deserialize;

/// The user's credentials after a successful code exchange.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Identity token with user information. Untrusted until validated.
    pub id_token: Option<SecretString>,
    /// Access token for API requests.
    pub access_token: Option<SecretString>,
    /// Refresh token for obtaining new tokens without signing in again.
    pub refresh_token: Option<SecretString>,
    /// Token type (usually "Bearer").
    pub token_type: Option<String>,
    /// When the access token expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scope, when it differs from the requested one.
    pub scope: Option<String>,
}

impl Credentials {
    /// Whether the access token has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|expires| expires <= now).unwrap_or(false)
    }
}

/// Wire shape of a successful token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    id_token: Option<SecretString>,
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
    token_type: Option<String>,
    /// Lifetime in seconds, relative to receipt.
    expires_in: Option<i64>,
    /// Absolute expiry in seconds since the epoch.
    expires_at: Option<i64>,
    scope: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_credentials(self, received_at: DateTime<Utc>) -> Credentials {
        let expires_at = match (self.expires_in, self.expires_at) {
            (Some(seconds), _) => Duration::try_seconds(seconds)
                .and_then(|lifetime| received_at.checked_add_signed(lifetime)),
            (None, Some(timestamp)) => Utc.timestamp_opt(timestamp, 0).single(),
            (None, None) => None,
        };

        Credentials {
            id_token: self.id_token,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_at,
            scope: self.scope,
        }
    }
}
