//! Account information for the identity provider.

use url::Url;

use crate::error::{authentication_error, AuthenticationErrorKind, Error};

/// Default host serving the authorization page.
pub const DEFAULT_DOMAIN: &str = "https://one.eartho.world/";
/// Default host serving the token API.
pub const DEFAULT_AUTH_URL: &str = "https://api.eartho.world";

/// Client identifier plus the endpoints and key material of one account.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    client_id: String,
    auth_url: Url,
    authorize_url: Url,
    token_url: Url,
    enabled_providers: Vec<String>,
    public_key: Option<String>,
}

impl AccountConfig {
    /// Create an account using the default domain and token API.
    pub fn new(client_id: impl Into<String>) -> Result<Self, Error> {
        let domain = ensure_valid_url(DEFAULT_DOMAIN)?;
        let auth_url = ensure_valid_url(DEFAULT_AUTH_URL)?;
        Ok(Self {
            client_id: client_id.into(),
            authorize_url: with_segments(&domain, &["connect"])?,
            token_url: with_segments(&auth_url, &["access", "oauth", "token"])?,
            auth_url,
            enabled_providers: Vec::new(),
            public_key: None,
        })
    }

    /// Override the host serving the authorization page.
    pub fn with_domain(mut self, domain: &str) -> Result<Self, Error> {
        let domain = ensure_valid_url(domain)?;
        self.authorize_url = with_segments(&domain, &["connect"])?;
        Ok(self)
    }

    /// Override the token API host. It is also the default ID token issuer.
    pub fn with_auth_url(mut self, auth_url: &str) -> Result<Self, Error> {
        let auth_url = ensure_valid_url(auth_url)?;
        self.token_url = with_segments(&auth_url, &["access", "oauth", "token"])?;
        self.auth_url = auth_url;
        Ok(self)
    }

    /// Restrict the authorization page to the given login providers.
    pub fn with_enabled_providers(mut self, providers: Vec<String>) -> Self {
        self.enabled_providers = providers;
        self
    }

    /// PEM encoded public key that signs this account's ID tokens.
    pub fn with_public_key(mut self, public_key_pem: String) -> Self {
        self.public_key = Some(public_key_pem);
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Token API base URL, without a trailing slash.
    pub fn auth_url(&self) -> &str {
        self.auth_url.as_str().trim_end_matches('/')
    }

    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    pub fn enabled_providers(&self) -> &[String] {
        &self.enabled_providers
    }

    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }
}

/// Parse a domain, defaulting the scheme to HTTPS.
///
/// Plain HTTP is only accepted for loopback hosts.
fn ensure_valid_url(url: &str) -> Result<Url, Error> {
    let lowercase = url.to_lowercase();
    let candidate = if lowercase.starts_with("http://") || lowercase.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };

    let parsed = Url::parse(&candidate).map_err(|e| {
        authentication_error(
            AuthenticationErrorKind::InvalidConfiguration,
            &format!("Invalid domain url: '{}': {}", url, e),
        )
    })?;

    let loopback = matches!(parsed.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
    if parsed.scheme() == "http" && !loopback {
        return Err(authentication_error(
            AuthenticationErrorKind::InvalidConfiguration,
            &format!(
                "Invalid domain url: '{}'. Only HTTPS domain URLs are supported. If no scheme is passed, HTTPS will be used.",
                url
            ),
        ));
    }
    Ok(parsed)
}

fn with_segments(base: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| {
            authentication_error(
                AuthenticationErrorKind::InvalidConfiguration,
                &format!("Invalid domain url: '{}'", base),
            )
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
