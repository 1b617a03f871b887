//! Client for the provider's authentication API.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::account::AccountConfig;
use crate::algorithm::CodeVerifier;
use crate::credentials::{Credentials, TokenResponse};
use crate::error::{exchange_error, Error, ErrorKind, ExchangeErrorKind, ProviderError};
use crate::http::{HttpClient, HttpClientBuilder};

/// Grant used to exchange an authorization code.
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";

/// Error code used when a failed response body is not JSON.
pub const NON_JSON_ERROR: &str = "one.sdk.internal_error.plain";
/// Error code used when a failed response has no body.
pub const EMPTY_BODY_ERROR: &str = "one.sdk.internal_error.empty";

const KEY_CLIENT_ID: &str = "client_id";
const KEY_GRANT_TYPE: &str = "grant_type";
const KEY_CODE: &str = "code";
const KEY_CODE_VERIFIER: &str = "code_verifier";
const KEY_REDIRECT_URI: &str = "redirect_uri";
const KEY_ACCESS_ID: &str = "access_id";

/// Builds requests against the account's token API.
#[derive(Clone)]
pub struct AuthenticationApiClient {
    account: AccountConfig,
    http_client: HttpClient,
}

impl AuthenticationApiClient {
    /// Create a client with a default HTTP client.
    pub fn new(account: AccountConfig) -> Result<Self, Error> {
        let http_client = HttpClientBuilder::new().build()?;
        Ok(Self::with_http_client(account, http_client))
    }

    pub fn with_http_client(account: AccountConfig, http_client: HttpClient) -> Self {
        Self {
            account,
            http_client,
        }
    }

    pub fn account(&self) -> &AccountConfig {
        &self.account
    }

    pub fn client_id(&self) -> &str {
        self.account.client_id()
    }

    /// Token API base URL; the default expected ID token issuer.
    pub fn base_url(&self) -> &str {
        self.account.auth_url()
    }

    /// Request exchanging an authorization code and its PKCE verifier for credentials.
    pub fn token(
        &self,
        authorization_code: &str,
        code_verifier: &CodeVerifier,
        redirect_uri: &str,
        access_id: &str,
    ) -> TokenRequest {
        let parameters = BTreeMap::from([
            (KEY_CLIENT_ID, self.account.client_id().to_string()),
            (KEY_GRANT_TYPE, GRANT_TYPE_AUTHORIZATION_CODE.to_string()),
            (KEY_CODE, authorization_code.to_string()),
            (KEY_CODE_VERIFIER, code_verifier.as_str().to_string()),
            (KEY_REDIRECT_URI, redirect_uri.to_string()),
            (KEY_ACCESS_ID, access_id.to_string()),
        ]);

        TokenRequest {
            http_client: self.http_client.clone(),
            url: self.account.token_url().clone(),
            parameters,
            headers: Vec::new(),
        }
    }
}

/// A token endpoint request that has not been sent yet.
pub struct TokenRequest {
    http_client: HttpClient,
    url: Url,
    parameters: BTreeMap<&'static str, String>,
    headers: Vec<(String, String)>,
}

impl TokenRequest {
    /// Attach a header, sent verbatim.
    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Send the request and map the response to credentials.
    pub async fn start(self) -> Result<Credentials, Error> {
        let mut request = self.http_client.post(self.url.as_str()).json(&self.parameters);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(network_error)?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let provider = parse_provider_error(status.as_u16(), &body);
            warn!(
                "Token endpoint returned {} with error {}",
                provider.status, provider.code
            );
            return Err(Error {
                source: provider.description.clone().map(Into::into),
                error_kind: ErrorKind::Exchange(ExchangeErrorKind::Provider(provider)),
            });
        }

        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            exchange_error(
                ExchangeErrorKind::MalformedResponse,
                &format!("Failed to parse token response: {}", e),
            )
        })?;
        debug!("Token endpoint returned credentials");

        Ok(token_response.into_credentials(Utc::now()))
    }
}

fn network_error(err: reqwest_middleware::Error) -> Error {
    Error {
        source: Some(Box::new(err)),
        error_kind: ErrorKind::Exchange(ExchangeErrorKind::Network),
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "code")]
    error: Option<String>,
    #[serde(alias = "description")]
    error_description: Option<String>,
}

fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    if body.trim().is_empty() {
        return ProviderError {
            status,
            code: EMPTY_BODY_ERROR.to_string(),
            description: Some("Empty response body".to_string()),
        };
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => ProviderError {
            status,
            code: parsed
                .error
                .unwrap_or_else(|| format!("http_{}", status)),
            description: parsed.error_description,
        },
        Err(_) => ProviderError {
            status,
            code: NON_JSON_ERROR.to_string(),
            description: Some(body.to_string()),
        },
    }
}
