//! Browser based login: authorization request, callback and token validation.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use tracing::{debug, warn};
use url::Url;

use crate::algorithm::{random_url_safe_string, CODE_CHALLENGE_METHOD};
use crate::api::AuthenticationApiClient;
use crate::callback::values_from_uri;
use crate::credentials::Credentials;
use crate::error::{authentication_error, AuthenticationErrorKind, Error};
use crate::id_token::IdTokenVerifier;
use crate::pkce::Pkce;
use crate::signature::SignatureVerifier;

/// Scope requested when none is given.
pub const DEFAULT_SCOPE: &str = "openid profile email";

const KEY_RESPONSE_TYPE: &str = "response_type";
const KEY_SCOPE: &str = "scope";
const KEY_CODE_CHALLENGE: &str = "code_challenge";
const KEY_CODE_CHALLENGE_METHOD: &str = "code_challenge_method";
const KEY_CLIENT_ID: &str = "client_id";
const KEY_REDIRECT_URI: &str = "redirect_uri";
const KEY_STATE: &str = "state";
const KEY_NONCE: &str = "nonce";
const KEY_ACCESS_ID: &str = "access_id";
const KEY_ENABLED_PROVIDERS: &str = "enabled_providers";
const KEY_MAX_AGE: &str = "max_age";
const KEY_CODE: &str = "code";
const KEY_ERROR: &str = "error";
const KEY_ERROR_DESCRIPTION: &str = "error_description";

const ERROR_ACCESS_DENIED: &str = "access_denied";
const ERROR_UNAUTHORIZED: &str = "unauthorized";
const ERROR_LOGIN_REQUIRED: &str = "login_required";

/// Parameters of one login.
#[derive(Debug)]
pub struct LoginOptions {
    pub redirect_uri: String,
    pub access_id: String,
    pub scope: String,
    /// Generated when absent.
    pub state: Option<String>,
    /// Generated when absent.
    pub nonce: Option<String>,
    pub max_age: Option<i64>,
    pub leeway: Option<Duration>,
    /// Expected `iss`, the token API URL when absent.
    pub issuer: Option<String>,
    /// Extra headers for the token request.
    pub headers: HashMap<String, String>,
    /// Verifies the ID token signature. Built from the account public key when absent.
    pub signature_verifier: Option<SignatureVerifier>,
}

impl LoginOptions {
    pub fn new(redirect_uri: &str, access_id: &str) -> Self {
        Self {
            redirect_uri: redirect_uri.to_string(),
            access_id: access_id.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            state: None,
            nonce: None,
            max_age: None,
            leeway: None,
            issuer: None,
            headers: HashMap::new(),
            signature_verifier: None,
        }
    }
}

/// A login waiting for its redirect callback.
///
/// [`LoginFlow::resume`] consumes the flow; a callback can only be handled once.
pub struct LoginFlow {
    pkce: Pkce,
    authorize_url: Url,
    state: String,
    nonce: String,
    access_id: String,
    id_token_verifier: IdTokenVerifier,
}

impl LoginFlow {
    /// Prepare the PKCE pair, the ID token expectations and the authorization URL.
    pub fn start(api_client: AuthenticationApiClient, options: LoginOptions) -> Result<Self, Error> {
        let account = api_client.account();

        let signature_verifier = match options.signature_verifier {
            Some(verifier) => verifier,
            None => {
                let public_key = account.public_key().ok_or_else(|| {
                    authentication_error(
                        AuthenticationErrorKind::InvalidConfiguration,
                        "A public key is required to verify ID tokens",
                    )
                })?;
                SignatureVerifier::for_asymmetric_algorithm(public_key)?
            }
        };

        let issuer = options
            .issuer
            .unwrap_or_else(|| api_client.base_url().to_string());
        let mut id_token_verifier =
            IdTokenVerifier::new(&issuer, api_client.client_id(), signature_verifier)
                .with_max_age(options.max_age);

        let state = options.state.unwrap_or_else(random_url_safe_string);
        let nonce = options.nonce.unwrap_or_else(random_url_safe_string);
        id_token_verifier = id_token_verifier.with_nonce(Some(nonce.clone()));
        if let Some(leeway) = options.leeway {
            id_token_verifier = id_token_verifier.with_leeway(leeway);
        }

        let mut authorize_url = account.authorize_url().clone();
        let enabled_providers = account.enabled_providers().join(",");
        let client_id = api_client.client_id().to_string();
        let pkce = Pkce::new(api_client, &options.redirect_uri, options.headers)?;

        {
            let mut query = authorize_url.query_pairs_mut();
            query
                .append_pair(KEY_RESPONSE_TYPE, "code")
                .append_pair(KEY_SCOPE, &with_openid(&options.scope))
                .append_pair(KEY_CODE_CHALLENGE, pkce.code_challenge().as_str())
                .append_pair(KEY_CODE_CHALLENGE_METHOD, CODE_CHALLENGE_METHOD)
                .append_pair(KEY_CLIENT_ID, &client_id)
                .append_pair(KEY_REDIRECT_URI, &options.redirect_uri)
                .append_pair(KEY_STATE, &state)
                .append_pair(KEY_NONCE, &nonce)
                .append_pair(KEY_ACCESS_ID, &options.access_id);
            if let Some(max_age) = options.max_age {
                query.append_pair(KEY_MAX_AGE, &max_age.to_string());
            }
            if !enabled_providers.is_empty() {
                query.append_pair(KEY_ENABLED_PROVIDERS, &enabled_providers);
            }
        }
        debug!("Using the following authorize URI: {}", authorize_url);

        Ok(Self {
            pkce,
            authorize_url,
            state,
            nonce,
            access_id: options.access_id,
            id_token_verifier,
        })
    }

    /// URL to open in the browser.
    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Handle the redirect callback: check it, exchange the code and validate the ID token.
    pub async fn resume(self, callback_uri: &str, now: DateTime<Utc>) -> Result<Credentials, Error> {
        let values = values_from_uri(Some(callback_uri));
        if values.is_empty() {
            warn!("The callback URI did not contain any values: {}", callback_uri);
            return Err(authentication_error(
                AuthenticationErrorKind::MissingCallbackValues,
                "The callback URI did not contain any values",
            ));
        }
        debug!("The parsed callback URI has {} values", values.len());

        assert_no_error(&values)?;

        if values.get(KEY_STATE) != Some(&self.state) {
            return Err(authentication_error(
                AuthenticationErrorKind::InvalidState,
                "The received state is invalid. Try again.",
            ));
        }

        let code = values.get(KEY_CODE).ok_or_else(|| {
            authentication_error(
                AuthenticationErrorKind::MissingCallbackValues,
                "The callback URI did not contain an authorization code",
            )
        })?;

        let credentials = self
            .pkce
            .get_token(code, &self.access_id)
            .await
            .inspect_err(|e| {
                let unauthorized = e
                    .provider_error()
                    .and_then(|provider| provider.description.as_deref())
                    == Some("Unauthorized");
                if unauthorized {
                    warn!("Unable to complete authentication with PKCE. PKCE support can be enabled by setting Application Type to 'Native' and Token Endpoint Authentication Method to 'None' for this app.");
                }
            })?;

        let id_token = credentials.id_token.as_ref().map(|token| token.expose_secret().as_str());
        self.id_token_verifier.verify(id_token, now)?;

        Ok(credentials)
    }
}

fn with_openid(scope: &str) -> String {
    if scope.split_whitespace().any(|s| s == "openid") {
        scope.to_string()
    } else if scope.trim().is_empty() {
        "openid".to_string()
    } else {
        format!("{} openid", scope.trim())
    }
}

fn assert_no_error(values: &HashMap<String, String>) -> Result<(), Error> {
    let Some(error) = values.get(KEY_ERROR) else {
        return Ok(());
    };
    let description = values.get(KEY_ERROR_DESCRIPTION).map(String::as_str);
    debug!("Error, access denied. Check that the required permissions are granted and that the application has this connection configured");

    let (kind, message) = match error.as_str() {
        ERROR_ACCESS_DENIED => (
            AuthenticationErrorKind::AccessDenied,
            description.unwrap_or("Permissions were not granted. Try again."),
        ),
        ERROR_UNAUTHORIZED => (
            AuthenticationErrorKind::Unauthorized,
            description.unwrap_or(ERROR_UNAUTHORIZED),
        ),
        ERROR_LOGIN_REQUIRED => (
            AuthenticationErrorKind::LoginRequired,
            description.unwrap_or(ERROR_LOGIN_REQUIRED),
        ),
        other => (
            AuthenticationErrorKind::InvalidConfiguration,
            description.unwrap_or(other),
        ),
    };
    Err(authentication_error(kind, message))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;
    use crate::account::AccountConfig;
    use crate::error::{ErrorKind, ExchangeErrorKind};
    use crate::test_support::{rsa_fixture, sign_rs256};

    const CLIENT_ID: &str = "client-123";
    const NOW: i64 = 1_700_000_000;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(NOW, 0).unwrap()
    }

    fn api_client(auth_url: &str) -> AuthenticationApiClient {
        let account = AccountConfig::new(CLIENT_ID)
            .unwrap()
            .with_auth_url(auth_url)
            .unwrap()
            .with_public_key(rsa_fixture().public_pem.clone());
        AuthenticationApiClient::new(account).unwrap()
    }

    fn options() -> LoginOptions {
        let mut options = LoginOptions::new("app://callback", "access-1");
        options.state = Some("state-1".to_string());
        options.nonce = Some("nonce-1".to_string());
        options
    }

    fn id_token(issuer: &str, nonce: &str) -> String {
        sign_rs256(json!({
            "iss": issuer,
            "sub": "user-1",
            "aud": CLIENT_ID,
            "exp": NOW + 3600,
            "iat": NOW,
            "nonce": nonce
        }))
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_authorize_url() {
        let account = AccountConfig::new(CLIENT_ID)
            .unwrap()
            .with_enabled_providers(vec!["google".to_string(), "apple".to_string()])
            .with_public_key(rsa_fixture().public_pem.clone());
        let client = AuthenticationApiClient::new(account).unwrap();

        let flow = LoginFlow::start(client, options()).unwrap();
        let url = flow.authorize_url();
        let params = query(url);

        assert_eq!(url.path(), "/connect");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid profile email");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["code_challenge"].len(), 43);
        assert_eq!(params["client_id"], CLIENT_ID);
        assert_eq!(params["redirect_uri"], "app://callback");
        assert_eq!(params["state"], "state-1");
        assert_eq!(params["nonce"], "nonce-1");
        assert_eq!(params["access_id"], "access-1");
        assert_eq!(params["enabled_providers"], "google,apple");
        assert!(!params.contains_key("max_age"));
    }

    #[test]
    fn test_generated_state_and_nonce() {
        let flow = LoginFlow::start(
            api_client("https://api.example.com"),
            LoginOptions::new("app://callback", "access-1"),
        )
        .unwrap();
        assert_eq!(flow.state().len(), 43);
        assert_eq!(flow.nonce().len(), 43);
        assert_ne!(flow.state(), flow.nonce());
        assert!(!query(flow.authorize_url()).contains_key("enabled_providers"));
    }

    #[test]
    fn test_scope_always_has_openid() {
        assert_eq!(with_openid("profile email"), "profile email openid");
        assert_eq!(with_openid("openid"), "openid");
        assert_eq!(with_openid(""), "openid");
        assert_eq!(with_openid("openidx"), "openidx openid");
    }

    #[test]
    fn test_start_requires_public_key() {
        let account = AccountConfig::new(CLIENT_ID).unwrap();
        let client = AuthenticationApiClient::new(account).unwrap();
        let err = LoginFlow::start(client, options()).err().unwrap();
        assert_eq!(
            err.error_kind,
            ErrorKind::Authentication(AuthenticationErrorKind::InvalidConfiguration)
        );
    }

    #[tokio::test]
    async fn test_resume_success() {
        let mut server = Server::new_async().await;
        let issuer = server.url();
        let mock = server
            .mock("POST", "/access/oauth/token")
            .match_body(Matcher::PartialJson(json!({
                "code": "auth-code",
                "access_id": "access-1",
                "redirect_uri": "app://callback"
            })))
            .with_status(200)
            .with_body(
                json!({
                    "id_token": id_token(&issuer, "nonce-1"),
                    "access_token": "at",
                    "token_type": "Bearer",
                    "expires_in": 3600
                })
                .to_string(),
            )
            .create_async()
            .await;

        let flow = LoginFlow::start(api_client(&server.url()), options()).unwrap();
        let credentials = flow
            .resume("app://callback?code=auth-code&state=state-1", now())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(credentials.token_type.as_deref(), Some("Bearer"));
    }

    #[tokio::test]
    async fn test_resume_rejects_invalid_id_token() {
        let mut server = Server::new_async().await;
        let issuer = server.url();
        let _mock = server
            .mock("POST", "/access/oauth/token")
            .with_status(200)
            .with_body(json!({"id_token": id_token(&issuer, "other-nonce")}).to_string())
            .create_async()
            .await;

        let flow = LoginFlow::start(api_client(&server.url()), options()).unwrap();
        let err = flow
            .resume("app://callback#code=auth-code&state=state-1", now())
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::TokenValidation);
    }

    #[tokio::test]
    async fn test_resume_without_values() {
        let flow = LoginFlow::start(api_client("https://api.example.com"), options()).unwrap();
        let err = flow.resume("app://callback", now()).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Authentication(AuthenticationErrorKind::MissingCallbackValues)
        );
    }

    #[tokio::test]
    async fn test_resume_maps_callback_errors() {
        let cases = [
            ("error=access_denied", AuthenticationErrorKind::AccessDenied),
            ("error=unauthorized", AuthenticationErrorKind::Unauthorized),
            ("error=login_required", AuthenticationErrorKind::LoginRequired),
            ("error=server_error", AuthenticationErrorKind::InvalidConfiguration),
        ];
        for (query, kind) in cases {
            let flow = LoginFlow::start(api_client("https://api.example.com"), options()).unwrap();
            let err = flow
                .resume(&format!("app://callback?{}&state=state-1", query), now())
                .await
                .unwrap_err();
            assert_eq!(err.error_kind, ErrorKind::Authentication(kind));
        }
    }

    #[tokio::test]
    async fn test_access_denied_default_description() {
        let flow = LoginFlow::start(api_client("https://api.example.com"), options()).unwrap();
        let err = flow
            .resume("app://callback?error=access_denied", now())
            .await
            .unwrap_err();
        assert_eq!(
            err.source.unwrap().to_string(),
            "Permissions were not granted. Try again."
        );
    }

    #[tokio::test]
    async fn test_resume_rejects_state_mismatch() {
        for uri in [
            "app://callback?code=auth-code&state=forged",
            "app://callback?code=auth-code",
        ] {
            let flow = LoginFlow::start(api_client("https://api.example.com"), options()).unwrap();
            let err = flow.resume(uri, now()).await.unwrap_err();
            assert_eq!(
                err.error_kind,
                ErrorKind::Authentication(AuthenticationErrorKind::InvalidState)
            );
        }
    }

    #[tokio::test]
    async fn test_resume_surfaces_exchange_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/access/oauth/token")
            .with_status(401)
            .with_body(r#"{"error":"unauthorized","error_description":"Unauthorized"}"#)
            .create_async()
            .await;

        let flow = LoginFlow::start(api_client(&server.url()), options()).unwrap();
        let err = flow
            .resume("app://callback?code=auth-code&state=state-1", now())
            .await
            .unwrap_err();
        assert!(matches!(
            err.error_kind,
            ErrorKind::Exchange(ExchangeErrorKind::Provider(_))
        ));
    }
}
