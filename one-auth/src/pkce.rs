//! Proof Key for Code Exchange session.

use std::collections::HashMap;

use tracing::{debug, error};

use crate::algorithm::{self, AlgorithmHelper, CodeChallenge, CodeVerifier, DefaultAlgorithmHelper};
use crate::api::{AuthenticationApiClient, TokenRequest};
use crate::credentials::Credentials;
use crate::error::{capability_error, Error};

/// Performs the code-for-token exchange of one login attempt.
///
/// The verifier is generated on construction and only ever leaves the process in
/// the exchange request. [`Pkce::get_token`] consumes the session, so a second
/// exchange with the same verifier does not compile:
///
/// ```compile_fail
/// # use std::collections::HashMap;
/// # use one_auth::{AccountConfig, AuthenticationApiClient, Pkce};
/// # async fn reuse() -> Result<(), one_auth::Error> {
/// let api = AuthenticationApiClient::new(AccountConfig::new("client-id")?)?;
/// let pkce = Pkce::new(api, "app://callback", HashMap::new())?;
/// let _ = pkce.get_token("code", "access-id").await;
/// let _ = pkce.get_token("code", "access-id").await;
/// # Ok(())
/// # }
/// ```
pub struct Pkce {
    api_client: AuthenticationApiClient,
    code_verifier: CodeVerifier,
    code_challenge: CodeChallenge,
    redirect_uri: String,
    headers: HashMap<String, String>,
}

impl Pkce {
    /// New session with a fresh verifier from the default primitives.
    pub fn new(
        api_client: AuthenticationApiClient,
        redirect_uri: &str,
        headers: HashMap<String, String>,
    ) -> Result<Self, Error> {
        Self::with_algorithm_helper(api_client, &DefaultAlgorithmHelper, redirect_uri, headers)
    }

    /// New session whose verifier and challenge come from `helper`.
    pub fn with_algorithm_helper(
        api_client: AuthenticationApiClient,
        helper: &dyn AlgorithmHelper,
        redirect_uri: &str,
        headers: HashMap<String, String>,
    ) -> Result<Self, Error> {
        if !algorithm::is_available(helper) {
            return Err(capability_error(
                "PKCE is not available: US-ASCII encoding or SHA-256 is not supported",
            ));
        }

        let code_verifier = helper.generate_code_verifier();
        let code_challenge = helper.generate_code_challenge(&code_verifier)?;

        Ok(Self {
            api_client,
            code_verifier,
            code_challenge,
            redirect_uri: redirect_uri.to_string(),
            headers,
        })
    }

    /// Whether the default primitives work on this platform.
    pub fn is_available() -> bool {
        algorithm::is_available(&DefaultAlgorithmHelper)
    }

    /// Challenge to send with the authorization request.
    pub fn code_challenge(&self) -> &CodeChallenge {
        &self.code_challenge
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub(crate) fn token_request(&self, authorization_code: &str, access_id: &str) -> TokenRequest {
        let mut request = self.api_client.token(
            authorization_code,
            &self.code_verifier,
            &self.redirect_uri,
            access_id,
        );
        for (name, value) in &self.headers {
            debug!("Adding header {} to the token request", name);
            request.add_header(name, value);
        }
        request
    }

    /// Exchange the authorization code for credentials.
    pub async fn get_token(
        self,
        authorization_code: &str,
        access_id: &str,
    ) -> Result<Credentials, Error> {
        self.token_request(authorization_code, access_id)
            .start()
            .await
            .inspect_err(|e| error!("Unable to get the token: {}", e))
    }
}
