//! # one-auth
//!
//! Client side of an OAuth 2.0 Authorization Code flow with PKCE, plus ID token
//! verification:
//! - PKCE verifier/challenge generation and the code-for-token exchange
//! - JWT parsing and signature verification with an algorithm allow-list
//! - Redirect callback parameter extraction
//! - OpenID Connect claim validation of the returned ID token
//!
//! ## Usage
//!
//! ```rust,ignore
//! use one_auth::{AccountConfig, AuthenticationApiClient, LoginFlow, LoginOptions};
//!
//! let account = AccountConfig::new("client-id")?.with_public_key(public_key_pem);
//! let api = AuthenticationApiClient::new(account)?;
//! let flow = LoginFlow::start(api, LoginOptions::new("app://callback", "access-id"))?;
//! // Send the user to `flow.authorize_url()`, then hand the redirect back:
//! let credentials = flow.resume(&callback_uri, chrono::Utc::now()).await?;
//! ```

pub mod account;
pub mod algorithm;
pub mod api;
pub mod callback;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod http;
pub mod id_token;
pub mod jwt;
pub mod pkce;
pub mod signature;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use account::AccountConfig;
pub use algorithm::{AlgorithmHelper, CodeChallenge, CodeVerifier, DefaultAlgorithmHelper};
pub use api::AuthenticationApiClient;
pub use callback::{values_from_uri, CallbackParameters};
pub use credentials::Credentials;
pub use error::{Error, ErrorKind};
pub use flow::{LoginFlow, LoginOptions};
pub use id_token::IdTokenVerifier;
pub use jwt::Jwt;
pub use pkce::Pkce;
pub use signature::SignatureVerifier;
