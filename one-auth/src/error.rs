//! Error types for the `one-auth` crate.
//!
//! A root `Error` struct carries an error kind and an optional source for chaining.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for one-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in one-auth.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// ASCII encoding or SHA-256 is not usable, so PKCE cannot be offered.
    Capability,
    /// The token is not three decodable base64url segments.
    TokenParse,
    /// Algorithm, signature, key material or claims were rejected.
    TokenValidation,
    Exchange(ExchangeErrorKind),
    Authentication(AuthenticationErrorKind),
    Http(HttpErrorKind),
}

/// Errors from the authorization code exchange.
#[derive(Debug, PartialEq)]
pub enum ExchangeErrorKind {
    Network,
    /// The token endpoint answered with an error payload.
    Provider(ProviderError),
    MalformedResponse,
}

/// Error payload reported by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderError {
    pub status: u16,
    pub code: String,
    pub description: Option<String>,
}

/// Errors from the redirect callback.
#[derive(Debug, PartialEq)]
pub enum AuthenticationErrorKind {
    AccessDenied,
    Unauthorized,
    LoginRequired,
    InvalidConfiguration,
    InvalidState,
    MissingCallbackValues,
}

/// Errors from HTTP client operations.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    /// The client or a request could not be built.
    BuilderFailed,
}

impl Error {
    /// Returns the provider error payload when the token endpoint reported one.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match &self.error_kind {
            ErrorKind::Exchange(ExchangeErrorKind::Provider(provider)) => Some(provider),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Capability => write!(f, "Capability unavailable")?,
            ErrorKind::TokenParse => write!(f, "Token parse error")?,
            ErrorKind::TokenValidation => write!(f, "Token validation error")?,
            ErrorKind::Exchange(ExchangeErrorKind::Provider(provider)) => write!(
                f,
                "Token exchange error: provider returned {} ({})",
                provider.code, provider.status
            )?,
            ErrorKind::Exchange(kind) => write!(f, "Token exchange error: {:?}", kind)?,
            ErrorKind::Authentication(kind) => write!(f, "Authentication error: {:?}", kind)?,
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind)?,
        }
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Builder failures are `Http`; anything raised while talking to the token API is a
/// network failure of the exchange.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else {
            ErrorKind::Exchange(ExchangeErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

/// Helper function to create capability errors.
pub fn capability_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Capability,
    }
}

/// Helper function to create token parse errors.
pub fn token_parse_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::TokenParse,
    }
}

/// Helper function to create token validation errors.
pub fn token_validation_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::TokenValidation,
    }
}

/// Helper function to create token exchange errors.
pub fn exchange_error(kind: ExchangeErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Exchange(kind),
    }
}

/// Helper function to create authentication errors.
pub fn authentication_error(kind: AuthenticationErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Authentication(kind),
    }
}
