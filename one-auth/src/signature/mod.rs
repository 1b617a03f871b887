//! ID token signature verification.
//!
//! A verifier is bound to one key and an allow-list of algorithms. The token's
//! declared `alg` is checked against that list before any cryptographic work, and
//! `none` is refused regardless of configuration.

mod asymmetric;
mod symmetric;

use std::fmt;

use secrecy::SecretString;
use tracing::debug;

use asymmetric::AsymmetricKey;
use symmetric::SymmetricKey;

use crate::error::{token_validation_error, Error};
use crate::jwt::Jwt;

/// Algorithm used with a shared secret.
pub const HS256: &str = "HS256";
/// Algorithm used with an RSA public key.
pub const RS256: &str = "RS256";

enum VerificationKey {
    Symmetric(SymmetricKey),
    Asymmetric(AsymmetricKey),
}

/// Verifies token signatures with either a shared secret or a public key.
///
/// Instances are immutable and may be shared across threads.
pub struct SignatureVerifier {
    supported_algorithms: Vec<String>,
    key: VerificationKey,
}

impl SignatureVerifier {
    /// Verifier for HMAC-SHA256 signatures made with `secret`.
    pub fn for_symmetric_algorithm(secret: SecretString) -> Self {
        Self {
            supported_algorithms: vec![HS256.to_string()],
            key: VerificationKey::Symmetric(SymmetricKey::new(secret)),
        }
    }

    /// Verifier for RSA PKCS#1 v1.5 SHA-256 signatures.
    ///
    /// `public_key_pem` is a `-----BEGIN PUBLIC KEY-----` block holding an X.509
    /// SubjectPublicKeyInfo. Malformed PEM, bad base64 or a non-RSA key produce a
    /// token validation error.
    pub fn for_asymmetric_algorithm(public_key_pem: &str) -> Result<Self, Error> {
        let key = AsymmetricKey::from_pem(public_key_pem)
            .map_err(|e| token_validation_error(&format!("Error creating verifier: {}", e)))?;
        Ok(Self {
            supported_algorithms: vec![RS256.to_string()],
            key: VerificationKey::Asymmetric(key),
        })
    }

    /// Replace the allow-list. The list must not be empty.
    ///
    /// Listing `none` has no effect: such tokens are still rejected.
    pub fn with_supported_algorithms(mut self, algorithms: &[&str]) -> Result<Self, Error> {
        if algorithms.is_empty() {
            return Err(token_validation_error(
                "At least one signature algorithm must be supported.",
            ));
        }
        self.supported_algorithms = algorithms.iter().map(|alg| alg.to_string()).collect();
        Ok(self)
    }

    pub fn supported_algorithms(&self) -> &[String] {
        &self.supported_algorithms
    }

    /// Verify that the token's signature is valid, deeming its payload authentic.
    pub fn verify(&self, token: &Jwt) -> Result<(), Error> {
        self.check_algorithm(token.algorithm())?;

        let signing_input = token.signing_input();
        match &self.key {
            VerificationKey::Symmetric(key) => key.verify(&signing_input, token.signature()),
            VerificationKey::Asymmetric(key) => key.verify(&signing_input, token.signature()),
        }
    }

    fn check_algorithm(&self, algorithm: Option<&str>) -> Result<(), Error> {
        let algorithm = algorithm.unwrap_or_default();
        let supported = self.supported_algorithms.iter().any(|alg| alg == algorithm);

        if supported && !algorithm.eq_ignore_ascii_case("none") {
            return Ok(());
        }

        debug!("Rejecting token signed with algorithm {:?}", algorithm);
        let message = if let [expected] = self.supported_algorithms.as_slice() {
            format!(
                "Signature algorithm of \"{}\" is not supported. Expected the ID token to be signed with {}.",
                algorithm, expected
            )
        } else {
            format!(
                "Signature algorithm of \"{}\" is not supported. Expected the ID token to be signed with any of [{}].",
                algorithm,
                self.supported_algorithms.join(", ")
            )
        };
        Err(token_validation_error(&message))
    }
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.key {
            VerificationKey::Symmetric(_) => "symmetric",
            VerificationKey::Asymmetric(_) => "asymmetric",
        };
        f.debug_struct("SignatureVerifier")
            .field("kind", &kind)
            .field("supported_algorithms", &self.supported_algorithms)
            .finish()
    }
}
