//! Primitives behind PKCE (RFC 7636) and token signature checks.
//!
//! The verifier is 32 random bytes from the thread-local CSPRNG, base64url encoded
//! without padding, which gives 43 characters of the unreserved alphabet. The
//! challenge is the base64url SHA-256 digest of the verifier's ASCII bytes (`S256`).

use std::fmt;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    DecodeError, Engine,
};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{capability_error, Error};

/// Code challenge method sent alongside the challenge.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

const VERIFIER_MIN_LEN: usize = 43;
const VERIFIER_MAX_LEN: usize = 128;

/// PKCE code verifier (random string).
#[derive(Clone, PartialEq, Eq)]
pub struct CodeVerifier(String);

impl CodeVerifier {
    /// Generate a new random code verifier.
    pub fn generate() -> Self {
        Self(random_url_safe_string())
    }

    /// Create a code verifier from an existing string.
    pub fn from_string(verifier: String) -> Self {
        Self(verifier)
    }

    /// Get the verifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the length and alphabet satisfy RFC 7636 section 4.1.
    pub fn is_well_formed(&self) -> bool {
        (VERIFIER_MIN_LEN..=VERIFIER_MAX_LEN).contains(&self.0.len())
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
    }

    /// Generate the corresponding code challenge.
    pub fn challenge(&self) -> CodeChallenge {
        CodeChallenge::from_verifier(self)
    }
}

impl fmt::Debug for CodeVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CodeVerifier([REDACTED])")
    }
}

/// PKCE code challenge (SHA-256 hash of the verifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChallenge(String);

impl CodeChallenge {
    /// Create a code challenge from a verifier.
    pub fn from_verifier(verifier: &CodeVerifier) -> Self {
        Self(URL_SAFE_NO_PAD.encode(sha256(verifier.as_str().as_bytes())))
    }

    /// Get the challenge string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CodeChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the PKCE primitives.
///
/// The default methods are what every flow uses. Implementations exist so callers
/// can pin the verifier or simulate a platform without the primitives.
pub trait AlgorithmHelper: Send + Sync {
    fn generate_code_verifier(&self) -> CodeVerifier {
        CodeVerifier::generate()
    }

    /// ASCII encoding of `value`; fails on any non-ASCII character.
    fn ascii_bytes(&self, value: &str) -> Result<Vec<u8>, Error> {
        if value.is_ascii() {
            Ok(value.as_bytes().to_vec())
        } else {
            Err(capability_error("Value is not US-ASCII encodable"))
        }
    }

    fn sha256(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(sha256(input))
    }

    fn generate_code_challenge(&self, verifier: &CodeVerifier) -> Result<CodeChallenge, Error> {
        let input = self.ascii_bytes(verifier.as_str())?;
        let digest = self.sha256(&input)?;
        Ok(CodeChallenge(URL_SAFE_NO_PAD.encode(digest)))
    }
}

/// The standard helper: thread-local CSPRNG and `sha2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAlgorithmHelper;

impl AlgorithmHelper for DefaultAlgorithmHelper {}

/// Probes whether `helper` can encode ASCII and hash with SHA-256.
///
/// Never panics; any failure, including a panicking helper, reports `false`.
pub fn is_available(helper: &dyn AlgorithmHelper) -> bool {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        helper
            .ascii_bytes("test")
            .and_then(|input| helper.sha256(&input))
            .is_ok()
    }))
    .unwrap_or(false)
}

/// 32 CSPRNG bytes, base64url encoded without padding.
pub fn random_url_safe_string() -> String {
    let random_bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

pub(crate) fn sha256(input: &[u8]) -> Vec<u8> {
    Sha256::digest(input).to_vec()
}

/// Decodes a base64url segment, tolerating trailing padding.
pub(crate) fn decode_base64_url(segment: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))
}

/// Decodes standard (padded) base64 such as a PEM body.
pub(crate) fn decode_base64(value: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(value)
}
