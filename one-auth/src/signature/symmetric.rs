//! HMAC-SHA256 (`HS256`) signatures.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::error::{token_validation_error, Error};

type HmacSha256 = Hmac<Sha256>;

/// Shared secret known to both the provider and this client.
pub(super) struct SymmetricKey {
    secret: SecretString,
}

impl SymmetricKey {
    pub(super) fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    pub(super) fn verify(&self, signing_input: &[u8], signature: &[u8]) -> Result<(), Error> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| token_validation_error("Invalid HMAC key"))?;
        mac.update(signing_input);

        // Constant-time comparison.
        mac.verify_slice(signature)
            .map_err(|_| token_validation_error("Invalid ID token signature."))
    }
}
