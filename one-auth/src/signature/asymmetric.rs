//! RSA PKCS#1 v1.5 SHA-256 (`RS256`) signatures.

use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;

use crate::algorithm::decode_base64;
use crate::error::{token_validation_error, Error};

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";

/// Public half of the provider's signing key.
pub(super) struct AsymmetricKey {
    verifying_key: VerifyingKey<Sha256>,
}

impl AsymmetricKey {
    /// Parse a PEM encoded X.509 SubjectPublicKeyInfo holding an RSA key.
    pub(super) fn from_pem(pem: &str) -> Result<Self, String> {
        let body: String = pem
            .replace(PEM_HEADER, "")
            .replace(PEM_FOOTER, "")
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        let der = decode_base64(&body).map_err(|e| format!("invalid base64: {}", e))?;
        let public_key = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| format!("invalid RSA public key: {}", e))?;

        Ok(Self {
            verifying_key: VerifyingKey::<Sha256>::new(public_key),
        })
    }

    pub(super) fn verify(&self, signing_input: &[u8], signature: &[u8]) -> Result<(), Error> {
        let signature = Signature::try_from(signature)
            .map_err(|_| token_validation_error("Invalid ID token signature."))?;
        self.verifying_key
            .verify(signing_input, &signature)
            .map_err(|_| token_validation_error("Invalid ID token signature."))
    }
}

#[cfg(test)]
mod tests {
    use rsa::pkcs1v15::SigningKey;
    use rsa::signature::{SignatureEncoding, Signer};

    use super::*;
    use crate::test_support::rsa_fixture;

    #[test]
    fn test_from_pem_accepts_crlf_and_single_line() {
        let fixture = rsa_fixture();
        let crlf = fixture.public_pem.replace('\n', "\r\n");
        let single_line = fixture.public_pem.replace('\n', "");
        assert!(AsymmetricKey::from_pem(&crlf).is_ok());
        assert!(AsymmetricKey::from_pem(&single_line).is_ok());
    }

    #[test]
    fn test_verify_round_trip() {
        let fixture = rsa_fixture();
        let signing_key = SigningKey::<Sha256>::new(fixture.private_key.clone());
        let signature = signing_key.sign(b"header.payload").to_vec();

        let key = AsymmetricKey::from_pem(&fixture.public_pem).unwrap();
        assert!(key.verify(b"header.payload", &signature).is_ok());
        assert!(key.verify(b"header.payloaD", &signature).is_err());
    }

    #[test]
    fn test_from_pem_rejects_empty_body() {
        assert!(AsymmetricKey::from_pem(&format!("{}\n{}", PEM_HEADER, PEM_FOOTER)).is_err());
    }
}
