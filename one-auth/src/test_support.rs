//! Token and key fixtures shared by the unit tests.

use std::sync::OnceLock;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use sha2::Sha256;

pub(crate) struct RsaFixture {
    pub private_key: RsaPrivateKey,
    pub public_pem: String,
}

/// One RSA key pair per test binary; generation is slow in debug builds.
pub(crate) fn rsa_fixture() -> &'static RsaFixture {
    static FIXTURE: OnceLock<RsaFixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let public_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        RsaFixture {
            private_key,
            public_pem,
        }
    })
}

fn signing_input(alg: &str, payload: &Value) -> String {
    let header = if alg.is_empty() {
        json!({"typ": "JWT"})
    } else {
        json!({"alg": alg, "typ": "JWT"})
    };
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

pub(crate) fn sign_rs256(payload: Value) -> String {
    let input = signing_input("RS256", &payload);
    let signing_key = SigningKey::<Sha256>::new(rsa_fixture().private_key.clone());
    let signature = signing_key.sign(input.as_bytes()).to_vec();
    format!("{}.{}", input, URL_SAFE_NO_PAD.encode(signature))
}

pub(crate) fn sign_hs256(secret: &str, payload: Value) -> String {
    let input = signing_input("HS256", &payload);
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(input.as_bytes());
    let signature = mac.finalize().into_bytes();
    format!("{}.{}", input, URL_SAFE_NO_PAD.encode(signature))
}

/// Token with the given `alg` header and an empty signature.
pub(crate) fn unsigned_token(alg: &str, payload: Value) -> String {
    format!("{}.", signing_input(alg, &payload))
}
