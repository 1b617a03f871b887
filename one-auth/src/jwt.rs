//! Compact JWT parsing.
//!
//! Parsing only checks structure: three period-separated base64url segments whose
//! header and payload are JSON objects. Claim types are checked later by
//! [`Jwt::claims`]. Nothing parsed here is trusted until a
//! [`SignatureVerifier`](crate::signature::SignatureVerifier) accepts the token.

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};

use crate::algorithm::decode_base64_url;
use crate::error::{token_parse_error, token_validation_error, Error};

/// Audience claim, which may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Audience::One(aud) => vec![aud.clone()],
            Audience::Many(auds) => auds.clone(),
        }
    }
}

/// Registered claims used by ID token validation, plus everything else untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    pub iss: Option<String>,
    pub sub: Option<String>,
    pub aud: Option<Audience>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub iat: Option<i64>,
    pub nonce: Option<String>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub auth_time: Option<i64>,
    pub azp: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A parsed, not yet verified, JSON Web Token.
#[derive(Clone)]
pub struct Jwt {
    parts: [String; 3],
    header: Map<String, Value>,
    payload: Map<String, Value>,
    signature: Vec<u8>,
}

impl Jwt {
    /// Parse a compact serialized token.
    pub fn parse(token: &str) -> Result<Self, Error> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(token_parse_error(&format!(
                "The token was expected to have 3 parts, but got {}.",
                segments.len()
            )));
        }

        let header = decode_json_segment(segments[0], "header")?;
        let payload = decode_json_segment(segments[1], "payload")?;
        let signature = decode_base64_url(segments[2])
            .map_err(|_| token_parse_error("The token's signature is not base64url encoded."))?;

        Ok(Self {
            parts: [
                segments[0].to_string(),
                segments[1].to_string(),
                segments[2].to_string(),
            ],
            header,
            payload,
            signature,
        })
    }

    /// The `alg` header value, if present and a string.
    pub fn algorithm(&self) -> Option<&str> {
        self.header.get("alg").and_then(Value::as_str)
    }

    /// The `kid` header value, if present.
    pub fn key_id(&self) -> Option<&str> {
        self.header.get("kid").and_then(Value::as_str)
    }

    /// The encoded header, payload and signature segments.
    pub fn parts(&self) -> &[String; 3] {
        &self.parts
    }

    /// Bytes covered by the signature: `header.payload`.
    pub fn signing_input(&self) -> Vec<u8> {
        format!("{}.{}", self.parts[0], self.parts[1]).into_bytes()
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Registered claims, typed. A claim of the wrong JSON type is a validation error.
    pub fn claims(&self) -> Result<Claims, Error> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|e| {
            token_validation_error(&format!("The token's claims are invalid: {}", e))
        })
    }
}

impl fmt::Debug for Jwt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwt")
            .field("header", &self.header)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// RFC 7519 NumericDate: any JSON number, fractional seconds truncated.
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<Number>::deserialize(deserializer)?;
    Ok(number.and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))))
}

fn decode_json_segment(segment: &str, name: &str) -> Result<Map<String, Value>, Error> {
    let bytes = decode_base64_url(segment).map_err(|_| {
        token_parse_error(&format!("The token's {} is not base64url encoded.", name))
    })?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(token_parse_error(&format!(
            "The token's {} is not a JSON object.",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn encode(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(value.to_string())
    }

    fn token(header: Value, payload: Value) -> String {
        format!("{}.{}.c2ln", encode(&header), encode(&payload))
    }

    #[test]
    fn test_parse_valid_token() {
        let raw = token(
            json!({"alg": "RS256", "typ": "JWT", "kid": "key-1"}),
            json!({"iss": "https://api.eartho.world", "sub": "user-1", "aud": ["a", "b"], "exp": 1700000000, "custom": true}),
        );
        let jwt = Jwt::parse(&raw).unwrap();

        assert_eq!(jwt.algorithm(), Some("RS256"));
        assert_eq!(jwt.key_id(), Some("key-1"));
        assert_eq!(jwt.signature(), b"sig");
        assert_eq!(jwt.claims().unwrap().sub.as_deref(), Some("user-1"));
        assert_eq!(
            jwt.claims().unwrap().aud,
            Some(Audience::Many(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(jwt.claims().unwrap().other.get("custom"), Some(&json!(true)));
        let parts = jwt.parts();
        assert_eq!(jwt.signing_input(), format!("{}.{}", parts[0], parts[1]).into_bytes());
    }

    #[test]
    fn test_single_audience() {
        let raw = token(json!({"alg": "HS256"}), json!({"aud": "client"}));
        let jwt = Jwt::parse(&raw).unwrap();
        assert_eq!(
            jwt.claims().unwrap().aud.as_ref().unwrap().to_vec(),
            vec!["client".to_string()]
        );
    }

    #[test]
    fn test_claim_types_checked_after_parse() {
        let raw = token(json!({"alg": "HS256"}), json!({"exp": 1700000000.75, "iat": 1.5e9}));
        let claims = Jwt::parse(&raw).unwrap().claims().unwrap();
        assert_eq!(claims.exp, Some(1700000000));
        assert_eq!(claims.iat, Some(1500000000));

        let raw = token(json!({"alg": "HS256"}), json!({"exp": "tomorrow"}));
        let jwt = Jwt::parse(&raw).unwrap();
        assert_eq!(jwt.claims().unwrap_err().error_kind, ErrorKind::TokenValidation);
    }

    #[test]
    fn test_wrong_segment_count() {
        for raw in ["", "a.b", "a.b.c.d"] {
            let err = Jwt::parse(raw).unwrap_err();
            assert_eq!(err.error_kind, ErrorKind::TokenParse);
        }
    }

    #[test]
    fn test_undecodable_segments() {
        let payload = encode(&json!({"sub": "user"}));
        let header = encode(&json!({"alg": "HS256"}));

        let bad_header = format!("%%%.{}.c2ln", payload);
        let bad_payload = format!("{}.bm90IGpzb24.c2ln", header);
        let bad_signature = format!("{}.{}.***", header, payload);

        for raw in [bad_header, bad_payload, bad_signature] {
            assert_eq!(Jwt::parse(&raw).unwrap_err().error_kind, ErrorKind::TokenParse);
        }
    }

    #[test]
    fn test_missing_algorithm_parses() {
        let raw = token(json!({"typ": "JWT"}), json!({}));
        let jwt = Jwt::parse(&raw).unwrap();
        assert_eq!(jwt.algorithm(), None);
    }

    #[test]
    fn test_empty_signature_parses() {
        let raw = format!(
            "{}.{}.",
            encode(&json!({"alg": "none"})),
            encode(&json!({}))
        );
        let jwt = Jwt::parse(&raw).unwrap();
        assert!(jwt.signature().is_empty());
    }
}
