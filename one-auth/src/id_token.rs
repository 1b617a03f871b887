//! ID token validation: signature first, then the OpenID Connect claims.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::{token_validation_error, Error};
use crate::jwt::{Claims, Jwt};
use crate::signature::SignatureVerifier;

/// Clock skew tolerated on time based claims.
pub const DEFAULT_LEEWAY_SECS: i64 = 60;

/// Expectations an ID token has to meet.
#[derive(Debug)]
pub struct IdTokenVerifier {
    issuer: String,
    audience: String,
    signature_verifier: SignatureVerifier,
    nonce: Option<String>,
    max_age: Option<i64>,
    leeway: Duration,
}

impl IdTokenVerifier {
    pub fn new(issuer: &str, audience: &str, signature_verifier: SignatureVerifier) -> Self {
        Self {
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            signature_verifier,
            nonce: None,
            max_age: None,
            leeway: Duration::seconds(DEFAULT_LEEWAY_SECS),
        }
    }

    /// Require the `nonce` claim to equal `nonce`.
    pub fn with_nonce(mut self, nonce: Option<String>) -> Self {
        self.nonce = nonce;
        self
    }

    /// Require a recent `auth_time`, in seconds.
    pub fn with_max_age(mut self, max_age: Option<i64>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Parse and validate `id_token` as of `now`.
    ///
    /// Returns the parsed token once its signature and claims are trusted.
    pub fn verify(&self, id_token: Option<&str>, now: DateTime<Utc>) -> Result<Jwt, Error> {
        let id_token = id_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| token_validation_error("ID token is required but missing"))?;

        let jwt = Jwt::parse(id_token)?;
        self.signature_verifier.verify(&jwt)?;
        self.verify_claims(&jwt.claims()?, now)?;

        debug!("ID token validated");
        Ok(jwt)
    }

    fn verify_claims(&self, claims: &Claims, now: DateTime<Utc>) -> Result<(), Error> {
        let now = now.timestamp();
        let leeway = self.leeway.num_seconds();

        match claims.iss.as_deref() {
            None => return Err(missing_claim("iss")),
            Some(iss) if iss != self.issuer => {
                return Err(token_validation_error(&format!(
                    "Issuer (iss) claim mismatch in the ID token, expected \"{}\", found \"{}\"",
                    self.issuer, iss
                )))
            }
            Some(_) => {}
        }

        if claims.sub.as_deref().map_or(true, str::is_empty) {
            return Err(missing_claim("sub"));
        }

        let audience = claims
            .aud
            .as_ref()
            .map(|aud| aud.to_vec())
            .ok_or_else(|| missing_claim("aud"))?;
        if !audience.contains(&self.audience) {
            return Err(token_validation_error(&format!(
                "Audience (aud) claim mismatch in the ID token; expected \"{}\" but was not one of \"{}\"",
                self.audience,
                audience.join(", ")
            )));
        }

        let exp = claims.exp.ok_or_else(|| missing_claim("exp"))?;
        let expires_at = exp.saturating_add(leeway);
        if now > expires_at {
            return Err(token_validation_error(&format!(
                "Expiration Time (exp) claim error in the ID token; current time ({}) is after expiration time ({})",
                now, expires_at
            )));
        }

        if claims.iat.is_none() {
            return Err(missing_claim("iat"));
        }

        if let Some(expected) = &self.nonce {
            match claims.nonce.as_deref() {
                None => return Err(missing_claim("nonce")),
                Some(nonce) if nonce != expected => {
                    return Err(token_validation_error(&format!(
                        "Nonce (nonce) claim mismatch in the ID token; expected \"{}\", found \"{}\"",
                        expected, nonce
                    )))
                }
                Some(_) => {}
            }
        }

        if audience.len() > 1 {
            match claims.azp.as_deref() {
                None => return Err(missing_claim("azp")),
                Some(azp) if azp != self.audience => {
                    return Err(token_validation_error(&format!(
                        "Authorized Party (azp) claim mismatch in the ID token; expected \"{}\", found \"{}\"",
                        self.audience, azp
                    )))
                }
                Some(_) => {}
            }
        }

        if let Some(max_age) = self.max_age {
            let auth_time = claims.auth_time.ok_or_else(|| missing_claim("auth_time"))?;
            let latest = auth_time.saturating_add(max_age).saturating_add(leeway);
            if now > latest {
                return Err(token_validation_error(&format!(
                    "Authentication Time (auth_time) claim in the ID token indicates that too much time has passed since the last end-user authentication. Current time ({}) is after last auth at ({})",
                    now, latest
                )));
            }
        }

        Ok(())
    }
}

fn missing_claim(claim: &str) -> Error {
    token_validation_error(&format!(
        "Required claim \"{}\" is missing in the ID token",
        claim
    ))
}
