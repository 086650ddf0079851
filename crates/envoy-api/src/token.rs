// Enphase token claims
//
// Tokens minted by Entrez are ES256 JWTs. We never hold the public key,
// so claims are read without signature verification. They serve display
// (expiry, owning serial) and let hosts skip resuming a stored token that
// has already lapsed.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::Error;

/// Claims carried by an Enphase gateway token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Gateway serial number the token was issued for.
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    /// `owner` or `installer`.
    #[serde(default, rename = "enphaseUser")]
    pub enphase_user: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub jti: Option<String>,
}

impl TokenClaims {
    /// Decode the claims section of a raw token without verifying it.
    pub fn decode_unverified(raw: &str) -> Result<Self, Error> {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<Self>(raw.trim(), &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| Error::InvalidToken(e.to_string()))
    }

    /// Expiry as a timestamp, if the token carries one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Issue time as a timestamp, if the token carries one.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|iat| DateTime::from_timestamp(iat, 0))
    }
}
