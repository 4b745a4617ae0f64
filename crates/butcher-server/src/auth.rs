//! Bearer session tokens: HS256 JWTs carrying the user id and role.

use butcher_core::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id as a decimal string.
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    #[must_use]
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Signing and verification keys derived from one shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    #[must_use]
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// # Errors
    ///
    /// Returns [`jsonwebtoken::errors::Error`] if encoding fails.
    pub fn issue(&self, user_id: i64, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: timestamp(now + self.ttl),
            iat: timestamp(now),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Verifies signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns [`jsonwebtoken::errors::Error`] for a bad signature, an
    /// expired token or malformed claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
    }
}

fn timestamp(at: chrono::DateTime<Utc>) -> usize {
    usize::try_from(at.timestamp()).unwrap_or(0)
}
