pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims carried by every token this service issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(
        username: impl Into<String>,
        is_admin: bool,
        expiry_hours: u64,
    ) -> Result<Self, TokenError> {
        let now = Utc::now();
        let exp = i64::try_from(expiry_hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(TokenError::InvalidExpiry(expiry_hours))?;

        Ok(Self {
            username: username.into(),
            is_admin,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        })
    }
}

/// The caller as established by a verified token. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            username: claims.username,
            is_admin: claims.is_admin,
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT generation error: {0}")]
    Generation(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Token lifetime of {0} hours is out of range")]
    InvalidExpiry(u64),
}

/// Sign a token for `username`.
pub fn create_token(
    username: &str,
    is_admin: bool,
    secret: &str,
    expiry_hours: u64,
) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::InvalidSecret);
    }

    let claims = Claims::new(username, is_admin, expiry_hours)?;
    let encoding_key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::default(), &claims, &encoding_key)
        .map_err(|e| TokenError::Generation(e.to_string()))
}

/// Verify a token against the shared secret.
///
/// A missing, malformed, expired or wrongly signed token all yield `None`.
/// Callers must not tell these apart: an absent identity is simply
/// anonymous, and it is up to the route policy to decide whether that
/// matters.
pub fn verify_token(token: Option<&str>, secret: &str) -> Option<Identity> {
    let token = token.map(str::trim).filter(|t| !t.is_empty())?;
    if secret.is_empty() {
        return None;
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    match decode::<Claims>(token, &decoding_key, &Validation::default()) {
        Ok(data) => Some(Identity::from(data.claims)),
        Err(e) => {
            tracing::debug!("Token rejected, continuing anonymously: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn round_trips_claims() {
        let token = create_token("u1", true, SECRET, 1).unwrap();
        let identity = verify_token(Some(&token), SECRET).unwrap();
        assert_eq!(
            identity,
            Identity {
                username: "u1".to_string(),
                is_admin: true
            }
        );
    }

    #[test]
    fn missing_token_is_anonymous() {
        assert!(verify_token(None, SECRET).is_none());
        assert!(verify_token(Some(""), SECRET).is_none());
        assert!(verify_token(Some("   "), SECRET).is_none());
    }

    #[test]
    fn garbage_token_is_anonymous() {
        assert!(verify_token(Some("not-a-token"), SECRET).is_none());
        assert!(verify_token(Some("a.b.c"), SECRET).is_none());
    }

    #[test]
    fn wrong_secret_is_anonymous() {
        let token = create_token("u1", false, "other-secret", 1).unwrap();
        assert!(verify_token(Some(&token), SECRET).is_none());
    }

    #[test]
    fn expired_token_is_anonymous() {
        let claims = Claims {
            username: "u1".to_string(),
            is_admin: true,
            exp: (Utc::now() - Duration::hours(2)).timestamp(),
            iat: (Utc::now() - Duration::hours(3)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(verify_token(Some(&token), SECRET).is_none());
    }

    #[test]
    fn huge_expiry_is_rejected_not_wrapped() {
        for hours in [u64::MAX, 1u64 << 63, 10_000_000_000] {
            assert!(matches!(
                create_token("u1", false, SECRET, hours),
                Err(TokenError::InvalidExpiry(h)) if h == hours
            ));
        }
    }

    #[test]
    fn empty_secret_cannot_sign() {
        assert!(matches!(
            create_token("u1", false, "", 1),
            Err(TokenError::InvalidSecret)
        ));
    }
}
