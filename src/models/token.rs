use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("access token is empty")]
pub struct EmptyTokenError;

/// An opaque bearer credential. The client only stores it and sends it back.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(raw: impl Into<String>) -> Result<Self, EmptyTokenError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmptyTokenError);
        }
        Ok(AuthToken(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads the `exp` claim when the token happens to be a JWT.
    ///
    /// The signature is not checked: the value only feeds refresh scheduling,
    /// the server stays the authority on validity.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        #[derive(Deserialize)]
        struct ExpiryClaim {
            exp: i64,
        }

        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data =
            decode::<ExpiryClaim>(&self.0, &DecodingKey::from_secret(&[]), &validation).ok()?;
        Utc.timestamp_opt(data.claims.exp, 0).single()
    }

    /// Time left before `exp`, zero when already past. `None` for non-JWT tokens.
    pub fn remaining_lifetime(&self) -> Option<Duration> {
        let expires_at = self.expires_at()?;
        Some((expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }
}

impl TryFrom<String> for AuthToken {
    type Error = EmptyTokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AuthToken::new(value)
    }
}

impl From<AuthToken> for String {
    fn from(token: AuthToken) -> Self {
        token.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: i64,
    }

    fn jwt_expiring_in(seconds: i64) -> String {
        let claims = Claims {
            sub: "65f0c0ffee".to_string(),
            exp: Utc::now().timestamp() + seconds,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_token_is_rejected() {
        assert_eq!(AuthToken::new("   "), Err(EmptyTokenError));
        assert!(serde_json::from_str::<AuthToken>("\"\"").is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = AuthToken::new("super-secret").unwrap();
        assert_eq!(format!("{:?}", token), "AuthToken(***)");
        assert_eq!(token.as_str(), "super-secret");
    }

    #[test]
    fn test_expiry_read_from_jwt_without_secret() {
        let token = AuthToken::new(jwt_expiring_in(1800)).unwrap();
        let remaining = token.remaining_lifetime().unwrap();
        assert!(remaining <= Duration::from_secs(1800));
        assert!(remaining > Duration::from_secs(1790));
    }

    #[test]
    fn test_expired_jwt_has_zero_lifetime() {
        let token = AuthToken::new(jwt_expiring_in(-60)).unwrap();
        assert_eq!(token.remaining_lifetime(), Some(Duration::ZERO));
    }

    #[test]
    fn test_opaque_token_has_no_expiry() {
        let token = AuthToken::new("not-a-jwt").unwrap();
        assert_eq!(token.expires_at(), None);
    }
}
