use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims. The subject and issued-at are the only semantically relevant
/// fields downstream; expiry is enforced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Result of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
}

/// Token failures are not distinguished to callers; a missing header is the
/// resolver's concern, everything else collapses to `Invalid`.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid or expired token")]
    Invalid,
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Issues and verifies HS256 bearer tokens against a server-held secret.
pub struct TokenService {
    secret: String,
    ttl_hours: i64,
}

impl TokenService {
    pub fn new(secret: String, ttl_hours: i64) -> Self {
        Self { secret, ttl_hours }
    }

    /// Mint a token for a user id, issued at `now`.
    pub fn issue(&self, user_id: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.ttl_hours)).timestamp(),
        };

        tracing::debug!("Issuing token for user {}, ttl {}h", user_id, self.ttl_hours);

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Validate signature and expiry, returning the claimed subject and
    /// issued-at. No side effects.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!("Token rejected: {}", e);
            TokenError::Invalid
        })?;

        let issued_at = Utc
            .timestamp_opt(data.claims.iat, 0)
            .single()
            .ok_or(TokenError::Invalid)?;

        Ok(VerifiedToken {
            subject: data.claims.sub,
            issued_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn service() -> TokenService {
        TokenService::new(TEST_SECRET.to_string(), 24)
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = service();
        let now = Utc::now();

        let token = tokens.issue("user123", now).unwrap();
        assert!(!token.is_empty());

        let verified = tokens.verify(&token).unwrap();
        assert_eq!(verified.subject, "user123");
        assert_eq!(verified.issued_at.timestamp(), now.timestamp());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let result = service().verify("not.a.token");
        assert!(matches!(result, Err(TokenError::Invalid)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let tokens = service();
        let other = TokenService::new("other-secret-key-for-jwt-testing-min-32ch".to_string(), 24);

        let token = tokens.issue("user123", Utc::now()).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = service();
        // Issued 48h ago with a 24h ttl.
        let token = tokens
            .issue("user123", Utc::now() - Duration::hours(48))
            .unwrap();
        assert!(matches!(tokens.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let tokens = service();
        let token = tokens.issue("user123", Utc::now()).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        assert!(tokens.verify(&tampered).is_err());
    }
}
