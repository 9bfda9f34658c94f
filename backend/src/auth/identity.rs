use axum::http::HeaderMap;
use chrono::{DateTime, Utc};

use crate::auth::error::AuthError;
use crate::auth::token::TokenService;
use crate::models::user::{GuestIdentity, Identity, User};
use crate::store::UserStore;

/// Bearer token pulled out of the `Authorization` header. Absence is a
/// distinct state from malformation so permissive routes can fall back to a
/// guest only when nothing was presented at all.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let header = match headers.get("authorization") {
        Some(value) => value,
        None => return Ok(None),
    };

    let raw = header.to_str().map_err(|_| AuthError::InvalidCredential)?;
    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidCredential)?;
    Ok(Some(token))
}

/// Strict resolution for protected routes: a missing or defective token is a
/// rejection, and a subject that no longer resolves gets its own message
/// (stale tokens for deleted accounts).
pub fn resolve_strict(
    store: &UserStore,
    tokens: &TokenService,
    headers: &HeaderMap,
) -> Result<Identity, AuthError> {
    let token = bearer_token(headers)?.ok_or(AuthError::MissingCredential)?;
    let verified = tokens
        .verify(token)
        .map_err(|_| AuthError::InvalidCredential)?;

    let user = store
        .find_by_id(&verified.subject)?
        .ok_or(AuthError::UserGone)?;

    check_not_stale(&user, verified.issued_at)?;

    Ok(Identity::Registered(user))
}

/// Permissive resolution for routes offering degraded guest access. No
/// credential at all synthesizes a guest; a presented-but-defective token is
/// still rejected rather than silently downgraded.
pub fn resolve_permissive(
    store: &UserStore,
    tokens: &TokenService,
    headers: &HeaderMap,
    guest_limit: u32,
) -> Result<Identity, AuthError> {
    match bearer_token(headers)? {
        None => Ok(Identity::Guest(GuestIdentity::new(guest_limit))),
        Some(token) => {
            let verified = tokens
                .verify(token)
                .map_err(|_| AuthError::InvalidCredential)?;
            let user = store
                .find_by_id(&verified.subject)?
                .ok_or(AuthError::UserGone)?;
            check_not_stale(&user, verified.issued_at)?;
            Ok(Identity::Registered(user))
        }
    }
}

/// Invalidation check: a token issued before the most recent password change
/// is dead. The change timestamp is truncated to whole seconds and compared
/// strictly, so a change in the same second as issuance does not invalidate.
/// Guests carry no password and never reach this check.
pub fn check_not_stale(user: &User, issued_at: DateTime<Utc>) -> Result<(), AuthError> {
    match user.password_changed_at {
        Some(changed_at) if changed_at.timestamp() > issued_at.timestamp() => {
            tracing::debug!(
                "Rejecting token for user {} issued before password change",
                user.id
            );
            Err(AuthError::StaleCredential)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{Plan, Role};
    use axum::http::header::AUTHORIZATION;
    use chrono::{Duration, TimeZone};

    fn test_user(changed_at: Option<DateTime<Utc>>) -> User {
        User {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
            password_hash: "hash".to_string(),
            password_changed_at: changed_at,
            role: Role::User,
            plan: Plan::Free,
            usage_limit: 20,
            usage_count: 0,
            reset_usage_at: Utc::now() + Duration::days(30),
            email_verified: true,
            created_at: Utc::now(),
        }
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_missing_header() {
        assert!(bearer_token(&HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn test_bearer_token_wrong_scheme_is_invalid() {
        let headers = headers_with("Basic dXNlcjpwYXNz");
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::InvalidCredential)
        ));
    }

    #[test]
    fn test_bearer_token_extracted() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_never_changed_password_is_always_fresh() {
        let user = test_user(None);
        let ancient = Utc.timestamp_opt(0, 0).unwrap();
        assert!(check_not_stale(&user, ancient).is_ok());
    }

    #[test]
    fn test_token_issued_before_change_is_stale() {
        let changed = Utc.timestamp_opt(1000, 0).unwrap();
        let user = test_user(Some(changed));

        let before = Utc.timestamp_opt(999, 0).unwrap();
        assert!(matches!(
            check_not_stale(&user, before),
            Err(AuthError::StaleCredential)
        ));
    }

    #[test]
    fn test_token_issued_at_or_after_change_is_fresh() {
        let changed = Utc.timestamp_opt(1000, 0).unwrap();
        let user = test_user(Some(changed));

        let same_second = Utc.timestamp_opt(1000, 0).unwrap();
        assert!(check_not_stale(&user, same_second).is_ok());

        let after = Utc.timestamp_opt(1001, 0).unwrap();
        assert!(check_not_stale(&user, after).is_ok());
    }

    #[test]
    fn test_subsecond_change_truncated_to_whole_seconds() {
        // Change at 1000.7s, token issued at 1000.1s: both truncate to 1000,
        // so the token survives.
        let changed = Utc.timestamp_opt(1000, 700_000_000).unwrap();
        let user = test_user(Some(changed));
        let issued = Utc.timestamp_opt(1000, 100_000_000).unwrap();
        assert!(check_not_stale(&user, issued).is_ok());
    }
}
