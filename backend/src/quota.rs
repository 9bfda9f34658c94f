//! Rolling usage quota tracking.
//!
//! Each identity gets `usage_limit` requests per period. The counter resets
//! when the wall clock passes `reset_usage_at`, and the reset is applied
//! before the limit check so a request arriving at the boundary is judged
//! against a fresh quota. Rejected requests never consume quota.

use chrono::{DateTime, Duration, Utc};

use crate::auth::error::AuthError;
use crate::models::user::{Identity, User};
use crate::store::UserStore;

/// Decide whether the usage period has rolled over. Pure: returns the updated
/// record for the caller to persist, or `None` when no reset is due.
pub fn try_reset(user: &User, now: DateTime<Utc>, period_days: i64) -> Option<User> {
    if now < user.reset_usage_at {
        return None;
    }
    let mut reset = user.clone();
    reset.usage_count = 0;
    reset.reset_usage_at = now + Duration::days(period_days);
    Some(reset)
}

/// Consume one unit of quota for an allowed request, or reject with
/// `QuotaExceeded` leaving the counter untouched.
///
/// Registered users go through the store: an overdue period is reset and
/// persisted first, then a single conditional increment lands the
/// consumption (two concurrent requests cannot both take the last slot).
/// Guests are counted on the transient identity only; there is no persistent
/// guest ledger and no timestamp reset.
pub fn consume(
    store: &UserStore,
    identity: Identity,
    now: DateTime<Utc>,
    period_days: i64,
) -> Result<Identity, AuthError> {
    match identity {
        Identity::Registered(user) => {
            let user = match try_reset(&user, now, period_days) {
                Some(reset) => {
                    store.apply_reset(&reset)?;
                    tracing::debug!("Usage period rolled over for user {}", reset.id);
                    reset
                }
                None => user,
            };

            if !store.consume_usage(&user.id)? {
                tracing::debug!(
                    "Quota exceeded for user {} ({}/{})",
                    user.id,
                    user.usage_count,
                    user.usage_limit
                );
                return Err(AuthError::QuotaExceeded);
            }

            let mut consumed = user;
            consumed.usage_count += 1;
            Ok(Identity::Registered(consumed))
        }
        Identity::Guest(mut guest) => {
            if guest.usage_count >= guest.usage_limit {
                return Err(AuthError::QuotaExceeded);
            }
            guest.usage_count += 1;
            Ok(Identity::Guest(guest))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{GuestIdentity, Plan, Role};

    fn user(count: u32, limit: u32, reset_at: DateTime<Utc>) -> User {
        User {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
            password_hash: "hash".to_string(),
            password_changed_at: None,
            role: Role::User,
            plan: Plan::Free,
            usage_limit: limit,
            usage_count: count,
            reset_usage_at: reset_at,
            email_verified: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_reset_before_boundary() {
        let now = Utc::now();
        let u = user(4, 5, now + Duration::days(10));
        assert!(try_reset(&u, now, 30).is_none());
    }

    #[test]
    fn test_reset_at_boundary_and_after() {
        let now = Utc::now();

        let at_boundary = user(999, 5, now);
        let reset = try_reset(&at_boundary, now, 30).unwrap();
        assert_eq!(reset.usage_count, 0);
        assert_eq!(reset.reset_usage_at, now + Duration::days(30));

        let long_past = user(2, 5, now - Duration::days(400));
        let reset = try_reset(&long_past, now, 30).unwrap();
        assert_eq!(reset.usage_count, 0);
        assert_eq!(reset.reset_usage_at, now + Duration::days(30));
    }

    #[test]
    fn test_guest_counts_up_then_rejects() {
        let mut identity = Identity::Guest(GuestIdentity::new(5));
        let store = UserStore::open(":memory:").unwrap();
        let now = Utc::now();

        for expected in 1..=5u32 {
            identity = consume(&store, identity, now, 30).unwrap();
            assert_eq!(identity.usage_count(), expected);
        }

        let result = consume(&store, identity, now, 30);
        assert!(matches!(result, Err(AuthError::QuotaExceeded)));
    }

    #[test]
    fn test_guest_with_zero_limit_always_rejected() {
        let store = UserStore::open(":memory:").unwrap();
        let identity = Identity::Guest(GuestIdentity::new(0));
        assert!(matches!(
            consume(&store, identity, Utc::now(), 30),
            Err(AuthError::QuotaExceeded)
        ));
    }

    #[test]
    fn test_registered_consume_until_limit() {
        let store = UserStore::open(":memory:").unwrap();
        let now = Utc::now();
        let created = store
            .create_user("a@example.com", "hash", Role::User, Plan::Free, 2, "d", now, 30)
            .unwrap();

        let identity = consume(&store, Identity::Registered(created.clone()), now, 30).unwrap();
        assert_eq!(identity.usage_count(), 1);

        let fresh = store.find_by_id(&created.id).unwrap().unwrap();
        let identity = consume(&store, Identity::Registered(fresh), now, 30).unwrap();
        assert_eq!(identity.usage_count(), 2);

        let fresh = store.find_by_id(&created.id).unwrap().unwrap();
        let result = consume(&store, Identity::Registered(fresh), now, 30);
        assert!(matches!(result, Err(AuthError::QuotaExceeded)));

        // Rejection did not consume quota.
        let after = store.find_by_id(&created.id).unwrap().unwrap();
        assert_eq!(after.usage_count, 2);
    }

    #[test]
    fn test_overdue_period_resets_before_limit_check() {
        let store = UserStore::open(":memory:").unwrap();
        let now = Utc::now();
        let created = store
            .create_user("a@example.com", "hash", Role::User, Plan::Free, 5, "d", now, 30)
            .unwrap();

        // Drive the row way over limit with an expired period.
        let mut overdue = created.clone();
        overdue.usage_count = 999;
        overdue.reset_usage_at = now - Duration::days(1);
        store.apply_reset(&overdue).unwrap();

        let loaded = store.find_by_id(&created.id).unwrap().unwrap();
        let identity = consume(&store, Identity::Registered(loaded), now, 30).unwrap();
        assert_eq!(identity.usage_count(), 1);

        let after = store.find_by_id(&created.id).unwrap().unwrap();
        assert_eq!(after.usage_count, 1);
        assert!(after.reset_usage_at > now + Duration::days(29));
    }
}
