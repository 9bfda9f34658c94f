use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, Row};

use crate::models::user::{Plan, Role, User};

/// SQLite-backed user store. One document-at-a-time updates; the quota
/// increment is a single conditional statement so concurrent requests cannot
/// push the count past the limit.
pub struct UserStore {
    conn: Mutex<Connection>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Email already registered")]
    DuplicateEmail,
}

impl UserStore {
    pub fn open(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        let conn = if path == ":memory:" {
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
            Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?
        };

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                password_changed_at TEXT,
                role TEXT NOT NULL,
                plan TEXT NOT NULL,
                usage_limit INTEGER NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                reset_usage_at TEXT NOT NULL,
                email_verified INTEGER NOT NULL DEFAULT 0,
                verification_token TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
            [],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("User store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a registered user. Usage starts at 0 with the reset timestamp a
    /// full period out.
    #[allow(clippy::too_many_arguments)]
    pub fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
        plan: Plan,
        usage_limit: u32,
        verification_token_digest: &str,
        now: DateTime<Utc>,
        period_days: i64,
    ) -> Result<User, StoreError> {
        let conn = self.lock()?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            password_changed_at: None,
            role,
            plan,
            usage_limit,
            usage_count: 0,
            reset_usage_at: now + Duration::days(period_days),
            email_verified: false,
            created_at: now,
        };

        let result = conn.execute(
            "INSERT INTO users (id, email, password_hash, password_changed_at, role, plan,
                                usage_limit, usage_count, reset_usage_at, email_verified,
                                verification_token, created_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, 0, ?7, 0, ?8, ?9)",
            params![
                user.id,
                user.email,
                user.password_hash,
                user.role.to_string(),
                user.plan.to_string(),
                user.usage_limit,
                user.reset_usage_at.to_rfc3339(),
                verification_token_digest,
                user.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {
                tracing::info!("Created user {} ({})", user.id, user.email);
                Ok(user)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateEmail)
            }
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                row_to_user,
            )
            .map(Some)
            .or_else(not_found_as_none)?;
        Ok(user)
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email],
                row_to_user,
            )
            .map(Some)
            .or_else(not_found_as_none)?;
        Ok(user)
    }

    /// Write a new password hash and stamp the change time. Tokens issued
    /// before this moment become invalid.
    pub fn update_password(
        &self,
        id: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET password_hash = ?1, password_changed_at = ?2 WHERE id = ?3",
            params![password_hash, now.to_rfc3339(), id],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::info!("Password changed for user {}", id);
        Ok(())
    }

    /// Persist the outcome of a period reset decided by `quota::try_reset`.
    pub fn apply_reset(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET usage_count = ?1, reset_usage_at = ?2 WHERE id = ?3",
            params![user.usage_count, user.reset_usage_at.to_rfc3339(), user.id],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::debug!("Usage period reset for user {}", user.id);
        Ok(())
    }

    /// Atomic increment-if-under-limit. Returns false when the ceiling is
    /// already reached; the counter is untouched in that case.
    pub fn consume_usage(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE users SET usage_count = usage_count + 1
                 WHERE id = ?1 AND usage_count < usage_limit",
                params![id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(changed == 1)
    }

    /// Written for the external plan-change flow; no route calls this.
    pub fn set_plan(&self, id: &str, plan: Plan, usage_limit: u32) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET plan = ?1, usage_limit = ?2 WHERE id = ?3",
            params![plan.to_string(), usage_limit, id],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Mark the account verified if the digest matches a pending token.
    pub fn verify_email(&self, token_digest: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE users SET email_verified = 1, verification_token = NULL
                 WHERE verification_token = ?1",
                params![token_digest],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(changed == 1)
    }

    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM users ORDER BY created_at",
                USER_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let users = stmt
            .query_map([], row_to_user)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(users)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, password_changed_at, role, plan, \
                            usage_limit, usage_count, reset_usage_at, email_verified, created_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let parse_ts = |idx: usize, value: String| {
        DateTime::parse_from_rfc3339(&value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    };

    let role_raw: String = row.get(4)?;
    let plan_raw: String = row.get(5)?;

    let changed_at = match row.get::<_, Option<String>>(3)? {
        Some(raw) => Some(parse_ts(3, raw)?),
        None => None,
    };

    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        password_changed_at: changed_at,
        role: Role::parse(&role_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown role: {}", role_raw).into(),
            )
        })?,
        plan: Plan::parse(&plan_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("unknown plan: {}", plan_raw).into(),
            )
        })?,
        usage_limit: row.get(6)?,
        usage_count: row.get(7)?,
        reset_usage_at: parse_ts(8, row.get(8)?)?,
        email_verified: row.get::<_, i32>(9)? != 0,
        created_at: parse_ts(10, row.get(10)?)?,
    })
}

fn not_found_as_none<T>(e: rusqlite::Error) -> Result<Option<T>, StoreError> {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(StoreError::Database(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UserStore {
        UserStore::open(":memory:").unwrap()
    }

    fn create(store: &UserStore, email: &str, limit: u32) -> User {
        store
            .create_user(
                email,
                "hash",
                Role::User,
                Plan::Free,
                limit,
                "digest",
                Utc::now(),
                30,
            )
            .unwrap()
    }

    #[test]
    fn test_create_and_find_user() {
        let store = store();
        let user = create(&store, "a@example.com", 20);

        assert_eq!(user.usage_count, 0);
        assert!(user.reset_usage_at > Utc::now());
        assert!(user.password_changed_at.is_none());

        let found = store.find_by_id(&user.id).unwrap().unwrap();
        assert_eq!(found.email, "a@example.com");
        assert_eq!(found.plan, Plan::Free);
        assert_eq!(found.role, Role::User);

        let by_email = store.find_by_email("a@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[test]
    fn test_find_missing_user_is_none() {
        let store = store();
        assert!(store.find_by_id("nope").unwrap().is_none());
        assert!(store.find_by_email("nope@example.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let store = store();
        create(&store, "a@example.com", 20);
        let result = store.create_user(
            "a@example.com",
            "hash2",
            Role::User,
            Plan::Free,
            20,
            "digest2",
            Utc::now(),
            30,
        );
        assert!(matches!(result, Err(StoreError::DuplicateEmail)));
    }

    #[test]
    fn test_consume_usage_stops_at_limit() {
        let store = store();
        let user = create(&store, "a@example.com", 3);

        for expected in 1..=3u32 {
            assert!(store.consume_usage(&user.id).unwrap());
            let current = store.find_by_id(&user.id).unwrap().unwrap();
            assert_eq!(current.usage_count, expected);
        }

        // Fourth request is rejected and the counter does not move.
        assert!(!store.consume_usage(&user.id).unwrap());
        let current = store.find_by_id(&user.id).unwrap().unwrap();
        assert_eq!(current.usage_count, 3);
    }

    #[test]
    fn test_update_password_stamps_change_time() {
        let store = store();
        let user = create(&store, "a@example.com", 20);
        let now = Utc::now();

        store.update_password(&user.id, "newhash", now).unwrap();

        let updated = store.find_by_id(&user.id).unwrap().unwrap();
        assert_eq!(updated.password_hash, "newhash");
        assert_eq!(
            updated.password_changed_at.unwrap().timestamp(),
            now.timestamp()
        );
    }

    #[test]
    fn test_apply_reset_persists_fresh_period() {
        let store = store();
        let mut user = create(&store, "a@example.com", 5);
        for _ in 0..5 {
            assert!(store.consume_usage(&user.id).unwrap());
        }

        user.usage_count = 0;
        user.reset_usage_at = Utc::now() + Duration::days(30);
        store.apply_reset(&user).unwrap();

        let fresh = store.find_by_id(&user.id).unwrap().unwrap();
        assert_eq!(fresh.usage_count, 0);
        assert!(fresh.reset_usage_at > Utc::now() + Duration::days(29));
    }

    #[test]
    fn test_verify_email_by_digest() {
        let store = store();
        let user = create(&store, "a@example.com", 20);
        assert!(!user.email_verified);

        assert!(store.verify_email("digest").unwrap());
        assert!(store.find_by_id(&user.id).unwrap().unwrap().email_verified);

        // Token is single-use.
        assert!(!store.verify_email("digest").unwrap());
    }

    #[test]
    fn test_set_plan_updates_limit() {
        let store = store();
        let user = create(&store, "a@example.com", 20);

        store.set_plan(&user.id, Plan::Pro, 500).unwrap();

        let updated = store.find_by_id(&user.id).unwrap().unwrap();
        assert_eq!(updated.plan, Plan::Pro);
        assert_eq!(updated.usage_limit, 500);
    }

    #[test]
    fn test_list_users() {
        let store = store();
        create(&store, "a@example.com", 20);
        create(&store, "b@example.com", 20);
        assert_eq!(store.list_users().unwrap().len(), 2);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/users.db");
        let store = UserStore::open(&format!("sqlite:{}", path.display())).unwrap();
        create(&store, "a@example.com", 20);
        assert!(path.exists());
    }
}
