use bcrypt::{hash, verify, DEFAULT_COST};

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// Hash a plaintext password for storage.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    hash(plain, DEFAULT_COST).map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Check a plaintext password against a stored hash. Any bcrypt failure is a
/// non-match; login never distinguishes "bad hash" from "bad password".
pub fn verify_password(plain: &str, hashed: &str) -> bool {
    verify(plain, hashed).unwrap_or(false)
}
