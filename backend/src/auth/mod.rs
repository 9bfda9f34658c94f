pub mod error;
pub mod identity;
pub mod middleware;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use identity::{bearer_token, check_not_stale, resolve_permissive, resolve_strict};
pub use middleware::{require_admin, require_role};
pub use token::{TokenService, VerifiedToken};
