use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Rejection taxonomy for the auth/quota pipeline. Every variant is
/// fail-closed and propagates to the HTTP boundary immediately; nothing is
/// retried. Message text is displayed verbatim by the frontend, so it is a
/// contract surface.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer token where one was required.
    #[error("Not authorized")]
    MissingCredential,
    /// Signature/expiry failure. Deliberately indistinguishable from other
    /// token defects.
    #[error("Not authorized")]
    InvalidCredential,
    /// Valid token whose subject no longer resolves (deleted account).
    #[error("User no longer exists")]
    UserGone,
    /// Token minted before the most recent password change.
    #[error("Password recently changed, please log in again")]
    StaleCredential,
    /// Authenticated but the role is not in the allowed set.
    #[error("Role not authorized")]
    RoleDenied,
    /// Usage ceiling reached for the current period.
    #[error("Usage limit exceeded")]
    QuotaExceeded,
    /// Unexpected store failure. Detail is logged server-side; callers get a
    /// generic message.
    #[error("Internal server error")]
    Persistence(#[source] crate::store::StoreError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential
            | AuthError::InvalidCredential
            | AuthError::UserGone
            | AuthError::StaleCredential => StatusCode::UNAUTHORIZED,
            AuthError::RoleDenied => StatusCode::FORBIDDEN,
            AuthError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Persistence(ref e) = self {
            tracing::error!("Persistence failure in auth pipeline: {}", e);
        }

        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));

        (self.status(), body).into_response()
    }
}

impl From<crate::store::StoreError> for AuthError {
    fn from(e: crate::store::StoreError) -> Self {
        AuthError::Persistence(e)
    }
}
