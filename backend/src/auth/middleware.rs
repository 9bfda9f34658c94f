use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::error::AuthError;
use crate::auth::identity::resolve_strict;
use crate::models::user::{Identity, Role};
use crate::AppState;

/// Role gate: pure membership predicate. Knows nothing about how the identity
/// was resolved; usage counters and token age never influence the decision.
pub fn require_role(identity: &Identity, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&identity.role()) {
        Ok(())
    } else {
        Err(AuthError::RoleDenied)
    }
}

/// Middleware that requires an authenticated admin user. The resolved
/// identity is attached to request extensions for the handler.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match resolve_strict(&state.user_store, &state.tokens, request.headers()) {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    if let Err(e) = require_role(&identity, &[Role::Admin]) {
        return e.into_response();
    }

    request.extensions_mut().insert(identity);
    next.run(request).await
}
