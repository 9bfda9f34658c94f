//! Admin API routes, gated on the admin role.

use std::sync::Arc;

use axum::{extract::State, middleware, routing::get, Json, Router};
use serde::Serialize;

use crate::auth::middleware::require_admin;
use crate::models::user::User;
use crate::AppState;

/// Response for /admin/users.
#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
    pub total: usize,
}

/// GET /admin/users - list all registered users with their usage state.
async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UsersResponse>, crate::auth::AuthError> {
    let users = state.user_store.list_users()?;
    let total = users.len();
    Ok(Json(UsersResponse { users, total }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .with_state(state)
}
