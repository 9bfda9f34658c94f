//! Account routes: registration, login, password change and email
//! verification. Plan changes and email delivery are external flows; this
//! module only writes the fields they depend on.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::auth::identity::resolve_strict;
use crate::auth::password::{hash_password, verify_password};
use crate::models::user::{Identity, Plan, Role, User};
use crate::store::StoreError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
    pub user: User,
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

/// POST /auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    if body.email.trim().is_empty() || !body.email.contains('@') {
        return reject(StatusCode::BAD_REQUEST, "A valid email is required");
    }
    if body.password.len() < 8 {
        return reject(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters",
        );
    }

    let password_hash = match hash_password(&body.password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Password hashing failed: {}", e);
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    // Raw token goes out for the external mailer; only its digest is stored.
    let verification_token = generate_verification_token();
    let digest = token_digest(&verification_token);

    let now = Utc::now();
    let plan = Plan::Free;
    let limit = plan.usage_limit(&state.config.quota);

    let user = match state.user_store.create_user(
        body.email.trim(),
        &password_hash,
        Role::User,
        plan,
        limit,
        &digest,
        now,
        state.config.quota.reset_period_days,
    ) {
        Ok(user) => user,
        Err(StoreError::DuplicateEmail) => {
            return reject(StatusCode::CONFLICT, "Email already registered");
        }
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let token = match state.tokens.issue(&user.id, now) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to issue token: {}", e);
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "token": token,
            "user": user,
            "verification_token": verification_token,
        })),
    )
        .into_response()
}

/// POST /auth/login
async fn login(State(state): State<Arc<AppState>>, Json(body): Json<LoginRequest>) -> Response {
    let user = match state.user_store.find_by_email(body.email.trim()) {
        Ok(Some(user)) => user,
        Ok(None) => return reject(StatusCode::UNAUTHORIZED, "Invalid email or password"),
        Err(e) => {
            tracing::error!("Login lookup failed: {}", e);
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    if !verify_password(&body.password, &user.password_hash) {
        return reject(StatusCode::UNAUTHORIZED, "Invalid email or password");
    }

    let token = match state.tokens.issue(&user.id, Utc::now()) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to issue token: {}", e);
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    Json(SessionResponse {
        success: true,
        token,
        user,
    })
    .into_response()
}

/// POST /auth/password - requires a valid session; earlier tokens die once
/// the change lands.
async fn change_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordRequest>,
) -> Response {
    let identity = match resolve_strict(&state.user_store, &state.tokens, &headers) {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };
    let user = match identity {
        Identity::Registered(user) => user,
        // Strict resolution never yields a guest.
        Identity::Guest(_) => return reject(StatusCode::UNAUTHORIZED, "Not authorized"),
    };

    if !verify_password(&body.current_password, &user.password_hash) {
        return reject(StatusCode::UNAUTHORIZED, "Current password is incorrect");
    }
    if body.new_password.len() < 8 {
        return reject(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters",
        );
    }

    let new_hash = match hash_password(&body.new_password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Password hashing failed: {}", e);
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let now = Utc::now();
    if let Err(e) = state.user_store.update_password(&user.id, &new_hash, now) {
        tracing::error!("Failed to update password: {}", e);
        return reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }

    // Re-issue so the caller is not locked out by their own change.
    let token = match state.tokens.issue(&user.id, now) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to issue token: {}", e);
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    Json(json!({ "success": true, "token": token })).into_response()
}

/// GET /auth/verify?token=...
async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    match state.user_store.verify_email(&token_digest(&query.token)) {
        Ok(true) => Json(json!({ "success": true, "message": "Email verified" })).into_response(),
        Ok(false) => reject(StatusCode::BAD_REQUEST, "Invalid or used verification token"),
        Err(e) => {
            tracing::error!("Email verification failed: {}", e);
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn generate_verification_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/password", post(change_password))
        .route("/auth/verify", get(verify_email))
        .with_state(state)
}
