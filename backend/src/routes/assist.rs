//! The quota-gated assist endpoint. Full pipeline per request: token
//! verification, identity resolution (guests allowed), password-change
//! invalidation, quota consumption, then the proxied AI call.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::auth::identity::resolve_permissive;
use crate::models::assist::{AssistRequest, AssistResponse};
use crate::quota;
use crate::AppState;

/// POST /assist
async fn assist(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AssistRequest>,
) -> Response {
    let identity = match resolve_permissive(
        &state.user_store,
        &state.tokens,
        &headers,
        state.config.quota.guest_limit,
    ) {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    // Quota is settled before the upstream call; a rejected request must not
    // reach the AI service.
    let identity = match quota::consume(
        &state.user_store,
        identity,
        Utc::now(),
        state.config.quota.reset_period_days,
    ) {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    let model = body
        .model
        .clone()
        .unwrap_or_else(|| state.ai_client.default_model().to_string());

    match state.ai_client.chat(&body.prompt, &model).await {
        Ok(answer) => Json(AssistResponse {
            answer,
            model,
            usage_count: identity.usage_count(),
            usage_limit: identity.usage_limit(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Assist upstream call failed for {}: {}", identity.id(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "AI service unavailable" })),
            )
                .into_response()
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/assist", post(assist))
        .with_state(state)
}
