//! Factories shared by unit and integration tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::password::hash_password;
use crate::auth::TokenService;
use crate::config::{
    AiConfig, AuthConfig, Config, CorsConfig, DatabaseConfig, LoggingConfig, QuotaConfig,
};
use crate::models::user::{Plan, Role, User};
use crate::store::UserStore;
use crate::{AiClient, AppState};

pub const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 8080,
        auth: AuthConfig {
            jwt_secret: TEST_SECRET.to_string(),
            token_ttl_hours: 24,
        },
        quota: QuotaConfig {
            guest_limit: 5,
            free_limit: 20,
            student_limit: 100,
            pro_limit: 500,
            ultra_limit: 2000,
            reset_period_days: 30,
        },
        database: DatabaseConfig {
            url: ":memory:".to_string(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig {
            origins: "*".to_string(),
        },
        ai: AiConfig {
            base_url: "http://localhost:11434".to_string(),
            model: "test-model".to_string(),
        },
    }
}

pub fn create_test_state() -> Arc<AppState> {
    create_test_state_with(test_config())
}

pub fn create_test_state_with(config: Config) -> Arc<AppState> {
    let user_store = UserStore::open(&config.database.url).unwrap();
    let tokens = TokenService::new(config.auth.jwt_secret.clone(), config.auth.token_ttl_hours);
    let ai_client = AiClient::new(&config.ai.base_url, &config.ai.model);

    Arc::new(AppState {
        config,
        user_store,
        tokens,
        ai_client,
    })
}

/// Create a registered user directly in the store and return it with a fresh
/// token.
pub fn register_test_user(
    state: &AppState,
    email: &str,
    password: &str,
    role: Role,
    plan: Plan,
    usage_limit: u32,
) -> (User, String) {
    let now = Utc::now();
    let user = state
        .user_store
        .create_user(
            email,
            &hash_password(password).unwrap(),
            role,
            plan,
            usage_limit,
            "test-digest",
            now,
            state.config.quota.reset_period_days,
        )
        .unwrap();
    let token = state.tokens.issue(&user.id, now).unwrap();
    (user, token)
}

/// Token issued at an arbitrary moment, for staleness and expiry scenarios.
pub fn issue_token_at(state: &AppState, user_id: &str, issued_at: DateTime<Utc>) -> String {
    state.tokens.issue(user_id, issued_at).unwrap()
}
