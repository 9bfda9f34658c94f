pub mod auth;
pub mod config;
pub mod llm;
pub mod logging;
pub mod models;
pub mod quota;
pub mod routes;
pub mod store;
pub mod test_util;

pub use auth::{AuthError, TokenService};
pub use config::Config;
pub use llm::AiClient;
pub use models::assist::{AssistRequest, AssistResponse};
pub use models::user::{GuestIdentity, Identity, Plan, Role, User};
pub use store::UserStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub user_store: UserStore,
    pub tokens: TokenService,
    pub ai_client: AiClient,
}
