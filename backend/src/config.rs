use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 8080)
    pub port: u16,
    pub auth: AuthConfig,
    pub quota: QuotaConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub ai: AiConfig,
}

/// Token signing settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret used to sign and verify JWTs (required)
    pub jwt_secret: String,
    /// Token time-to-live in hours (default: 24)
    pub token_ttl_hours: i64,
}

/// Plan usage ceilings and the rolling reset period.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Requests per period for unauthenticated guests (default: 5)
    pub guest_limit: u32,
    /// Requests per period for the free plan (default: 20)
    pub free_limit: u32,
    /// Requests per period for the student plan (default: 100)
    pub student_limit: u32,
    /// Requests per period for the pro plan (default: 500)
    pub pro_limit: u32,
    /// Requests per period for the ultra plan (default: 2000)
    pub ultra_limit: u32,
    /// Length of the rolling usage period in days (default: 30)
    pub reset_period_days: i64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite database URL (default: sqlite:./data/studybuddy.db)
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// CORS allowed origins (comma-separated, default: *)
    pub origins: String,
}

/// Upstream AI service the assist route proxies to.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Base URL of the Ollama-compatible service (default: http://localhost:11434)
    pub base_url: String,
    /// Default model (default: llama3.2)
    pub model: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("PORT"))?,
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnvVar("JWT_SECRET"))?,
                token_ttl_hours: parse_var("TOKEN_TTL_HOURS", 24)?,
            },
            quota: QuotaConfig {
                guest_limit: parse_var("GUEST_PLAN_LIMIT", 5)?,
                free_limit: parse_var("FREE_PLAN_LIMIT", 20)?,
                student_limit: parse_var("STUDENT_PLAN_LIMIT", 100)?,
                pro_limit: parse_var("PRO_PLAN_LIMIT", 500)?,
                ultra_limit: parse_var("ULTRA_PLAN_LIMIT", 2000)?,
                reset_period_days: parse_var("USAGE_RESET_DAYS", 30)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./data/studybuddy.db".to_string()),
            },
            logging: LoggingConfig {
                level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            cors: CorsConfig {
                origins: env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            },
            ai: AiConfig {
                base_url: env::var("AI_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string()),
                model: env::var("AI_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(name)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),
}
