use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec![],
            max_age: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Signing configuration for bearer tokens and confirmation codes.
///
/// Injected into the token/code paths through `AppState`; nothing reads it
/// from ambient global state.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    /// Bearer token lifetime in hours. Default: 7 days.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Confirmation code lifetime in hours. Default: 24 hours.
    #[serde(default = "default_confirmation_ttl_hours")]
    pub confirmation_ttl_hours: i64,
}

fn default_token_ttl_hours() -> i64 {
    168
}
fn default_confirmation_ttl_hours() -> i64 {
    24
}

/// Bounds for review scores.
#[derive(Debug, Deserialize, Clone)]
pub struct ReviewConfig {
    #[serde(default = "default_score_min")]
    pub score_min: i16,
    #[serde(default = "default_score_max")]
    pub score_max: i16,
}

fn default_score_min() -> i16 {
    1
}
fn default_score_max() -> i16 {
    10
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            score_min: default_score_min(),
            score_max: default_score_max(),
        }
    }
}

/// Optional bootstrap administrator, created at startup if absent.
#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    pub admin: Option<AdminConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., LAUREL__AUTH__TOKEN_SECRET)
            .add_source(Environment::with_prefix("LAUREL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
