//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// A Postgres URL, or `memory` for the in-process store.
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub generation_model: String,
    pub vision_model: String,
    pub generation_timeout: Duration,
    pub google_client_id: String,
    pub google_tokeninfo_url: String,
    pub identity_timeout: Duration,
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Load Server and Database Settings ---
        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:8001");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required("DATABASE_URL")?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generative Backend ---
        let openai_api_key = required("OPENAI_API_KEY")?;
        let openai_base_url = lookup("OPENAI_BASE_URL");
        let generation_model = or_default("GENERATION_MODEL", "gpt-4o-mini");
        let vision_model = or_default("VISION_MODEL", "gpt-4o-mini");
        let generation_timeout = parse_secs(&or_default("GENERATION_TIMEOUT_SECS", "60"), "GENERATION_TIMEOUT_SECS")?;

        // --- Identity and Sessions ---
        let google_client_id = required("GOOGLE_CLIENT_ID")?;
        let google_tokeninfo_url =
            or_default("GOOGLE_TOKENINFO_URL", "https://oauth2.googleapis.com/tokeninfo");
        let identity_timeout = parse_secs(&or_default("IDENTITY_TIMEOUT_SECS", "10"), "IDENTITY_TIMEOUT_SECS")?;
        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "must not be empty".to_string(),
            ));
        }

        // --- HTTP Surface ---
        let cors_origins = or_default("CORS_ORIGINS", "http://localhost:3000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let max_upload_str = or_default("MAX_UPLOAD_BYTES", "10485760");
        let max_upload_bytes = max_upload_str.parse::<usize>().map_err(|e| {
            ConfigError::InvalidValue("MAX_UPLOAD_BYTES".to_string(), e.to_string())
        })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_base_url,
            generation_model,
            vision_model,
            generation_timeout,
            google_client_id,
            google_tokeninfo_url,
            identity_timeout,
            jwt_secret,
            cors_origins,
            max_upload_bytes,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.eq_ignore_ascii_case("memory")
    }
}

fn parse_secs(value: &str, key: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
