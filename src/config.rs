use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The credential for the generative service was not provided.
    #[error("Missing credential: {0} must be set")]
    UnconfiguredCredential(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Configuration was installed twice in the global cache.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration for the analysis server.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key presented to the Gemini `generateContent` endpoint.
    pub gemini_api_key: String,
    /// Gemini model identifier used for every metric request.
    pub gemini_model: String,
    /// Base URL of the Gemini API (overridable for testing and proxies).
    pub gemini_base_url: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            gemini_api_key: load_env_optional("GEMINI_API_KEY")
                .ok_or_else(|| ConfigError::UnconfiguredCredential("GEMINI_API_KEY".into()))?,
            gemini_model: load_env_optional("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: load_env_optional("GEMINI_BASE_URL")
                .map(|value| validate_base_url(&value))
                .transpose()?
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn validate_base_url(value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidValue("GEMINI_BASE_URL".into()))
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Fails fast when the Gemini credential is absent so no request is ever served without it.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        model = %config.gemini_model,
        base_url = %config.gemini_base_url,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    Ok(get_config())
}
