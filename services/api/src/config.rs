use meetsl_core::latency::DEFAULT_STATS_INTERVAL;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub model_path: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub chat_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub tts_base_url: String,
    pub cors_origin: String,
    pub stats_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8000)),
            model_path: PathBuf::from("./models/gesture_recognizer.json"),
            openai_api_key: None,
            openai_api_base: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            log_level: Level::INFO,
            prompts_path: PathBuf::from("./prompts"),
            tts_base_url: "https://translate.google.com".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            stats_interval: DEFAULT_STATS_INTERVAL,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Self::default();

        let bind_address = match std::env::var("BIND_ADDRESS") {
            Ok(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?,
            Err(_) => defaults.bind_address,
        };

        let model_path = std::env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let openai_api_base =
            std::env::var("OPENAI_API_BASE").unwrap_or(defaults.openai_api_base);

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or(defaults.chat_model);

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.prompts_path);

        let tts_base_url = std::env::var("TTS_BASE_URL").unwrap_or(defaults.tts_base_url);

        let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        let stats_interval = match std::env::var("STATS_INTERVAL") {
            Ok(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "STATS_INTERVAL".to_string(),
                        format!("'{}' is not a positive integer", raw),
                    )
                })?,
            Err(_) => defaults.stats_interval,
        };

        Ok(Self {
            bind_address,
            model_path,
            openai_api_key,
            openai_api_base,
            chat_model,
            log_level,
            prompts_path,
            tts_base_url,
            cors_origin,
            stats_interval,
        })
    }
}
