use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_BUCKET_NAME: &str = "imageinquiry-images";
const DEFAULT_INDEX_NAME: &str = "photo-label";
const DEFAULT_BLOB_STORE_URL: &str = "https://s3.amazonaws.com";
const DEFAULT_LABEL_SERVICE_URL: &str = "https://rekognition.us-east-1.amazonaws.com";
const DEFAULT_LABEL_MIN_CONFIDENCE: f32 = 75.0;
const DEFAULT_USER_ID: &str = "u123";
/// Default request body limit (32 MiB of base64 text).
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the image labeling server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bucket that receives uploaded images.
    pub bucket_name: String,
    /// Base URL of the S3-compatible blob store (path-style addressing).
    pub blob_store_url: String,
    /// Endpoint of the label detection service.
    pub label_service_url: String,
    /// Minimum confidence (0-100) a detected label must reach.
    pub label_min_confidence: f32,
    /// Search host endpoint; `https://` is assumed when no scheme is given.
    pub search_host: String,
    /// Basic-auth user for the search index.
    pub search_username: String,
    /// Basic-auth password for the search index.
    pub search_password: String,
    /// Index that receives label records.
    pub index_name: String,
    /// Identity used when a request carries no user header.
    pub default_user_id: String,
    /// Report malformed requests as `400` instead of `500`.
    pub strict_status_codes: bool,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Largest request body accepted by the upload routes.
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bucket_name: load_env_or("IMAGE_BUCKET_NAME", DEFAULT_BUCKET_NAME),
            blob_store_url: load_env_or("BLOB_STORE_URL", DEFAULT_BLOB_STORE_URL),
            label_service_url: load_env_or("LABEL_SERVICE_URL", DEFAULT_LABEL_SERVICE_URL),
            label_min_confidence: load_env_optional("LABEL_MIN_CONFIDENCE")
                .map(|value| parse_confidence(&value))
                .transpose()?
                .unwrap_or(DEFAULT_LABEL_MIN_CONFIDENCE),
            search_host: load_env("OPENSEARCH_HOST_ENDPOINT")?,
            search_username: load_env("ESUSERNAME")?,
            search_password: load_env("ESPASSWORD")?,
            index_name: load_env_or("SEARCH_INDEX_NAME", DEFAULT_INDEX_NAME),
            default_user_id: load_env_or("DEFAULT_USER_ID", DEFAULT_USER_ID),
            strict_status_codes: load_env_optional("STRICT_STATUS_CODES")
                .map(|value| parse_flag(&value))
                .transpose()?
                .unwrap_or(false),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            max_body_bytes: load_env_optional("MAX_BODY_BYTES")
                .map(|value| parse_body_limit(&value))
                .transpose()?
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
        })
    }

    /// Public URL under which an uploaded object is addressable.
    pub fn object_url(&self, object_key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{object_key}", self.bucket_name)
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_confidence(value: &str) -> Result<f32, ConfigError> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|confidence| (0.0..=100.0).contains(confidence))
        .ok_or_else(|| ConfigError::InvalidValue("LABEL_MIN_CONFIDENCE".to_string()))
}

fn parse_body_limit(value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|limit| *limit > 0)
        .ok_or_else(|| ConfigError::InvalidValue("MAX_BODY_BYTES".to_string()))
}

fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue("STRICT_STATUS_CODES".to_string())),
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        bucket = %config.bucket_name,
        index = %config.index_name,
        search_host = %config.search_host,
        label_min_confidence = config.label_min_confidence,
        server_port = ?config.server_port,
        max_body_bytes = config.max_body_bytes,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_must_be_a_percentage() {
        assert_eq!(parse_confidence("75").unwrap(), 75.0);
        assert_eq!(parse_confidence(" 0.5 ").unwrap(), 0.5);
        assert!(matches!(
            parse_confidence("101"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(parse_confidence("-1").is_err());
        assert!(parse_confidence("high").is_err());
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(parse_flag("1").unwrap());
        assert!(!parse_flag("off").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn body_limit_must_be_positive() {
        assert_eq!(parse_body_limit("1048576").unwrap(), 1024 * 1024);
        assert!(parse_body_limit("0").is_err());
        assert!(parse_body_limit("lots").is_err());
    }

    #[test]
    fn object_url_uses_bucket_host() {
        let config = Config {
            bucket_name: "imageinquiry-images".into(),
            blob_store_url: DEFAULT_BLOB_STORE_URL.into(),
            label_service_url: DEFAULT_LABEL_SERVICE_URL.into(),
            label_min_confidence: DEFAULT_LABEL_MIN_CONFIDENCE,
            search_host: "search.example.org".into(),
            search_username: "user".into(),
            search_password: "secret".into(),
            index_name: DEFAULT_INDEX_NAME.into(),
            default_user_id: DEFAULT_USER_ID.into(),
            strict_status_codes: false,
            server_port: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        };
        assert_eq!(
            config.object_url("u123/abc"),
            "https://imageinquiry-images.s3.amazonaws.com/u123/abc"
        );
    }
}
