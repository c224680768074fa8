use crate::geocoder::GOOGLE_GEOCODE_ENDPOINT;
use std::{env, net::SocketAddr, str::FromStr, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
}

/// DynamoDB table names, one per record kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableNames {
    pub campgrounds: String,
    pub users: String,
    pub notifications: String,
    pub comments: String,
    pub reviews: String,
}

impl TableNames {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            campgrounds: format!("{prefix}campgrounds"),
            users: format!("{prefix}users"),
            notifications: format!("{prefix}notifications"),
            comments: format!("{prefix}comments"),
            reviews: format!("{prefix}reviews"),
        }
    }

    pub fn all(&self) -> [&str; 5] {
        [
            self.campgrounds.as_str(),
            self.users.as_str(),
            self.notifications.as_str(),
            self.comments.as_str(),
            self.reviews.as_str(),
        ]
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub image_bucket_name: String,
    /// Base URL under which uploaded images are publicly reachable.
    pub image_public_base_url: String,
    pub aws_region: String,
    // Optional endpoint for LocalStack
    pub localstack_endpoint: Option<String>,
    pub tables: TableNames,
    pub geocoder_endpoint: String,
    pub geocoder_api_key: String,
    /// Upper bound for every store, asset-host and geocoder call.
    pub external_call_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &str| var(key).filter(|v| !v.is_empty()).ok_or_else(|| ConfigError::MissingVar(key.into()));

        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = SocketAddr::from_str(&bind_address_str)
            .map_err(|e| ConfigError::InvalidVar("BIND_ADDRESS".into(), e.to_string()))?;

        let image_bucket_name = required("IMAGE_BUCKET_NAME")?;
        let aws_region = var("AWS_DEFAULT_REGION").unwrap_or_else(|| "ca-central-1".to_string());
        let localstack_endpoint = var("AWS_ENDPOINT_URL");

        let image_public_base_url = var("IMAGE_PUBLIC_BASE_URL").unwrap_or_else(|| match &localstack_endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), image_bucket_name),
            None => format!("https://{}.s3.{}.amazonaws.com", image_bucket_name, aws_region),
        });

        let tables = TableNames::with_prefix(&var("TABLE_PREFIX").unwrap_or_default());

        let geocoder_endpoint = var("GEOCODER_ENDPOINT").unwrap_or_else(|| GOOGLE_GEOCODE_ENDPOINT.to_string());
        let geocoder_api_key = required("GEOCODER_API_KEY")?;

        let timeout_secs: u64 = parse_or("EXTERNAL_CALL_TIMEOUT_SECS", var("EXTERNAL_CALL_TIMEOUT_SECS"), 10)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidVar(
                "EXTERNAL_CALL_TIMEOUT_SECS".into(),
                "must be greater than zero".into(),
            ));
        }
        let max_upload_bytes = parse_or("MAX_UPLOAD_BYTES", var("MAX_UPLOAD_BYTES"), 10 * 1024 * 1024)?;

        Ok(Config {
            bind_address,
            image_bucket_name,
            image_public_base_url,
            aws_region,
            localstack_endpoint,
            tables,
            geocoder_endpoint,
            geocoder_api_key,
            external_call_timeout: Duration::from_secs(timeout_secs),
            max_upload_bytes,
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidVar(key.into(), e.to_string())),
    }
}
