//! Client configuration.
//!
//! The processing service address is resolved once, at startup, and passed
//! explicitly into the controller. Everything else here is a fixed constant
//! shared by the library and the CLI.

use std::env;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Environment variable holding the processing service base URL.
pub const SERVICE_URL_ENV: &str = "TALLYFLOW_API_URL";

/// Processing service base URL used when nothing is configured.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:5000";

/// The only media type accepted for upload.
pub const CSV_MEDIA_TYPE: &str = "text/csv";

/// Declared for files whose extension says nothing.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Name of the multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Advertised maximum upload size (in bytes).
///
/// 16 MB. Displayed to the user only; the service enforces it.
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Capacity of each controller's event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Settings for talking to the processing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL without trailing slash, e.g. `http://localhost:5000`.
    pub base_url: String,
    /// Whole-request timeout. `None` waits for as long as the transport does.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Build a config for an explicit base URL.
    pub fn new(base_url: impl AsRef<str>) -> ConfigResult<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url.as_ref())?,
            timeout: None,
        })
    }

    /// Resolve the config from the environment, loading `.env` first.
    ///
    /// Falls back to [`DEFAULT_SERVICE_URL`] when the variable is unset or blank.
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();

        match env::var(SERVICE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url),
            Ok(_) | Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnv(SERVICE_URL_ENV)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Full URL of the upload endpoint.
    pub fn upload_url(&self) -> String {
        format!("{}/api/upload", self.base_url)
    }

    /// Full URL of the health endpoint.
    pub fn health_url(&self) -> String {
        format!("{}/api/health", self.base_url)
    }
}

fn normalize_base_url(raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');

    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }

    reqwest::Url::parse(trimmed).map_err(|_| ConfigError::InvalidBaseUrl(raw.to_string()))?;

    Ok(trimmed.to_string())
}
