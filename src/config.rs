//! Client configuration.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. The only environment-driven setting is the backend
//! origin: when no base URL is given explicitly, `TOOLHUB_API_URL` is consulted,
//! and when that is absent requests go to the default hosting origin.

use crate::error::ConfigError;
use crate::notify::Notifier;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable selecting the backend origin.
pub const BASE_URL_ENV: &str = "TOOLHUB_API_URL";

/// Origin used when neither the builder nor the environment names one.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8000";

/// Configuration for an [`crate::client::ApiClient`].
///
/// # Example
/// ```rust
/// use toolhub_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:8000/")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url, "http://localhost:8000");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Backend origin without a trailing slash.
    pub base_url: String,

    /// Whole-request timeout for request, upload and download calls. Default: 60.
    ///
    /// Streams are exempt: a batch conversion legitimately runs for minutes.
    pub request_timeout_secs: u64,

    /// TCP connect timeout for every call, streams included. Default: 10.
    pub connect_timeout_secs: u64,

    /// `User-Agent` header value.
    pub user_agent: String,

    /// Observer for conversion orchestrator transitions.
    pub progress_callback: Option<ProgressCallback>,

    /// Sink for user-facing notifications. If None, notifications go to `tracing`.
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: base_url_from_env(),
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            user_agent: format!("toolhub-client/{}", env!("CARGO_PKG_VERSION")),
            progress_callback: None,
            notifier: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field("notifier", &self.notifier.as_ref().map(|_| "<dyn Notifier>"))
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Join `endpoint` onto the base URL.
    ///
    /// Absolute `http://` / `https://` endpoints are returned unchanged.
    pub fn resolve_url(&self, endpoint: &str) -> String {
        if is_absolute(endpoint) {
            return endpoint.to_string();
        }
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the underlying reqwest client.
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = normalise_base(&url.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.config.notifier = Some(notifier);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let c = &self.config;
        if !is_absolute(&c.base_url) {
            return Err(ConfigError::InvalidBaseUrl {
                url: c.base_url.clone(),
            });
        }
        if c.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                field: "request_timeout_secs",
            });
        }
        if c.connect_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                field: "connect_timeout_secs",
            });
        }
        Ok(self.config)
    }
}

/// Check if the input string looks like an absolute HTTP(S) URL.
pub fn is_absolute(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn normalise_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn base_url_from_env() -> String {
    match std::env::var(BASE_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => normalise_base(&url),
        _ => DEFAULT_ORIGIN.to_string(),
    }
}
