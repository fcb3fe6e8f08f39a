//! Configuration for the HTTP inference client.

use std::time::Duration;

use reqwest::Url;

use crate::error::{BackendError, Result};

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default path of the streaming chat endpoint.
pub const DEFAULT_STREAM_PATH: &str = "/chat";

/// Default path of the synchronous generation endpoint.
pub const DEFAULT_GENERATE_PATH: &str = "/generate";

/// Default wait for connection, response headers and first byte.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`HttpInferenceClient`](crate::HttpInferenceClient).
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    /// Backend base URL, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Path of the streaming endpoint.
    pub stream_path: String,
    /// Path of the synchronous endpoint.
    pub generate_path: String,
    /// Bound on connect, response headers and first chunk; also the total
    /// bound for synchronous calls.
    pub request_timeout: Duration,
    /// Longest allowed gap between stream chunks once streaming started.
    /// `None` lets a connected stream stall indefinitely.
    pub stream_idle_timeout: Option<Duration>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            generate_path: DEFAULT_GENERATE_PATH.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_idle_timeout: None,
        }
    }
}

impl InferenceConfig {
    /// Create a new config builder
    pub fn builder() -> InferenceConfigBuilder {
        InferenceConfigBuilder::default()
    }

    /// Full URL of the streaming endpoint.
    pub fn stream_url(&self) -> String {
        join_url(&self.base_url, &self.stream_path)
    }

    /// Full URL of the synchronous endpoint.
    pub fn generate_url(&self) -> String {
        join_url(&self.base_url, &self.generate_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Builder for [`InferenceConfig`].
#[derive(Debug, Clone, Default)]
pub struct InferenceConfigBuilder {
    config: InferenceConfig,
}

impl InferenceConfigBuilder {
    /// Set the backend base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the streaming endpoint path
    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        self.config.stream_path = path.into();
        self
    }

    /// Set the synchronous endpoint path
    pub fn generate_path(mut self, path: impl Into<String>) -> Self {
        self.config.generate_path = path.into();
        self
    }

    /// Set the connect / first-byte timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the idle timeout between stream chunks
    pub fn stream_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.stream_idle_timeout = timeout;
        self
    }

    /// Build and validate the config.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ConfigError`] if the base URL is not an
    /// absolute http(s) URL or a timeout is zero.
    pub fn build(self) -> Result<InferenceConfig> {
        let url = Url::parse(&self.config.base_url).map_err(|e| {
            BackendError::ConfigError(format!("invalid base_url '{}': {e}", self.config.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BackendError::ConfigError(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.config.request_timeout.is_zero() {
            return Err(BackendError::ConfigError("request_timeout must be non-zero".to_string()));
        }
        if self.config.stream_idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(BackendError::ConfigError(
                "stream_idle_timeout must be non-zero when set".to_string(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_double_slashes() {
        let config = InferenceConfig::builder().base_url("http://ai:8000/").build().unwrap();
        assert_eq!(config.stream_url(), "http://ai:8000/chat");
        assert_eq!(config.generate_url(), "http://ai:8000/generate");
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = InferenceConfig::default();
        assert_eq!(config.stream_url(), "http://localhost:8000/chat");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.stream_idle_timeout.is_none());
    }

    #[test]
    fn rejects_non_http_urls_and_zero_timeouts() {
        assert!(InferenceConfig::builder().base_url("ftp://x").build().is_err());
        assert!(InferenceConfig::builder().base_url("not a url").build().is_err());
        assert!(InferenceConfig::builder().request_timeout(Duration::ZERO).build().is_err());
        assert!(
            InferenceConfig::builder().stream_idle_timeout(Some(Duration::ZERO)).build().is_err()
        );
    }
}
