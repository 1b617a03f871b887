//! HTTP client builder for the token API.

use std::time::Duration;

use reqwest_middleware::ClientBuilder;
use reqwest_retry::RetryTransientMiddleware;

use super::RetryAfterPolicy;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum number of retries. Authorization codes are single-use, so the
    /// default is no retry.
    pub max_retries: u32,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 0,
            user_agent: format!("one-auth/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client with middleware.
pub type HttpClient = reqwest_middleware::ClientWithMiddleware;

/// Builder for HTTP clients with timeout and retry middleware.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    /// Create a new client builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.config.user_agent = user_agent;
        self
    }

    /// Build the configured HTTP client.
    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .user_agent(self.config.user_agent)
            .build()?;

        let mut builder = ClientBuilder::new(client);
        if self.config.max_retries > 0 {
            let retry_policy = RetryAfterPolicy::new(self.config.max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(builder.build())
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_default() {
        let builder = HttpClientBuilder::new();
        assert_eq!(builder.config.timeout, Duration::from_secs(30));
        assert_eq!(builder.config.max_retries, 0);
        assert!(builder.config.user_agent.starts_with("one-auth/"));
    }

    #[test]
    fn test_builder_with_timeout() {
        let builder = HttpClientBuilder::new().with_timeout(Duration::from_secs(60));
        assert_eq!(builder.config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_with_max_retries() {
        let builder = HttpClientBuilder::new().with_max_retries(5);
        assert_eq!(builder.config.max_retries, 5);
    }

    #[tokio::test]
    async fn test_build_client() {
        assert!(HttpClientBuilder::new().build().is_ok());
        assert!(HttpClientBuilder::new().with_max_retries(2).build().is_ok());
    }
}
