use bytes::Bytes;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::upstream::UpstreamError;

/// Longest slice of an upstream error body kept in [`UpstreamError::HttpError`].
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Settings for the pooled HTTP client shared by every upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Maximum number of upstream requests in flight across all routes.
    pub concurrent_limit: usize,
    /// How long a request waits for a concurrency permit before failing.
    pub permit_timeout_ms: u64,
    /// TCP connect timeout.
    pub connect_timeout_ms: u64,
    /// Default per-request timeout; upstreams may override it.
    pub request_timeout_ms: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 1000,
            permit_timeout_ms: 500,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl HttpClientConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Basic-auth credentials for a full-node upstream.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Pooled HTTP client with a global concurrency limit.
///
/// One instance is shared by every upstream client so connection pools and the permit budget
/// are process-wide.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    concurrent_limit: Arc<Semaphore>,
    config: HttpClientConfig,
}

struct PermitGuard {
    _permit: OwnedSemaphorePermit,
    semaphore: Arc<Semaphore>,
}

impl PermitGuard {
    fn new(permit: OwnedSemaphorePermit, semaphore: Arc<Semaphore>) -> Self {
        Self { _permit: permit, semaphore }
    }

    fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        tracing::trace!(
            available_permits = self.semaphore.available_permits(),
            "permit guard dropped"
        );
    }
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidConfig`] if the underlying client cannot be built.
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidConfig`] if the underlying client cannot be built.
    pub fn with_config(config: HttpClientConfig) -> Result<Self, UpstreamError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(64)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("chain-relay/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                UpstreamError::InvalidConfig(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            concurrent_limit: Arc::new(Semaphore::new(config.concurrent_limit)),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else if error.is_redirect() {
            "unexpected redirect".to_string()
        } else {
            "network error".to_string()
        }
    }

    fn truncate_error_body(raw: String) -> String {
        match raw.char_indices().nth(MAX_ERROR_BODY_CHARS) {
            Some((cut, _)) => format!("{}... (truncated)", &raw[..cut]),
            None => raw,
        }
    }

    /// POSTs `body` as `application/json` and returns the full response body on 2xx.
    ///
    /// Makes exactly one attempt; failover between upstreams is the caller's concern.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::ConcurrencyLimit`] if no permit frees up within the permit timeout.
    /// - [`UpstreamError::Timeout`] if the request exceeds `timeout`.
    /// - [`UpstreamError::HttpError`] on a non-2xx status.
    /// - [`UpstreamError::ConnectionFailed`] on any other transport failure.
    pub async fn send_request(
        &self,
        url: &str,
        body: Bytes,
        credentials: Option<&Credentials>,
        timeout: Duration,
    ) -> Result<Bytes, UpstreamError> {
        let permit = tokio::time::timeout(
            Duration::from_millis(self.config.permit_timeout_ms),
            Arc::clone(&self.concurrent_limit).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                available_permits = self.concurrent_limit.available_permits(),
                "http client semaphore acquisition timeout"
            );
            UpstreamError::ConcurrencyLimit
        })?
        .map_err(|_| UpstreamError::ConcurrencyLimit)?;

        let permit_guard = PermitGuard::new(permit, Arc::clone(&self.concurrent_limit));

        tracing::trace!(
            available_permits = permit_guard.available_permits(),
            "http request started"
        );

        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .timeout(timeout);
        if let Some(credentials) = credentials {
            request = request.basic_auth(&credentials.username, credentials.password.as_ref());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::trace!(
                    available_permits = permit_guard.available_permits(),
                    "http request error"
                );
                if e.is_timeout() {
                    return Err(UpstreamError::Timeout);
                }
                return Err(UpstreamError::ConnectionFailed(Self::sanitize_network_error(&e)));
            }
        };

        let status = response.status();
        if status.is_success() {
            let result = response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout
                } else {
                    UpstreamError::ConnectionFailed(Self::sanitize_network_error(&e))
                }
            });
            tracing::trace!(
                available_permits = permit_guard.available_permits(),
                "http request completed"
            );
            return result;
        }

        let raw_text = response.text().await.unwrap_or_default();
        tracing::trace!(
            status = status.as_u16(),
            available_permits = permit_guard.available_permits(),
            "http request failed"
        );
        Err(UpstreamError::HttpError(status.as_u16(), Self::truncate_error_body(raw_text)))
    }

    #[cfg(test)]
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}
