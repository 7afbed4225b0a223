use thiserror::Error;

/// Errors from a single upstream call.
///
/// Messages are safe to return to clients: network errors are reduced to a fixed vocabulary
/// and never carry the upstream URL, credentials or tag secrets.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Request exceeded the client's timeout.
    #[error("request timeout")]
    Timeout,

    /// Could not reach the upstream or the transfer failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Upstream answered with a non-2xx status.
    ///
    /// First field is the status code, second a truncated copy of the response body.
    #[error("HTTP error {0}: {1}")]
    HttpError(u16, String),

    /// No permit was available on the shared HTTP client in time.
    #[error("concurrency limit reached")]
    ConcurrencyLimit,

    /// The request's `tag` does not name a configured secret.
    #[error("unknown upstream tag: {0}")]
    UnknownTag(String),

    /// The client could not be constructed from its configuration.
    #[error("invalid upstream configuration: {0}")]
    InvalidConfig(String),
}

impl UpstreamError {
    /// Short, fixed label used for the `error_type` metric dimension.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailed(_) => "connection",
            Self::HttpError(status, _) if (500..=599).contains(status) => "http_5xx",
            Self::HttpError(..) => "http_4xx",
            Self::ConcurrencyLimit => "concurrency_limit",
            Self::UnknownTag(_) => "unknown_tag",
            Self::InvalidConfig(_) => "config",
        }
    }
}
