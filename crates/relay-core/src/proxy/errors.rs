use crate::{cache::CacheError, types::RouteError, upstream::UpstreamError};
use std::{fmt, io, sync::Arc};

/// One failed attempt in a failover walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub upstream: Arc<str>,
    pub error: UpstreamError,
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.upstream, self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error("no upstreams configured")]
    NoUpstreams,

    /// Every client failed. Failures are listed in the order they were tried.
    #[error("all upstreams failed: {}", join_failures(.0))]
    AllUpstreamsFailed(Vec<UpstreamFailure>),
}

fn join_failures(failures: &[UpstreamFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Top-level error for a routed request.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Route(#[from] RouteError),

    /// The request body could not be read for fingerprinting.
    #[error("failed to read request body: {0}")]
    Body(#[from] io::Error),

    /// This request ran the upstream fetch and it failed.
    #[error("{0}")]
    Upstream(ProxyError),

    /// This request waited on a concurrent identical request that did not produce a response.
    #[error("coalesced request failed: no response was cached for {key}, retry the request")]
    CoalescedFetchFailed { key: String },
}

impl From<CacheError<ProxyError>> for RelayError {
    fn from(err: CacheError<ProxyError>) -> Self {
        match err {
            CacheError::Loader(e) => Self::Upstream(e),
            CacheError::CoalescedFetchFailed { key } => Self::CoalescedFetchFailed { key },
        }
    }
}

impl RelayError {
    /// HTTP status for this error. Unknown routes are client errors; everything else is a 500.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Route(_) => 404,
            Self::Body(_) | Self::Upstream(_) | Self::CoalescedFetchFailed { .. } => 500,
        }
    }

    /// Label for the `outcome` dimension of the request counter.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Route(_) => "unknown_route",
            Self::Body(_) => "body_error",
            Self::Upstream(_) => "upstream_error",
            Self::CoalescedFetchFailed { .. } => "coalesced_error",
        }
    }
}
