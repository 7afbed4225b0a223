//! Upstream client variants.
//!
//! | Variant | Target | Per-request shaping |
//! |---------|--------|---------------------|
//! | [`NodeClient`] | a full node's JSON-RPC port | optional basic auth |
//! | [`TaggedClient`] | a hosted endpoint keyed by API secret | URL secret picked by `?tag=` |
//!
//! Clients are immutable after construction and hold no per-request state.

use crate::{
    config::UpstreamConfig,
    types::RequestMeta,
    upstream::{
        http_client::{Credentials, HttpClient},
        UpstreamError,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

/// Placeholder in a tagged URL template that is replaced by the selected secret.
pub const SECRET_PLACEHOLDER: &str = "{secret}";

/// One upstream JSON-RPC endpoint.
#[async_trait]
pub trait UpstreamClient: Send + Sync + fmt::Debug {
    /// Operator-assigned name, used in logs, metrics and aggregate errors.
    fn name(&self) -> &Arc<str>;

    /// POSTs `body` and returns the upstream's response body.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] on transport failure, non-2xx status, or when `meta` cannot be
    /// applied to this client.
    async fn handle(&self, body: Bytes, meta: &RequestMeta) -> Result<Bytes, UpstreamError>;
}

/// Builds the client described by `config`, sharing `http` for transport.
///
/// # Errors
///
/// Returns [`UpstreamError::InvalidConfig`] if a URL is not an absolute http(s) URL, a template
/// lacks the `{secret}` placeholder, or the default tag has no secret.
pub fn build_client(
    config: &UpstreamConfig,
    http: &Arc<HttpClient>,
) -> Result<Arc<dyn UpstreamClient>, UpstreamError> {
    let default_timeout = http.config().request_timeout();
    let timeout =
        |override_ms: Option<u64>| override_ms.map_or(default_timeout, Duration::from_millis);

    match config {
        UpstreamConfig::Node { name, host, username, password, timeout_ms } => {
            let credentials = username
                .clone()
                .map(|username| Credentials { username, password: password.clone() });
            let client = NodeClient::new(name.as_str(), host, credentials, Arc::clone(http))?
                .with_timeout(timeout(*timeout_ms));
            Ok(Arc::new(client))
        }
        UpstreamConfig::Tagged {
            name,
            base_url_template,
            tag_to_secret,
            default_tag,
            timeout_ms,
        } => {
            let client = TaggedClient::new(
                name.as_str(),
                base_url_template,
                tag_to_secret.clone(),
                default_tag,
                Arc::clone(http),
            )?
            .with_timeout(timeout(*timeout_ms));
            Ok(Arc::new(client))
        }
    }
}

fn check_http_url(url: &str) -> Result<(), UpstreamError> {
    let parsed =
        Url::parse(url).map_err(|e| UpstreamError::InvalidConfig(format!("invalid url: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(UpstreamError::InvalidConfig(format!("unsupported url scheme: {other}"))),
    }
}

/// Direct full-node JSON-RPC client.
pub struct NodeClient {
    name: Arc<str>,
    url: String,
    credentials: Option<Credentials>,
    http: Arc<HttpClient>,
    timeout: Duration,
}

impl NodeClient {
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidConfig`] if `host` is not an http(s) URL.
    pub fn new(
        name: impl Into<Arc<str>>,
        host: &str,
        credentials: Option<Credentials>,
        http: Arc<HttpClient>,
    ) -> Result<Self, UpstreamError> {
        check_http_url(host)?;
        let timeout = http.config().request_timeout();
        Ok(Self { name: name.into(), url: host.to_string(), credentials, http, timeout })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeClient")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl UpstreamClient for NodeClient {
    fn name(&self) -> &Arc<str> {
        &self.name
    }

    async fn handle(&self, body: Bytes, _meta: &RequestMeta) -> Result<Bytes, UpstreamError> {
        self.http.send_request(&self.url, body, self.credentials.as_ref(), self.timeout).await
    }
}

/// Hosted-endpoint client whose URL embeds a secret chosen per request.
///
/// The secret is looked up by the request's `tag`; requests without a tag use `default_tag`.
pub struct TaggedClient {
    name: Arc<str>,
    url_template: String,
    tag_to_secret: BTreeMap<String, String>,
    default_tag: String,
    http: Arc<HttpClient>,
    timeout: Duration,
}

impl TaggedClient {
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidConfig`] if the template lacks `{secret}`, does not
    /// render to an http(s) URL, or `default_tag` is not a key of `tag_to_secret`.
    pub fn new(
        name: impl Into<Arc<str>>,
        url_template: &str,
        tag_to_secret: BTreeMap<String, String>,
        default_tag: &str,
        http: Arc<HttpClient>,
    ) -> Result<Self, UpstreamError> {
        if !url_template.contains(SECRET_PLACEHOLDER) {
            return Err(UpstreamError::InvalidConfig(format!(
                "url template must contain {SECRET_PLACEHOLDER}"
            )));
        }
        check_http_url(&url_template.replace(SECRET_PLACEHOLDER, "secret"))?;
        if !tag_to_secret.contains_key(default_tag) {
            return Err(UpstreamError::InvalidConfig(format!(
                "default tag {default_tag} has no secret"
            )));
        }

        let timeout = http.config().request_timeout();
        Ok(Self {
            name: name.into(),
            url_template: url_template.to_string(),
            tag_to_secret,
            default_tag: default_tag.to_string(),
            http,
            timeout,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Renders the URL for a request.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::UnknownTag`] if the request names a tag with no secret.
    pub fn resolve_url(&self, meta: &RequestMeta) -> Result<String, UpstreamError> {
        let tag = meta.tag.as_deref().filter(|t| !t.is_empty()).unwrap_or(&self.default_tag);
        let secret = self
            .tag_to_secret
            .get(tag)
            .ok_or_else(|| UpstreamError::UnknownTag(tag.to_string()))?;
        Ok(self.url_template.replace(SECRET_PLACEHOLDER, secret))
    }
}

impl fmt::Debug for TaggedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedClient")
            .field("name", &self.name)
            .field("url_template", &self.url_template)
            .field("tags", &self.tag_to_secret.keys().collect::<Vec<_>>())
            .field("default_tag", &self.default_tag)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl UpstreamClient for TaggedClient {
    fn name(&self) -> &Arc<str> {
        &self.name
    }

    async fn handle(&self, body: Bytes, meta: &RequestMeta) -> Result<Bytes, UpstreamError> {
        let url = self.resolve_url(meta)?;
        self.http.send_request(&url, body, None, self.timeout).await
    }
}
