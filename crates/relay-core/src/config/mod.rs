//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `Default` implementations and `set_default` calls
//! 2. **Config file**: TOML file named by the `RELAY_CONFIG` env var (default
//!    `config/config.toml`, optional)
//! 3. **Environment variables**: `RELAY__SECTION__FIELD` overrides specific fields
//! 4. **Legacy route variables**: `<CHAIN>_<NETWORK>_URL[S]` and friends add routes the file does
//!    not define (see [`AppConfig::with_legacy_routes`])
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind_port = 8545
//!
//! [[routes]]
//! chain = "btc"
//! network = "mainnet"
//!
//! [[routes.upstreams]]
//! kind = "node"
//! name = "btc-primary"
//! host = "http://10.0.0.4:8332"
//! username = "rpc"
//! password = "secret"
//!
//! [[routes]]
//! chain = "eth"
//! network = "testnet"
//!
//! [[routes.upstreams]]
//! kind = "tagged"
//! name = "infura-kovan"
//! base_url_template = "https://kovan.infura.io/v3/{secret}"
//! default_tag = "wallet"
//! tag_to_secret = { wallet = "abc123", explorer = "def456" }
//! ```

use crate::{
    cache::CacheConfig,
    types::{Chain, Network, RouteKey},
    upstream::{HttpClientConfig, SECRET_PLACEHOLDER},
};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::Path,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    8545
}

fn default_max_concurrent_requests() -> usize {
    1000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,

    /// `json` or `pretty`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// One upstream in a route's failover list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UpstreamConfig {
    /// Direct full-node JSON-RPC endpoint.
    Node {
        name: String,
        host: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Hosted endpoint whose URL embeds a secret selected by the request's `tag`.
    Tagged {
        name: String,
        base_url_template: String,
        #[serde(default)]
        tag_to_secret: BTreeMap<String, String>,
        default_tag: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

impl UpstreamConfig {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Node { name, .. } | Self::Tagged { name, .. } => name,
        }
    }
}

/// Upstream list for one `(chain, network)` route, in failover order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub chain: Chain,
    pub network: Network,
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
}

impl RouteConfig {
    #[must_use]
    pub fn key(&self) -> RouteKey {
        RouteKey::new(self.chain, self.network)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub http_client: HttpClientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl AppConfig {
    /// Loads defaults, the TOML file at `config_path` (if present) and `RELAY__*` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source cannot be read or does not deserialize.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("server.bind_address", default_bind_address())?
            .set_default("server.bind_port", i64::from(default_bind_port()))?
            .set_default("cache.ttl_seconds", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("metrics.enabled", true)?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("RELAY").prefix_separator("__").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads the layered configuration and merges routes from the legacy environment scheme.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source cannot be read or does not deserialize.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("RELAY_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Ok(Self::from_file(&config_path)?.with_legacy_routes(std::env::vars()))
    }

    /// Adds routes described by the legacy per-chain environment variables.
    ///
    /// For each `<CHAIN>_<NETWORK>` prefix (upper case, e.g. `BTC_MAINNET`):
    ///
    /// | Variable | Effect |
    /// |----------|--------|
    /// | `_URLS` | comma-separated node URLs, in failover order |
    /// | `_URL` | single node URL, used when `_URLS` is absent |
    /// | `_USER`, `_PASSWORD` | basic auth applied to every node URL |
    /// | `ETH_<NETWORK>_URL_TEMPLATE` | tagged upstream appended after the nodes |
    /// | `ETH_TAG_<TAG>` | secret for `<TAG>` (tag names are lower-cased) |
    /// | `ETH_DEFAULT_TAG` | tag used when a request has none (default `default`) |
    ///
    /// `ETH_KOVAN_*` is read when the matching `ETH_TESTNET_*` variable is unset. Routes already
    /// defined by earlier layers are left untouched.
    #[must_use]
    pub fn with_legacy_routes<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let defined: HashSet<RouteKey> = self.routes.iter().map(RouteConfig::key).collect();

        for chain in Chain::ALL {
            for network in Network::ALL {
                let key = RouteKey::new(chain, network);
                if defined.contains(&key) {
                    continue;
                }
                let upstreams = legacy_upstreams(&vars, key);
                if !upstreams.is_empty() {
                    tracing::debug!(route = %key, count = upstreams.len(), "route from legacy env");
                    self.routes.push(RouteConfig { chain, network, upstreams });
                }
            }
        }

        self
    }

    /// Returns the parsed socket address for the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address cannot be parsed.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
            .parse()
            .map_err(|_| {
                format!(
                    "Invalid socket address: {}:{}",
                    self.server.bind_address, self.server.bind_port
                )
            })
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string for the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.routes.is_empty() {
            return Err("No routes configured".to_string());
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            let key = route.key();
            if !seen.insert(key) {
                return Err(format!("Duplicate route: {key}"));
            }
            if route.upstreams.is_empty() {
                return Err(format!("No upstreams configured for route {key}"));
            }

            let mut names = HashSet::new();
            for upstream in &route.upstreams {
                if !names.insert(upstream.name()) {
                    return Err(format!(
                        "Duplicate upstream name {} in route {key}",
                        upstream.name()
                    ));
                }
                validate_upstream(upstream).map_err(|e| format!("Route {key}: {e}"))?;
            }
        }

        self.cache.validate().map_err(|e| e.to_string())?;

        if self.server.max_concurrent_requests == 0 {
            return Err("Max concurrent requests must be greater than 0".to_string());
        }

        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }

        if self.http_client.concurrent_limit == 0 {
            return Err("HTTP client concurrency limit must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn validate_upstream(upstream: &UpstreamConfig) -> Result<(), String> {
    match upstream {
        UpstreamConfig::Node { name, host, .. } => {
            if !is_http_url(host) {
                return Err(format!("Invalid URL for upstream {name}"));
            }
        }
        UpstreamConfig::Tagged { name, base_url_template, tag_to_secret, default_tag, .. } => {
            if !is_http_url(base_url_template) {
                return Err(format!("Invalid URL template for upstream {name}"));
            }
            if !base_url_template.contains(SECRET_PLACEHOLDER) {
                return Err(format!(
                    "URL template for upstream {name} must contain {SECRET_PLACEHOLDER}"
                ));
            }
            if !tag_to_secret.contains_key(default_tag) {
                return Err(format!("Default tag {default_tag} of upstream {name} has no secret"));
            }
        }
    }
    Ok(())
}

fn legacy_upstreams(vars: &HashMap<String, String>, key: RouteKey) -> Vec<UpstreamConfig> {
    let prefix = format!("{}_{}", key.chain, key.network).to_uppercase();
    let kovan_prefix = (key.chain == Chain::Eth && key.network == Network::Testnet)
        .then(|| "ETH_KOVAN".to_string());

    let lookup = |suffix: &str| -> Option<String> {
        vars.get(&format!("{prefix}_{suffix}"))
            .or_else(|| kovan_prefix.as_ref().and_then(|p| vars.get(&format!("{p}_{suffix}"))))
            .filter(|value| !value.trim().is_empty())
            .cloned()
    };

    let urls: Vec<String> = match lookup("URLS").or_else(|| lookup("URL")) {
        Some(value) => value
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };

    let username = lookup("USER");
    let password = lookup("PASSWORD");
    let route_name = format!("{}-{}", key.chain, key.network);

    let mut upstreams: Vec<UpstreamConfig> = urls
        .into_iter()
        .enumerate()
        .map(|(i, host)| UpstreamConfig::Node {
            name: format!("{route_name}-{i}"),
            host,
            username: username.clone(),
            password: password.clone(),
            timeout_ms: None,
        })
        .collect();

    if key.chain == Chain::Eth {
        if let Some(template) = lookup("URL_TEMPLATE") {
            let tag_to_secret: BTreeMap<String, String> = vars
                .iter()
                .filter_map(|(name, secret)| {
                    name.strip_prefix("ETH_TAG_").map(|tag| (tag.to_lowercase(), secret.clone()))
                })
                .collect();
            let default_tag = vars
                .get("ETH_DEFAULT_TAG")
                .map_or_else(|| "default".to_string(), |tag| tag.to_lowercase());

            upstreams.push(UpstreamConfig::Tagged {
                name: format!("{route_name}-tagged"),
                base_url_template: template,
                tag_to_secret,
                default_tag,
                timeout_ms: None,
            });
        }
    }

    upstreams
}
