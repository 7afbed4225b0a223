use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use thiserror::Error;

/// Errors produced when a `/<chain>/<network>` path does not name a known route.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("unknown network for {chain}: {network}")]
    UnknownNetwork { chain: Chain, network: String },

    #[error("no upstreams configured for /{0}/{1}")]
    NotConfigured(Chain, Network),
}

/// Blockchain family served by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Btc,
    Bch,
    Zec,
    Eth,
}

impl Chain {
    pub const ALL: [Self; 4] = [Self::Btc, Self::Bch, Self::Zec, Self::Eth];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Btc => "btc",
            Self::Bch => "bch",
            Self::Zec => "zec",
            Self::Eth => "eth",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "btc" => Ok(Self::Btc),
            "bch" => Ok(Self::Bch),
            "zec" => Ok(Self::Zec),
            "eth" => Ok(Self::Eth),
            other => Err(RouteError::UnknownChain(other.to_string())),
        }
    }
}

/// Network within a chain family.
///
/// Ethereum's `kovan` is accepted as an alias of `testnet` when parsing a route path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[serde(alias = "kovan")]
    Testnet,
    Localnet,
}

impl Network {
    pub const ALL: [Self; 3] = [Self::Mainnet, Self::Testnet, Self::Localnet];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Localnet => "localnet",
        }
    }

    /// Parses a network path segment in the context of `chain`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownNetwork`] for anything other than the three network names,
    /// or `kovan` on a non-Ethereum chain.
    pub fn parse_for(chain: Chain, segment: &str) -> Result<Self, RouteError> {
        match (chain, segment) {
            (_, "mainnet") => Ok(Self::Mainnet),
            (_, "testnet") | (Chain::Eth, "kovan") => Ok(Self::Testnet),
            (_, "localnet") => Ok(Self::Localnet),
            (chain, other) => {
                Err(RouteError::UnknownNetwork { chain, network: other.to_string() })
            }
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one `POST /<chain>/<network>` route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub chain: Chain,
    pub network: Network,
}

impl RouteKey {
    #[must_use]
    pub fn new(chain: Chain, network: Network) -> Self {
        Self { chain, network }
    }

    /// Parses the two path segments of a route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if either segment is not recognized.
    pub fn parse(chain: &str, network: &str) -> Result<Self, RouteError> {
        let chain = chain.parse::<Chain>()?;
        let network = Network::parse_for(chain, network)?;
        Ok(Self { chain, network })
    }

    /// Store namespace for this route.
    ///
    /// Networks of the same chain get distinct namespaces so a `getblockcount` on testnet never
    /// answers the same body sent to mainnet.
    #[must_use]
    pub fn namespace(&self) -> Arc<str> {
        Arc::from(format!("{}-{}", self.chain, self.network))
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.chain, self.network)
    }
}

/// Per-request metadata that upstream clients may use to shape the outgoing call.
///
/// Deserialized from the query string of the incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Selects the secret for tagged upstreams (e.g. a hosted Ethereum API key).
    #[serde(default)]
    pub tag: Option<String>,
}

impl RequestMeta {
    #[must_use]
    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self { tag: Some(tag.into()) }
    }
}
