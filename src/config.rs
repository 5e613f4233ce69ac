//! Client configuration
//!
//! An explicit value carrying the coin, chain and API token. Each operation
//! that needs network parameters receives them from here; nothing is held in
//! process-wide state.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

use crate::error::{ErrorCode, SignerError};
use crate::types::{Coin, NetworkParams};

pub const ENV_COIN: &str = "BCY_COIN";
pub const ENV_CHAIN: &str = "BCY_CHAIN";
pub const ENV_TOKEN: &str = "BCY_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown coin `{0}`")]
    UnknownCoin(String),
    #[error("coin `{coin}` has no chain `{chain}`")]
    UnknownChain { coin: String, chain: String },
    #[error("malformed config: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<ConfigError> for SignerError {
    fn from(e: ConfigError) -> Self {
        let code = match e {
            ConfigError::Malformed(_) => ErrorCode::ConfigError,
            _ => ErrorCode::UnsupportedNetwork,
        };
        SignerError::new(code, e.to_string())
    }
}

/// Shape accepted by [`ClientConfig::from_json`]
#[derive(Deserialize)]
struct RawConfig {
    coin: String,
    chain: String,
    #[serde(default)]
    token: Option<String>,
}

/// Connection parameters shared by one owned client
pub struct ClientConfig {
    network: NetworkParams,
    token: Option<SecretString>,
}

impl ClientConfig {
    pub fn new(coin: &str, chain: &str) -> Result<Self, ConfigError> {
        let coin_parsed: Coin = coin
            .parse()
            .map_err(|_| ConfigError::UnknownCoin(coin.to_string()))?;
        let network = NetworkParams::lookup(coin_parsed, chain).map_err(|_| ConfigError::UnknownChain {
            coin: coin.to_string(),
            chain: chain.to_string(),
        })?;
        Ok(Self { network, token: None })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Read `BCY_COIN`, `BCY_CHAIN` and `BCY_TOKEN`. The coin defaults to
    /// `bcy` and the chain to the coin's default chain.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(None, None)
    }

    /// Explicit values win over the environment. A missing chain falls back
    /// to `BCY_CHAIN` only when the coin equals `BCY_COIN`, otherwise to the
    /// coin's default chain.
    pub fn resolve(coin: Option<&str>, chain: Option<&str>) -> Result<Self, ConfigError> {
        Self::resolve_with(coin, chain, |key| std::env::var(key).ok())
    }

    fn resolve_with(
        coin: Option<&str>,
        chain: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env_coin = env(ENV_COIN).filter(|c| !c.is_empty());
        let coin = match (coin, &env_coin) {
            (Some(coin), _) => coin.to_string(),
            (None, Some(coin)) => coin.clone(),
            (None, None) => Coin::Bcy.as_str().to_string(),
        };
        let parsed: Coin = coin.parse().map_err(|_| ConfigError::UnknownCoin(coin.clone()))?;

        let coin_from_env = env_coin.as_deref() == Some(coin.as_str());
        let chain = match chain {
            Some(chain) => chain.to_string(),
            None if !coin_from_env => parsed.default_chain().to_string(),
            None => env(ENV_CHAIN)
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| parsed.default_chain().to_string()),
        };

        let config = Self::new(&coin, &chain)?;
        Ok(match env(ENV_TOKEN) {
            Some(token) if !token.is_empty() => config.with_token(token),
            _ => config,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        let config = Self::new(&raw.coin, &raw.chain)?;
        Ok(match raw.token {
            Some(token) => config.with_token(token),
            None => config,
        })
    }

    pub fn network(&self) -> NetworkParams {
        self.network
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Token for the transport layer; never log the returned value
    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose_secret())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: NetworkParams::BCY_TEST,
            token: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("network", &self.network.to_string())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
