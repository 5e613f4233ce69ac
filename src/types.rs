//! Shared types
//!
//! Network parameters and the hex-friendly byte wrappers that cross module
//! boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{SignerError, SignerResult};

// =============================================================================
// Network Types
// =============================================================================

/// Coins served by the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coin {
    Btc,
    Ltc,
    Doge,
    Dash,
    Bcy,
}

impl Coin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Coin::Btc => "btc",
            Coin::Ltc => "ltc",
            Coin::Doge => "doge",
            Coin::Dash => "dash",
            Coin::Bcy => "bcy",
        }
    }

    /// Chain used when only the coin is given
    pub fn default_chain(&self) -> &'static str {
        match self {
            Coin::Bcy => "test",
            _ => "main",
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Coin {
    type Err = SignerError;

    fn from_str(s: &str) -> SignerResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btc" => Ok(Coin::Btc),
            "ltc" => Ok(Coin::Ltc),
            "doge" => Ok(Coin::Doge),
            "dash" => Ok(Coin::Dash),
            "bcy" => Ok(Coin::Bcy),
            other => Err(SignerError::unsupported_network(other, "*")),
        }
    }
}

/// Version bytes for one `coin/chain` pair.
///
/// Address and WIF encodings are consensus-visible, so these values must
/// match the target chain exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkParams {
    pub coin: Coin,
    pub chain: &'static str,
    pub p2pkh_version: u8,
    pub p2sh_version: u8,
    pub wif_version: u8,
}

impl NetworkParams {
    pub const BTC_MAIN: NetworkParams = NetworkParams {
        coin: Coin::Btc,
        chain: "main",
        p2pkh_version: 0x00,
        p2sh_version: 0x05,
        wif_version: 0x80,
    };

    pub const BTC_TEST3: NetworkParams = NetworkParams {
        coin: Coin::Btc,
        chain: "test3",
        p2pkh_version: 0x6f,
        p2sh_version: 0xc4,
        wif_version: 0xef,
    };

    pub const LTC_MAIN: NetworkParams = NetworkParams {
        coin: Coin::Ltc,
        chain: "main",
        p2pkh_version: 0x30,
        p2sh_version: 0x32,
        wif_version: 0xb0,
    };

    pub const DOGE_MAIN: NetworkParams = NetworkParams {
        coin: Coin::Doge,
        chain: "main",
        p2pkh_version: 0x1e,
        p2sh_version: 0x16,
        wif_version: 0x9e,
    };

    pub const DASH_MAIN: NetworkParams = NetworkParams {
        coin: Coin::Dash,
        chain: "main",
        p2pkh_version: 0x4c,
        p2sh_version: 0x10,
        wif_version: 0xcc,
    };

    /// The API provider's own test chain
    pub const BCY_TEST: NetworkParams = NetworkParams {
        coin: Coin::Bcy,
        chain: "test",
        p2pkh_version: 0x1b,
        p2sh_version: 0x1f,
        wif_version: 0x49,
    };

    pub const ALL: [NetworkParams; 6] = [
        Self::BTC_MAIN,
        Self::BTC_TEST3,
        Self::LTC_MAIN,
        Self::DOGE_MAIN,
        Self::DASH_MAIN,
        Self::BCY_TEST,
    ];

    /// Resolve the parameters for a `coin/chain` pair
    pub fn lookup(coin: Coin, chain: &str) -> SignerResult<Self> {
        let chain = chain.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.coin == coin && p.chain == chain)
            .ok_or_else(|| SignerError::unsupported_network(coin.as_str(), &chain))
    }

    pub fn is_testnet(&self) -> bool {
        self.chain != "main"
    }
}

impl fmt::Display for NetworkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.coin, self.chain)
    }
}

// =============================================================================
// Digests
// =============================================================================

/// A 32-byte digest-to-sign as presented by the remote service
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub fn from_hex(s: &str) -> SignerResult<Self> {
        let bytes = hex::decode(s.trim())?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> SignerResult<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            SignerError::invalid_input(format!("digest must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Digest(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for SEC1 public keys as hex strings
pub(crate) mod pubkey_hex {
    use bitcoin::PublicKey;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(pk: &PublicKey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(pk.to_bytes()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PublicKey, D::Error> {
        let s = String::deserialize(deserializer)?;
        crate::wallet::parse_public_key(&s).map_err(serde::de::Error::custom)
    }

    pub mod vec {
        use bitcoin::PublicKey;
        use serde::{Deserialize, Deserializer, Serializer, ser::SerializeSeq};

        pub fn serialize<S: Serializer>(keys: &[PublicKey], serializer: S) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(keys.len()))?;
            for pk in keys {
                seq.serialize_element(&hex::encode(pk.to_bytes()))?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<PublicKey>, D::Error> {
            let raw = Vec::<String>::deserialize(deserializer)?;
            raw.iter()
                .map(|s| crate::wallet::parse_public_key(s).map_err(serde::de::Error::custom))
                .collect()
        }
    }
}
