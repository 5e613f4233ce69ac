//! Key Generation
//!
//! Creates and imports secp256k1 keypairs and derives their addresses.
//!
//! SECURITY: the secret scalar is erased when the `KeyPair` is dropped, is
//! never printed by `Debug`, and only leaves the struct through
//! [`KeyPair::wif`] or [`KeyPair::export_keychain`].

use bitcoin::base58;
use bitcoin::secp256k1::{PublicKey as SecpPublicKey, Secp256k1, SecretKey};
use bitcoin::PublicKey;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::Serialize;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{SignerError, SignerResult};
use crate::types::NetworkParams;
use crate::{log_debug, log_info};

use super::address::p2pkh_address;

/// Draws that may all land outside `[1, n-1]` before we blame the RNG.
/// A healthy source fails a single draw with probability below 2^-127.
const MAX_SCALAR_DRAWS: usize = 8;

pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
    network: NetworkParams,
}

impl KeyPair {
    /// Generate a fresh keypair from the OS random source
    pub fn generate(network: NetworkParams) -> SignerResult<Self> {
        Self::generate_with(&mut OsRng, network)
    }

    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R, network: NetworkParams) -> SignerResult<Self> {
        let mut candidate = Zeroizing::new([0u8; 32]);
        for _ in 0..MAX_SCALAR_DRAWS {
            rng.try_fill_bytes(candidate.as_mut())
                .map_err(|e| SignerError::entropy(format!("random source unavailable: {}", e)))?;
            if let Ok(secret) = SecretKey::from_slice(candidate.as_ref()) {
                let pair = Self::from_secret(secret, network);
                log_info!("keygen", "Generated keypair", address = pair.address(), network = network);
                return Ok(pair);
            }
        }
        Err(SignerError::entropy("random source keeps producing out-of-range scalars"))
    }

    fn from_secret(secret: SecretKey, network: NetworkParams) -> Self {
        let secp = Secp256k1::signing_only();
        let inner = SecpPublicKey::from_secret_key(&secp, &secret);
        Self {
            secret,
            public: PublicKey::new(inner),
            network,
        }
    }

    pub fn from_secret_bytes(bytes: &[u8], network: NetworkParams) -> SignerResult<Self> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| SignerError::invalid_private_key(format!("invalid scalar: {}", e)))?;
        Ok(Self::from_secret(secret, network))
    }

    pub fn from_hex(hex_str: &str, network: NetworkParams) -> SignerResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(hex_str.trim())
                .map_err(|e| SignerError::invalid_private_key(format!("private key is not hex: {}", e)))?,
        );
        if bytes.len() != 32 {
            return Err(SignerError::invalid_private_key(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Self::from_secret_bytes(&bytes, network)
    }

    /// Import a WIF key; its version byte must belong to `network`
    pub fn from_wif(wif: &str, network: NetworkParams) -> SignerResult<Self> {
        let data = Zeroizing::new(
            base58::decode_check(wif.trim())
                .map_err(|e| SignerError::invalid_private_key(format!("invalid WIF: {}", e)))?,
        );

        let compressed = match data.len() {
            33 => false,
            34 if data[33] == 0x01 => true,
            n => {
                return Err(SignerError::invalid_private_key(format!(
                    "WIF payload has unexpected length {}",
                    n
                )))
            }
        };
        if data[0] != network.wif_version {
            return Err(SignerError::invalid_private_key(format!(
                "WIF version 0x{:02x} does not belong to {}",
                data[0], network
            )));
        }

        let pair = Self::from_secret_bytes(&data[1..33], network)?;
        Ok(if compressed { pair } else { pair.uncompressed() })
    }

    /// Accept either 64 hex characters or a WIF string
    pub fn parse(key: &str, network: NetworkParams) -> SignerResult<Self> {
        let trimmed = key.trim();
        if trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            Self::from_hex(trimmed, network)
        } else {
            Self::from_wif(trimmed, network)
        }
    }

    /// Switch to the 65-byte public key encoding
    pub fn uncompressed(mut self) -> Self {
        self.public = PublicKey::new_uncompressed(self.public.inner);
        self
    }

    pub fn is_compressed(&self) -> bool {
        self.public.compressed
    }

    pub fn network(&self) -> NetworkParams {
        self.network
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.to_bytes())
    }

    pub fn address(&self) -> String {
        p2pkh_address(&self.public, &self.network)
    }

    pub fn uncompressed_address(&self) -> String {
        p2pkh_address(&PublicKey::new_uncompressed(self.public.inner), &self.network)
    }

    /// Address of the other public key encoding
    pub fn alternate_address(&self) -> String {
        p2pkh_address(&self.alternate_public_key(), &self.network)
    }

    /// This key's point in the other encoding
    pub fn alternate_public_key(&self) -> PublicKey {
        if self.public.compressed {
            PublicKey::new_uncompressed(self.public.inner)
        } else {
            PublicKey::new(self.public.inner)
        }
    }

    /// True when `pk` is this key's point, in either encoding
    pub fn matches_public_key(&self, pk: &PublicKey) -> bool {
        self.public.inner == pk.inner
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// Scalar bytes in a buffer wiped on drop
    fn secret_scalar(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.secret_bytes())
    }

    /// Export as WIF. The caller owns the secret from here on.
    pub fn wif(&self) -> Zeroizing<String> {
        let mut data = Zeroizing::new(Vec::with_capacity(34));
        data.push(self.network.wif_version);
        data.extend_from_slice(&self.secret_scalar()[..]);
        if self.public.compressed {
            data.push(0x01);
        }
        Zeroizing::new(base58::encode_check(&data))
    }

    /// Full key material in the shape the remote API hands out for new
    /// addresses
    pub fn export_keychain(&self) -> AddrKeychain {
        log_debug!("keygen", "Exporting key material", address = self.address());
        AddrKeychain {
            address: self.address(),
            public: self.public_key_hex(),
            private: hex::encode(&self.secret_scalar()[..]),
            wif: self.wif().to_string(),
        }
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .field("public", &self.public_key_hex())
            .field("network", &self.network.to_string())
            .finish_non_exhaustive()
    }
}

/// Exported key material
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct AddrKeychain {
    pub address: String,
    pub public: String,
    pub private: String,
    pub wif: String,
}

impl fmt::Debug for AddrKeychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddrKeychain")
            .field("address", &self.address)
            .field("public", &self.public)
            .field("private", &"[REDACTED]")
            .field("wif", &"[REDACTED]")
            .finish()
    }
}
