//! Transaction Signer
//!
//! ECDSA over secp256k1 for raw digests and transaction skeletons. Every
//! signature leaving this module is low-S and strict DER.

use bitcoin::secp256k1::{ecdsa, All, Message, Secp256k1};
use bitcoin::PublicKey;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{SignerError, SignerResult};
use crate::types::{Digest, NetworkParams};
use crate::wallet::{pays_to_public_key, KeyPair};
use crate::{log_debug, log_info};

use super::skeleton::{ExpectedSigner, SignatureEntry, TransactionSkeleton};

// =============================================================================
// Signatures
// =============================================================================

/// A canonical (low-S) ECDSA signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ecdsa::Signature);

impl Signature {
    /// Parse strict DER. High-S encodings are rejected as well.
    pub fn from_der(bytes: &[u8]) -> SignerResult<Self> {
        let inner = ecdsa::Signature::from_der(bytes)
            .map_err(|e| SignerError::invalid_signature(format!("not strict DER: {}", e)))?;
        let sig = Signature(inner);
        if !sig.is_low_s() {
            return Err(SignerError::invalid_signature("signature has a high S value"));
        }
        Ok(sig)
    }

    pub fn from_der_hex(hex_str: &str) -> SignerResult<Self> {
        let bytes = hex::decode(hex_str.trim())?;
        Self::from_der(&bytes)
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.0.serialize_der().to_vec()
    }

    pub fn to_der_hex(&self) -> String {
        hex::encode(self.to_der())
    }

    /// S lies in the lower half of the curve order
    pub fn is_low_s(&self) -> bool {
        let mut normalized = self.0;
        normalized.normalize_s();
        normalized == self.0
    }

    pub fn as_ecdsa(&self) -> &ecdsa::Signature {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_der_hex())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_der_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_der_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_der_hex(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Signer
// =============================================================================

/// How the per-signature nonce is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NonceMode {
    /// RFC6979
    #[default]
    Deterministic,
    /// RFC6979 with 32 bytes of OS entropy mixed in
    Randomized,
}

/// How supplied keys are paired with skeleton inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyAssignment {
    /// Match each input's expected address, public key or multisig keys
    #[default]
    ByExpectedSigner,
    /// Key `i` signs input `i`
    Positional,
}

pub struct Signer {
    secp: Secp256k1<All>,
    nonce: NonceMode,
}

impl Default for Signer {
    fn default() -> Self {
        Self::new(NonceMode::Deterministic)
    }
}

impl Signer {
    pub fn new(nonce: NonceMode) -> Self {
        Self {
            secp: Secp256k1::new(),
            nonce,
        }
    }

    pub fn nonce_mode(&self) -> NonceMode {
        self.nonce
    }

    pub fn sign_digest(&self, digest: &Digest, key: &KeyPair) -> SignerResult<Signature> {
        let msg = Message::from_digest(digest.0);
        let mut sig = match self.nonce {
            NonceMode::Deterministic => self.secp.sign_ecdsa(&msg, key.secret_key()),
            NonceMode::Randomized => {
                let mut extra = Zeroizing::new([0u8; 32]);
                OsRng
                    .try_fill_bytes(extra.as_mut())
                    .map_err(|e| SignerError::entropy(format!("random source unavailable: {}", e)))?;
                self.secp.sign_ecdsa_with_noncedata(&msg, key.secret_key(), &extra)
            }
        };
        sig.normalize_s();
        Ok(Signature(sig))
    }

    pub fn verify_digest(&self, signature: &Signature, digest: &Digest, public_key: &PublicKey) -> bool {
        let msg = Message::from_digest(digest.0);
        self.secp
            .verify_ecdsa(&msg, &signature.0, &public_key.inner)
            .is_ok()
    }

    /// Produce a signed copy of `skeleton`. Either every input gets its
    /// signatures or nothing is returned.
    pub fn sign_skeleton(
        &self,
        skeleton: &TransactionSkeleton,
        keys: &[KeyPair],
        assignment: KeyAssignment,
    ) -> SignerResult<TransactionSkeleton> {
        if skeleton.inputs.is_empty() {
            return Err(SignerError::invalid_input("skeleton has no inputs to sign"));
        }
        if assignment == KeyAssignment::Positional && keys.len() != skeleton.inputs.len() {
            return Err(SignerError::invalid_input(format!(
                "positional signing needs one key per input: {} keys for {} inputs",
                keys.len(),
                skeleton.inputs.len()
            )));
        }

        let mut signatures = Vec::with_capacity(skeleton.inputs.len());
        for (i, input) in skeleton.inputs.iter().enumerate() {
            input
                .signer
                .validate()
                .map_err(|e| e.with_details(format!("input {}", i)))?;
            let signers = match assignment {
                KeyAssignment::ByExpectedSigner => select_signers(i, &input.signer, keys)?,
                KeyAssignment::Positional => check_positional(i, &input.signer, &keys[i])?,
            };

            let mut entries = Vec::with_capacity(signers.len());
            for (key, public_key) in signers {
                entries.push(SignatureEntry {
                    signature: self.sign_digest(&input.digest, key)?,
                    public_key,
                });
            }
            log_debug!("signer", "Signed input", input = i, digest = input.digest, count = entries.len());
            signatures.push(entries);
        }

        log_info!("signer", "Signed skeleton", inputs = signatures.len());

        Ok(TransactionSkeleton {
            inputs: skeleton.inputs.clone(),
            outputs: skeleton.outputs.clone(),
            signatures,
        })
    }

    /// Check that every input is fully signed by its expected signer and
    /// every signature verifies against its input digest
    pub fn verify_skeleton(&self, skeleton: &TransactionSkeleton) -> SignerResult<()> {
        skeleton.ensure_submittable()?;
        for (i, (input, entries)) in skeleton.inputs.iter().zip(&skeleton.signatures).enumerate() {
            check_recorded_keys(i, &input.signer, entries)?;
            for entry in entries {
                if !self.verify_digest(&entry.signature, &input.digest, &entry.public_key) {
                    return Err(SignerError::invalid_signature(format!(
                        "signature on input {} does not verify",
                        i
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The encoding of `key` that `address` pays to
fn key_for_address(key: &KeyPair, address: &str) -> Option<PublicKey> {
    if key.address() == address {
        Some(key.public_key())
    } else if key.alternate_address() == address {
        Some(key.alternate_public_key())
    } else {
        None
    }
}

/// Keys that sign `expected`, each with the public key encoding the entry records
fn select_signers<'k>(
    input: usize,
    expected: &ExpectedSigner,
    keys: &'k [KeyPair],
) -> SignerResult<Vec<(&'k KeyPair, PublicKey)>> {
    match expected {
        ExpectedSigner::Address { address } => keys
            .iter()
            .find_map(|k| key_for_address(k, address).map(|pk| vec![(k, pk)]))
            .ok_or_else(|| SignerError::key_mismatch(format!("input {}: no supplied key controls {}", input, address))),
        ExpectedSigner::PublicKey { public_key } => keys
            .iter()
            .find(|k| k.matches_public_key(public_key))
            .map(|k| vec![(k, *public_key)])
            .ok_or_else(|| {
                SignerError::key_mismatch(format!(
                    "input {}: no supplied key matches {}",
                    input,
                    hex::encode(public_key.to_bytes())
                ))
            }),
        ExpectedSigner::Multisig { public_keys, threshold } => {
            // script order, one key per slot
            let matched: Vec<(&KeyPair, PublicKey)> = public_keys
                .iter()
                .filter_map(|pk| keys.iter().find(|k| k.matches_public_key(pk)).map(|k| (k, *pk)))
                .take(*threshold)
                .collect();

            if matched.is_empty() {
                Err(SignerError::key_mismatch(format!(
                    "input {}: no supplied key belongs to the multisig",
                    input
                )))
            } else if matched.len() < *threshold {
                Err(SignerError::partial_signature(format!(
                    "input {}: {} of {} required keys supplied",
                    input,
                    matched.len(),
                    threshold
                )))
            } else {
                Ok(matched)
            }
        }
    }
}

fn check_positional<'k>(
    input: usize,
    expected: &ExpectedSigner,
    key: &'k KeyPair,
) -> SignerResult<Vec<(&'k KeyPair, PublicKey)>> {
    let recorded = match expected {
        ExpectedSigner::Address { address } => key_for_address(key, address),
        ExpectedSigner::PublicKey { public_key } => key.matches_public_key(public_key).then_some(*public_key),
        ExpectedSigner::Multisig { public_keys, .. } => {
            public_keys.iter().find(|pk| key.matches_public_key(pk)).copied()
        }
    };
    let Some(public_key) = recorded else {
        return Err(SignerError::key_mismatch(format!(
            "input {}: key {} is not the expected signer",
            input,
            key.address()
        )));
    };
    if expected.required_signatures() > 1 {
        return Err(SignerError::partial_signature(format!(
            "input {}: positional signing supplies one key but {} are required",
            input,
            expected.required_signatures()
        )));
    }
    Ok(vec![(key, public_key)])
}

/// Every entry's key must be one the input expects, in the exact encoding
/// its address or script commits to. Multisig entries take distinct script
/// slots in script order.
fn check_recorded_keys(input: usize, expected: &ExpectedSigner, entries: &[SignatureEntry]) -> SignerResult<()> {
    let allowed = match expected {
        ExpectedSigner::Address { address } => entries.iter().all(|e| pays_to_public_key(address, &e.public_key)),
        ExpectedSigner::PublicKey { public_key } => entries.iter().all(|e| e.public_key == *public_key),
        ExpectedSigner::Multisig { public_keys, .. } => {
            let mut next = 0;
            entries.iter().all(|e| {
                match public_keys[next..].iter().position(|pk| *pk == e.public_key) {
                    Some(offset) => {
                        next += offset + 1;
                        true
                    }
                    None => false,
                }
            })
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(SignerError::key_mismatch(format!(
            "input {}: a signature comes from a key the input does not expect",
            input
        )))
    }
}

/// Sign with a default signer
pub fn sign_digest(digest: &Digest, key: &KeyPair, nonce: NonceMode) -> SignerResult<Signature> {
    Signer::new(nonce).sign_digest(digest, key)
}

pub fn verify_digest(signature: &Signature, digest: &Digest, public_key: &PublicKey) -> bool {
    Signer::default().verify_digest(signature, digest, public_key)
}

/// Sign a skeleton with caller-supplied private keys (hex or WIF). The
/// parsed keys are dropped, and their scalars erased, before returning.
pub fn sign_skeleton<S: AsRef<str>>(
    skeleton: &TransactionSkeleton,
    keys: &[S],
    network: &NetworkParams,
) -> SignerResult<TransactionSkeleton> {
    let pairs = keys
        .iter()
        .map(|k| KeyPair::parse(k.as_ref(), *network))
        .collect::<SignerResult<Vec<_>>>()?;
    Signer::default().sign_skeleton(skeleton, &pairs, KeyAssignment::ByExpectedSigner)
}
