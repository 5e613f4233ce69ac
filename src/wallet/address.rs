//! Base58Check address encoding
//!
//! Addresses are `Base58Check(version || HASH160(payload))` where the payload
//! is a serialized public key (P2PKH) or a redeem script (P2SH).

use bitcoin::base58;
use bitcoin::hashes::{Hash, hash160};
use bitcoin::PublicKey;

use crate::error::{SignerError, SignerResult};
use crate::types::NetworkParams;

/// Which hash an address commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    PubKeyHash,
    ScriptHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub kind: AddressKind,
    pub hash: [u8; 20],
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

/// Encode a 20-byte hash under a version byte
pub fn encode_address(version: u8, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(hash);
    base58::encode_check(&payload)
}

/// Pay-to-pubkey-hash address; the key's own encoding (compressed or not)
/// is what gets hashed.
pub fn p2pkh_address(public_key: &PublicKey, network: &NetworkParams) -> String {
    encode_address(network.p2pkh_version, &hash160(&public_key.to_bytes()))
}

/// Address the remote API reports for a raw public key
pub fn address_for_public_key(public_key_hex: &str, network: &NetworkParams) -> SignerResult<String> {
    let pk = parse_public_key(public_key_hex)?;
    Ok(p2pkh_address(&pk, network))
}

/// Pay-to-script-hash address of a serialized redeem script
pub fn p2sh_address(redeem_script: &[u8], network: &NetworkParams) -> String {
    encode_address(network.p2sh_version, &hash160(redeem_script))
}

/// Decode and classify an address for the given network
pub fn decode_address(address: &str, network: &NetworkParams) -> SignerResult<DecodedAddress> {
    let data = base58::decode_check(address.trim())?;
    if data.len() != 21 {
        return Err(SignerError::invalid_address(format!(
            "address payload must be 21 bytes, got {}",
            data.len()
        )));
    }

    let kind = if data[0] == network.p2pkh_version {
        AddressKind::PubKeyHash
    } else if data[0] == network.p2sh_version {
        AddressKind::ScriptHash
    } else {
        return Err(SignerError::invalid_address(format!(
            "version byte 0x{:02x} does not belong to {}",
            data[0], network
        )));
    };

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&data[1..]);
    Ok(DecodedAddress { kind, hash })
}

/// The address commits to exactly this encoding of the key. The version
/// byte is not checked.
pub fn pays_to_public_key(address: &str, public_key: &PublicKey) -> bool {
    match base58::decode_check(address.trim()) {
        Ok(data) if data.len() == 21 => data[1..] == hash160(&public_key.to_bytes())[..],
        _ => false,
    }
}

pub fn is_valid_address(address: &str, network: &NetworkParams) -> bool {
    decode_address(address, network).is_ok()
}

/// Parse a hex-encoded SEC1 public key (33 or 65 bytes)
pub fn parse_public_key(hex_str: &str) -> SignerResult<PublicKey> {
    let bytes = hex::decode(hex_str.trim())
        .map_err(|e| SignerError::invalid_public_key(format!("public key is not hex: {}", e)))?;
    PublicKey::from_slice(&bytes)
        .map_err(|e| SignerError::invalid_public_key(format!("invalid public key: {}", e)))
}
