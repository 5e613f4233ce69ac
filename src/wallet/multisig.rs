//! Multisig Redeem Scripts
//!
//! Builds `OP_M <pk1> ... <pkN> OP_N OP_CHECKMULTISIG` redeem scripts and
//! their pay-to-script-hash addresses. Key order is part of the script and
//! therefore of the address: keys are never sorted or deduplicated.

use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::OP_CHECKMULTISIG;
use bitcoin::script::Builder;
use bitcoin::{PublicKey, ScriptBuf, ScriptHash};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{SignerError, SignerResult};
use crate::log_debug;
use crate::types::{pubkey_hex, NetworkParams};

use super::address::{encode_address, parse_public_key};

/// Largest N expressible with a single `OP_N` opcode
pub const MAX_MULTISIG_KEYS: usize = 16;

/// P2SH redeem scripts are pushed as one stack element
pub const MAX_REDEEM_SCRIPT_SIZE: usize = 520;

/// Parsed `multisig-M-of-N` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptType {
    pub required: usize,
    pub total: usize,
}

impl FromStr for ScriptType {
    type Err = SignerError;

    fn from_str(s: &str) -> SignerResult<Self> {
        let bad = || SignerError::invalid_input(format!("script type `{}` is not multisig-M-of-N", s));
        let rest = s.trim().strip_prefix("multisig-").ok_or_else(bad)?;
        let (m, n) = rest.split_once("-of-").ok_or_else(bad)?;
        Ok(ScriptType {
            required: m.parse().map_err(|_| bad())?,
            total: n.parse().map_err(|_| bad())?,
        })
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "multisig-{}-of-{}", self.required, self.total)
    }
}

impl Serialize for ScriptType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn script_hex<S: Serializer>(script: &ScriptBuf, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(script.as_bytes()))
}

/// An M-of-N multisig policy with its derived script and address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultisigDescriptor {
    #[serde(rename = "pubkeys", with = "pubkey_hex::vec")]
    public_keys: Vec<PublicKey>,
    threshold: usize,
    script_type: ScriptType,
    #[serde(serialize_with = "script_hex")]
    redeem_script: ScriptBuf,
    address: String,
}

impl MultisigDescriptor {
    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn script_type(&self) -> ScriptType {
        self.script_type
    }

    pub fn redeem_script(&self) -> &ScriptBuf {
        &self.redeem_script
    }

    pub fn redeem_script_hex(&self) -> String {
        hex::encode(self.redeem_script.as_bytes())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// `OP_HASH160 <script hash> OP_EQUAL`
    pub fn script_pubkey(&self) -> ScriptBuf {
        ScriptBuf::new_p2sh(&ScriptHash::hash(self.redeem_script.as_bytes()))
    }

    /// Position of `pk` in the script's key list
    pub fn position_of(&self, pk: &PublicKey) -> Option<usize> {
        self.public_keys.iter().position(|k| k.inner == pk.inner)
    }
}

/// Build the redeem script and P2SH address for `threshold`-of-`public_keys.len()`
pub fn build_multisig(
    public_keys: &[PublicKey],
    threshold: usize,
    network: &NetworkParams,
) -> SignerResult<MultisigDescriptor> {
    let total = public_keys.len();
    if threshold == 0 || threshold > total {
        return Err(SignerError::invalid_threshold(threshold, total));
    }
    if total > MAX_MULTISIG_KEYS {
        return Err(SignerError::invalid_input(format!(
            "at most {} public keys are allowed, got {}",
            MAX_MULTISIG_KEYS, total
        )));
    }

    let mut builder = Builder::new().push_int(threshold as i64);
    for pk in public_keys {
        builder = builder.push_key(pk);
    }
    let redeem_script = builder
        .push_int(total as i64)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script();

    if redeem_script.len() > MAX_REDEEM_SCRIPT_SIZE {
        return Err(SignerError::invalid_input(format!(
            "redeem script is {} bytes, limit is {}",
            redeem_script.len(),
            MAX_REDEEM_SCRIPT_SIZE
        )));
    }

    let script_hash = ScriptHash::hash(redeem_script.as_bytes());
    let address = encode_address(network.p2sh_version, &script_hash.to_byte_array());

    log_debug!(
        "multisig",
        "Built redeem script",
        address = address,
        script_type = format!("multisig-{}-of-{}", threshold, total),
    );

    Ok(MultisigDescriptor {
        public_keys: public_keys.to_vec(),
        threshold,
        script_type: ScriptType { required: threshold, total },
        redeem_script,
        address,
    })
}

/// Hex keys plus a `multisig-M-of-N` tag, as accepted by the remote API's
/// multisig address endpoint
pub fn gen_addr_multisig<S: AsRef<str>>(
    public_keys_hex: &[S],
    script_type: &str,
    network: &NetworkParams,
) -> SignerResult<MultisigDescriptor> {
    let script_type: ScriptType = script_type.parse()?;
    if script_type.total != public_keys_hex.len() {
        return Err(SignerError::invalid_input(format!(
            "{} names {} keys but {} were supplied",
            script_type,
            script_type.total,
            public_keys_hex.len()
        )));
    }

    let keys = public_keys_hex
        .iter()
        .map(|k| parse_public_key(k.as_ref()))
        .collect::<SignerResult<Vec<_>>>()?;
    build_multisig(&keys, script_type.required, network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const KEYS: [&str; 3] = [
        "02c716d071a76cbf0d29c29cacfec76e0ef8116b37389fb7a3e76d6d32cf59f4d3",
        "033ef4d5165637d99b673bcdbb7ead359cee6afd7aaf78d3da9d2392ee4102c8ea",
        "022b8934cc41e76cb4286b9f3ed57e2d27798395b04dd23711981a77dc216df8ca",
    ];

    fn keys() -> Vec<PublicKey> {
        KEYS.iter().map(|k| parse_public_key(k).unwrap()).collect()
    }

    #[test]
    fn test_known_bcy_address() {
        let desc = build_multisig(&keys(), 2, &NetworkParams::BCY_TEST).unwrap();
        assert_eq!(desc.address(), "De2gwq9GvNgvKgHCYRMKnPqss3pzWGSHiH");
        assert_eq!(desc.script_type().to_string(), "multisig-2-of-3");
    }

    #[test]
    fn test_redeem_script_layout() {
        let desc = build_multisig(&keys(), 2, &NetworkParams::BCY_TEST).unwrap();
        let hex = desc.redeem_script_hex();
        // OP_2 <33-byte push> x3 OP_3 OP_CHECKMULTISIG
        let expected = format!("5221{}21{}21{}53ae", KEYS[0], KEYS[1], KEYS[2]);
        assert_eq!(hex, expected);
        assert_eq!(desc.redeem_script().len(), 1 + 3 * 34 + 2);
    }

    #[test]
    fn test_order_changes_address() {
        let mut reordered = keys();
        reordered.swap(0, 2);
        let a = build_multisig(&keys(), 2, &NetworkParams::BCY_TEST).unwrap();
        let b = build_multisig(&reordered, 2, &NetworkParams::BCY_TEST).unwrap();
        assert_ne!(a.address(), b.address());
        assert_eq!(b.public_keys()[0], keys()[2]);
    }

    #[test]
    fn test_threshold_bounds() {
        let zero = build_multisig(&keys(), 0, &NetworkParams::BCY_TEST).unwrap_err();
        assert_eq!(zero.code, ErrorCode::InvalidThreshold);
        let over = build_multisig(&keys(), 4, &NetworkParams::BCY_TEST).unwrap_err();
        assert_eq!(over.code, ErrorCode::InvalidThreshold);
        let empty = build_multisig(&[], 1, &NetworkParams::BCY_TEST).unwrap_err();
        assert_eq!(empty.code, ErrorCode::InvalidThreshold);
    }

    #[test]
    fn test_size_limits() {
        let many: Vec<PublicKey> = (0..17).map(|i| keys()[i % 3]).collect();
        let err = build_multisig(&many, 1, &NetworkParams::BCY_TEST).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        // 16 compressed keys overflow the 520-byte push
        let err = build_multisig(&many[..16], 1, &NetworkParams::BCY_TEST).unwrap_err();
        assert!(err.message.contains("limit is 520"));

        // 15 fit
        assert!(build_multisig(&many[..15], 1, &NetworkParams::BCY_TEST).is_ok());
    }

    #[test]
    fn test_duplicates_preserved() {
        let dup = vec![keys()[0], keys()[0], keys()[1]];
        let desc = build_multisig(&dup, 2, &NetworkParams::BCY_TEST).unwrap();
        assert_eq!(desc.public_keys().len(), 3);
    }

    #[test]
    fn test_gen_addr_multisig() {
        let desc = gen_addr_multisig(&KEYS, "multisig-2-of-3", &NetworkParams::BCY_TEST).unwrap();
        assert_eq!(desc.address(), "De2gwq9GvNgvKgHCYRMKnPqss3pzWGSHiH");

        let err = gen_addr_multisig(&KEYS, "multisig-2-of-4", &NetworkParams::BCY_TEST).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!("multisig-2".parse::<ScriptType>().is_err());
        assert!("p2pkh".parse::<ScriptType>().is_err());
    }

    #[test]
    fn test_script_pubkey() {
        let desc = build_multisig(&keys(), 2, &NetworkParams::BCY_TEST).unwrap();
        let spk = desc.script_pubkey();
        assert!(spk.is_p2sh());
        assert_eq!(spk.len(), 23);
    }

    #[test]
    fn test_serializes_hex_fields() {
        let desc = build_multisig(&keys(), 2, &NetworkParams::BCY_TEST).unwrap();
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["address"], "De2gwq9GvNgvKgHCYRMKnPqss3pzWGSHiH");
        assert_eq!(json["script_type"], "multisig-2-of-3");
        assert_eq!(json["pubkeys"][1], KEYS[1]);
    }
}
