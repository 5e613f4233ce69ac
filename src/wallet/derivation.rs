//! Public-only HD Derivation
//!
//! Derives child public keys and addresses from a BIP32 extended public key.
//! Only normal (non-hardened) steps are possible without the private key.
//!
//! Path layout below the extended key, selected by `custom_depth`:
//! - `0`: `chain/index`, with `chain` = 1 for change addresses, 0 otherwise
//! - `1`: `index` only; change is rejected since there is no chain level
//! - `d >= 2`: `d - 2` zero steps, then `chain/index`

use bitcoin::bip32::{ChildNumber, Xpub};
use bitcoin::secp256k1::{Secp256k1, Verification};
use bitcoin::PublicKey;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{SignerError, SignerResult};
use crate::log_debug;
use crate::types::{pubkey_hex, NetworkParams};

use super::address::p2pkh_address;

/// A parsed extended public key. Immutable once parsed.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedPublicKey {
    inner: Xpub,
}

impl ExtendedPublicKey {
    pub fn parse(encoded: &str) -> SignerResult<Self> {
        let inner = Xpub::from_str(encoded.trim())?;
        Ok(Self { inner })
    }

    pub fn depth(&self) -> u8 {
        self.inner.depth
    }

    pub fn chain_code(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.inner.chain_code[..]);
        out
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.inner.parent_fingerprint[..]);
        out
    }

    pub fn child_index(&self) -> u32 {
        u32::from(self.inner.child_number)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(self.inner.public_key)
    }

    pub fn as_xpub(&self) -> &Xpub {
        &self.inner
    }
}

impl FromStr for ExtendedPublicKey {
    type Err = SignerError;

    fn from_str(s: &str) -> SignerResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ExtendedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for ExtendedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtendedPublicKey({})", self.inner)
    }
}

/// Result of deriving one child. Carries no private material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedChild {
    pub index: u32,
    pub is_change: bool,
    /// Path relative to the parent extended key, e.g. `0/5`
    pub path: String,
    pub address: String,
    #[serde(rename = "public", with = "pubkey_hex")]
    pub public_key: PublicKey,
    pub extended_key: String,
}

/// Normal child indices along the derivation path
pub fn derivation_steps(index: u32, is_change: bool, custom_depth: u32) -> SignerResult<Vec<u32>> {
    if index >= 1 << 31 {
        return Err(SignerError::invalid_input(format!(
            "index {} is hardened; hardened derivation needs the private key",
            index
        )));
    }

    if custom_depth > u32::from(u8::MAX) {
        return Err(SignerError::invalid_input(format!("custom depth {} exceeds 255", custom_depth)));
    }

    let chain = u32::from(is_change);
    match custom_depth {
        0 => Ok(vec![chain, index]),
        1 if is_change => Err(SignerError::invalid_input(
            "a depth-1 path has no chain level to mark as change",
        )),
        1 => Ok(vec![index]),
        d => {
            let mut steps = vec![0; (d - 2) as usize];
            steps.push(chain);
            steps.push(index);
            Ok(steps)
        }
    }
}

fn derive_with<C: Verification>(
    secp: &Secp256k1<C>,
    parent: &ExtendedPublicKey,
    index: u32,
    is_change: bool,
    custom_depth: u32,
    network: &NetworkParams,
) -> SignerResult<DerivedChild> {
    let steps = derivation_steps(index, is_change, custom_depth)?;
    if usize::from(parent.depth()) + steps.len() > usize::from(u8::MAX) {
        return Err(SignerError::invalid_input("derived depth would exceed 255"));
    }

    let mut current = parent.inner;
    for &step in &steps {
        let child_number = ChildNumber::from_normal_idx(step)?;
        current = match current.ckd_pub(secp, child_number) {
            Ok(child) => child,
            Err(bitcoin::bip32::Error::Secp256k1(_)) => return Err(SignerError::invalid_child(step)),
            Err(e) => return Err(e.into()),
        };
    }

    let public_key = PublicKey::new(current.public_key);
    let path = steps.iter().map(u32::to_string).collect::<Vec<_>>().join("/");
    let address = p2pkh_address(&public_key, network);

    log_debug!("hd", "Derived child", path = path, address = address);

    Ok(DerivedChild {
        index,
        is_change,
        path,
        address,
        public_key,
        extended_key: current.to_string(),
    })
}

/// Derive one child public key and its address
pub fn derive_child(
    parent: &ExtendedPublicKey,
    index: u32,
    is_change: bool,
    custom_depth: u32,
    network: &NetworkParams,
) -> SignerResult<DerivedChild> {
    let secp = Secp256k1::verification_only();
    derive_with(&secp, parent, index, is_change, custom_depth, network)
}

/// Derive indices `0..count`. Stops at the first invalid child; the caller
/// decides how to continue.
pub fn derive_range(
    parent: &ExtendedPublicKey,
    count: u32,
    is_change: bool,
    custom_depth: u32,
    network: &NetworkParams,
) -> SignerResult<Vec<DerivedChild>> {
    let secp = Secp256k1::verification_only();
    (0..count)
        .map(|i| derive_with(&secp, parent, i, is_change, custom_depth, network))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    // extended key used by the SDK's HD wallet test
    const SDK_XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";
    // BIP32 test vector 2, master and m/0
    const V2_MASTER: &str = "xpub661MyMwAqRbcFW31YEwpkMuc5THy2PSt5bDMsktWQcFF8syAmRUapSCGu8ED9W6oDMSgv6Zz8idoc4a6mr8BDzTJY47LJhkJ8UB7WEGuduB";
    const V2_CHILD_0: &str = "xpub69H7F5d8KSRgmmdJg2KhpAK8SR3DjMwAdkxj3ZuxV27CprR9LgpeyGmXUbC6wb7ERfvrnKZjXoUmmDznezpbZb7ap6r1D3tgFxHmwMkQTPH";

    #[test]
    fn test_parse_fields() {
        let xpub = ExtendedPublicKey::parse(SDK_XPUB).unwrap();
        assert_eq!(xpub.depth(), 0);
        assert_eq!(xpub.child_index(), 0);
        assert_eq!(xpub.parent_fingerprint(), [0u8; 4]);
        assert_eq!(
            hex::encode(xpub.public_key().to_bytes()),
            "0339a36013301597daef41fbe593a02cc513d0b55527ec2df1050e2e8ff49c85c2"
        );
        assert_eq!(
            hex::encode(xpub.chain_code()),
            "873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508"
        );
        assert_eq!(xpub.to_string(), SDK_XPUB);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = ExtendedPublicKey::parse("xpub-not-a-key").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidExtendedKey);
    }

    #[test]
    fn test_bip32_vector_single_step() {
        let master = ExtendedPublicKey::parse(V2_MASTER).unwrap();
        let child = derive_child(&master, 0, false, 1, &NetworkParams::BTC_MAIN).unwrap();
        assert_eq!(child.extended_key, V2_CHILD_0);
        assert_eq!(child.path, "0");
    }

    #[test]
    fn test_default_path_addresses() {
        let xpub = ExtendedPublicKey::parse(SDK_XPUB).unwrap();

        let receive = derive_child(&xpub, 1, false, 0, &NetworkParams::BCY_TEST).unwrap();
        assert_eq!(receive.path, "0/1");
        assert_eq!(
            hex::encode(receive.public_key.to_bytes()),
            "02e740d213a1aa5746c66bae1ecda3b95d7f64d4bf8aff9d93702fc302f28df0f1"
        );
        assert_eq!(receive.address, "BuXLV5AAVmUtVtasLMzxSBeqQVBfw4DtqD");

        let change = derive_child(&xpub, 1, true, 0, &NetworkParams::BCY_TEST).unwrap();
        assert_eq!(change.path, "1/1");
        assert_eq!(change.address, "BzNuTaSuGriEch6wLYrtDUNP2aYVSHHph8");
    }

    #[test]
    fn test_deterministic() {
        let xpub = ExtendedPublicKey::parse(SDK_XPUB).unwrap();
        let a = derive_child(&xpub, 7, false, 0, &NetworkParams::BCY_TEST).unwrap();
        let b = derive_child(&xpub, 7, false, 0, &NetworkParams::BCY_TEST).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_custom_depth_paths() {
        assert_eq!(derivation_steps(3, false, 0).unwrap(), vec![0, 3]);
        assert_eq!(derivation_steps(3, false, 1).unwrap(), vec![3]);
        assert_eq!(derivation_steps(3, true, 2).unwrap(), vec![1, 3]);
        assert_eq!(derivation_steps(3, true, 4).unwrap(), vec![0, 0, 1, 3]);
        assert!(derivation_steps(3, true, 1).is_err());
        assert!(derivation_steps(3, false, u32::MAX).is_err());
    }

    #[test]
    fn test_hardened_index_rejected() {
        let xpub = ExtendedPublicKey::parse(SDK_XPUB).unwrap();
        let err = derive_child(&xpub, 0x8000_0000, false, 0, &NetworkParams::BCY_TEST).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_derive_range() {
        let xpub = ExtendedPublicKey::parse(SDK_XPUB).unwrap();
        let children = derive_range(&xpub, 3, false, 0, &NetworkParams::BCY_TEST).unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].address, "BtKceF5RfiEmn7E4cScxCaqXCNmrBNrZ8f");
        assert_eq!(children[1].address, "BuXLV5AAVmUtVtasLMzxSBeqQVBfw4DtqD");
        assert_eq!(children[2].address, "CABd5WqWTEQhPTHwABaJUHkSSt9thVp4C1");
    }
}
