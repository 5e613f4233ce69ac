use bcy_signer::tx::{sign_digest, verify_digest, NonceMode};
use bcy_signer::wallet::{build_multisig, decode_address, derive_child, AddressKind, ExtendedPublicKey, KeyPair};
use bcy_signer::{Digest, NetworkParams};
use bitcoin::secp256k1::SecretKey;
use proptest::prelude::*;

const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x5d, 0x57, 0x6e,
    0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

const XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";

fn any_secret_key() -> impl Strategy<Value = SecretKey> {
    prop::array::uniform32(any::<u8>()).prop_filter_map("valid secp256k1 scalar", |bytes| {
        SecretKey::from_slice(&bytes).ok()
    })
}

fn keypair(secret: &SecretKey) -> KeyPair {
    KeyPair::from_secret_bytes(&secret.secret_bytes(), NetworkParams::BCY_TEST).expect("valid scalar")
}

proptest! {
    #[test]
    fn signatures_verify_and_are_low_s(secret in any_secret_key(), digest in prop::array::uniform32(any::<u8>())) {
        let key = keypair(&secret);
        let digest = Digest(digest);

        for mode in [NonceMode::Deterministic, NonceMode::Randomized] {
            let sig = sign_digest(&digest, &key, mode).expect("signing succeeds");
            prop_assert!(verify_digest(&sig, &digest, &key.public_key()));
            prop_assert!(sig.is_low_s());

            let compact = sig.as_ecdsa().serialize_compact();
            prop_assert!(&compact[32..] <= &HALF_ORDER[..]);
        }
    }

    #[test]
    fn reimported_keys_keep_public_key_and_address(secret in any_secret_key()) {
        let key = keypair(&secret);
        let via_wif = KeyPair::from_wif(&key.wif(), NetworkParams::BCY_TEST).expect("wif imports");
        prop_assert_eq!(via_wif.public_key(), key.public_key());
        prop_assert_eq!(via_wif.address(), key.address());

        let decoded = decode_address(&key.address(), &NetworkParams::BCY_TEST).expect("address decodes");
        prop_assert_eq!(decoded.kind, AddressKind::PubKeyHash);
    }

    #[test]
    fn multisig_address_depends_on_key_order(a in any_secret_key(), b in any_secret_key(), c in any_secret_key()) {
        let keys: Vec<_> = [a, b, c].iter().map(|s| keypair(s).public_key()).collect();
        prop_assume!(keys[0] != keys[2]);

        let first = build_multisig(&keys, 2, &NetworkParams::BCY_TEST).expect("valid policy");
        let again = build_multisig(&keys, 2, &NetworkParams::BCY_TEST).expect("valid policy");
        prop_assert_eq!(first.address(), again.address());

        let mut reordered = keys.clone();
        reordered.swap(0, 2);
        let swapped = build_multisig(&reordered, 2, &NetworkParams::BCY_TEST).expect("valid policy");
        prop_assert_ne!(first.address(), swapped.address());
    }

    #[test]
    fn hd_derivation_is_deterministic(index in 0u32..(1 << 31), change in any::<bool>()) {
        let parent = ExtendedPublicKey::parse(XPUB).expect("xpub parses");
        let a = derive_child(&parent, index, change, 0, &NetworkParams::BCY_TEST);
        let b = derive_child(&parent, index, change, 0, &NetworkParams::BCY_TEST);
        prop_assert_eq!(a.is_ok(), b.is_ok());
        if let (Ok(a), Ok(b)) = (a, b) {
            prop_assert_eq!(a, b);
        }
    }
}
