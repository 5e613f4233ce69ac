//! Transaction Skeletons
//!
//! A skeleton is the partially built transaction the remote service hands
//! back: one digest per input plus who is expected to sign it. The local
//! side only fills `signatures`, aligned by input index.

use bitcoin::PublicKey;
use serde::{Deserialize, Serialize};

use crate::error::{SignerError, SignerResult};
use crate::types::{pubkey_hex, Digest};
use crate::wallet::{KeyPair, MAX_MULTISIG_KEYS};

use super::signer::{KeyAssignment, Signature, Signer};

/// Who must sign an input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpectedSigner {
    Address {
        address: String,
    },
    PublicKey {
        #[serde(with = "pubkey_hex")]
        public_key: PublicKey,
    },
    Multisig {
        #[serde(with = "pubkey_hex::vec")]
        public_keys: Vec<PublicKey>,
        threshold: usize,
    },
}

impl ExpectedSigner {
    /// Signatures needed before the input is complete
    pub fn required_signatures(&self) -> usize {
        match self {
            ExpectedSigner::Multisig { threshold, .. } => *threshold,
            _ => 1,
        }
    }

    /// Reject multisig descriptors no script could satisfy
    pub fn validate(&self) -> SignerResult<()> {
        if let ExpectedSigner::Multisig { public_keys, threshold } = self {
            if *threshold == 0 || *threshold > public_keys.len() {
                return Err(SignerError::invalid_threshold(*threshold, public_keys.len()));
            }
            if public_keys.len() > MAX_MULTISIG_KEYS {
                return Err(SignerError::invalid_input(format!(
                    "at most {} multisig keys are allowed, got {}",
                    MAX_MULTISIG_KEYS,
                    public_keys.len()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonInput {
    #[serde(rename = "tosign")]
    pub digest: Digest,
    pub signer: ExpectedSigner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonOutput {
    pub address: String,
    pub value: u64,
}

/// One signature together with the key that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub signature: Signature,
    #[serde(with = "pubkey_hex")]
    pub public_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSkeleton {
    pub inputs: Vec<SkeletonInput>,
    pub outputs: Vec<SkeletonOutput>,
    /// `signatures[i]` belongs to `inputs[i]`; empty until signed
    #[serde(default)]
    pub signatures: Vec<Vec<SignatureEntry>>,
}

impl TransactionSkeleton {
    pub fn new(inputs: Vec<SkeletonInput>, outputs: Vec<SkeletonOutput>) -> Self {
        Self {
            inputs,
            outputs,
            signatures: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> SignerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> SignerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Digests in input order
    pub fn to_sign(&self) -> Vec<Digest> {
        self.inputs.iter().map(|i| i.digest).collect()
    }

    pub fn is_signed(&self) -> bool {
        self.ensure_submittable().is_ok()
    }

    /// Refuse to hand a skeleton back to the service with unsigned inputs
    pub fn ensure_submittable(&self) -> SignerResult<()> {
        if self.signatures.len() != self.inputs.len() {
            return Err(SignerError::partial_signature(format!(
                "{} of {} inputs carry signatures",
                self.signatures.len(),
                self.inputs.len()
            )));
        }
        for (i, (input, sigs)) in self.inputs.iter().zip(&self.signatures).enumerate() {
            input
                .signer
                .validate()
                .map_err(|e| e.with_details(format!("input {}", i)))?;
            let needed = input.signer.required_signatures();
            if sigs.len() < needed {
                return Err(SignerError::partial_signature(format!(
                    "input {} has {} of {} signatures",
                    i,
                    sigs.len(),
                    needed
                )));
            }
        }
        Ok(())
    }

    /// Sign every input with the matching keys. On error `self` is unchanged.
    pub fn sign(&mut self, keys: &[KeyPair]) -> SignerResult<()> {
        let signed = Signer::default().sign_skeleton(self, keys, KeyAssignment::ByExpectedSigner)?;
        self.signatures = signed.signatures;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::NetworkParams;

    fn key(n: u8) -> KeyPair {
        let mut bytes = [0u8; 32];
        bytes[31] = n;
        KeyPair::from_secret_bytes(&bytes, NetworkParams::BCY_TEST).unwrap()
    }

    fn single_input(signer: ExpectedSigner) -> TransactionSkeleton {
        TransactionSkeleton::new(
            vec![SkeletonInput {
                digest: Digest([0x11; 32]),
                signer,
            }],
            vec![SkeletonOutput {
                address: "CFr99841LyMkyX5ZTGepY58rjXJhyNGXHf".into(),
                value: 1000,
            }],
        )
    }

    #[test]
    fn test_unsigned_is_not_submittable() {
        let skel = single_input(ExpectedSigner::Address { address: key(1).address() });
        let err = skel.ensure_submittable().unwrap_err();
        assert_eq!(err.code, ErrorCode::PartialSignature);
        assert!(!skel.is_signed());
    }

    #[test]
    fn test_sign_in_place() {
        let mut skel = single_input(ExpectedSigner::Address { address: key(1).address() });
        skel.sign(&[key(2), key(1)]).unwrap();
        assert_eq!(skel.signatures.len(), 1);
        assert_eq!(skel.signatures[0][0].public_key, key(1).public_key());
        skel.ensure_submittable().unwrap();
    }

    #[test]
    fn test_failed_sign_leaves_skeleton() {
        let mut skel = single_input(ExpectedSigner::Address { address: key(1).address() });
        let before = skel.clone();
        assert!(skel.sign(&[key(2)]).is_err());
        assert_eq!(skel, before);
    }

    #[test]
    fn test_unsatisfiable_multisig_is_never_submittable() {
        let mut skel = single_input(ExpectedSigner::Multisig {
            public_keys: vec![key(1).public_key(), key(2).public_key()],
            threshold: 0,
        });
        skel.signatures = vec![vec![]];
        let err = skel.ensure_submittable().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidThreshold);
        assert!(!skel.is_signed());

        let too_high = ExpectedSigner::Multisig {
            public_keys: vec![key(1).public_key()],
            threshold: 2,
        };
        assert_eq!(too_high.validate().unwrap_err().code, ErrorCode::InvalidThreshold);

        let too_many = ExpectedSigner::Multisig {
            public_keys: (1..=17).map(|n| key(n).public_key()).collect(),
            threshold: 1,
        };
        assert_eq!(too_many.validate().unwrap_err().code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_json_shape() {
        let skel = single_input(ExpectedSigner::Multisig {
            public_keys: vec![key(1).public_key(), key(2).public_key()],
            threshold: 2,
        });
        let json = serde_json::to_value(&skel).unwrap();
        assert_eq!(json["inputs"][0]["signer"]["type"], "multisig");
        assert_eq!(json["inputs"][0]["tosign"], "11".repeat(32));

        let back = TransactionSkeleton::from_json(&skel.to_json().unwrap()).unwrap();
        assert_eq!(back, skel);
        assert_eq!(back.inputs[0].signer.required_signatures(), 2);
    }
}
