//! Microtransactions
//!
//! Small payments the service builds on request. The request names a sender
//! public key, a recipient and a value; the service answers with digests to
//! sign. With a private-key source the digests are signed as soon as they
//! arrive. With a public-key source the transaction stays `Unsigned` until
//! the holder of the matching key signs it.

use bitcoin::PublicKey;
use serde::Serialize;

use crate::error::{SignerError, SignerResult};
use crate::log_info;
use crate::types::{pubkey_hex, Digest};
use crate::wallet::KeyPair;

use super::signer::{Signature, Signer};

/// Where signing capability comes from
pub enum MicroSource {
    PrivateKey(KeyPair),
    PublicKey(PublicKey),
}

impl MicroSource {
    pub fn public_key(&self) -> PublicKey {
        match self {
            MicroSource::PrivateKey(key) => key.public_key(),
            MicroSource::PublicKey(pk) => *pk,
        }
    }
}

/// The part of a request that may travel to the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MicroPayment {
    #[serde(rename = "from_pubkey", with = "pubkey_hex")]
    pub public_key: PublicKey,
    pub to_address: String,
    pub value: u64,
}

pub struct MicroRequest {
    source: MicroSource,
    to_address: String,
    value: u64,
}

impl MicroRequest {
    pub fn with_private_key(key: KeyPair, to_address: impl Into<String>, value: u64) -> Self {
        Self {
            source: MicroSource::PrivateKey(key),
            to_address: to_address.into(),
            value,
        }
    }

    pub fn with_public_key(public_key: PublicKey, to_address: impl Into<String>, value: u64) -> Self {
        Self {
            source: MicroSource::PublicKey(public_key),
            to_address: to_address.into(),
            value,
        }
    }

    pub fn source(&self) -> &MicroSource {
        &self.source
    }

    pub fn payment(&self) -> MicroPayment {
        MicroPayment {
            public_key: self.source.public_key(),
            to_address: self.to_address.clone(),
            value: self.value,
        }
    }

    /// Attach the service's digests. A private-key source signs right away.
    pub fn into_transaction(self, digests: Vec<Digest>) -> SignerResult<MicroTransaction> {
        if digests.is_empty() {
            return Err(SignerError::invalid_input("microtransaction has no digests to sign"));
        }
        if self.value == 0 {
            return Err(SignerError::invalid_input("microtransaction value must be positive"));
        }

        let body = MicroBody {
            public_key: self.source.public_key(),
            to_address: self.to_address,
            value: self.value,
            digests,
        };
        let mut tx = MicroTransaction::Unsigned(body);
        if let MicroSource::PrivateKey(key) = &self.source {
            tx.sign(key)?;
        }
        Ok(tx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MicroBody {
    #[serde(rename = "from_pubkey", with = "pubkey_hex")]
    pub public_key: PublicKey,
    pub to_address: String,
    pub value: u64,
    #[serde(rename = "tosign")]
    pub digests: Vec<Digest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MicroTransaction {
    Unsigned(MicroBody),
    Signed {
        body: MicroBody,
        signatures: Vec<Signature>,
    },
}

impl MicroTransaction {
    pub fn body(&self) -> &MicroBody {
        match self {
            MicroTransaction::Unsigned(body) => body,
            MicroTransaction::Signed { body, .. } => body,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, MicroTransaction::Signed { .. })
    }

    pub fn signatures(&self) -> Option<&[Signature]> {
        match self {
            MicroTransaction::Unsigned(_) => None,
            MicroTransaction::Signed { signatures, .. } => Some(signatures),
        }
    }

    /// Sign every digest with `key`, which must own the stored public key.
    /// Signing again replaces earlier signatures.
    pub fn sign(&mut self, key: &KeyPair) -> SignerResult<()> {
        let body = self.body();
        if !key.matches_public_key(&body.public_key) {
            return Err(SignerError::key_mismatch(format!(
                "key {} does not own the microtransaction's public key",
                key.address()
            )));
        }

        let signer = Signer::default();
        let signatures = body
            .digests
            .iter()
            .map(|d| signer.sign_digest(d, key))
            .collect::<SignerResult<Vec<_>>>()?;

        log_info!("micro", "Signed microtransaction", recipient = body.to_address, digests = signatures.len());

        let body = body.clone();
        *self = MicroTransaction::Signed { body, signatures };
        Ok(())
    }

    /// The signed payload for the final submission
    pub fn submission(&self) -> SignerResult<MicroSubmission> {
        match self {
            MicroTransaction::Unsigned(_) => Err(SignerError::invalid_state(
                "microtransaction must be signed before submission",
            )),
            MicroTransaction::Signed { body, signatures } => Ok(MicroSubmission {
                body: body.clone(),
                signatures: signatures.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MicroSubmission {
    #[serde(flatten)]
    pub body: MicroBody,
    pub signatures: Vec<Signature>,
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

    fn digests() -> Vec<Digest> {
        vec![Digest([0xaa; 32]), Digest([0xbb; 32])]
    }

    #[test]
    fn test_private_source_signs_immediately() {
        let tx = MicroRequest::with_private_key(key(2), key(1).address(), 25_000)
            .into_transaction(digests())
            .unwrap();
        assert!(tx.is_signed());
        assert_eq!(tx.signatures().unwrap().len(), 2);

        let signer = Signer::default();
        for (sig, digest) in tx.signatures().unwrap().iter().zip(&tx.body().digests) {
            assert!(signer.verify_digest(sig, digest, &key(2).public_key()));
        }
    }

    #[test]
    fn test_public_source_defers() {
        let request = MicroRequest::with_public_key(key(2).public_key(), key(1).address(), 15_000);
        let payment = serde_json::to_value(request.payment()).unwrap();
        assert_eq!(payment["from_pubkey"], key(2).public_key_hex());

        let mut tx = request.into_transaction(digests()).unwrap();
        assert!(!tx.is_signed());
        assert_eq!(tx.submission().unwrap_err().code, ErrorCode::InvalidState);

        tx.sign(&key(2)).unwrap();
        let submission = tx.submission().unwrap();
        assert_eq!(submission.signatures.len(), 2);
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["value"], 15_000);
        assert_eq!(json["tosign"][0], "aa".repeat(32));
    }

    #[test]
    fn test_wrong_key_keeps_state() {
        let mut tx = MicroRequest::with_public_key(key(2).public_key(), key(1).address(), 15_000)
            .into_transaction(digests())
            .unwrap();
        let before = tx.clone();
        let err = tx.sign(&key(3)).unwrap_err();
        assert_eq!(err.code, ErrorCode::KeyMismatch);
        assert_eq!(tx, before);
    }

    #[test]
    fn test_resign_overwrites() {
        let mut tx = MicroRequest::with_public_key(key(2).public_key(), key(1).address(), 15_000)
            .into_transaction(digests())
            .unwrap();
        tx.sign(&key(2)).unwrap();
        let first = tx.clone();
        tx.sign(&key(2)).unwrap();
        // deterministic nonces reproduce the same signatures
        assert_eq!(tx, first);
    }

    #[test]
    fn test_rejects_empty_requests() {
        let empty = MicroRequest::with_public_key(key(2).public_key(), key(1).address(), 1).into_transaction(vec![]);
        assert_eq!(empty.unwrap_err().code, ErrorCode::InvalidInput);
        let zero = MicroRequest::with_public_key(key(2).public_key(), key(1).address(), 0).into_transaction(digests());
        assert_eq!(zero.unwrap_err().code, ErrorCode::InvalidInput);
    }
}
