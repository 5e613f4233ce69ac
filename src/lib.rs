//! bcy-signer Core Library
//!
//! Local signing core for a hosted blockchain REST service. Keys never leave
//! this crate unless the caller exports them explicitly.
//!
//! # Architecture
//!
//! This crate provides:
//! - **wallet**: Keypairs, Base58Check addresses, multisig scripts and
//!   public-only HD derivation
//! - **tx**: Digest signing, transaction skeletons and microtransactions
//! - **config**: Explicit client configuration (coin, chain, API token)
//!
//! # Security
//!
//! Secret scalars are erased when a `KeyPair` is dropped and intermediate
//! buffers are held in `zeroize::Zeroizing`. The API token is a
//! `secrecy::SecretString`. Log fields are redacted by name.
//!
//! # Example
//!
//! ```rust,ignore
//! use bcy_signer::{wallet::KeyPair, tx::Signer, Digest, NetworkParams};
//!
//! let key = KeyPair::generate(NetworkParams::BCY_TEST)?;
//! let sig = Signer::default().sign_digest(&Digest([0x11; 32]), &key)?;
//! println!("{} signed {}", key.address(), sig);
//! ```

pub mod config;
pub mod error;
pub mod tx;
pub mod types;
pub mod utils;
pub mod wallet;

pub use config::{ClientConfig, ConfigError};
pub use error::{ErrorCode, SignerError, SignerResult};
pub use types::{Coin, Digest, NetworkParams};
