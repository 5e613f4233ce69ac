//! Wallet Module
//!
//! Key generation, address encoding, multisig scripts and public-only HD
//! derivation.

mod address;
mod derivation;
mod keygen;
mod multisig;

pub use address::*;
pub use derivation::*;
pub use keygen::*;
pub use multisig::*;
