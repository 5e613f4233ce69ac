//! Transaction Module
//!
//! Digest signing, transaction skeletons and microtransactions.

mod micro;
mod signer;
mod skeleton;

pub use micro::*;
pub use signer::*;
pub use skeleton::*;
