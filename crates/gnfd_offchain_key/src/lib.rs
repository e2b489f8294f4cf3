#![deny(missing_docs)]
#![deny(unsafe_code)]
//! Deterministic EdDSA key derivation for the Greenfield off-chain
//! authentication flow.
//!
//! A low-entropy seed string (typically produced once by a wallet
//! personal-sign) is expanded into a Baby JubJub keypair. The same seed
//! always yields the same key material, so callers recompute it per use
//! instead of persisting a secret.

mod derive;
pub use derive::*;
