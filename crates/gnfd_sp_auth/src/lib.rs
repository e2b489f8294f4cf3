#![deny(missing_docs)]
#![deny(unsafe_code)]
//! Authenticated-request client for Greenfield storage providers.
//!
//! Every outbound SP request is reduced to a canonical string, hashed
//! with the `keccak256(sha256(..))` nesting the SP verifier expects, and
//! signed under one of two schemes: authTypeV1 (local chain key) or
//! authTypeV2 (an externally produced wallet signature). Endpoints are
//! resolved from a per-client cache over the chain registry, refreshed
//! wholesale on a lookup miss.
//!
//! The companion crate [gnfd_offchain_key] derives the deterministic
//! EdDSA key material used by the off-chain registration flow in
//! [offchain].

mod error;
pub use error::*;

mod types;
pub use types::*;

pub mod canonical;

pub mod sign;

pub mod offchain;

mod resolver;
pub use resolver::*;

mod dispatch;
pub use dispatch::*;
