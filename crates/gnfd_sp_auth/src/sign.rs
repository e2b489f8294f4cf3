//! Request signing and `Authorization` header assembly.
//!
//! The signed digest is `keccak256(sha256(canonical_request))`: an inner
//! SHA-256 over the canonical string, then an outer Keccak-256 over that
//! digest. The server-side verifier reproduces the exact nesting, so it
//! must never be flattened to a single hash.

use crate::{AuthInfo, AuthMode, SpAuthError, SpAuthResult};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// Scheme token for chain-key signing.
pub const AUTH_V1: &str = "authTypeV1";

/// Scheme token for wallet-signature embedding.
pub const AUTH_V2: &str = "authTypeV2";

/// Algorithm token carried in both header forms.
pub const SIGN_ALGORITHM: &str = "ECDSA-secp256k1";

/// Compute the digest that gets signed for a canonical request string.
pub fn request_digest(canonical: &str) -> [u8; 32] {
    let inner = Sha256::digest(canonical.as_bytes());
    keccak256(&inner)
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// The account's secp256k1 chain key.
///
/// Wraps the signing key so it can be passed around without exposing the
/// scalar; `Debug` prints only the derived account address.
pub struct ChainKey {
    signing: SigningKey,
}

impl std::fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainKey")
            .field("address", &self.evm_address())
            .finish()
    }
}

impl ChainKey {
    /// Load a chain key from raw 32-byte scalar bytes.
    pub fn from_bytes(bytes: &[u8]) -> SpAuthResult<Self> {
        let signing =
            SigningKey::from_slice(bytes).map_err(SpAuthError::other)?;
        Ok(Self { signing })
    }

    /// Load a chain key from a hex private key, `0x` prefix optional.
    pub fn from_hex(s: &str) -> SpAuthResult<Self> {
        let raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(SpAuthError::other)?;
        Self::from_bytes(&raw)
    }

    /// The public verifying key for this chain key.
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.signing.verifying_key()
    }

    /// The EVM-style account address: last 20 bytes of the keccak256 of
    /// the uncompressed public key, `0x`-prefixed hex.
    pub fn evm_address(&self) -> String {
        let point = self.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        format!("0x{}", hex::encode(&hash[12..]))
    }

    /// RFC6979-deterministic recoverable ECDSA over a 32-byte prehash.
    /// Output layout is `r || s || v` (65 bytes).
    pub fn sign_digest_recoverable(
        &self,
        digest: &[u8; 32],
    ) -> SpAuthResult<[u8; 65]> {
        let (sig, rid) = self
            .signing
            .sign_prehash_recoverable(digest)
            .map_err(SpAuthError::other)?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = rid.to_byte();
        Ok(out)
    }
}

/// Produce the `Authorization` header value for a canonical request.
///
/// Must run after every other header is final: the request timestamp is
/// covered only by virtue of sitting in the canonical headers block.
pub fn authorization(
    canonical: &str,
    auth: &AuthInfo,
    key: Option<&ChainKey>,
) -> SpAuthResult<String> {
    match auth.mode {
        AuthMode::ChainKey => {
            let key = key.ok_or(SpAuthError::MissingKey)?;
            let digest = request_digest(canonical);
            let signature = key.sign_digest_recoverable(&digest)?;
            // leading spaces on continuation segments are part of the
            // server parser's expected grammar
            let segments = [
                format!("{} {}", AUTH_V1, SIGN_ALGORITHM),
                format!(" SignedMsg={}", hex::encode(digest)),
                format!("Signature={}", hex::encode(signature)),
            ];
            Ok(segments.join(", "))
        }
        AuthMode::WalletSignature => {
            let sig = auth.wallet_signature.as_deref().unwrap_or("");
            if sig.is_empty() {
                return Err(SpAuthError::MissingSignature);
            }
            let segments = [
                format!("{} {}", AUTH_V2, SIGN_ALGORITHM),
                format!(" Signature={}", sig),
            ];
            Ok(segments.join(", "))
        }
    }
}

/// EIP-191 style personal-sign: keccak256 of the prefixed message,
/// signed recoverably with the chain key.
pub fn personal_sign(
    key: &ChainKey,
    message: &str,
) -> SpAuthResult<[u8; 65]> {
    let prefixed = format!(
        "\x19Ethereum Signed Message:\n{}{}",
        message.len(),
        message
    );
    let digest = keccak256(prefixed.as_bytes());
    key.sign_digest_recoverable(&digest)
}
