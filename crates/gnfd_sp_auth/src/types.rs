use crate::{SpAuthError, SpAuthResult};
use reqwest::Method;
use url::Url;

/// Hex sha256 of an empty body, sent when a request carries no payload.
pub const EMPTY_BODY_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Header constants shared by the signing and dispatch steps.
pub mod header {
    /// Request timestamp, ISO-8601 UTC at second precision.
    pub const GNFD_DATE: &str = "X-Gnfd-Date";
    /// Hex sha256 of the request body.
    pub const GNFD_CONTENT_SHA256: &str = "X-Gnfd-Content-Sha256";
    /// Hex-encoded pre-signature transaction bytes for approval flows.
    pub const GNFD_UNSIGNED_MSG: &str = "X-Gnfd-Unsigned-Msg";
    /// SP-countersigned transaction bytes returned by approval flows.
    pub const GNFD_SIGNED_MSG: &str = "X-Gnfd-Signed-Msg";
    /// Challenged object id.
    pub const GNFD_OBJECT_ID: &str = "X-Gnfd-Object-ID";
    /// Challenged piece index within the object.
    pub const GNFD_PIECE_INDEX: &str = "X-Gnfd-Piece-Index";
    /// Challenged redundancy (EC segment) index.
    pub const GNFD_REDUNDANCY_INDEX: &str = "X-Gnfd-Redundancy-Index";
    /// Integrity hash of the challenged piece, returned by the SP.
    pub const GNFD_INTEGRITY_HASH: &str = "X-Gnfd-Integrity-Hash";
    /// Piece hashes of the challenged object, returned by the SP.
    pub const GNFD_PIECE_HASH: &str = "X-Gnfd-Piece-Hash";
    /// Registering application domain for the off-chain auth flow.
    pub const GNFD_APP_DOMAIN: &str = "x-gnfd-app-domain";
    /// Registration nonce for the off-chain auth flow.
    pub const GNFD_APP_REG_NONCE: &str = "x-gnfd-app-reg-nonce";
    /// Derived public key being registered for the off-chain auth flow.
    pub const GNFD_APP_REG_PUBLIC_KEY: &str = "x-gnfd-app-reg-public-key";
    /// Expiry timestamp of the registered off-chain key.
    pub const GNFD_EXPIRY_TIMESTAMP: &str = "X-Gnfd-Expiry-Timestamp";
}

/// Authentication scheme for a signed SP request.
///
/// A closed sum: the two modes share nothing beyond header assembly, and
/// an exhaustive match keeps "unknown mode" out of the sign path. Unknown
/// wire/config integers are rejected at [AuthMode::try_from].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// authTypeV1: ECDSA-secp256k1 over the request digest with the
    /// locally configured chain key.
    ChainKey,
    /// authTypeV2: an externally produced wallet signature embedded
    /// verbatim.
    WalletSignature,
}

impl TryFrom<u8> for AuthMode {
    type Error = SpAuthError;

    fn try_from(v: u8) -> SpAuthResult<Self> {
        match v {
            1 => Ok(AuthMode::ChainKey),
            2 => Ok(AuthMode::WalletSignature),
            other => Err(SpAuthError::InvalidAuthMode(other)),
        }
    }
}

/// Per-request authentication input. Never persisted.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    /// The authentication scheme to sign under.
    pub mode: AuthMode,
    /// Wallet-produced signature string, required (non-empty) for
    /// [AuthMode::WalletSignature].
    pub wallet_signature: Option<String>,
}

impl AuthInfo {
    /// Auth info for chain-key (authTypeV1) signing.
    pub fn chain_key() -> Self {
        Self {
            mode: AuthMode::ChainKey,
            wallet_signature: None,
        }
    }

    /// Auth info embedding an out-of-band wallet signature (authTypeV2).
    pub fn wallet_signature(sig: impl Into<String>) -> Self {
        Self {
            mode: AuthMode::WalletSignature,
            wallet_signature: Some(sig.into()),
        }
    }
}

/// Challenge parameters for proof-of-storage admin requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeInfo {
    /// On-chain object id under challenge.
    pub object_id: String,
    /// Piece index within the object.
    pub piece_index: u32,
    /// Redundancy (EC segment) index; -1 addresses the primary SP.
    pub redundancy_index: i32,
}

/// Everything the dispatcher needs to build one SP request.
///
/// Immutable once built; constructed fresh per call.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    /// HTTP method of the request.
    pub method: Method,
    /// Target bucket name, when the request addresses one.
    pub bucket_name: Option<String>,
    /// Target object name, when the request addresses one.
    pub object_name: Option<String>,
    /// Relative admin path (e.g. `/greenfield/admin/v1/challenge`),
    /// used instead of bucket/object addressing when non-empty.
    pub admin_path: String,
    /// Query parameters in caller order; canonicalization sorts them.
    pub query: Vec<(String, String)>,
    /// Body content type; `application/octet-stream` is attached when
    /// absent.
    pub content_type: Option<String>,
    /// Body length in bytes.
    pub content_length: Option<u64>,
    /// Hex sha256 of the body; the empty-body constant is used when
    /// absent.
    pub content_sha256: Option<String>,
    /// Base64 md5 of the body, when the API requires it.
    pub content_md5: Option<String>,
    /// Byte range for ranged reads: (start, optional inclusive end).
    pub range: Option<(u64, Option<u64>)>,
    /// Challenge parameters for admin challenge requests.
    pub challenge: Option<ChallengeInfo>,
    /// Hex-encoded pre-serialized transaction for approval requests.
    pub unsigned_msg: Option<String>,
}

impl Default for RequestMeta {
    fn default() -> Self {
        Self {
            method: Method::GET,
            bucket_name: None,
            object_name: None,
            admin_path: String::new(),
            query: Vec::new(),
            content_type: None,
            content_length: None,
            content_sha256: None,
            content_md5: None,
            range: None,
            challenge: None,
            unsigned_msg: None,
        }
    }
}

/// A storage provider as listed by the chain registry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpInfo {
    /// The SP's operator chain address; the resolver cache key.
    pub operator_address: String,
    /// Base URL the SP serves its HTTP APIs from.
    pub endpoint: Url,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn auth_mode_from_wire_integer() {
        assert_eq!(AuthMode::try_from(1).unwrap(), AuthMode::ChainKey);
        assert_eq!(
            AuthMode::try_from(2).unwrap(),
            AuthMode::WalletSignature
        );
        assert!(matches!(
            AuthMode::try_from(0),
            Err(SpAuthError::InvalidAuthMode(0))
        ));
        assert!(matches!(
            AuthMode::try_from(7),
            Err(SpAuthError::InvalidAuthMode(7))
        ));
    }
}
