//! Off-chain key registration flow.
//!
//! Routine requests avoid repeated wallet prompts by registering a
//! seed-derived EdDSA public key with the SP once. The registration
//! request carries the derived public key in headers and proves account
//! ownership with a wallet-style personal-sign over a human-readable
//! challenge string.

use crate::sign::{personal_sign, ChainKey, AUTH_V2, SIGN_ALGORITHM};
use crate::{header, SpAuthResult};
use gnfd_offchain_key::OffChainKeyMaterial;

/// Caller-supplied parameters for one key registration.
#[derive(Debug, Clone)]
pub struct RegistrationParams {
    /// Application domain the key is being registered for.
    pub app_domain: String,
    /// One-time registration nonce issued by the SP.
    pub nonce: String,
    /// Expiry of the registered key, ISO-8601.
    pub expiry_timestamp: String,
}

/// The human-readable challenge string the wallet signs.
///
/// Embeds domain, account, derived public key, nonce, and expiry so the
/// user sees exactly what is being authorized.
pub fn registration_challenge(
    params: &RegistrationParams,
    account: &str,
    public_key_hex: &str,
) -> String {
    format!(
        "{domain} wants you to sign in with your account:\n\
         {account}\n\
         \n\
         Register your identity public key {public_key}\n\
         Nonce: {nonce}\n\
         Expiration Time: {expiry}",
        domain = params.app_domain,
        account = account,
        public_key = public_key_hex,
        nonce = params.nonce,
        expiry = params.expiry_timestamp,
    )
}

/// Build the full header set for an off-chain key registration request:
/// the four registration headers plus a v2-shaped `Authorization`
/// carrying the personal-sign of the challenge.
pub fn registration_headers(
    key: &ChainKey,
    material: &OffChainKeyMaterial,
    params: &RegistrationParams,
) -> SpAuthResult<Vec<(String, String)>> {
    let account = key.evm_address();
    let public_key_hex = material.public_key_hex();
    let challenge =
        registration_challenge(params, &account, &public_key_hex);
    let signature = personal_sign(key, &challenge)?;
    let authorization = [
        format!("{} {}", AUTH_V2, SIGN_ALGORITHM),
        format!(" Signature=0x{}", hex::encode(signature)),
    ]
    .join(", ");

    Ok(vec![
        (header::GNFD_APP_DOMAIN.to_string(), params.app_domain.clone()),
        (header::GNFD_APP_REG_NONCE.to_string(), params.nonce.clone()),
        (header::GNFD_APP_REG_PUBLIC_KEY.to_string(), public_key_hex),
        (
            header::GNFD_EXPIRY_TIMESTAMP.to_string(),
            params.expiry_timestamp.clone(),
        ),
        ("Authorization".to_string(), authorization),
    ])
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params() -> RegistrationParams {
        RegistrationParams {
            app_domain: "https://dapp.example.com".to_string(),
            nonce: "123456".to_string(),
            expiry_timestamp: "2024-06-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn challenge_embeds_every_field() {
        let challenge = registration_challenge(
            &params(),
            "0x00000000000000000000000000000000000000aa",
            "deadbeef",
        );
        assert!(challenge.contains("https://dapp.example.com"));
        assert!(challenge
            .contains("0x00000000000000000000000000000000000000aa"));
        assert!(challenge.contains("public key deadbeef"));
        assert!(challenge.contains("Nonce: 123456"));
        assert!(
            challenge.contains("Expiration Time: 2024-06-01T00:00:00Z")
        );
    }

    #[test]
    fn registration_headers_complete_and_deterministic() {
        let key = ChainKey::from_bytes(&[0x01; 32]).unwrap();
        let material =
            gnfd_offchain_key::derive_key_material("reg-seed").unwrap();
        let p = params();

        let a = registration_headers(&key, &material, &p).unwrap();
        let b = registration_headers(&key, &material, &p).unwrap();
        assert_eq!(a, b);

        let names: Vec<&str> =
            a.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                header::GNFD_APP_DOMAIN,
                header::GNFD_APP_REG_NONCE,
                header::GNFD_APP_REG_PUBLIC_KEY,
                header::GNFD_EXPIRY_TIMESTAMP,
                "Authorization",
            ]
        );

        let pubkey = a
            .iter()
            .find(|(n, _)| n == header::GNFD_APP_REG_PUBLIC_KEY)
            .map(|(_, v)| v.clone())
            .unwrap();
        assert_eq!(pubkey, material.public_key_hex());

        let auth = &a.last().unwrap().1;
        assert!(auth.starts_with("authTypeV2 ECDSA-secp256k1,  Signature=0x"));
    }

    #[test]
    fn registration_signature_recovers_to_account_key() {
        use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
        use sha3::{Digest, Keccak256};

        let key = ChainKey::from_bytes(&[0x01; 32]).unwrap();
        let material =
            gnfd_offchain_key::derive_key_material("reg-seed").unwrap();
        let p = params();

        let headers =
            registration_headers(&key, &material, &p).unwrap();
        let auth = &headers.last().unwrap().1;
        let sig_hex = auth
            .split("Signature=0x")
            .nth(1)
            .unwrap();
        let sig: [u8; 65] =
            hex::decode(sig_hex).unwrap().try_into().unwrap();

        let challenge = registration_challenge(
            &p,
            &key.evm_address(),
            &material.public_key_hex(),
        );
        let prefixed = format!(
            "\x19Ethereum Signed Message:\n{}{}",
            challenge.len(),
            challenge
        );
        let digest: [u8; 32] =
            Keccak256::digest(prefixed.as_bytes()).into();

        let signature = Signature::from_slice(&sig[..64]).unwrap();
        let rid = RecoveryId::from_byte(sig[64]).unwrap();
        let recovered = VerifyingKey::recover_from_prehash(
            &digest, &signature, rid,
        )
        .unwrap();
        assert_eq!(recovered, key.verifying_key());
    }
}
