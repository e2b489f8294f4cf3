use ark_ec::{CurveGroup, Group};
use ark_ed_on_bn254::{EdwardsProjective, Fr};
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::CanonicalSerialize;
use blake2::{Blake2b512, Digest};
use subtle::{Choice, ConditionallySelectable};
use zeroize::Zeroize;

/// Byte length of the fixed seed buffer the derivation hashes.
pub const SEED_BUF_BYTES: usize = 32;

/// Byte length of the secret scalar.
pub const SCALAR_BYTES: usize = 32;

/// Byte length of the compressed public point.
pub const PUB_KEY_BYTES: usize = 32;

/// Byte length of the auxiliary nonce material.
pub const AUX_NONCE_BYTES: usize = 32;

/// Byte length of the assembled key material:
/// `[public(32) || scalar(32) || aux(32)]`.
pub const KEY_MATERIAL_BYTES: usize =
    PUB_KEY_BYTES + SCALAR_BYTES + AUX_NONCE_BYTES;

/// Off-chain key derivation error type.
#[derive(Debug, thiserror::Error)]
pub enum OffChainKeyError {
    /// Failure compressing the public curve point.
    #[error("curve point encoding failed: {0}")]
    PointEncoding(String),
}

/// Off-chain key derivation result type.
pub type OffChainKeyResult<T> = Result<T, OffChainKeyError>;

/// Derived off-chain key material.
///
/// Holds the 96-byte `[public || scalar || aux]` structure that the
/// off-chain signing flow consumes. There is intentionally no `Display`
/// impl and `Debug` shows only the public half.
pub struct OffChainKeyMaterial {
    bytes: [u8; KEY_MATERIAL_BYTES],
}

impl std::fmt::Debug for OffChainKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffChainKeyMaterial")
            .field("public", &self.public_key_hex())
            .finish()
    }
}

impl Drop for OffChainKeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl OffChainKeyMaterial {
    /// The compressed public point bytes.
    pub fn public_bytes(&self) -> [u8; PUB_KEY_BYTES] {
        let mut out = [0; PUB_KEY_BYTES];
        out.copy_from_slice(&self.bytes[..PUB_KEY_BYTES]);
        out
    }

    /// The curve-order-reduced secret scalar, little-endian.
    pub fn secret_scalar_bytes(&self) -> [u8; SCALAR_BYTES] {
        let mut out = [0; SCALAR_BYTES];
        out.copy_from_slice(
            &self.bytes[PUB_KEY_BYTES..PUB_KEY_BYTES + SCALAR_BYTES],
        );
        out
    }

    /// The auxiliary nonce material (upper half of the wide seed hash).
    pub fn aux_nonce_bytes(&self) -> [u8; AUX_NONCE_BYTES] {
        let mut out = [0; AUX_NONCE_BYTES];
        out.copy_from_slice(&self.bytes[PUB_KEY_BYTES + SCALAR_BYTES..]);
        out
    }

    /// The full 96-byte `[public || scalar || aux]` structure.
    pub fn as_bytes(&self) -> &[u8; KEY_MATERIAL_BYTES] {
        &self.bytes
    }

    /// Hex encoding of the compressed public point.
    pub fn public_key_hex(&self) -> String {
        let mut out = String::with_capacity(PUB_KEY_BYTES * 2);
        for b in &self.bytes[..PUB_KEY_BYTES] {
            out.push_str(&format!("{:02x}", b));
        }
        out
    }
}

/// Constant-time byte copy. Mirrors the conditional-copy primitive the
/// verifier-side implementation uses when laying out secret bytes.
fn ct_copy(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());
    let on = Choice::from(1);
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d = u8::conditional_select(d, s, on);
    }
}

/// Classic EdDSA scalar pruning plus an extra top-bit clear.
///
/// Bytes are in the written (big-endian-visual) order here; the scalar is
/// consumed little-endian after a byte reverse. The extra `b[0] &= 0x7F`
/// clears bit 255 so the value fits the sub-255-bit Baby JubJub order.
/// Interop requirement: the server-side verifier performs the identical
/// clearing, so this must not be "corrected" to plain Ed25519 pruning.
fn prune_scalar(b: &mut [u8; SCALAR_BYTES]) {
    b[0] &= 0xF8;
    b[SCALAR_BYTES - 1] &= 0x7F;
    b[SCALAR_BYTES - 1] |= 0x40;
    b[0] &= 0x7F;
}

/// Derive the off-chain key material for a seed string.
///
/// Pure and deterministic: identical seed, identical keypair, always.
/// The seed is right-zero-padded (or truncated) into a 32-byte buffer,
/// expanded with Blake2b-512, pruned, reduced into the Baby JubJub scalar
/// field, and multiplied against the curve base point.
pub fn derive_key_material(
    seed: &str,
) -> OffChainKeyResult<OffChainKeyMaterial> {
    let mut buf = [0u8; SEED_BUF_BYTES];
    let raw = seed.as_bytes();
    let take = raw.len().min(SEED_BUF_BYTES);
    buf[..take].copy_from_slice(&raw[..take]);

    let mut wide = [0u8; 64];
    wide.copy_from_slice(&Blake2b512::digest(buf));

    let mut pruned = [0u8; SCALAR_BYTES];
    pruned.copy_from_slice(&wide[..SCALAR_BYTES]);
    prune_scalar(&mut pruned);

    // pruning above is written big-endian-visually; the scalar itself is
    // little-endian, with integer bits 253..=255 zeroed as a hard bound
    let mut le = pruned;
    le.reverse();
    le[SCALAR_BYTES - 1] &= 0x1F;

    // reduce into the scalar field so 0 <= scalar < curve order holds
    // unconditionally, then re-serialize to 32 little-endian bytes
    let scalar = Fr::from_le_bytes_mod_order(&le);
    let scalar_le = scalar.into_bigint().to_bytes_le();

    let public = (EdwardsProjective::generator() * scalar).into_affine();
    let mut public_bytes = [0u8; PUB_KEY_BYTES];
    public
        .serialize_compressed(&mut public_bytes[..])
        .map_err(|e| OffChainKeyError::PointEncoding(e.to_string()))?;

    let mut bytes = [0u8; KEY_MATERIAL_BYTES];
    ct_copy(&mut bytes[..PUB_KEY_BYTES], &public_bytes);
    ct_copy(
        &mut bytes[PUB_KEY_BYTES..PUB_KEY_BYTES + SCALAR_BYTES],
        &scalar_le,
    );
    ct_copy(
        &mut bytes[PUB_KEY_BYTES + SCALAR_BYTES..],
        &wide[SCALAR_BYTES..],
    );

    buf.zeroize();
    wide.zeroize();
    pruned.zeroize();
    le.zeroize();

    Ok(OffChainKeyMaterial { bytes })
}
