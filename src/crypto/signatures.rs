//! ECDSA over NIST P-256, operating directly on 32-byte prehashed digests.
//!
//! Signing never re-hashes its input: callers pass the already-computed
//! transaction-id digest, and `PrehashSigner`/`PrehashVerifier` sign/verify
//! that digest as-is. Keys and signatures are fixed-width 64-byte
//! concatenations (`X‖Y`, `r‖s`) since P-256 scalars are 32 bytes each.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;

use crate::error::{Error, Result};

/// Signs a 32-byte digest, returning the raw 64-byte `r‖s` signature.
pub fn sign_prehash(signing_key: &SigningKey, digest: &[u8; 32]) -> Result<[u8; 64]> {
    let signature: Signature = signing_key
        .sign_prehash(digest)
        .map_err(|e| Error::Internal(format!("signing failed: {e}")))?;
    let bytes = signature.to_bytes();
    let mut out = [0u8; 64];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Verifies a raw 64-byte `r‖s` signature against a 32-byte digest and a
/// raw 64-byte `X‖Y` public key.
pub fn verify_prehash(pub_key: &[u8], digest: &[u8; 32], signature: &[u8]) -> Result<bool> {
    let verifying_key = verifying_key_from_bytes(pub_key)?;
    let signature = Signature::from_slice(signature)
        .map_err(|e| Error::Internal(format!("malformed signature: {e}")))?;
    Ok(verifying_key.verify_prehash(digest, &signature).is_ok())
}

/// Rebuilds a `VerifyingKey` from its raw 64-byte `X‖Y` encoding, as stored
/// in `TxInput::pub_key`.
pub fn verifying_key_from_bytes(pub_key: &[u8]) -> Result<VerifyingKey> {
    if pub_key.len() != 64 {
        return Err(Error::BadRequest);
    }
    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(pub_key);
    VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| Error::BadRequest)
}

/// Encodes a `VerifyingKey` as the raw 64-byte `X‖Y` form used on the wire.
pub fn public_key_to_bytes(key: &VerifyingKey) -> [u8; 64] {
    let point = key.to_encoded_point(false);
    let mut out = [0u8; 64];
    out.copy_from_slice(&point.as_bytes()[1..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn sign_and_verify_roundtrip() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let digest = [9u8; 32];

        let sig = sign_prehash(&signing_key, &digest).unwrap();
        let pub_bytes = public_key_to_bytes(&verifying_key);

        assert!(verify_prehash(&pub_bytes, &digest, &sig).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_digest() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let digest = [1u8; 32];
        let other_digest = [2u8; 32];

        let sig = sign_prehash(&signing_key, &digest).unwrap();
        let pub_bytes = public_key_to_bytes(&verifying_key);

        assert!(!verify_prehash(&pub_bytes, &other_digest, &sig).unwrap());
    }

    #[test]
    fn public_key_roundtrips_through_bytes() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);

        let bytes = public_key_to_bytes(&verifying_key);
        let rebuilt = verifying_key_from_bytes(&bytes).unwrap();
        assert_eq!(rebuilt, verifying_key);
    }
}
