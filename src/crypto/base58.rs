//! Bitcoin-alphabet Base58 and Base58Check encoding, built by hand on top of
//! `num-bigint` rather than pulling in a dedicated base58 crate — this is
//! core address-format logic, not ambient plumbing.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::config::ADDRESS_CHECKSUM_LEN;
use crate::crypto::hash::double_sha256;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Encodes `data` as Base58, preserving leading zero bytes as leading `1`s.
pub fn encode(data: &[u8]) -> String {
    let leading_zeros = data.iter().take_while(|&&b| b == 0).count();

    let mut value = BigUint::from_bytes_be(data);
    let base = BigUint::from(58u32);
    let mut digits = Vec::new();

    while !value.is_zero() {
        let remainder = &value % &base;
        value /= &base;
        let idx = remainder.to_bytes_be().first().copied().unwrap_or(0) as usize;
        digits.push(ALPHABET[idx]);
    }

    let mut out = vec![ALPHABET[0]; leading_zeros];
    out.extend(digits.iter().rev());
    String::from_utf8(out).expect("alphabet is ASCII")
}

/// Decodes a Base58 string back to bytes. Returns `None` on an invalid
/// character.
pub fn decode(s: &str) -> Option<Vec<u8>> {
    let leading_zeros = s.bytes().take_while(|&b| b == ALPHABET[0]).count();

    let base = BigUint::from(58u32);
    let mut value = BigUint::zero();
    for c in s.bytes() {
        let digit = ALPHABET.iter().position(|&a| a == c)?;
        value = value * &base + BigUint::from(digit as u32);
    }

    let mut out = vec![0u8; leading_zeros];
    out.extend(value.to_bytes_be());
    Some(out)
}

/// Encodes `payload` (already containing its version byte) with a 4-byte
/// double-SHA256 checksum appended, per spec §4.1/§4.2.
pub fn encode_check(payload: &[u8]) -> String {
    let checksum = &double_sha256(payload)[..ADDRESS_CHECKSUM_LEN];
    let mut full = Vec::with_capacity(payload.len() + ADDRESS_CHECKSUM_LEN);
    full.extend_from_slice(payload);
    full.extend_from_slice(checksum);
    encode(&full)
}

/// Decodes a Base58Check string, verifying the trailing checksum. Returns
/// the payload (version byte + hash) with the checksum stripped.
pub fn decode_check(s: &str) -> Option<Vec<u8>> {
    let full = decode(s)?;
    if full.len() < ADDRESS_CHECKSUM_LEN {
        return None;
    }
    let (payload, checksum) = full.split_at(full.len() - ADDRESS_CHECKSUM_LEN);
    let expected = &double_sha256(payload)[..ADDRESS_CHECKSUM_LEN];
    if checksum != expected {
        return None;
    }
    Some(payload.to_vec())
}
