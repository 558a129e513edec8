//! Hashing primitives used throughout the ledger: plain and double SHA-256
//! for block/transaction/PoW content, and the SHA-256-then-RIPEMD-160
//! pipeline used to turn a public key into an address's payload.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 applied twice, used for Base58Check checksums.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160(SHA-256(pub_key)) — the address payload before version/checksum.
pub fn hash_pub_key(pub_key: &[u8]) -> [u8; 20] {
    let sha = sha256(pub_key);
    let mut hasher = Ripemd160::new();
    hasher.update(sha);
    hasher.finalize().into()
}
