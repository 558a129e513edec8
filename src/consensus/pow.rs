//! Hashcash-style proof-of-work: a fixed target of `2^(256 - target_bits)`,
//! mined by brute-forcing a nonce until the block header hash falls below
//! it. No difficulty adjustment — the target is fixed for the life of the
//! chain (§4.3, explicit Non-goal).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::One;

use crate::crypto::hash::sha256;

/// `2^(256 - target_bits)`, the maximum hash value (as a big-endian integer)
/// that counts as a valid proof of work.
pub fn target(target_bits: u32) -> BigUint {
    BigUint::one() << (256 - target_bits as usize)
}

/// Builds the exact preimage the original hashcash design hashes:
/// `prev_block_hash ‖ be_i64(timestamp) ‖ tx_commitment ‖ be_i64(target_bits) ‖ be_i64(nonce)`.
pub fn header_preimage(
    prev_block_hash: &[u8; 32],
    timestamp: i64,
    tx_commitment: &[u8; 32],
    target_bits: u32,
    nonce: i64,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 + 8 + 32 + 8 + 8);
    buf.extend_from_slice(prev_block_hash);
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(tx_commitment);
    buf.extend_from_slice(&(target_bits as i64).to_be_bytes());
    buf.extend_from_slice(&nonce.to_be_bytes());
    buf
}

fn hash_meets_target(hash: &[u8; 32], target: &BigUint) -> bool {
    BigUint::from_bytes_be(hash) < *target
}

/// Mines a block header: searches nonces from 0 until the header hash is
/// below `target(target_bits)`, returning the winning `(nonce, hash)`.
///
/// `cancel`, when set, aborts the search early and returns `None`.
pub fn mine(
    prev_block_hash: &[u8; 32],
    timestamp: i64,
    tx_commitment: &[u8; 32],
    target_bits: u32,
    cancel: Option<&Arc<AtomicBool>>,
) -> Option<(i64, [u8; 32])> {
    let target = target(target_bits);
    let mut nonce: i64 = 0;

    loop {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return None;
            }
        }

        let preimage = header_preimage(prev_block_hash, timestamp, tx_commitment, target_bits, nonce);
        let hash = sha256(&preimage);

        if hash_meets_target(&hash, &target) {
            return Some((nonce, hash));
        }

        nonce = nonce.checked_add(1)?;
    }
}

/// Re-derives the header hash for `(nonce)` and checks it against the
/// fixed target — used to validate a mined or received block.
pub fn is_valid(
    prev_block_hash: &[u8; 32],
    timestamp: i64,
    tx_commitment: &[u8; 32],
    target_bits: u32,
    nonce: i64,
    hash: &[u8; 32],
) -> bool {
    let preimage = header_preimage(prev_block_hash, timestamp, tx_commitment, target_bits, nonce);
    let recomputed = sha256(&preimage);
    &recomputed == hash && hash_meets_target(hash, &target(target_bits))
}
