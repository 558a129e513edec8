//! Blocks: a timestamped batch of transactions, chained by hash, sealed by
//! proof-of-work (§3, §4.3).

use serde::{Deserialize, Serialize};

use crate::blockchain::transaction::Transaction;
use crate::consensus::pow;
use crate::crypto::hash::sha256;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub prev_block_hash: [u8; 32],
    pub hash: [u8; 32],
    pub nonce: i64,
    pub target_bits: u32,
}

impl Block {
    /// SHA-256 of the concatenated transaction ids — the flat commitment
    /// this design uses in place of a Merkle root (§4.3, §9).
    pub fn tx_commitment(transactions: &[Transaction]) -> [u8; 32] {
        let mut buf = Vec::with_capacity(transactions.len() * 32);
        for tx in transactions {
            buf.extend_from_slice(&tx.id);
        }
        sha256(&buf)
    }

    /// Mines a new block on top of `prev_block_hash` containing
    /// `transactions`, searching for a nonce whose header hash satisfies the
    /// fixed target.
    pub fn new(
        transactions: Vec<Transaction>,
        prev_block_hash: [u8; 32],
        timestamp: i64,
        target_bits: u32,
    ) -> Result<Self> {
        let commitment = Self::tx_commitment(&transactions);
        let (nonce, hash) = pow::mine(&prev_block_hash, timestamp, &commitment, target_bits, None)
            .ok_or(Error::Internal("proof-of-work search exhausted".into()))?;

        Ok(Self {
            timestamp,
            transactions,
            prev_block_hash,
            hash,
            nonce,
            target_bits,
        })
    }

    /// The genesis block: a single coinbase transaction, no predecessor.
    pub fn genesis(coinbase: Transaction, timestamp: i64, target_bits: u32) -> Result<Self> {
        Self::new(vec![coinbase], [0u8; 32], timestamp, target_bits)
    }

    /// Re-validates this block's proof-of-work against its own fields.
    pub fn has_valid_pow(&self) -> bool {
        let commitment = Self::tx_commitment(&self.transactions);
        pow::is_valid(
            &self.prev_block_hash,
            self.timestamp,
            &commitment,
            self.target_bits,
            self.nonce,
            &self.hash,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Wallet;

    #[test]
    fn mined_genesis_block_has_valid_pow() {
        let wallet = Wallet::new();
        let coinbase = Transaction::new_coinbase(&wallet.address(), Vec::new()).unwrap();
        let block = Block::genesis(coinbase, 1_700_000_000, 16).unwrap();

        assert!(block.has_valid_pow());
        assert_eq!(block.prev_block_hash, [0u8; 32]);
    }

    #[test]
    fn tampered_transactions_invalidate_pow() {
        let wallet = Wallet::new();
        let coinbase = Transaction::new_coinbase(&wallet.address(), Vec::new()).unwrap();
        let mut block = Block::genesis(coinbase, 1_700_000_000, 16).unwrap();

        block.transactions[0].outputs[0].value += 1;
        assert!(!block.has_valid_pow());
    }

    #[test]
    fn tx_commitment_is_order_sensitive() {
        let a = Wallet::new();
        let b = Wallet::new();
        let tx1 = Transaction::new_coinbase(&a.address(), Vec::new()).unwrap();
        let tx2 = Transaction::new_coinbase(&b.address(), Vec::new()).unwrap();

        let commitment_ab = Block::tx_commitment(&[tx1.clone(), tx2.clone()]);
        let commitment_ba = Block::tx_commitment(&[tx2, tx1]);
        assert_ne!(commitment_ab, commitment_ba);
    }
}
