//! The UTXO index: a materialized `tx_id -> surviving outputs` view over
//! `chainstate`, kept in lockstep with the chain (§4.6).

use std::collections::{HashMap, HashSet};

use sled::transaction::TransactionalTree;
use serde::{Deserialize, Serialize};

use crate::blockchain::block::Block;
use crate::blockchain::transaction::{Transaction, TxOutput};
use crate::crypto::keys::pub_key_hash_from_address;
use crate::error::{Error, Result};
use crate::store::Store;

/// The serialized value stored at a transaction id's `chainstate` key:
/// surviving outputs kept at their original output-index positions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TxOutputs {
    /// `None` at an index means that output has been spent.
    pub outputs: Vec<Option<TxOutput>>,
}

pub struct UtxoSet<'a> {
    store: &'a Store,
}

impl<'a> UtxoSet<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Rebuilds `chainstate` from scratch by walking the whole chain once,
    /// per the deterministic full-scan semantics of §4.6/§9: a spent-set is
    /// recorded first, over the full walk, and surviving outputs are
    /// computed only once the walk is complete — not interleaved the way a
    /// naive tip-to-genesis recording would do it.
    pub fn reindex(&self, blocks: &[Block]) -> Result<()> {
        let mut spent: HashSet<(([u8; 32]), u32)> = HashSet::new();
        let mut by_tx: HashMap<[u8; 32], Vec<TxOutput>> = HashMap::new();

        for block in blocks {
            for tx in &block.transactions {
                by_tx.insert(tx.id, tx.outputs.clone());
                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        spent.insert((input.tx_id, input.out_index));
                    }
                }
            }
        }

        self.store.chainstate.clear()?;

        for (tx_id, outputs) in by_tx {
            let trimmed: Vec<Option<TxOutput>> = outputs
                .into_iter()
                .enumerate()
                .map(|(idx, out)| {
                    if spent.contains(&(tx_id, idx as u32)) {
                        None
                    } else {
                        Some(out)
                    }
                })
                .collect();

            if trimmed.iter().any(Option::is_some) {
                let record = TxOutputs { outputs: trimmed };
                let encoded = bincode::serialize(&record)?;
                self.store.chainstate.insert(tx_id.as_slice(), encoded)?;
            }
        }

        Ok(())
    }

    /// All unspent outputs locked to `address`'s public-key-hash.
    pub fn find_utxo(&self, address: &str) -> Result<Vec<TxOutput>> {
        let pub_key_hash = pub_key_hash_from_address(address)?;
        let mut found = Vec::new();

        for entry in self.store.chainstate.iter() {
            let (_key, value) = entry?;
            let record: TxOutputs = bincode::deserialize(&value)?;
            for output in record.outputs.into_iter().flatten() {
                if output.is_locked_with_key(&pub_key_hash) {
                    found.push(output);
                }
            }
        }

        Ok(found)
    }

    /// Unspent outputs locked to `address`, as `(tx_id, out_index, value)`
    /// triples, in storage-key (lexicographic tx-id) order — the defined
    /// greedy coin-selection order (§9).
    pub fn find_spendable_outputs(&self, address: &str) -> Result<Vec<([u8; 32], u32, u64)>> {
        let pub_key_hash = pub_key_hash_from_address(address)?;
        let mut found = Vec::new();

        for entry in self.store.chainstate.iter() {
            let (key, value) = entry?;
            let tx_id: [u8; 32] = key
                .as_ref()
                .try_into()
                .map_err(|_| Error::Internal("corrupt chainstate key".into()))?;
            let record: TxOutputs = bincode::deserialize(&value)?;

            for (idx, output) in record.outputs.into_iter().enumerate() {
                if let Some(output) = output {
                    if output.is_locked_with_key(&pub_key_hash) {
                        found.push((tx_id, idx as u32, output.value));
                    }
                }
            }
        }

        Ok(found)
    }

    /// Total balance for `address`.
    pub fn balance(&self, address: &str) -> Result<u64> {
        Ok(self.find_utxo(address)?.iter().map(|o| o.value).sum())
    }

    /// Applies a newly mined block's effect on the index, within the given
    /// `sled` transaction: spent inputs are removed (preserving positional
    /// indices of the outputs that remain, per §4.6's index-output
    /// stability rule), and the block's own transactions are added.
    pub fn apply_block(
        chainstate: &TransactionalTree,
        block: &Block,
    ) -> std::result::Result<(), sled::transaction::ConflictableTransactionError<Error>> {
        for tx in &block.transactions {
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    if let Some(existing) = chainstate.get(input.tx_id.as_slice())? {
                        let mut record: TxOutputs = bincode::deserialize(&existing)
                            .map_err(|e| sled::transaction::ConflictableTransactionError::Abort(Error::from(e)))?;

                        if let Some(slot) = record.outputs.get_mut(input.out_index as usize) {
                            *slot = None;
                        }

                        if record.outputs.iter().any(Option::is_some) {
                            let encoded = bincode::serialize(&record).map_err(|e| {
                                sled::transaction::ConflictableTransactionError::Abort(Error::from(e))
                            })?;
                            chainstate.insert(input.tx_id.as_slice(), encoded)?;
                        } else {
                            chainstate.remove(input.tx_id.as_slice())?;
                        }
                    }
                }
            }

            let record = TxOutputs {
                outputs: tx.outputs.clone().into_iter().map(Some).collect(),
            };
            let encoded = bincode::serialize(&record)
                .map_err(|e| sled::transaction::ConflictableTransactionError::Abort(Error::from(e)))?;
            chainstate.insert(tx.id.as_slice(), encoded)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Wallet;
    use tempfile::tempdir;

    fn genesis_block(to: &str) -> Block {
        let coinbase = Transaction::new_coinbase(to, Vec::new()).unwrap();
        Block::genesis(coinbase, 1_700_000_000, 16).unwrap()
    }

    #[test]
    fn reindex_finds_coinbase_output() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let wallet = Wallet::new();
        let block = genesis_block(&wallet.address());

        let utxo = UtxoSet::new(&store);
        utxo.reindex(&[block]).unwrap();

        assert_eq!(utxo.balance(&wallet.address()).unwrap(), crate::config::SUBSIDY);
    }

    #[test]
    fn spent_output_is_absent_after_reindex() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let from = Wallet::new();
        let to = Wallet::new();
        let funding = Transaction::new_coinbase(&from.address(), Vec::new()).unwrap();
        let genesis = Block::genesis(funding.clone(), 1_700_000_000, 16).unwrap();

        let mut prev_txs = HashMap::new();
        prev_txs.insert(funding.id, funding.clone());
        let spendable = vec![((funding.id, 0u32), funding.outputs[0].value)];
        let mut spend = Transaction::new_unsigned(
            &from,
            &to.address(),
            funding.outputs[0].value,
            spendable,
            funding.outputs[0].value,
        )
        .unwrap();
        spend.sign(&from.signing_key().unwrap(), &prev_txs).unwrap();

        let second = Block::new(vec![spend], genesis.hash, 1_700_000_100, 16).unwrap();

        let utxo = UtxoSet::new(&store);
        utxo.reindex(&[genesis, second]).unwrap();

        assert_eq!(utxo.balance(&from.address()).unwrap(), 0);
        assert_eq!(utxo.balance(&to.address()).unwrap(), funding.outputs[0].value);
    }

    #[test]
    fn spendable_outputs_are_ordered_by_tx_id() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let wallet = Wallet::new();
        let block = genesis_block(&wallet.address());

        let utxo = UtxoSet::new(&store);
        utxo.reindex(&[block]).unwrap();

        let spendable = utxo.find_spendable_outputs(&wallet.address()).unwrap();
        assert_eq!(spendable.len(), 1);
    }
}
