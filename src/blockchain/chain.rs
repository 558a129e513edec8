//! The blockchain itself: tip tracking, append (mine), transaction lookup,
//! and the tip-to-genesis iterator (§4.5).

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info};

use crate::blockchain::block::Block;
use crate::blockchain::transaction::Transaction;
use crate::blockchain::utxo::UtxoSet;
use crate::error::{Error, Result};
use crate::store::Store;

pub struct Blockchain {
    store: Store,
    tip: [u8; 32],
    target_bits: u32,
}

impl Blockchain {
    /// Opens an existing chain, or creates one if the store is empty, per
    /// §4.5. `target_bits` governs any blocks newly mined by this instance.
    pub fn open_or_create(path: impl AsRef<Path>, genesis_address: &str, target_bits: u32) -> Result<Self> {
        let store = Store::open(path)?;

        match store.tip()? {
            Some(tip) => {
                info!("opened existing chain, tip {}", hex::encode(tip));
                Ok(Self { store, tip, target_bits })
            }
            None => {
                info!("no existing chain found, creating genesis block for {genesis_address}");
                let coinbase = Transaction::new_coinbase(genesis_address, Vec::new())?;
                let timestamp = current_timestamp();
                let genesis = Block::genesis(coinbase, timestamp, target_bits)?;

                store.commit_block(&genesis.hash, &bincode::serialize(&genesis)?, |chainstate| {
                    UtxoSet::apply_block(chainstate, &genesis)
                })?;

                Ok(Self { store, tip: genesis.hash, target_bits })
            }
        }
    }

    pub fn tip(&self) -> [u8; 32] {
        self.tip
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Mines a new block containing `txs` on top of the current tip,
    /// rejecting the batch if it's empty or any non-coinbase transaction
    /// fails to verify (§4.5).
    pub fn mine_block(&mut self, txs: Vec<Transaction>) -> Result<Block> {
        if txs.is_empty() {
            return Err(Error::BadRequest);
        }

        for tx in &txs {
            if !tx.is_coinbase() && !self.verify_transaction(tx)? {
                return Err(Error::BadRequest);
            }
        }

        let timestamp = current_timestamp();
        let block = Block::new(txs, self.tip, timestamp, self.target_bits)?;

        debug!("mined block {} at height after tip {}", hex::encode(block.hash), hex::encode(self.tip));

        self.store.commit_block(&block.hash, &bincode::serialize(&block)?, |chainstate| {
            UtxoSet::apply_block(chainstate, &block)
        })?;

        self.tip = block.hash;
        info!("committed block {}", hex::encode(block.hash));

        Ok(block)
    }

    /// Linear reverse scan from tip to genesis; first matching transaction
    /// id is returned.
    pub fn find_tx(&self, id: &[u8; 32]) -> Result<Transaction> {
        for block in self.iter() {
            let block = block?;
            if let Some(tx) = block.transactions.iter().find(|tx| &tx.id == id) {
                return Ok(tx.clone());
            }
        }
        Err(Error::NotFound)
    }

    fn prev_tx_map(&self, tx: &Transaction) -> Result<HashMap<[u8; 32], Transaction>> {
        let mut map = HashMap::new();
        for input in &tx.inputs {
            if !map.contains_key(&input.tx_id) {
                let prev = self.find_tx(&input.tx_id)?;
                map.insert(prev.id, prev);
            }
        }
        Ok(map)
    }

    pub fn sign_tx(&self, tx: &mut Transaction, signing_key: &p256::ecdsa::SigningKey) -> Result<()> {
        let prev_txs = self.prev_tx_map(tx)?;
        tx.sign(signing_key, &prev_txs)
    }

    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        if tx.is_coinbase() {
            return Ok(true);
        }
        let prev_txs = self.prev_tx_map(tx)?;
        tx.verify(&prev_txs)
    }

    /// Collects every block from tip to genesis, for reindexing (§4.6).
    pub fn all_blocks(&self) -> Result<Vec<Block>> {
        self.iter().collect()
    }

    /// Tip-to-genesis iterator: starts at the tip, loads each block, and
    /// advances to `prev_block_hash`; terminates after yielding genesis.
    pub fn iter(&self) -> BlockchainIterator<'_> {
        BlockchainIterator {
            store: &self.store,
            current_hash: Some(self.tip),
        }
    }
}

pub struct BlockchainIterator<'a> {
    store: &'a Store,
    current_hash: Option<[u8; 32]>,
}

impl<'a> Iterator for BlockchainIterator<'a> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current_hash?;
        let result = (|| -> Result<Block> {
            let encoded = self.store.get_block(&hash)?.ok_or(Error::NotFound)?;
            let block: Block = bincode::deserialize(&encoded)?;
            Ok(block)
        })();

        match result {
            Ok(block) => {
                self.current_hash = if block.prev_block_hash == [0u8; 32] {
                    None
                } else {
                    Some(block.prev_block_hash)
                };
                Some(Ok(block))
            }
            Err(e) => {
                self.current_hash = None;
                Some(Err(e))
            }
        }
    }
}

fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::utxo::UtxoSet;
    use crate::crypto::keys::Wallet;
    use tempfile::tempdir;

    #[test]
    fn genesis_chain_has_length_one_and_expected_balance() {
        let dir = tempdir().unwrap();
        let wallet = Wallet::new();
        let chain = Blockchain::open_or_create(dir.path(), &wallet.address(), 16).unwrap();

        let blocks = chain.all_blocks().unwrap();
        assert_eq!(blocks.len(), 1);

        let utxo = UtxoSet::new(chain.store());
        utxo.reindex(&blocks).unwrap();
        assert_eq!(utxo.balance(&wallet.address()).unwrap(), crate::config::SUBSIDY);
    }

    #[test]
    fn reopening_an_existing_chain_preserves_the_tip() {
        let dir = tempdir().unwrap();
        let wallet = Wallet::new();
        let tip = {
            let chain = Blockchain::open_or_create(dir.path(), &wallet.address(), 16).unwrap();
            chain.tip()
        };

        let reopened = Blockchain::open_or_create(dir.path(), &wallet.address(), 16).unwrap();
        assert_eq!(reopened.tip(), tip);
    }

    #[test]
    fn mine_block_rejects_empty_transaction_list() {
        let dir = tempdir().unwrap();
        let wallet = Wallet::new();
        let mut chain = Blockchain::open_or_create(dir.path(), &wallet.address(), 16).unwrap();

        let err = chain.mine_block(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::BadRequest));
    }

    #[test]
    fn simple_transfer_updates_balances() {
        let dir = tempdir().unwrap();
        let a = Wallet::new();
        let b = Wallet::new();
        let mut chain = Blockchain::open_or_create(dir.path(), &a.address(), 16).unwrap();

        let blocks = chain.all_blocks().unwrap();
        let utxo = UtxoSet::new(chain.store());
        utxo.reindex(&blocks).unwrap();

        let funding_id = blocks[0].transactions[0].id;
        let funding_value = blocks[0].transactions[0].outputs[0].value;

        let mut prev_txs = HashMap::new();
        prev_txs.insert(funding_id, blocks[0].transactions[0].clone());
        let spendable = vec![((funding_id, 0u32), funding_value)];

        let mut spend =
            Transaction::new_unsigned(&a, &b.address(), 4, spendable, funding_value).unwrap();
        spend.sign(&a.signing_key().unwrap(), &prev_txs).unwrap();

        let coinbase = Transaction::new_coinbase(&a.address(), Vec::new()).unwrap();
        chain.mine_block(vec![coinbase, spend]).unwrap();

        let blocks = chain.all_blocks().unwrap();
        utxo.reindex(&blocks).unwrap();

        assert_eq!(utxo.balance(&a.address()).unwrap(), funding_value - 4 + crate::config::SUBSIDY);
        assert_eq!(utxo.balance(&b.address()).unwrap(), 4);
    }

    #[test]
    fn iterator_terminates_after_genesis() {
        let dir = tempdir().unwrap();
        let wallet = Wallet::new();
        let chain = Blockchain::open_or_create(dir.path(), &wallet.address(), 16).unwrap();

        let blocks: Vec<_> = chain.iter().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].prev_block_hash, [0u8; 32]);
    }

    #[test]
    fn find_tx_locates_coinbase_by_id() {
        let dir = tempdir().unwrap();
        let wallet = Wallet::new();
        let chain = Blockchain::open_or_create(dir.path(), &wallet.address(), 16).unwrap();
        let blocks = chain.all_blocks().unwrap();
        let coinbase_id = blocks[0].transactions[0].id;

        let found = chain.find_tx(&coinbase_id).unwrap();
        assert_eq!(found.id, coinbase_id);
    }

    #[test]
    fn find_tx_reports_not_found_for_unknown_id() {
        let dir = tempdir().unwrap();
        let wallet = Wallet::new();
        let chain = Blockchain::open_or_create(dir.path(), &wallet.address(), 16).unwrap();

        let err = chain.find_tx(&[9u8; 32]).unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }
}
