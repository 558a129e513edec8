//! Persistent key-value store backing the chain and its UTXO index: two
//! `sled` trees standing in for the original design's two buckets, with
//! atomic cross-tree commits where the spec requires them (§4.5).

use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use sled::{Db, Transactional, Tree};

use crate::config::{BLOCKS_BUCKET, TIP_KEY, UTXO_BUCKET};
use crate::error::{Error, Result};

pub struct Store {
    #[allow(dead_code)]
    db: Db,
    pub blocks: Tree,
    pub chainstate: Tree,
}

impl Store {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let blocks = db.open_tree(BLOCKS_BUCKET)?;
        let chainstate = db.open_tree(UTXO_BUCKET)?;
        Ok(Self { db, blocks, chainstate })
    }

    pub fn tip(&self) -> Result<Option<[u8; 32]>> {
        match self.blocks.get(TIP_KEY)? {
            Some(bytes) => Ok(Some(to_hash(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_block(&self, hash: &[u8; 32]) -> Result<Option<Vec<u8>>> {
        Ok(self.blocks.get(hash)?.map(|v| v.to_vec()))
    }

    /// Persists a mined block's encoded bytes under its hash and advances
    /// the tip, in the same `sled` transaction as `utxo_update` — the atomic
    /// pairing §4.5 requires between the chain and its UTXO index.
    pub fn commit_block(
        &self,
        hash: &[u8; 32],
        encoded_block: &[u8],
        utxo_update: impl Fn(&TransactionalTree) -> std::result::Result<(), ConflictableTransactionError<Error>>,
    ) -> Result<()> {
        (&self.blocks, &self.chainstate)
            .transaction(|(blocks, chainstate)| {
                blocks.insert(hash.as_slice(), encoded_block)?;
                blocks.insert(TIP_KEY, hash.as_slice())?;
                utxo_update(chainstate)?;
                Ok(())
            })
            .map_err(Error::from)
    }
}

fn to_hash(bytes: &[u8]) -> Result<[u8; 32]> {
    bytes.try_into().map_err(|_| Error::Internal("corrupt tip pointer".into()))
}
