// In-memory block and transaction indexes

use crate::core::{Block, Transaction};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("block {0} already stored")]
    DuplicateBlock(String),
    #[error("height {0} already stored")]
    DuplicateHeight(u64),
    #[error("transaction {0} already stored")]
    DuplicateTransaction(String),
}

/// Blocks by hash, a height index and the tip pointer
#[derive(Debug, Default)]
pub struct BlockStore {
    blocks: HashMap<String, Block>,
    heights: HashMap<u64, String>,
    tip: Option<String>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `block` can be stored without overwriting anything
    pub fn check_insert(&self, block: &Block) -> Result<(), StoreError> {
        if self.blocks.contains_key(&block.hash) {
            return Err(StoreError::DuplicateBlock(block.hash.clone()));
        }
        if self.heights.contains_key(&block.height) {
            return Err(StoreError::DuplicateHeight(block.height));
        }
        Ok(())
    }

    /// Store a block and make it the tip
    pub fn insert(&mut self, block: Block) -> Result<(), StoreError> {
        self.check_insert(&block)?;
        self.heights.insert(block.height, block.hash.clone());
        self.tip = Some(block.hash.clone());
        self.blocks.insert(block.hash.clone(), block);
        Ok(())
    }

    /// Get a block by hash
    pub fn get(&self, hash: &str) -> Option<&Block> {
        self.blocks.get(hash)
    }

    /// Get block by height
    pub fn get_by_height(&self, height: u64) -> Option<&Block> {
        self.heights.get(&height).and_then(|hash| self.blocks.get(hash))
    }

    pub fn tip(&self) -> Option<&Block> {
        self.tip.as_ref().and_then(|hash| self.blocks.get(hash))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }
}

/// Confirmed transactions by hash
#[derive(Debug, Default)]
pub struct TxDatabase {
    txs: HashMap<String, Transaction>,
}

impl TxDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_insert(&self, tx: &Transaction) -> Result<(), StoreError> {
        if self.txs.contains_key(&tx.hash) {
            return Err(StoreError::DuplicateTransaction(tx.hash.clone()));
        }
        Ok(())
    }

    pub fn insert(&mut self, tx: Transaction) -> Result<(), StoreError> {
        self.check_insert(&tx)?;
        self.txs.insert(tx.hash.clone(), tx);
        Ok(())
    }

    pub fn get(&self, hash: &str) -> Option<&Transaction> {
        self.txs.get(hash)
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }
}
