// Append-only ledger: blocks, confirmed transactions and the UTXO set

mod config;
pub mod genesis;

pub use config::ChainConfig;
pub use genesis::{GENESIS_TIME, GenesisError, genesis_block, genesis_wallets};

use crate::consensus::{BlockError, BlockValidator, Target};
use crate::core::{Block, Env, Transaction};
use crate::storage::{BlockStore, InMemUtxoDatabase, StoreError, TxDatabase, Utxo, UtxoDatabase, UtxoError};
use std::collections::HashSet;
use std::fmt::Display;

/// Log and abort on a broken ledger invariant
fn consistency_fault(what: impl Display) -> ! {
    log::error!("Ledger consistency fault: {}", what);
    panic!("ledger consistency fault: {}", what);
}

/// The ledger. Only the miner mutates it, through `append`.
pub struct BlockChain {
    env: Env,
    config: ChainConfig,
    blocks: BlockStore,
    txs: TxDatabase,
    utxos: Box<dyn UtxoDatabase>,
}

impl BlockChain {
    /// Chain holding only the genesis block, backed by an in-memory UTXO set
    pub fn genesis(env: Env, config: ChainConfig) -> Result<Self, BlockError> {
        Self::with_utxo_database(env, config, Box::new(InMemUtxoDatabase::new()))
    }

    /// Chain holding only the genesis block over a caller supplied UTXO set
    pub fn with_utxo_database(
        env: Env,
        config: ChainConfig,
        utxos: Box<dyn UtxoDatabase>,
    ) -> Result<Self, BlockError> {
        let config = config.normalized()?;
        let block = match genesis_block(&config.genesis_difficulty) {
            Ok(block) => block,
            Err(GenesisError::Hash(e)) => return Err(e.into()),
            Err(GenesisError::Wallet(e)) => consistency_fault(e),
        };

        let mut chain = Self {
            env,
            config,
            blocks: BlockStore::new(),
            txs: TxDatabase::new(),
            utxos,
        };
        chain.append(block)?;
        Ok(chain)
    }

    /// Validate `block` against the tip and commit it.
    ///
    /// Rejections leave the ledger untouched. Duplicate hashes or heights
    /// and spends of missing outputs are consistency faults and panic, also
    /// before anything is written.
    pub fn append(&mut self, block: Block) -> Result<(), BlockError> {
        let difficulty = self.next_difficulty()?;
        BlockValidator::new(self.blocks.tip(), difficulty).validate_block(&block, |hash| self.txs.get(hash))?;

        let spent = self.check_commit(&block);

        for tx in &block.transactions {
            if let Err(e) = self.txs.insert(tx.clone()) {
                consistency_fault(e);
            }
        }
        for utxo in &spent {
            if let Err(e) = self.utxos.remove(utxo) {
                consistency_fault(e);
            }
        }
        for tx in &block.transactions {
            for output in &tx.outputs {
                if let Err(e) = self.utxos.add(Utxo::from_output(output)) {
                    consistency_fault(e);
                }
            }
        }

        log::info!(
            "Appended block {} at height {} with {} transactions ({} confirmed, {} unspent outputs)",
            block.hash,
            block.height,
            block.transactions.len(),
            self.txs.len(),
            self.utxos.count()
        );

        if let Err(e) = self.blocks.insert(block) {
            consistency_fault(e);
        }
        Ok(())
    }

    /// UTXOs spent by `block`. Panics if committing it would break the
    /// ledger, before any write.
    fn check_commit(&self, block: &Block) -> Vec<Utxo> {
        if let Err(e) = self.blocks.check_insert(block) {
            consistency_fault(e);
        }

        let mut hashes = HashSet::new();
        for tx in &block.transactions {
            if let Err(e) = self.txs.check_insert(tx) {
                consistency_fault(e);
            }
            if !hashes.insert(tx.hash.as_str()) {
                consistency_fault(StoreError::DuplicateTransaction(tx.hash.clone()));
            }
        }

        let mut spent: Vec<Utxo> = Vec::new();
        for input in block.transactions.iter().flat_map(|tx| &tx.inputs) {
            let utxo = Utxo::from_output(&input.output);
            if spent.contains(&utxo) || !self.utxos(&utxo.address).contains(&utxo) {
                consistency_fault(UtxoError::NotFound {
                    address: utxo.address,
                    tx_hash: utxo.tx_hash,
                    index: utxo.tx_output_index,
                });
            }
            spent.push(utxo);
        }
        spent
    }

    /// Difficulty the next block must carry
    pub fn next_difficulty(&self) -> Result<String, BlockError> {
        let tip = match self.blocks.tip() {
            Some(tip) if tip.height > 0 => tip,
            _ => return Ok(self.config.genesis_difficulty.clone()),
        };

        let interval = self.config.retarget_interval;
        if (tip.height + 1) % interval != 0 {
            return Ok(tip.difficulty.clone());
        }

        let mut first = tip;
        for _ in 0..interval - 1 {
            first = match self.blocks.get(&first.pre_hash) {
                Some(parent) => parent,
                None => consistency_fault(format!("missing parent {} of block {}", first.pre_hash, first.hash)),
            };
        }

        let target_span = self.config.target_timespan;
        let actual_span = (tip.timestamp - first.timestamp).clamp(target_span / 4, target_span.saturating_mul(4));
        let next = Target::from_hex(&tip.difficulty)?.scale(actual_span, target_span)?;

        log::info!(
            "Retarget at height {}: span {} ms (target {} ms), difficulty {} -> {} ({} leading zeros)",
            tip.height + 1,
            actual_span,
            target_span,
            tip.difficulty,
            next.as_str(),
            next.leading_zeros()
        );
        Ok(next.into_string())
    }

    /// Unsealed block on top of the tip. `txs[0]` must be the coinbase.
    pub fn new_block(&self, txs: Vec<Transaction>) -> Result<Block, BlockError> {
        let pre = self.tip();
        let mut block = Block::new(
            self.env.unix_time(),
            pre.hash.clone(),
            pre.height + 1,
            txs,
            self.next_difficulty()?,
        )?;
        block.pre_tx_sum = pre.pre_tx_sum + pre.tx_count;
        block.pre_output_sum = pre.pre_output_sum + pre.output_count();
        Ok(block)
    }

    /// Number of blocks, genesis included
    pub fn size(&self) -> usize {
        self.blocks.len()
    }

    pub fn tip(&self) -> &Block {
        match self.blocks.tip() {
            Some(tip) => tip,
            None => consistency_fault("chain has no genesis block"),
        }
    }

    pub fn block(&self, hash: &str) -> Option<&Block> {
        self.blocks.get(hash)
    }

    pub fn block_at(&self, height: u64) -> Option<&Block> {
        self.blocks.get_by_height(height)
    }

    pub fn transaction(&self, hash: &str) -> Option<&Transaction> {
        self.txs.get(hash)
    }

    /// Confirmed UTXOs of `address`, oldest first
    pub fn utxos(&self, address: &str) -> Vec<Utxo> {
        match self.utxos.get(address) {
            Ok(utxos) => utxos,
            Err(e) => consistency_fault(e),
        }
    }

    pub fn balance(&self, address: &str) -> i64 {
        crate::storage::total(&self.utxos(address))
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}
