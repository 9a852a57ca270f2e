// Miner - batches pool transactions into proof-of-work blocks

use crate::consensus::{BlockError, MiningResult, mine};
use crate::core::{Block, HashError, Transaction};
use crate::node::SharedChain;
use crate::wallet::Wallet;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Miner parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerConfig {
    /// Pool transactions per block, coinbase excluded
    pub batch_size: usize,
    /// Coins paid by each coinbase
    pub reward: i64,
    /// Nonce attempts between shutdown checks
    pub poll_interval: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            reward: 50,
            poll_interval: 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum MinerError {
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error("nonce search task failed: {0}")]
    Search(#[from] tokio::task::JoinError),
}

/// Single task owning the pending batch
pub struct Miner {
    chain: SharedChain,
    wallet: Wallet,
    config: MinerConfig,
    pending: Vec<Transaction>,
    transactions: mpsc::Receiver<Transaction>,
    confirmed: mpsc::UnboundedSender<Block>,
    height: watch::Sender<u64>,
    shutdown: watch::Receiver<bool>,
}

impl Miner {
    /// Start the miner task. Mined blocks are reported on `confirmed` and
    /// their height published on `height`.
    pub fn spawn(
        chain: SharedChain,
        wallet: Wallet,
        config: MinerConfig,
        transactions: mpsc::Receiver<Transaction>,
        confirmed: mpsc::UnboundedSender<Block>,
        height: watch::Sender<u64>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let miner = Self {
            chain,
            wallet,
            config,
            pending: Vec::new(),
            transactions,
            confirmed,
            height,
            shutdown,
        };
        tokio::spawn(miner.run())
    }

    async fn run(mut self) {
        log::info!("Miner {} started", self.wallet.address());

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                tx = self.transactions.recv() => match tx {
                    Some(tx) => self.on_transaction(tx).await,
                    None => break,
                },
            }
        }

        if !self.pending.is_empty() {
            log::warn!("Miner stopped with {} unmined transactions", self.pending.len());
        }
        log::info!("Miner stopped");
    }

    async fn on_transaction(&mut self, tx: Transaction) {
        self.pending.push(tx);
        if self.pending.len() < self.config.batch_size.max(1) {
            log::debug!("Miner holds {} transactions", self.pending.len());
            return;
        }

        let batch = std::mem::take(&mut self.pending);
        match self.mine_batch(batch).await {
            Ok(Some(block)) => {
                let height = block.height;
                if self.confirmed.send(block).is_err() {
                    log::warn!("Pool is gone, reservations will not be released");
                }
                self.height.send_replace(height);
            }
            Ok(None) => {}
            Err(e) => log::error!("Failed to mine block: {}", e),
        }
    }

    /// Coinbase-prefixed block over `batch`, sealed and appended. None if
    /// the search was cancelled by shutdown.
    async fn mine_batch(&self, batch: Vec<Transaction>) -> Result<Option<Block>, MinerError> {
        let block = {
            let chain = self.chain.read().await;
            let height = chain.tip().height + 1;
            let coinbase = Transaction::coinbase(
                chain.env().unix_time(),
                height,
                self.config.reward,
                self.wallet.lock_script(),
                self.wallet.address(),
            )?;

            let mut txs = Vec::with_capacity(batch.len() + 1);
            txs.push(coinbase);
            txs.extend(batch);
            chain.new_block(txs)?
        };

        let shutdown = self.shutdown.clone();
        let poll_interval = self.config.poll_interval;
        let (mut block, mut result) = tokio::task::spawn_blocking(move || {
            let result: MiningResult = mine(&block, poll_interval, || {
                *shutdown.borrow() || shutdown.has_changed().is_err()
            });
            (block, result)
        })
        .await?;

        let Some(found) = result.found.take() else {
            log::info!("Abandoned block {} on shutdown", block.height);
            return Ok(None);
        };

        block.seal(found);
        log::info!(
            "Mined block [{}] with hash {} after {} attempts ({:.0} H/s)",
            block.height,
            block.hash,
            result.attempts,
            result.hash_rate()
        );

        self.chain.write().await.append(block.clone())?;
        Ok(Some(block))
    }
}
