// Node - wires the ledger, the transaction pool and the miner together

use crate::chain::{BlockChain, ChainConfig};
use crate::consensus::BlockError;
use crate::core::{Env, Transaction};
use crate::miner::{Miner, MinerConfig};
use crate::pool::{PoolConfig, PoolError, TxPool, TxRequest};
use crate::wallet::Wallet;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;

/// Ledger shared between tasks. Only the miner takes the write lock.
pub type SharedChain = Arc<RwLock<BlockChain>>;

#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub chain: ChainConfig,
    pub pool: PoolConfig,
    pub miner: MinerConfig,
}

/// Running node
pub struct Node {
    chain: SharedChain,
    pool: TxPool,
    miner_address: String,
    height: watch::Receiver<u64>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Node {
    /// Build the genesis chain and spawn the pool and miner tasks.
    /// Must be called inside a tokio runtime.
    pub fn start(env: Env, config: NodeConfig, miner_wallet: Wallet) -> Result<Self, BlockError> {
        let chain: SharedChain = Arc::new(RwLock::new(BlockChain::genesis(env, config.chain)?));

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (height_tx, height) = watch::channel(0);
        let (confirmed_tx, confirmed_rx) = mpsc::unbounded_channel();

        let (pool, transactions, pool_task) =
            TxPool::spawn(chain.clone(), config.pool, confirmed_rx, shutdown_rx.clone());
        let miner_address = miner_wallet.address().to_string();
        let miner_task = Miner::spawn(
            chain.clone(),
            miner_wallet,
            config.miner,
            transactions,
            confirmed_tx,
            height_tx,
            shutdown_rx,
        );

        log::info!("Node started, miner address {}", miner_address);

        Ok(Self {
            chain,
            pool,
            miner_address,
            height,
            shutdown,
            tasks: vec![pool_task, miner_task],
        })
    }

    pub fn chain(&self) -> SharedChain {
        self.chain.clone()
    }

    pub fn pool(&self) -> TxPool {
        self.pool.clone()
    }

    pub fn miner_address(&self) -> &str {
        &self.miner_address
    }

    /// Submit a spend request and wait for the signed transaction
    pub async fn transform(&self, request: TxRequest) -> Result<Transaction, PoolError> {
        self.pool.transform(request).await
    }

    /// Wait until the miner has appended a block at `height` or above.
    /// Returns false if the miner stopped first.
    pub async fn wait_for_height(&self, height: u64) -> bool {
        let mut rx = self.height.clone();
        rx.wait_for(|h| *h >= height).await.is_ok()
    }

    /// Signal both tasks and wait for them to finish
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                log::error!("Task failed during shutdown: {}", e);
            }
        }
        log::info!("Node stopped");
    }
}
