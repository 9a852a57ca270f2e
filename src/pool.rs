// Transaction pool - turns spend requests into signed transactions

use crate::core::{Block, MAX_EXTRA_LEN, Transaction};
use crate::node::SharedChain;
use crate::storage::{InMemUtxoDatabase, Utxo, UtxoDatabase};
use crate::wallet::{AddressError, BuildError, TransactionBuilder, Wallet, address_to_pubkey_hash};
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Pool parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Capacity of the pool to miner queue
    pub queue_depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { queue_depth: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("extra is {0} bytes, max {MAX_EXTRA_LEN}")]
    MemoTooLong(usize),
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("invalid fee {0}")]
    InvalidFee(i64),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("transaction pool stopped")]
    Stopped,
}

/// Spend request: move `fee` coins from `from` to `to`, signed by `wallet`
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub from: String,
    pub to: String,
    pub fee: i64,
    pub extra: String,
    pub wallet: Wallet,
}

impl TxRequest {
    /// Request spending from the wallet's own address
    pub fn new(wallet: &Wallet, to: impl Into<String>, fee: i64, extra: impl Into<String>) -> Self {
        Self {
            from: wallet.address().to_string(),
            to: to.into(),
            fee,
            extra: extra.into(),
            wallet: wallet.clone(),
        }
    }

    /// Checks that need no pool state
    fn check(&self) -> Result<(), PoolError> {
        if self.extra.len() > MAX_EXTRA_LEN {
            return Err(PoolError::MemoTooLong(self.extra.len()));
        }
        address_to_pubkey_hash(&self.from)?;
        address_to_pubkey_hash(&self.to)?;
        if self.fee <= 0 {
            return Err(PoolError::InvalidFee(self.fee));
        }
        Ok(())
    }
}

enum Command {
    Transform {
        request: TxRequest,
        reply: oneshot::Sender<Result<Transaction, PoolError>>,
    },
    Reserved {
        address: String,
        reply: oneshot::Sender<Vec<Utxo>>,
    },
}

/// Handle to the pool task. Clones share the same task.
#[derive(Clone)]
pub struct TxPool {
    commands: mpsc::Sender<Command>,
}

impl TxPool {
    /// Start the pool task.
    ///
    /// Accepted transactions are forwarded on the returned receiver; blocks
    /// arriving on `confirmed` release the reservations of their inputs.
    pub fn spawn(
        chain: SharedChain,
        config: PoolConfig,
        confirmed: mpsc::UnboundedReceiver<Block>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, mpsc::Receiver<Transaction>, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(config.queue_depth.max(1));
        let (miner_tx, miner_rx) = mpsc::channel(config.queue_depth.max(1));

        let worker = PoolWorker {
            chain,
            reserved: InMemUtxoDatabase::new(),
            commands: commands_rx,
            confirmed,
            miner: miner_tx,
            shutdown,
        };
        let handle = tokio::spawn(worker.run());

        (Self { commands: commands_tx }, miner_rx, handle)
    }

    /// Build, sign and reserve a spend, then hand it to the miner
    pub async fn transform(&self, request: TxRequest) -> Result<Transaction, PoolError> {
        request.check()?;

        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Transform { request, reply })
            .await
            .map_err(|_| PoolError::Stopped)?;
        response.await.map_err(|_| PoolError::Stopped)?
    }

    /// UTXOs of `address` held by pending transactions
    pub async fn reserved(&self, address: &str) -> Result<Vec<Utxo>, PoolError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Reserved {
                address: address.to_string(),
                reply,
            })
            .await
            .map_err(|_| PoolError::Stopped)?;
        response.await.map_err(|_| PoolError::Stopped)
    }
}

/// Task state, owned by exactly one task
struct PoolWorker {
    chain: SharedChain,
    reserved: InMemUtxoDatabase,
    commands: mpsc::Receiver<Command>,
    confirmed: mpsc::UnboundedReceiver<Block>,
    miner: mpsc::Sender<Transaction>,
    shutdown: watch::Receiver<bool>,
}

impl PoolWorker {
    async fn run(mut self) {
        log::info!("Transaction pool started");

        loop {
            // Confirmations are drained before new requests
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                Some(block) = self.confirmed.recv() => self.release(&block),
                command = self.commands.recv() => match command {
                    Some(Command::Transform { request, reply }) => {
                        let result = self.transform(request).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Reserved { address, reply }) => {
                        let reserved = self.reserved.get(&address).unwrap_or_default();
                        let _ = reply.send(reserved);
                    }
                    None => break,
                },
            }
        }

        log::info!("Transaction pool stopped");
    }

    async fn transform(&mut self, request: TxRequest) -> Result<Transaction, PoolError> {
        let tx = {
            let chain = self.chain.read().await;
            let builder = TransactionBuilder::new(&chain);

            let reserved: HashSet<Utxo> = self.reserved.get(&request.from).unwrap_or_default().into_iter().collect();
            let selected = match builder.select_utxos(&request.from, request.fee, &reserved) {
                Ok(selected) => selected,
                Err(e) => {
                    log::debug!("Rejected request {} -> {} ({}): {}", request.from, request.to, request.fee, e);
                    return Err(e.into());
                }
            };

            let tx = builder.build(
                &request.wallet,
                &request.to,
                request.fee,
                request.extra.into_bytes(),
                &selected,
            )?;

            for utxo in selected {
                if let Err(e) = self.reserved.add(utxo) {
                    log::error!("Reserving an already reserved output: {}", e);
                    panic!("pool consistency fault: {}", e);
                }
            }
            tx
        };

        log::info!("Pool accepted transaction {} paying {} to {}", tx.hash, request.fee, request.to);

        if self.miner.send(tx.clone()).await.is_err() {
            log::warn!("Miner is gone, transaction {} will not be mined", tx.hash);
        }
        Ok(tx)
    }

    /// Drop the reservations spent by a confirmed block
    fn release(&mut self, block: &Block) {
        let mut released = 0;
        for tx in &block.transactions {
            for input in &tx.inputs {
                if let Err(e) = self.reserved.remove(&Utxo::from_output(&input.output)) {
                    log::error!("Block {} spends an unreserved output: {}", block.hash, e);
                    panic!("pool consistency fault: {}", e);
                }
                released += 1;
            }
        }
        log::debug!("Released {} reserved outputs for block {}", released, block.height);
    }
}
