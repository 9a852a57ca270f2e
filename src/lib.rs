// Educational UTXO chain: script VM, P-256 wallets, proof-of-work ledger,
// a reserving transaction pool and a batching miner

pub mod core;
pub mod consensus;
pub mod storage;
pub mod chain;
pub mod wallet;
pub mod pool;
pub mod miner;
pub mod node;
pub mod cli;

// Re-exports for convenience
pub use crate::core::{Block, Env, Input, Output, Script, Transaction, TxType};
pub use crate::consensus::{BlockError, Target};
pub use crate::chain::{BlockChain, ChainConfig};
pub use crate::storage::{InMemUtxoDatabase, Utxo, UtxoDatabase};
pub use crate::wallet::Wallet;
pub use crate::pool::{PoolConfig, PoolError, TxPool, TxRequest};
pub use crate::miner::{Miner, MinerConfig};
pub use crate::node::{Node, NodeConfig, SharedChain};
pub use crate::cli::{Cli, CliHandler};
