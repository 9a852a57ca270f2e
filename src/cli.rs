// CLI commands

use crate::chain::{ChainConfig, GenesisError, genesis_block, genesis_wallets};
use crate::consensus::BlockError;
use crate::core::Env;
use crate::miner::MinerConfig;
use crate::node::{Node, NodeConfig};
use crate::pool::TxRequest;
use crate::wallet::{Wallet, WalletError};
use clap::{Parser, Subcommand};
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "utxo-chain")]
#[command(about = "Educational UTXO blockchain engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the genesis block as JSON
    Genesis,

    /// Start a node and drive random transfers between the genesis accounts
    Run {
        /// Number of spend requests to submit
        #[arg(short, long, default_value = "9")]
        requests: usize,

        /// Pool transactions per block
        #[arg(short, long, default_value = "3")]
        batch_size: usize,

        /// Coinbase reward
        #[arg(long, default_value = "50")]
        reward: i64,

        /// Largest amount moved by a single request
        #[arg(long, default_value = "10")]
        max_fee: i64,

        /// Use an easy difficulty so blocks are found quickly
        #[arg(long)]
        easy: bool,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Genesis(#[from] GenesisError),
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("max fee must be positive, got {0}")]
    InvalidMaxFee(i64),
}

/// CLI handler
#[derive(Default)]
pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    /// Handle CLI command
    pub async fn handle(&self, cli: Cli) -> Result<(), CliError> {
        match cli.command {
            Commands::Genesis => self.genesis(),
            Commands::Run {
                requests,
                batch_size,
                reward,
                max_fee,
                easy,
            } => {
                let chain = if easy { ChainConfig::testing() } else { ChainConfig::default() };
                let miner = MinerConfig {
                    batch_size,
                    reward,
                    ..MinerConfig::default()
                };
                self.run(chain, miner, requests, max_fee).await
            }
        }
    }

    fn genesis(&self) -> Result<(), CliError> {
        let block = genesis_block(&ChainConfig::default().genesis_difficulty)?;
        println!("{}", serde_json::to_string_pretty(&block)?);
        Ok(())
    }

    async fn run(&self, chain: ChainConfig, miner: MinerConfig, requests: usize, max_fee: i64) -> Result<(), CliError> {
        if max_fee <= 0 {
            return Err(CliError::InvalidMaxFee(max_fee));
        }

        let accounts = genesis_wallets()?;
        let batch_size = miner.batch_size.max(1);
        let config = NodeConfig {
            chain,
            miner,
            ..NodeConfig::default()
        };
        let node = Node::start(Env::system(), config, Wallet::generate())?;

        let mut accepted = 0;
        for i in 0..requests {
            let (from, to, fee) = {
                let mut rng = rand::thread_rng();
                let pair: Vec<&Wallet> = accounts.choose_multiple(&mut rng, 2).collect();
                (pair[0], pair[1], rng.gen_range(1..=max_fee))
            };

            let request = TxRequest::new(from, to.address(), fee, format!("transfer {}", i));
            match node.transform(request).await {
                Ok(tx) => {
                    accepted += 1;
                    println!("[{}] {} -> {} : {} ({})", i, from.address(), to.address(), fee, tx.hash);
                }
                Err(e) => println!("[{}] {} -> {} : {} rejected: {}", i, from.address(), to.address(), fee, e),
            }
        }

        let blocks = (accepted / batch_size) as u64;
        if blocks > 0 && !node.wait_for_height(blocks).await {
            log::warn!("Miner stopped before reaching height {}", blocks);
        }

        {
            let chain = node.chain();
            let chain = chain.read().await;
            println!("Chain height: {} ({} blocks)", chain.tip().height, chain.size());
            println!("Tip: {}", chain.tip().hash);
            for account in &accounts {
                println!("  {} {}", account.address(), chain.balance(account.address()));
            }
            println!("  {} {} (miner)", node.miner_address(), chain.balance(node.miner_address()));
        }

        node.shutdown().await;
        Ok(())
    }
}
