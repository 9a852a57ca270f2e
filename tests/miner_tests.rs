//! Miner task driven directly, without a pool

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, watch};
use utxo_chain::chain::{GENESIS_TIME, genesis_wallets};
use utxo_chain::wallet::TransactionBuilder;
use utxo_chain::*;

#[tokio::test]
async fn test_miner_seals_full_batch() {
    let chain = BlockChain::genesis(Env::stepping(GENESIS_TIME, 1_000), ChainConfig::testing()).unwrap();
    let wallets = genesis_wallets().unwrap();
    let tx = {
        let builder = TransactionBuilder::new(&chain);
        let selected = builder.select_utxos(wallets[0].address(), 40, &HashSet::new()).unwrap();
        builder.build(&wallets[0], wallets[1].address(), 40, vec![], &selected).unwrap()
    };

    let chain: SharedChain = Arc::new(RwLock::new(chain));
    let miner = Wallet::generate();
    let (tx_sender, transactions) = mpsc::channel(4);
    let (confirm, mut confirmed) = mpsc::unbounded_channel();
    let (height, mut height_rx) = watch::channel(0u64);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let config = MinerConfig {
        batch_size: 1,
        ..MinerConfig::default()
    };
    let task = Miner::spawn(chain.clone(), miner.clone(), config, transactions, confirm, height, shutdown_rx);

    tx_sender.send(tx.clone()).await.unwrap();
    let block = confirmed.recv().await.unwrap();
    height_rx.wait_for(|h| *h == 1).await.unwrap();

    assert_eq!(block.height, 1);
    assert_eq!(block.transactions[1], tx);
    assert!(!block.nonce.is_empty());
    assert_eq!(block.hash, block.hash_with(&block.nonce));
    assert!(block.hash.as_str() < block.difficulty.as_str());
    {
        let chain = chain.read().await;
        assert_eq!(chain.tip(), &block);
        assert_eq!(chain.balance(miner.address()), 50);
        assert_eq!(chain.balance(wallets[1].address()), 140);
    }

    shutdown.send_replace(true);
    task.await.unwrap();
}
