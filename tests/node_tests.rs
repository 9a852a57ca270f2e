//! End-to-end: requests flow through the pool into mined, appended blocks

use utxo_chain::chain::{GENESIS_TIME, genesis_wallets};
use utxo_chain::wallet::BuildError;
use utxo_chain::*;

fn start(batch_size: usize) -> Node {
    let config = NodeConfig {
        chain: ChainConfig::testing(),
        miner: MinerConfig {
            batch_size,
            ..MinerConfig::default()
        },
        ..NodeConfig::default()
    };
    Node::start(Env::stepping(GENESIS_TIME, 1_000), config, Wallet::generate()).unwrap()
}

#[tokio::test]
async fn test_genesis_to_mined_block() {
    let node = start(2);
    let wallets = genesis_wallets().unwrap();
    let genesis_utxo = node.chain().read().await.utxos(wallets[0].address())[0].clone();

    let a = node.transform(TxRequest::new(&wallets[0], wallets[1].address(), 30, "a")).await.unwrap();
    let b = node.transform(TxRequest::new(&wallets[2], wallets[3].address(), 100, "b")).await.unwrap();
    assert!(node.wait_for_height(1).await);

    {
        let chain = node.chain();
        let chain = chain.read().await;
        assert_eq!(chain.size(), 2);

        let tip = chain.tip();
        assert_eq!(tip.height, 1);
        assert_eq!(tip.transactions.len(), 3);
        assert!(tip.transactions[0].is_coinbase());
        assert_eq!(tip.transactions[1], a);
        assert_eq!(tip.transactions[2], b);

        assert!(!chain.utxos(wallets[0].address()).contains(&genesis_utxo));
        assert_eq!(chain.balance(wallets[0].address()), 70);
        assert_eq!(chain.balance(wallets[1].address()), 130);
        assert_eq!(chain.balance(wallets[2].address()), 0);
        assert_eq!(chain.balance(wallets[3].address()), 200);
        assert_eq!(chain.balance(node.miner_address()), 50);
    }

    assert!(node.pool().reserved(wallets[0].address()).await.unwrap().is_empty());
    assert!(node.pool().reserved(wallets[2].address()).await.unwrap().is_empty());
    node.shutdown().await;
}

#[tokio::test]
async fn test_pending_change_is_not_spendable() {
    let node = start(2);
    let wallets = genesis_wallets().unwrap();

    node.transform(TxRequest::new(&wallets[0], wallets[1].address(), 5, "")).await.unwrap();

    // The 95 change is unconfirmed and the only confirmed output is reserved
    let err = node.transform(TxRequest::new(&wallets[0], wallets[1].address(), 5, "")).await.unwrap_err();
    assert!(matches!(err, PoolError::Build(BuildError::InsufficientFunds { .. })));

    node.transform(TxRequest::new(&wallets[4], wallets[5].address(), 1, "")).await.unwrap();
    assert!(node.wait_for_height(1).await);

    // Once confirmed the change can be spent
    let tx = node.transform(TxRequest::new(&wallets[0], wallets[1].address(), 95, "")).await.unwrap();
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.inputs[0].output.fee, 95);
    assert_eq!(tx.outputs.len(), 1);
    node.shutdown().await;
}

#[tokio::test]
async fn test_blocks_chain_together() {
    let node = start(1);
    let wallets = genesis_wallets().unwrap();

    for i in 0..4 {
        let from = &wallets[i];
        let to = &wallets[i + 1];
        node.transform(TxRequest::new(from, to.address(), 10, format!("hop {}", i))).await.unwrap();
        assert!(node.wait_for_height(i as u64 + 1).await);
    }

    let chain = node.chain();
    let chain = chain.read().await;
    assert_eq!(chain.size(), 5);
    for height in 1..=4 {
        let block = chain.block_at(height).unwrap();
        let parent = chain.block_at(height - 1).unwrap();
        assert_eq!(block.pre_hash, parent.hash);
        assert_eq!(block.pre_tx_sum, parent.pre_tx_sum + parent.tx_count);
        assert_eq!(chain.block(&block.hash), Some(block));
        assert!(block.hash.as_str() < block.difficulty.as_str());
    }
    assert_eq!(chain.balance(node.miner_address()), 4 * 50);
    drop(chain);
    node.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_pool() {
    let node = start(3);
    let pool = node.pool();
    node.shutdown().await;

    let wallets = genesis_wallets().unwrap();
    let result = pool.transform(TxRequest::new(&wallets[0], wallets[1].address(), 5, "")).await;
    assert_eq!(result, Err(PoolError::Stopped));
}
