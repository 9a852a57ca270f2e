// Genesis accounts and block

use crate::core::{Block, HashError, HashResult, Output, Transaction, TxType};
use crate::wallet::{Wallet, WalletError};
use thiserror::Error;

/// 2021-09-05 04:08:00 UTC in milliseconds
pub const GENESIS_TIME: i64 = 1_630_814_880_000;

/// Nonce sealing the genesis block under GENESIS_DIFFICULTY
pub const GENESIS_NONCE: &str = "0000000000004896";

pub const GENESIS_DIFFICULTY: &str = "0000ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

/// Coins granted to each founding account
pub const GENESIS_FUNDS: i64 = 100;

/// Private keys of the founding accounts
pub const GENESIS_PRIVATE_KEYS: [[u8; 32]; 10] = [
    [
        44, 190, 182, 28, 72, 154, 195, 227, 70, 39, 86, 55, 22, 45, 247, 94, 231, 212, 68, 207,
        32, 212, 252, 144, 140, 150, 134, 231, 1, 40, 214, 69,
    ],
    [
        37, 175, 36, 250, 25, 142, 150, 140, 15, 59, 114, 33, 160, 85, 234, 46, 232, 8, 148, 252,
        209, 35, 247, 208, 198, 208, 180, 87, 199, 123, 21, 163,
    ],
    [
        124, 193, 148, 216, 238, 84, 77, 65, 123, 33, 174, 115, 84, 138, 92, 104, 208, 203, 126,
        6, 46, 101, 141, 154, 10, 90, 248, 108, 65, 53, 156, 45,
    ],
    [
        46, 36, 217, 131, 42, 20, 225, 33, 77, 192, 9, 13, 131, 25, 55, 129, 202, 78, 248, 36,
        103, 23, 63, 199, 46, 78, 148, 12, 62, 33, 238, 254,
    ],
    [
        189, 204, 180, 135, 97, 95, 152, 255, 132, 51, 102, 4, 100, 111, 175, 247, 227, 152, 149,
        246, 69, 251, 238, 114, 55, 205, 60, 17, 36, 82, 180, 216,
    ],
    [
        115, 182, 146, 98, 119, 63, 178, 120, 29, 60, 255, 102, 176, 176, 15, 40, 130, 12, 249,
        89, 30, 102, 236, 163, 27, 251, 175, 89, 243, 36, 252, 203,
    ],
    [
        216, 75, 15, 252, 154, 49, 236, 216, 126, 126, 233, 68, 77, 110, 52, 19, 205, 186, 255,
        127, 113, 130, 49, 84, 86, 123, 205, 130, 240, 226, 130, 231,
    ],
    [
        174, 39, 70, 72, 166, 168, 162, 221, 205, 9, 50, 194, 57, 6, 61, 141, 89, 143, 163, 126,
        39, 68, 160, 59, 244, 234, 204, 175, 222, 246, 47, 34,
    ],
    [
        144, 210, 192, 20, 2, 137, 110, 100, 71, 14, 196, 100, 97, 190, 61, 110, 207, 240, 60, 0,
        9, 157, 164, 111, 176, 14, 251, 28, 27, 142, 27, 54,
    ],
    [
        73, 83, 74, 17, 154, 230, 214, 34, 134, 38, 20, 96, 177, 79, 86, 84, 175, 253, 240, 58,
        120, 168, 81, 230, 215, 12, 43, 71, 92, 164, 5, 167,
    ],
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenesisError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Wallets of the founding accounts, in key order
pub fn genesis_wallets() -> Result<Vec<Wallet>, WalletError> {
    GENESIS_PRIVATE_KEYS.iter().map(|key| Wallet::restore(key)).collect()
}

/// The sealed genesis block: one genesis transaction paying GENESIS_FUNDS
/// to every founding account
pub fn genesis_block(difficulty: &str) -> Result<Block, GenesisError> {
    let outputs = genesis_wallets()?
        .iter()
        .map(|wallet| Output::new(GENESIS_FUNDS, wallet.lock_script(), wallet.address()))
        .collect();

    let mut tx = Transaction::new(GENESIS_TIME, TxType::Genesis, vec![], outputs, vec![]);
    tx.update_hash()?;

    let mut block = Block::new(GENESIS_TIME, String::new(), 0, vec![tx], difficulty.to_string())?;
    let hash = block.hash_with(GENESIS_NONCE);
    block.seal(HashResult {
        nonce: GENESIS_NONCE.to_string(),
        hash,
    });
    Ok(block)
}
