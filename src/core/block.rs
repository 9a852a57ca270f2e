// Block data structures

use crate::consensus::pow;
use crate::core::hash::{concat_bytes, int64_be, sha256d};
use crate::core::{HashError, Transaction, decode_hash};
use serde::{Deserialize, Serialize};

/// Nonce width in bytes, hex encoded to 16 characters
pub const NONCE_LEN: usize = 8;

/// Winning nonce and the hash it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResult {
    pub nonce: String,
    pub hash: String,
}

/// Block - a batch of transactions sealed by proof-of-work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: i64,
    /// Hex hash, empty until sealed
    pub hash: String,
    /// 8 byte nonce, hex encoded
    pub nonce: String,
    /// Hash of the previous block, empty for genesis
    pub pre_hash: String,
    /// transactions[0] is the coinbase
    pub transactions: Vec<Transaction>,
    /// 0 = genesis
    pub height: u64,
    pub tx_count: u64,
    /// Transactions in all previous blocks
    pub pre_tx_sum: u64,
    /// Outputs in all previous blocks
    pub pre_output_sum: u64,
    pub merkle_root: String,
    /// 256-bit target, 64 hex chars
    pub difficulty: String,
}

impl Block {
    /// Unsealed block over `transactions`
    pub fn new(
        timestamp: i64,
        pre_hash: String,
        height: u64,
        transactions: Vec<Transaction>,
        difficulty: String,
    ) -> Result<Self, HashError> {
        let merkle_root = merkle_root(&tx_hashes(&transactions))?;
        Ok(Self {
            timestamp,
            hash: String::new(),
            nonce: String::new(),
            pre_hash,
            tx_count: transactions.len() as u64,
            transactions,
            height,
            pre_tx_sum: 0,
            pre_output_sum: 0,
            merkle_root,
            difficulty,
        })
    }

    /// Block hash for a candidate nonce:
    /// SHA256(SHA256(ts ‖ pre_hash ‖ merkle_root ‖ nonce)), strings as raw bytes
    pub fn hash_with(&self, nonce: &str) -> String {
        let ts = int64_be(self.timestamp);
        let data = concat_bytes(&[
            &ts[..],
            self.pre_hash.as_bytes(),
            self.merkle_root.as_bytes(),
            nonce.as_bytes(),
        ]);
        hex::encode(sha256d(&data))
    }

    /// Hash with `nonce`, returning it only if it satisfies the difficulty
    pub fn try_hash(&self, nonce: &str) -> Option<HashResult> {
        let hash = self.hash_with(nonce);
        if pow::meets_difficulty(&hash, &self.difficulty) {
            Some(HashResult {
                nonce: nonce.to_string(),
                hash,
            })
        } else {
            None
        }
    }

    pub fn seal(&mut self, result: HashResult) {
        self.nonce = result.nonce;
        self.hash = result.hash;
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.pre_hash.is_empty()
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    pub fn output_count(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.outputs.len() as u64).sum()
    }

    /// Merkle root recomputed from the carried transactions
    pub fn calc_merkle_root(&self) -> Result<String, HashError> {
        merkle_root(&tx_hashes(&self.transactions))
    }
}

fn tx_hashes(transactions: &[Transaction]) -> Vec<&str> {
    transactions.iter().map(|tx| tx.hash.as_str()).collect()
}

fn reversed(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

/// Bitcoin-style Merkle root over hex transaction hashes. Leaves are byte
/// reversed before hashing, an odd trailing node is paired with itself at
/// every level and the root is reversed back. Empty input gives "".
pub fn merkle_root<S: AsRef<str>>(hashes: &[S]) -> Result<String, HashError> {
    if hashes.is_empty() {
        return Ok(String::new());
    }

    let mut level: Vec<Vec<u8>> = hashes
        .iter()
        .map(|h| decode_hash(h.as_ref()).map(|raw| reversed(&raw)))
        .collect::<Result<_, _>>()?;

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                sha256d(&concat_bytes(&[left, right])).to_vec()
            })
            .collect();
    }

    Ok(hex::encode(reversed(&level[0])))
}
