// Transaction data structures and their canonical hashes

use crate::core::hash::{concat_bytes, int64_be, sha256};
use crate::core::{Script, TxType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for the free-form memo
pub const MAX_EXTRA_LEN: usize = 100;

/// Memo prefix marking a coinbase transaction
pub const COINBASE_TAG: &[u8] = b"coinbase";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("referenced output has no transaction hash")]
    MissingTxHash,
    #[error("invalid hex hash {hash:?}: {reason}")]
    InvalidHex { hash: String, reason: String },
}

/// Decode a lowercase hex hash
pub fn decode_hash(hash: &str) -> Result<Vec<u8>, HashError> {
    hex::decode(hash).map_err(|e| HashError::InvalidHex {
        hash: hash.to_string(),
        reason: e.to_string(),
    })
}

/// Transaction output - amount locked by a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Coin amount
    pub fee: i64,
    /// OP_DUP OP_HASH160 OP_PUSH <pubKeyHash> OP_EQUALVERIFY OP_CHECKSIG
    pub script: Script,
    /// Position within the owning transaction
    pub tx_index: usize,
    /// Recipient address, informational
    pub address: String,
    /// Hash of the owning transaction, filled in once that is hashed
    pub tx_hash: String,
}

impl Output {
    pub fn new(fee: i64, script: Script, address: impl Into<String>) -> Self {
        Self {
            fee,
            script,
            tx_index: 0,
            address: address.into(),
            tx_hash: String::new(),
        }
    }

    /// Hash used when this output belongs to the transaction being hashed
    pub fn spend_hash(&self) -> [u8; 32] {
        let fee = int64_be(self.fee);
        let script = self.script.hash();
        let index = int64_be(self.tx_index as i64);
        let address = sha256(self.address.as_bytes());
        sha256(&concat_bytes(&[&fee[..], &script[..], &index[..], &address[..]]))
    }

    /// Hash used when this output is referenced by an input. The owning
    /// transaction hash must already be known.
    pub fn prior_hash(&self) -> Result<[u8; 32], HashError> {
        if self.tx_hash.is_empty() {
            return Err(HashError::MissingTxHash);
        }
        let tx_hash = decode_hash(&self.tx_hash)?;
        let fee = int64_be(self.fee);
        let script = self.script.hash();
        let index = int64_be(self.tx_index as i64);
        Ok(sha256(&concat_bytes(&[&fee[..], &script[..], &tx_hash[..], &index[..]])))
    }
}

/// Transaction input - spends a previously confirmed output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// <sig> <pubKey>
    pub script: Script,
    /// Copy of the output being spent
    pub output: Output,
}

impl Input {
    pub fn new(script: Script, output: Output) -> Self {
        Self { script, output }
    }

    pub fn hash(&self) -> Result<[u8; 32], HashError> {
        let script = self.script.hash();
        let prior = self.output.prior_hash()?;
        Ok(sha256(&concat_bytes(&[&script[..], &prior[..]])))
    }
}

/// Transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub timestamp: i64,
    pub tx_type: TxType,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    /// Free-form memo, at most MAX_EXTRA_LEN bytes
    pub extra: Vec<u8>,
    /// Hex hash, empty until `update_hash`
    pub hash: String,
}

impl Transaction {
    /// Create an unhashed transaction, numbering outputs from 0
    pub fn new(
        timestamp: i64,
        tx_type: TxType,
        inputs: Vec<Input>,
        mut outputs: Vec<Output>,
        extra: Vec<u8>,
    ) -> Self {
        for (i, output) in outputs.iter_mut().enumerate() {
            output.tx_index = i;
        }
        Self {
            timestamp,
            tx_type,
            inputs,
            outputs,
            extra,
            hash: String::new(),
        }
    }

    /// Create a hashed coinbase transaction (mining reward)
    pub fn coinbase(
        timestamp: i64,
        height: u64,
        reward: i64,
        lock: Script,
        address: impl Into<String>,
    ) -> Result<Self, HashError> {
        let mut extra = COINBASE_TAG.to_vec();
        extra.extend_from_slice(format!(":{}", height).as_bytes());
        let output = Output::new(reward, lock, address);
        let mut tx = Self::new(timestamp, TxType::Normal, vec![], vec![output], extra);
        tx.update_hash()?;
        Ok(tx)
    }

    /// Check if this is a coinbase transaction
    pub fn is_coinbase(&self) -> bool {
        self.tx_type == TxType::Normal
            && self.inputs.is_empty()
            && self.extra.starts_with(COINBASE_TAG)
    }

    /// Hash over every field, inputs and outputs hashed recursively
    pub fn calc_hash(&self) -> Result<[u8; 32], HashError> {
        let mut parts: Vec<Vec<u8>> = Vec::with_capacity(3 + self.inputs.len() + self.outputs.len());
        parts.push(int64_be(self.timestamp).to_vec());
        parts.push(int64_be(self.tx_type.code()).to_vec());
        for input in &self.inputs {
            parts.push(input.hash()?.to_vec());
        }
        for output in &self.outputs {
            parts.push(output.spend_hash().to_vec());
        }
        parts.push(self.extra.clone());
        Ok(sha256(&concat_bytes(&parts)))
    }

    /// Compute the hash and back-fill it into every output
    pub fn update_hash(&mut self) -> Result<(), HashError> {
        let hash = hex::encode(self.calc_hash()?);
        for output in &mut self.outputs {
            output.tx_hash = hash.clone();
        }
        self.hash = hash;
        Ok(())
    }

    /// Calculate total input value
    pub fn total_input_value(&self) -> i64 {
        self.inputs.iter().map(|input| input.output.fee).sum()
    }

    /// Calculate total output value
    pub fn total_output_value(&self) -> i64 {
        self.outputs.iter().map(|out| out.fee).sum()
    }
}
