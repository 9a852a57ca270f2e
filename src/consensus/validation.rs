// Block validation

use crate::consensus::pow::{TargetError, meets_difficulty};
use crate::core::{Block, HashError, Input, Output, Transaction, TxType, VmError, decode_hash, verify_script};
use thiserror::Error;

/// Reasons a block is rejected by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("block has no nonce")]
    EmptyNonce,
    #[error("block has no hash")]
    EmptyHash,
    #[error("block has no transactions")]
    NoTransactions,
    #[error("block hash mismatch: claimed {claimed}, computed {computed}")]
    HashMismatch { claimed: String, computed: String },
    #[error("block hash {hash} does not meet difficulty {difficulty}")]
    InvalidProofOfWork { hash: String, difficulty: String },
    #[error("invalid merkle root: expected {expected}, got {actual}")]
    InvalidMerkleRoot { expected: String, actual: String },
    #[error("block does not extend tip: expected parent {expected:?}, got {actual:?}")]
    InvalidParent { expected: String, actual: String },
    #[error("invalid height: expected {expected}, got {actual}")]
    InvalidHeight { expected: u64, actual: u64 },
    #[error("invalid difficulty: expected {expected}, got {actual}")]
    InvalidDifficulty { expected: String, actual: String },
    #[error("missing coinbase transaction")]
    MissingCoinbase,
    #[error("coinbase not in first position")]
    CoinbaseNotFirst,
    #[error("genesis block must only carry genesis transactions")]
    InvalidGenesis,
    #[error("block carries {0} transactions, need at least 2")]
    TooFewTransactions(usize),
    #[error("transaction hash mismatch: claimed {claimed}, computed {computed}")]
    TransactionHashMismatch { claimed: String, computed: String },
    #[error("transaction {tx} output {index} is not bound to it")]
    UnboundOutput { tx: String, index: usize },
    #[error("transaction {tx} input {input} spends an unknown output")]
    UnknownPriorOutput { tx: String, input: usize },
    #[error("transaction {tx} input {input} does not match the confirmed output")]
    PriorOutputMismatch { tx: String, input: usize },
    #[error("transaction {tx} pays {outputs} from {inputs}")]
    OutputsExceedInputs { tx: String, inputs: i64, outputs: i64 },
    #[error("transaction {tx} input {input}: {source}")]
    InvalidScript {
        tx: String,
        input: usize,
        #[source]
        source: VmError,
    },
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Target(#[from] TargetError),
}

/// Checks a candidate block against the current tip
pub struct BlockValidator {
    /// Tip hash, empty when the chain has no blocks
    pre_hash: String,
    height: u64,
    difficulty: String,
}

impl BlockValidator {
    /// Validator for the next block. `tip` is None before genesis.
    pub fn new(tip: Option<&Block>, difficulty: String) -> Self {
        let (pre_hash, height) = match tip {
            Some(tip) => (tip.hash.clone(), tip.height + 1),
            None => (String::new(), 0),
        };
        Self {
            pre_hash,
            height,
            difficulty,
        }
    }

    /// Seal, proof-of-work, parent link and difficulty
    pub fn validate_header(&self, block: &Block) -> Result<(), BlockError> {
        if block.nonce.is_empty() {
            return Err(BlockError::EmptyNonce);
        }
        if block.hash.is_empty() {
            return Err(BlockError::EmptyHash);
        }

        let computed = block.hash_with(&block.nonce);
        if computed != block.hash {
            return Err(BlockError::HashMismatch {
                claimed: block.hash.clone(),
                computed,
            });
        }
        if !meets_difficulty(&block.hash, &block.difficulty) {
            return Err(BlockError::InvalidProofOfWork {
                hash: block.hash.clone(),
                difficulty: block.difficulty.clone(),
            });
        }

        if block.pre_hash != self.pre_hash {
            return Err(BlockError::InvalidParent {
                expected: self.pre_hash.clone(),
                actual: block.pre_hash.clone(),
            });
        }
        if block.height != self.height {
            return Err(BlockError::InvalidHeight {
                expected: self.height,
                actual: block.height,
            });
        }
        if block.difficulty != self.difficulty {
            return Err(BlockError::InvalidDifficulty {
                expected: self.difficulty.clone(),
                actual: block.difficulty.clone(),
            });
        }

        Ok(())
    }

    /// Validate a complete block. `confirmed` looks up ledger transactions
    /// by hash; every spend is checked against the output found there.
    pub fn validate_block<'a, F>(&self, block: &Block, confirmed: F) -> Result<(), BlockError>
    where
        F: Fn(&str) -> Option<&'a Transaction>,
    {
        if block.transactions.is_empty() {
            return Err(BlockError::NoTransactions);
        }

        self.validate_header(block)?;

        for tx in &block.transactions {
            validate_tx_hash(tx)?;
        }

        let expected = block.calc_merkle_root()?;
        if expected != block.merkle_root {
            return Err(BlockError::InvalidMerkleRoot {
                expected,
                actual: block.merkle_root.clone(),
            });
        }

        if block.is_genesis() {
            if block.transactions.iter().any(|tx| tx.tx_type != TxType::Genesis) {
                return Err(BlockError::InvalidGenesis);
            }
            return Ok(());
        }

        if !block.coinbase().is_some_and(Transaction::is_coinbase) {
            return Err(BlockError::MissingCoinbase);
        }
        if block.transactions[1..].iter().any(Transaction::is_coinbase) {
            return Err(BlockError::CoinbaseNotFirst);
        }
        if block.transactions.len() < 2 {
            return Err(BlockError::TooFewTransactions(block.transactions.len()));
        }

        for tx in &block.transactions[1..] {
            for (index, input) in tx.inputs.iter().enumerate() {
                let prior = confirmed(&input.output.tx_hash)
                    .and_then(|prior_tx| prior_tx.outputs.get(input.output.tx_index))
                    .ok_or_else(|| BlockError::UnknownPriorOutput {
                        tx: tx.hash.clone(),
                        input: index,
                    })?;
                if input.output != *prior {
                    return Err(BlockError::PriorOutputMismatch {
                        tx: tx.hash.clone(),
                        input: index,
                    });
                }
                validate_spend(input, prior).map_err(|source| BlockError::InvalidScript {
                    tx: tx.hash.clone(),
                    input: index,
                    source,
                })?;
            }

            let (inputs, outputs) = (tx.total_input_value(), tx.total_output_value());
            if outputs > inputs {
                return Err(BlockError::OutputsExceedInputs {
                    tx: tx.hash.clone(),
                    inputs,
                    outputs,
                });
            }
        }

        Ok(())
    }
}

/// The stored hash must be the hash of the contents, and every output must
/// carry it at its own position
fn validate_tx_hash(tx: &Transaction) -> Result<(), BlockError> {
    let computed = hex::encode(tx.calc_hash()?);
    if computed != tx.hash {
        return Err(BlockError::TransactionHashMismatch {
            claimed: tx.hash.clone(),
            computed,
        });
    }
    for (index, output) in tx.outputs.iter().enumerate() {
        if output.tx_hash != tx.hash || output.tx_index != index {
            return Err(BlockError::UnboundOutput {
                tx: tx.hash.clone(),
                index,
            });
        }
    }
    Ok(())
}

/// Run an input's unlock script against the lock script of the confirmed
/// output it spends, signed over that output's transaction hash
pub fn validate_spend(input: &Input, prior: &Output) -> Result<(), VmError> {
    let msg_hash = decode_hash(&prior.tx_hash).map_err(|_| VmError::MissingMessageHash)?;
    verify_script(&msg_hash, &input.script, &prior.script)
}
