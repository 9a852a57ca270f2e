// UTXO (Unspent Transaction Output) set management

use crate::core::Output;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UtxoError {
    #[error("utxo {tx_hash}:{index} of {address} not found")]
    NotFound {
        address: String,
        tx_hash: String,
        index: usize,
    },
    #[error("utxo {tx_hash}:{index} already present")]
    Duplicate { tx_hash: String, index: usize },
}

impl UtxoError {
    fn not_found(utxo: &Utxo) -> Self {
        Self::NotFound {
            address: utxo.address.clone(),
            tx_hash: utxo.tx_hash.clone(),
            index: utxo.tx_output_index,
        }
    }
}

/// Pointer to a confirmed, still spendable output. Compared by full value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Utxo {
    pub address: String,
    pub tx_hash: String,
    pub tx_output_index: usize,
    pub fee: i64,
}

impl Utxo {
    pub fn new(address: impl Into<String>, tx_hash: impl Into<String>, tx_output_index: usize, fee: i64) -> Self {
        Self {
            address: address.into(),
            tx_hash: tx_hash.into(),
            tx_output_index,
            fee,
        }
    }

    /// Utxo for an output whose transaction is already hashed
    pub fn from_output(output: &Output) -> Self {
        Self::new(output.address.clone(), output.tx_hash.clone(), output.tx_index, output.fee)
    }
}

/// Sum of the amounts in `utxos`
pub fn total(utxos: &[Utxo]) -> i64 {
    utxos.iter().map(|u| u.fee).sum()
}

/// Address-indexed UTXO storage
pub trait UtxoDatabase: Send + Sync {
    /// Add a UTXO
    fn add(&mut self, utxo: Utxo) -> Result<(), UtxoError>;

    /// All UTXOs of `address` in insertion order
    fn get(&self, address: &str) -> Result<Vec<Utxo>, UtxoError>;

    /// Remove a UTXO (spent)
    fn remove(&mut self, utxo: &Utxo) -> Result<(), UtxoError>;

    /// Count total UTXOs
    fn count(&self) -> usize;
}

/// In-memory UTXO set, address -> ordered list
#[derive(Debug, Default)]
pub struct InMemUtxoDatabase {
    utxos: HashMap<String, Vec<Utxo>>,
}

impl InMemUtxoDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UtxoDatabase for InMemUtxoDatabase {
    fn add(&mut self, utxo: Utxo) -> Result<(), UtxoError> {
        let list = self.utxos.entry(utxo.address.clone()).or_default();
        if list.contains(&utxo) {
            return Err(UtxoError::Duplicate {
                tx_hash: utxo.tx_hash,
                index: utxo.tx_output_index,
            });
        }
        list.push(utxo);
        Ok(())
    }

    fn get(&self, address: &str) -> Result<Vec<Utxo>, UtxoError> {
        Ok(self.utxos.get(address).cloned().unwrap_or_default())
    }

    fn remove(&mut self, utxo: &Utxo) -> Result<(), UtxoError> {
        let list = self
            .utxos
            .get_mut(&utxo.address)
            .ok_or_else(|| UtxoError::not_found(utxo))?;
        let pos = list
            .iter()
            .position(|u| u == utxo)
            .ok_or_else(|| UtxoError::not_found(utxo))?;
        list.remove(pos);
        if list.is_empty() {
            self.utxos.remove(&utxo.address);
        }
        Ok(())
    }

    fn count(&self) -> usize {
        self.utxos.values().map(Vec::len).sum()
    }
}
