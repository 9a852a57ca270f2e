// Transaction builder

use crate::chain::BlockChain;
use crate::core::{HashError, Input, Output, Script, Transaction, TxType, VmError, decode_hash, verify_script};
use crate::storage::Utxo;
use crate::wallet::{AddressError, Wallet, WalletError, address_to_pubkey_hash};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("insufficient funds for {address}: have {have}, need {need}")]
    InsufficientFunds { address: String, have: i64, need: i64 },
    #[error("transaction {0} not found")]
    MissingTransaction(String),
    #[error("transaction {tx} has {len} outputs, index {index} out of range")]
    OutputIndexOutOfRange { tx: String, index: usize, len: usize },
    #[error("script verify fail: {0}")]
    ScriptVerification(#[from] VmError),
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Builds signed spends against the confirmed ledger
pub struct TransactionBuilder<'a> {
    chain: &'a BlockChain,
}

impl<'a> TransactionBuilder<'a> {
    /// Create a new transaction builder
    pub fn new(chain: &'a BlockChain) -> Self {
        Self { chain }
    }

    /// Confirmed UTXOs of `from` not in `reserved`, in ledger order
    pub fn spendable(&self, from: &str, reserved: &HashSet<Utxo>) -> Vec<Utxo> {
        self.chain
            .utxos(from)
            .into_iter()
            .filter(|utxo| !reserved.contains(utxo))
            .collect()
    }

    /// First-fit selection: take UTXOs in order until they cover `amount`
    pub fn select_utxos(&self, from: &str, amount: i64, reserved: &HashSet<Utxo>) -> Result<Vec<Utxo>, BuildError> {
        let mut selected = Vec::new();
        let mut total = 0i64;

        for utxo in self.spendable(from, reserved) {
            total += utxo.fee;
            selected.push(utxo);

            if total >= amount {
                return Ok(selected);
            }
        }

        Err(BuildError::InsufficientFunds {
            address: from.to_string(),
            have: total,
            need: amount,
        })
    }

    /// Spend `selected` paying `amount` to `to`, change back to the wallet.
    ///
    /// Each input signs the hash of the transaction holding the spent output
    /// and is run through the VM before it is accepted.
    pub fn build(
        &self,
        wallet: &Wallet,
        to: &str,
        amount: i64,
        extra: Vec<u8>,
        selected: &[Utxo],
    ) -> Result<Transaction, BuildError> {
        let mut inputs = Vec::with_capacity(selected.len());
        let mut total = 0i64;

        for utxo in selected {
            let prior = self.prior_output(utxo)?;
            let msg_hash = decode_hash(&prior.tx_hash)?;
            let unlock = Script::p2pkh_unlock(&wallet.sign(&msg_hash)?, &wallet.public_key());
            verify_script(&msg_hash, &unlock, &prior.script)?;

            total += prior.fee;
            inputs.push(Input::new(unlock, prior));
        }

        let change = total - amount;
        if change < 0 {
            log::error!("Selected {} for a spend of {}", total, amount);
            panic!("negative change {} after utxo selection", change);
        }

        // One output per address: paying yourself absorbs the change
        let (amount, change) = if to == wallet.address() { (total, 0) } else { (amount, change) };

        let mut outputs = Vec::with_capacity(2);
        if change > 0 {
            outputs.push(Output::new(change, wallet.lock_script(), wallet.address()));
        }
        let recipient = Script::p2pkh_lock(&address_to_pubkey_hash(to)?);
        outputs.push(Output::new(amount, recipient, to));

        let mut tx = Transaction::new(self.chain.env().unix_time(), TxType::Normal, inputs, outputs, extra);
        tx.update_hash()?;
        Ok(tx)
    }

    fn prior_output(&self, utxo: &Utxo) -> Result<Output, BuildError> {
        let tx = self
            .chain
            .transaction(&utxo.tx_hash)
            .ok_or_else(|| BuildError::MissingTransaction(utxo.tx_hash.clone()))?;
        tx.outputs
            .get(utxo.tx_output_index)
            .cloned()
            .ok_or_else(|| BuildError::OutputIndexOutOfRange {
                tx: tx.hash.clone(),
                index: utxo.tx_output_index,
                len: tx.outputs.len(),
            })
    }
}
