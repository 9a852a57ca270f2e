// Storage layer for blocks, transactions and the UTXO set

mod block_store;
mod utxo_set;

pub(crate) use block_store::{BlockStore, StoreError, TxDatabase};
pub use utxo_set::{InMemUtxoDatabase, Utxo, UtxoDatabase, UtxoError, total};
