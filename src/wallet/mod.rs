// Wallet keys, addresses and transaction building

pub mod address;
mod keys;
mod tx_builder;

pub use address::{AddressError, address_from_pubkey, address_from_pubkey_hash, address_to_pubkey_hash};
pub use keys::{PUBKEY_LEN, Wallet, WalletError, verify};
pub use tx_builder::{BuildError, TransactionBuilder};
