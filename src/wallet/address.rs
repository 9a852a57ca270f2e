// Base58Check address codec

use crate::core::{concat_bytes, hash160, sha256d};
use thiserror::Error;

/// Mainnet version byte
pub const VERSION: u8 = 0x00;
pub const LEN_VERSION: usize = 1;
pub const LEN_RIPEMD160: usize = 20;
pub const LEN_CHECKSUM: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is not valid base58: {0}")]
    Base58(String),
    #[error("invalid address size {0}")]
    InvalidLength(usize),
    #[error("invalid address version {0}")]
    InvalidVersion(u8),
    #[error("address checksum failed")]
    ChecksumMismatch,
}

fn checksum(payload: &[u8]) -> [u8; LEN_CHECKSUM] {
    let digest = sha256d(payload);
    let mut sum = [0u8; LEN_CHECKSUM];
    sum.copy_from_slice(&digest[..LEN_CHECKSUM]);
    sum
}

/// Address for a pubkey hash:
/// Base58(version ‖ hash ‖ first 4 bytes of SHA256(SHA256(version ‖ hash)))
pub fn address_from_pubkey_hash(pubkey_hash: &[u8; 20]) -> String {
    let payload = concat_bytes(&[&[VERSION][..], &pubkey_hash[..]]);
    let sum = checksum(&payload);
    bs58::encode(concat_bytes(&[&payload[..], &sum[..]])).into_string()
}

/// Address for a raw 64 byte public key
pub fn address_from_pubkey(pubkey: &[u8]) -> String {
    address_from_pubkey_hash(&hash160(pubkey))
}

/// Decode an address back to RIPEMD160(SHA256(pubkey)), verifying size,
/// version and checksum.
pub fn address_to_pubkey_hash(address: &str) -> Result<[u8; 20], AddressError> {
    let raw = bs58::decode(address)
        .into_vec()
        .map_err(|e| AddressError::Base58(e.to_string()))?;

    if raw.len() != LEN_VERSION + LEN_RIPEMD160 + LEN_CHECKSUM {
        return Err(AddressError::InvalidLength(raw.len()));
    }
    if raw[0] != VERSION {
        return Err(AddressError::InvalidVersion(raw[0]));
    }

    let (payload, sum) = raw.split_at(LEN_VERSION + LEN_RIPEMD160);
    if sum != checksum(payload) {
        return Err(AddressError::ChecksumMismatch);
    }

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[LEN_VERSION..]);
    Ok(hash)
}
