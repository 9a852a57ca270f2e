// P-256 key pair, signing and verification

use crate::core::{Script, hash160};
use crate::wallet::address::address_from_pubkey;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

/// Raw X ‖ Y public key length
pub const PUBKEY_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("sign error: {0}")]
    Sign(String),
}

/// Key pair owning one address
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    public_key: Vec<u8>,
    address: String,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Wallet").field("address", &self.address).finish()
    }
}

impl Wallet {
    /// Generate a fresh key pair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Restore a wallet from its 32 byte private scalar
    pub fn restore(private_key: &[u8]) -> Result<Self, WalletError> {
        let signing_key = SigningKey::from_slice(private_key)
            .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let point = signing_key.verifying_key().to_encoded_point(false);
        // Uncompressed SEC1 is 0x04 ‖ X ‖ Y
        let public_key = point.as_bytes()[1..].to_vec();
        let address = address_from_pubkey(&public_key);
        Self {
            signing_key,
            public_key,
            address,
        }
    }

    pub fn private_key(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    /// X ‖ Y, 64 bytes, no SEC1 tag
    pub fn public_key(&self) -> Vec<u8> {
        self.public_key.clone()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.public_key)
    }

    /// P2PKH lock script paying this wallet
    pub fn lock_script(&self) -> Script {
        Script::p2pkh_lock(&self.pubkey_hash())
    }

    /// Sign a message hash, returning r ‖ s (64 bytes)
    pub fn sign(&self, msg_hash: &[u8]) -> Result<Vec<u8>, WalletError> {
        let signature: Signature = self
            .signing_key
            .sign_prehash(msg_hash)
            .map_err(|e| WalletError::Sign(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

/// Verify an r ‖ s signature over `msg_hash` with a raw X ‖ Y public key
pub fn verify(msg_hash: &[u8], signature: &[u8], pubkey: &[u8]) -> bool {
    if pubkey.len() != PUBKEY_LEN {
        log::info!("Found size invalid pub key: {} bytes", pubkey.len());
        return false;
    }

    let mut sec1 = Vec::with_capacity(PUBKEY_LEN + 1);
    sec1.push(0x04);
    sec1.extend_from_slice(pubkey);

    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&sec1) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };

    verifying_key.verify_prehash(msg_hash, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sha256;
    use crate::wallet::address::address_to_pubkey_hash;

    #[test]
    fn test_restore_round_trip() {
        let wallet = Wallet::generate();
        let restored = Wallet::restore(&wallet.private_key()).unwrap();

        assert_eq!(restored.public_key(), wallet.public_key());
        assert_eq!(restored.private_key(), wallet.private_key());
        assert_eq!(restored.address(), wallet.address());
    }

    #[test]
    fn test_public_key_is_raw_xy() {
        let wallet = Wallet::generate();
        assert_eq!(wallet.public_key().len(), PUBKEY_LEN);
    }

    #[test]
    fn test_sign_verify() {
        let wallet = Wallet::generate();
        let msg_hash = sha256("Key signs the transaction hash".as_bytes());
        let signature = wallet.sign(&msg_hash).unwrap();

        assert_eq!(signature.len(), 64);
        assert!(verify(&msg_hash, &signature, &wallet.public_key()));
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let signer = Wallet::generate();
        let other = Wallet::generate();
        let msg_hash = sha256(b"message");
        let signature = signer.sign(&msg_hash).unwrap();

        assert!(!verify(&msg_hash, &signature, &other.public_key()));
    }

    #[test]
    fn test_verify_rejects_tampered_message() {
        let wallet = Wallet::generate();
        let signature = wallet.sign(&sha256(b"message")).unwrap();

        assert!(!verify(&sha256(b"massage"), &signature, &wallet.public_key()));
    }

    #[test]
    fn test_verify_rejects_malformed_inputs() {
        let wallet = Wallet::generate();
        let msg_hash = sha256(b"message");
        let signature = wallet.sign(&msg_hash).unwrap();

        assert!(!verify(&msg_hash, &signature, &wallet.public_key()[..63]));
        assert!(!verify(&msg_hash, &signature[..10], &wallet.public_key()));
        assert!(!verify(&msg_hash, &signature, &[0u8; 64]));
    }

    #[test]
    fn test_address_recovers_pubkey_hash() {
        let wallet = Wallet::generate();
        let decoded = address_to_pubkey_hash(wallet.address()).unwrap();
        assert_eq!(decoded, hash160(&wallet.public_key()));
        assert_eq!(decoded, wallet.pubkey_hash());
    }

    #[test]
    fn test_restore_rejects_zero_key() {
        assert!(Wallet::restore(&[0u8; 32]).is_err());
    }
}
