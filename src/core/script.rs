// Script elements and the P2PKH script builders

use crate::core::hash::{concat_bytes, sha256};
use serde::{Deserialize, Serialize};

/// Opcodes understood by the VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Push the next script element onto the stack
    PushData = 0x00,
    /// Duplicate the top stack item
    Duplicate = 0x01,
    /// Replace the top stack item with RIPEMD160(SHA256(item))
    Hash160 = 0x02,
    /// Pop two items and fail unless they are equal
    EqVerify = 0x03,
    /// Pop pubkey and signature, verify against the message hash
    CheckSig = 0x04,
}

impl OpCode {
    /// The single-byte script element carrying this opcode
    pub fn element(self) -> Vec<u8> {
        vec![self as u8]
    }
}

/// Ordered sequence of opaque byte strings.
///
/// The VM reads it as opcode elements, each `PushData` followed by its
/// operand element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script(pub Vec<Vec<u8>>);

impl Script {
    pub fn new(elements: Vec<Vec<u8>>) -> Self {
        Self(elements)
    }

    pub fn elements(&self) -> &[Vec<u8>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA256 over all elements concatenated in order
    pub fn hash(&self) -> [u8; 32] {
        sha256(&concat_bytes(&self.0))
    }

    /// Unlock script followed by lock script, as executed by the VM
    pub fn concat(unlock: &Script, lock: &Script) -> Script {
        let mut elements = Vec::with_capacity(unlock.len() + lock.len());
        elements.extend(unlock.0.iter().cloned());
        elements.extend(lock.0.iter().cloned());
        Script(elements)
    }

    /// Create a P2PKH lock script
    /// OP_DUP OP_HASH160 OP_PUSH <pubKeyHash> OP_EQUALVERIFY OP_CHECKSIG
    pub fn p2pkh_lock(pubkey_hash: &[u8; 20]) -> Self {
        Self(vec![
            OpCode::Duplicate.element(),
            OpCode::Hash160.element(),
            OpCode::PushData.element(),
            pubkey_hash.to_vec(),
            OpCode::EqVerify.element(),
            OpCode::CheckSig.element(),
        ])
    }

    /// Create a P2PKH unlock script
    /// OP_PUSH <sig> OP_PUSH <pubkey>
    pub fn p2pkh_unlock(signature: &[u8], pubkey: &[u8]) -> Self {
        Self(vec![
            OpCode::PushData.element(),
            signature.to_vec(),
            OpCode::PushData.element(),
            pubkey.to_vec(),
        ])
    }
}
