// Stack machine evaluating P2PKH spend scripts

use crate::core::hash::hash160;
use crate::core::script::{OpCode, Script};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Environment key holding the message hash that CheckSig verifies against
pub const VM_ENV_TX_HASH: &str = "VM_TX_HASH";

/// Sentinel pushed by a successful CheckSig
pub const CODE_TRUE: &[u8] = &[0x01];

/// Signature verifier: (message hash, signature, public key) -> valid
pub type VerifyFn = fn(&[u8], &[u8], &[u8]) -> bool;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("empty stack")]
    EmptyStack,
    #[error("invalid opcode size {size} at position {pos}")]
    InvalidOpSize { pos: usize, size: usize },
    #[error("unknown opcode {code:#04x} at position {pos}")]
    UnknownOpcode { pos: usize, code: u8 },
    #[error("opcode at position {pos} has no data element to push")]
    MissingOperand { pos: usize },
    #[error("{op} needs {need} stack items, found {have}")]
    StackTooSmall { op: &'static str, need: usize, have: usize },
    #[error("stack items not equal")]
    NotEqual,
    #[error("no message hash in vm environment")]
    MissingMessageHash,
    #[error("signature check failed")]
    SignatureCheckFailed,
    #[error("script finished with {size} unexpected stack items")]
    InvalidFinalStack { size: usize },
}

/// Byte-string stack
#[derive(Debug, Default, Clone)]
pub struct Stack {
    data: Vec<Vec<u8>>,
}

impl Stack {
    pub fn push(&mut self, item: Vec<u8>) {
        self.data.push(item);
    }

    pub fn pop(&mut self) -> Result<Vec<u8>, VmError> {
        self.data.pop().ok_or(VmError::EmptyStack)
    }

    pub fn peek(&self) -> Result<&[u8], VmError> {
        self.data.last().map(Vec::as_slice).ok_or(VmError::EmptyStack)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn items(&self) -> &[Vec<u8>] {
        &self.data
    }
}

/// One opcode handler. Handlers advance the program counter themselves.
pub trait OpExec: Send + Sync {
    fn exec(&self, vm: &mut Vm) -> Result<(), VmError>;
}

pub struct OpPushData;
pub struct OpDuplicate;
pub struct OpHash160;
pub struct OpEqVerify;

pub struct OpCheckSig {
    verify: VerifyFn,
}

impl OpCheckSig {
    pub fn with_verifier(verify: VerifyFn) -> Self {
        Self { verify }
    }
}

impl Default for OpCheckSig {
    fn default() -> Self {
        Self::with_verifier(crate::wallet::verify)
    }
}

impl OpExec for OpPushData {
    fn exec(&self, vm: &mut Vm) -> Result<(), VmError> {
        let operand = vm
            .script
            .elements()
            .get(vm.pc + 1)
            .cloned()
            .ok_or(VmError::MissingOperand { pos: vm.pc })?;
        vm.stack.push(operand);
        vm.pc += 2;
        Ok(())
    }
}

impl OpExec for OpDuplicate {
    fn exec(&self, vm: &mut Vm) -> Result<(), VmError> {
        let top = vm.stack.peek()?.to_vec();
        vm.stack.push(top);
        vm.pc += 1;
        Ok(())
    }
}

impl OpExec for OpHash160 {
    fn exec(&self, vm: &mut Vm) -> Result<(), VmError> {
        let item = vm.stack.pop()?;
        vm.stack.push(hash160(&item).to_vec());
        vm.pc += 1;
        Ok(())
    }
}

impl OpExec for OpEqVerify {
    fn exec(&self, vm: &mut Vm) -> Result<(), VmError> {
        require_stack(vm, "EqVerify", 2)?;
        let a = vm.stack.pop()?;
        let b = vm.stack.pop()?;
        if a != b {
            return Err(VmError::NotEqual);
        }
        vm.pc += 1;
        Ok(())
    }
}

impl OpExec for OpCheckSig {
    fn exec(&self, vm: &mut Vm) -> Result<(), VmError> {
        require_stack(vm, "CheckSig", 2)?;
        let pubkey = vm.stack.pop()?;
        let signature = vm.stack.pop()?;
        let msg_hash = vm.env(VM_ENV_TX_HASH).ok_or(VmError::MissingMessageHash)?;
        if !(self.verify)(msg_hash, &signature, &pubkey) {
            return Err(VmError::SignatureCheckFailed);
        }
        vm.stack.push(CODE_TRUE.to_vec());
        vm.pc += 1;
        Ok(())
    }
}

fn require_stack(vm: &Vm, op: &'static str, need: usize) -> Result<(), VmError> {
    let have = vm.stack.len();
    if have < need {
        return Err(VmError::StackTooSmall { op, need, have });
    }
    Ok(())
}

type OpTable = HashMap<u8, Arc<dyn OpExec>>;

fn default_ops() -> &'static OpTable {
    static OPS: OnceLock<OpTable> = OnceLock::new();
    OPS.get_or_init(|| {
        let mut ops: OpTable = HashMap::new();
        ops.insert(OpCode::PushData as u8, Arc::new(OpPushData));
        ops.insert(OpCode::Duplicate as u8, Arc::new(OpDuplicate));
        ops.insert(OpCode::Hash160 as u8, Arc::new(OpHash160));
        ops.insert(OpCode::EqVerify as u8, Arc::new(OpEqVerify));
        ops.insert(OpCode::CheckSig as u8, Arc::new(OpCheckSig::default()));
        ops
    })
}

/// Script virtual machine
pub struct Vm {
    stack: Stack,
    pc: usize,
    script: Script,
    ops: OpTable,
    env: HashMap<String, Vec<u8>>,
}

impl Vm {
    pub fn new(script: Script) -> Self {
        Self {
            stack: Stack::default(),
            pc: 0,
            script,
            ops: default_ops().clone(),
            env: HashMap::new(),
        }
    }

    pub fn set_env(&mut self, key: &str, value: Vec<u8>) {
        self.env.insert(key.to_string(), value);
    }

    pub fn env(&self, key: &str) -> Option<&[u8]> {
        self.env.get(key).map(Vec::as_slice)
    }

    /// Replace the handler for one opcode in this VM only
    pub fn custom_exec(&mut self, code: u8, exec: Arc<dyn OpExec>) {
        self.ops.insert(code, exec);
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Run the whole script.
    ///
    /// Succeeds iff every element is consumed without error and the final
    /// stack is empty or holds exactly the true sentinel.
    pub fn exec(&mut self) -> Result<(), VmError> {
        while self.pc < self.script.len() {
            let element = &self.script.elements()[self.pc];
            if element.len() != 1 {
                return Err(VmError::InvalidOpSize {
                    pos: self.pc,
                    size: element.len(),
                });
            }
            let code = element[0];
            let op = self
                .ops
                .get(&code)
                .cloned()
                .ok_or(VmError::UnknownOpcode { pos: self.pc, code })?;
            log::trace!("Run op code {:#04x} at pos [{}]", code, self.pc);
            if let Err(e) = op.exec(self) {
                log::debug!("Vm error at pos [{}]: {}", self.pc, e);
                return Err(e);
            }
        }

        match self.stack.len() {
            0 => Ok(()),
            1 if self.stack.peek()? == CODE_TRUE => Ok(()),
            size => Err(VmError::InvalidFinalStack { size }),
        }
    }
}

/// Run `unlock ‖ lock` with `msg_hash` as the CheckSig message
pub fn verify_script(msg_hash: &[u8], unlock: &Script, lock: &Script) -> Result<(), VmError> {
    let mut vm = Vm::new(Script::concat(unlock, lock));
    vm.set_env(VM_ENV_TX_HASH, msg_hash.to_vec());
    vm.exec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;
    use crate::wallet::Wallet;

    const OP_NEXT: u8 = 0x05;

    struct OpNext;

    impl OpExec for OpNext {
        fn exec(&self, vm: &mut Vm) -> Result<(), VmError> {
            vm.pc += 1;
            Ok(())
        }
    }

    fn vm_with_next(elements: Vec<Vec<u8>>) -> Vm {
        let mut vm = Vm::new(Script::new(elements));
        vm.custom_exec(OP_NEXT, Arc::new(OpNext));
        vm
    }

    fn push() -> Vec<u8> {
        OpCode::PushData.element()
    }

    #[test]
    fn test_stack() {
        let mut s = Stack::default();
        assert!(s.is_empty());
        s.push(vec![1, 2, 3]);
        s.push(vec![2, 3, 4]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.pop().unwrap(), vec![2, 3, 4]);
        assert_eq!(s.pop().unwrap(), vec![1, 2, 3]);
        assert_eq!(s.pop(), Err(VmError::EmptyStack));
        assert_eq!(s.peek(), Err(VmError::EmptyStack));
    }

    #[test]
    fn test_exec_custom_op() {
        let mut vm = vm_with_next(vec![vec![OP_NEXT], vec![OP_NEXT], vec![OP_NEXT]]);
        assert!(vm.exec().is_ok());
        assert_eq!(vm.pc(), 3);
    }

    #[test]
    fn test_custom_op_does_not_touch_default_table() {
        let _ = vm_with_next(vec![]);
        let mut vm = Vm::new(Script::new(vec![vec![OP_NEXT]]));
        assert_eq!(
            vm.exec(),
            Err(VmError::UnknownOpcode { pos: 0, code: OP_NEXT })
        );
    }

    #[test]
    fn test_invalid_op_size() {
        let mut vm = vm_with_next(vec![vec![OP_NEXT], vec![OP_NEXT, 2], vec![OP_NEXT]]);
        assert_eq!(vm.exec(), Err(VmError::InvalidOpSize { pos: 1, size: 2 }));
        assert_eq!(vm.pc(), 1);
    }

    #[test]
    fn test_unknown_opcode() {
        let mut vm = vm_with_next(vec![vec![OP_NEXT], vec![OP_NEXT], vec![52]]);
        assert_eq!(vm.exec(), Err(VmError::UnknownOpcode { pos: 2, code: 52 }));
        assert_eq!(vm.pc(), 2);
    }

    #[test]
    fn test_push_data() {
        let mut vm = Vm::new(Script::new(vec![push(), vec![2, 3, 4]]));
        assert_eq!(vm.exec(), Err(VmError::InvalidFinalStack { size: 1 }));
        assert_eq!(vm.stack().peek().unwrap(), &[2u8, 3, 4][..]);
    }

    #[test]
    fn test_push_data_without_operand() {
        let mut vm = vm_with_next(vec![vec![OP_NEXT], vec![OP_NEXT], push()]);
        assert_eq!(vm.exec(), Err(VmError::MissingOperand { pos: 2 }));
    }

    #[test]
    fn test_duplicate() {
        let mut vm = Vm::new(Script::new(vec![
            push(),
            vec![5, 0, 2],
            OpCode::Duplicate.element(),
        ]));
        assert_eq!(vm.exec(), Err(VmError::InvalidFinalStack { size: 2 }));
        assert_eq!(vm.stack().items(), &[vec![5u8, 0, 2], vec![5u8, 0, 2]][..]);
    }

    #[test]
    fn test_duplicate_empty_stack() {
        let mut vm = Vm::new(Script::new(vec![OpCode::Duplicate.element()]));
        assert_eq!(vm.exec(), Err(VmError::EmptyStack));
    }

    #[test]
    fn test_hash160() {
        let mut vm = Vm::new(Script::new(vec![
            push(),
            vec![5, 0, 2],
            OpCode::Hash160.element(),
        ]));
        assert!(vm.exec().is_err());
        assert_eq!(
            hex::encode(vm.stack().peek().unwrap()),
            "d72c354f2dc38f12a84917349c9f6492f0db3d91"
        );
    }

    #[test]
    fn test_eq_verify() {
        let mut vm = Vm::new(Script::new(vec![
            push(),
            vec![5, 0, 2],
            push(),
            vec![5, 0, 2],
            OpCode::EqVerify.element(),
        ]));
        assert!(vm.exec().is_ok());
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn test_eq_verify_mismatch() {
        let mut vm = Vm::new(Script::new(vec![
            push(),
            vec![5, 0, 2],
            push(),
            vec![5, 0, 1],
            OpCode::EqVerify.element(),
        ]));
        assert_eq!(vm.exec(), Err(VmError::NotEqual));
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn test_eq_verify_needs_two_items() {
        let mut vm = Vm::new(Script::new(vec![
            push(),
            vec![5, 0, 2],
            OpCode::EqVerify.element(),
        ]));
        assert_eq!(
            vm.exec(),
            Err(VmError::StackTooSmall { op: "EqVerify", need: 2, have: 1 })
        );
    }

    #[test]
    fn test_check_sig_with_stub_verifier() {
        let mut vm = Vm::new(Script::new(vec![
            push(),
            vec![1, 2, 3],
            push(),
            vec![4, 5, 6],
            OpCode::CheckSig.element(),
        ]));
        vm.custom_exec(
            OpCode::CheckSig as u8,
            Arc::new(OpCheckSig::with_verifier(|_, _, _| true)),
        );
        vm.set_env(VM_ENV_TX_HASH, vec![9; 32]);

        assert!(vm.exec().is_ok());
        assert_eq!(vm.stack().items(), &[CODE_TRUE.to_vec()][..]);
    }

    #[test]
    fn test_check_sig_rejecting_verifier() {
        let mut vm = Vm::new(Script::new(vec![
            push(),
            vec![1, 2, 3],
            push(),
            vec![4, 5, 6],
            OpCode::CheckSig.element(),
        ]));
        vm.custom_exec(
            OpCode::CheckSig as u8,
            Arc::new(OpCheckSig::with_verifier(|_, _, _| false)),
        );
        vm.set_env(VM_ENV_TX_HASH, vec![9; 32]);
        assert_eq!(vm.exec(), Err(VmError::SignatureCheckFailed));
    }

    #[test]
    fn test_check_sig_without_message_hash() {
        let mut vm = Vm::new(Script::new(vec![
            push(),
            vec![1],
            push(),
            vec![2],
            OpCode::CheckSig.element(),
        ]));
        assert_eq!(vm.exec(), Err(VmError::MissingMessageHash));
    }

    #[test]
    fn test_p2pkh_with_real_signature() {
        let wallet = Wallet::generate();
        let msg_hash = sha256(b"Coinbase is the first transaction of every block");
        let signature = wallet.sign(&msg_hash).unwrap();

        let unlock = Script::p2pkh_unlock(&signature, &wallet.public_key());
        let lock = wallet.lock_script();

        assert!(verify_script(&msg_hash, &unlock, &lock).is_ok());
    }

    #[test]
    fn test_p2pkh_wrong_key() {
        let owner = Wallet::generate();
        let thief = Wallet::generate();
        let msg_hash = sha256(b"spend");
        let signature = thief.sign(&msg_hash).unwrap();

        let unlock = Script::p2pkh_unlock(&signature, &thief.public_key());
        let lock = owner.lock_script();

        assert_eq!(verify_script(&msg_hash, &unlock, &lock), Err(VmError::NotEqual));
    }

    #[test]
    fn test_p2pkh_wrong_message() {
        let wallet = Wallet::generate();
        let signature = wallet.sign(&sha256(b"one")).unwrap();

        let unlock = Script::p2pkh_unlock(&signature, &wallet.public_key());
        let lock = wallet.lock_script();

        assert_eq!(
            verify_script(&sha256(b"two"), &unlock, &lock),
            Err(VmError::SignatureCheckFailed)
        );
    }
}
