// Core blockchain data structures

mod types;
mod transaction;
mod block;
mod hash;
pub mod script;
pub mod vm;

pub use types::*;
pub use transaction::*;
pub use block::*;
pub use hash::*;
pub use script::{OpCode, Script};
pub use vm::{Vm, VmError, verify_script};
