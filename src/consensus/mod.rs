// Consensus and validation logic

pub mod pow;
pub mod validation;

pub use pow::{MiningResult, Target, TargetError, meets_difficulty, mine, scale_difficulty};
pub use validation::{BlockError, BlockValidator, validate_spend};
