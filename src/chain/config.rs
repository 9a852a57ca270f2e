// Ledger parameters

use crate::chain::genesis::GENESIS_DIFFICULTY;
use crate::consensus::{Target, TargetError};

/// Difficulty schedule of a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Target used by genesis and the first retarget window, 64 hex chars
    pub genesis_difficulty: String,
    /// Retarget every this many blocks
    pub retarget_interval: u64,
    /// Expected milliseconds per retarget window
    pub target_timespan: i64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            genesis_difficulty: GENESIS_DIFFICULTY.to_string(),
            retarget_interval: 10,
            target_timespan: 100_000,
        }
    }
}

impl ChainConfig {
    /// Easy target for tests and demos, roughly one in sixteen hashes wins
    pub fn testing() -> Self {
        Self {
            genesis_difficulty: format!("0fff{}", "f".repeat(60)),
            ..Self::default()
        }
    }

    /// Reject an unusable schedule and left-pad the genesis difficulty to
    /// 64 lowercase hex chars
    pub fn normalized(self) -> Result<Self, TargetError> {
        if self.target_timespan <= 0 {
            return Err(TargetError::InvalidTimespan(self.target_timespan));
        }
        Ok(Self {
            genesis_difficulty: Target::from_hex(&self.genesis_difficulty)?.into_string(),
            retarget_interval: self.retarget_interval.max(1),
            ..self
        })
    }
}
