// Basic shared types: transaction kind and the runtime context

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of transaction, hashed as an int64
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    Normal = 0,
    Genesis = 1,
}

impl TxType {
    pub fn code(self) -> i64 {
        self as i64
    }
}

/// Unix timestamp source in milliseconds
pub type TimeProvider = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Context threaded into the chain, pool and miner
#[derive(Clone)]
pub struct Env {
    clock: TimeProvider,
}

impl Env {
    pub fn new(clock: TimeProvider) -> Self {
        Self { clock }
    }

    /// Wall clock
    pub fn system() -> Self {
        Self::new(Arc::new(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or_default()
        }))
    }

    /// Deterministic clock advancing by `step` on every read, first read
    /// returning `start + step`
    pub fn stepping(start: i64, step: i64) -> Self {
        let now = Arc::new(AtomicI64::new(start));
        Self::new(Arc::new(move || now.fetch_add(step, Ordering::SeqCst) + step))
    }

    pub fn unix_time(&self) -> i64 {
        (self.clock)()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Env").finish_non_exhaustive()
    }
}
