// Proof of Work implementation

use crate::core::{Block, HashResult, NONCE_LEN};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::Rng;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Difficulty width in hex characters (256 bits)
pub const DIFFICULTY_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("difficulty {0:?} is not hex")]
    InvalidHex(String),
    #[error("difficulty is {0} hex chars, wider than 256 bits")]
    TooWide(usize),
    #[error("target timespan must be positive, got {0}")]
    InvalidTimespan(i64),
}

/// A hash is valid iff it sorts below the difficulty. Both are fixed-width
/// lowercase hex, so string order matches numeric order.
pub fn meets_difficulty(hash: &str, difficulty: &str) -> bool {
    hash < difficulty
}

/// Difficulty target representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    hex: String,
}

impl Target {
    /// Parse a hex target, left-padding it to 64 chars
    pub fn from_hex(hex: &str) -> Result<Self, TargetError> {
        if hex.len() > DIFFICULTY_HEX_LEN {
            return Err(TargetError::TooWide(hex.len()));
        }
        let value = parse_hex(hex)?;
        Ok(Self::from_value(&value))
    }

    fn from_value(value: &BigUint) -> Self {
        let max = max_target();
        let value = if value > &max { &max } else { value };
        Self {
            hex: format!("{:0>width$}", value.to_str_radix(16), width = DIFFICULTY_HEX_LEN),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }

    pub fn into_string(self) -> String {
        self.hex
    }

    /// Count leading zero hex digits (difficulty indicator)
    pub fn leading_zeros(&self) -> usize {
        self.hex.chars().take_while(|c| *c == '0').count()
    }

    /// New target = floor(self * actual / target), saturating at 2^256 - 1
    pub fn scale(&self, actual_span: i64, target_span: i64) -> Result<Self, TargetError> {
        if target_span <= 0 {
            return Err(TargetError::InvalidTimespan(target_span));
        }
        let value = parse_hex(&self.hex)?;
        let actual = BigUint::from(actual_span.max(0) as u64);
        let scaled = value * actual / BigUint::from(target_span as u64);
        Ok(Self::from_value(&scaled))
    }
}

fn parse_hex(hex: &str) -> Result<BigUint, TargetError> {
    if hex.is_empty() {
        return Ok(BigUint::zero());
    }
    BigUint::parse_bytes(hex.as_bytes(), 16).ok_or_else(|| TargetError::InvalidHex(hex.to_string()))
}

fn max_target() -> BigUint {
    (BigUint::one() << (DIFFICULTY_HEX_LEN * 4)) - 1u32
}

/// Retarget helper over hex strings, returning a 64 char target
pub fn scale_difficulty(difficulty: &str, actual_span: i64, target_span: i64) -> Result<String, TargetError> {
    Ok(Target::from_hex(difficulty)?.scale(actual_span, target_span)?.into_string())
}

/// Random 8 byte nonce, hex encoded
pub fn random_nonce<R: Rng>(rng: &mut R) -> String {
    let mut bytes = [0u8; NONCE_LEN];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

/// Mining result
#[derive(Debug)]
pub struct MiningResult {
    /// Winning nonce and hash, None if the search was cancelled
    pub found: Option<HashResult>,
    /// Number of attempts
    pub attempts: u64,
    /// Time taken
    pub duration: Duration,
}

impl MiningResult {
    /// Calculate hash rate (hashes per second)
    pub fn hash_rate(&self) -> f64 {
        self.attempts as f64 / self.duration.as_secs_f64().max(f64::EPSILON)
    }
}

/// Draw random nonces until one satisfies the block's difficulty.
/// `cancelled` is polled every `poll_interval` attempts.
pub fn mine<F>(block: &Block, poll_interval: u64, cancelled: F) -> MiningResult
where
    F: Fn() -> bool,
{
    let start_time = Instant::now();
    let poll_interval = poll_interval.max(1);
    let mut rng = rand::thread_rng();
    let mut attempts = 0u64;

    loop {
        if attempts % poll_interval == 0 && cancelled() {
            log::debug!("Nonce search for block {} cancelled after {} attempts", block.height, attempts);
            return MiningResult {
                found: None,
                attempts,
                duration: start_time.elapsed(),
            };
        }

        let nonce = random_nonce(&mut rng);
        attempts += 1;

        if let Some(result) = block.try_hash(&nonce) {
            return MiningResult {
                found: Some(result),
                attempts,
                duration: start_time.elapsed(),
            };
        }

        // Progress indicator every 100k attempts
        if attempts % 100_000 == 0 {
            let elapsed = start_time.elapsed();
            log::debug!(
                "Mining attempts: {} ({:.1} KH/s)",
                attempts,
                attempts as f64 / elapsed.as_secs_f64() / 1000.0
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Output, Script, Transaction, TxType};
    use std::sync::atomic::{AtomicU64, Ordering};

    fn padded(hex: &str) -> String {
        format!("{:0>64}", hex)
    }

    #[test]
    fn test_scale_difficulty_vectors() {
        let cases = [
            ("fff", 2, 2, "fff"),
            ("111", 4, 2, "222"),
            ("333", 1, 3, "111"),
            ("fff", 1, 3, "555"),
            ("2341fac", 2, 15, "4b376c"),
            ("2341fac", 11, 3, "8147421"),
        ];
        for (difficulty, actual, target, expected) in cases {
            assert_eq!(
                scale_difficulty(difficulty, actual, target).unwrap(),
                padded(expected),
                "{} * {} / {}",
                difficulty,
                actual,
                target
            );
        }
    }

    #[test]
    fn test_scale_saturates() {
        let max = "f".repeat(64);
        assert_eq!(scale_difficulty(&max, 4, 1).unwrap(), max);
        assert_eq!(scale_difficulty(&format!("8{}", "0".repeat(63)), 3, 1).unwrap(), max);
    }

    #[test]
    fn test_scale_rejects_bad_input() {
        assert_eq!(scale_difficulty("xyz", 1, 1), Err(TargetError::InvalidHex("xyz".to_string())));
        assert_eq!(scale_difficulty("fff", 1, 0), Err(TargetError::InvalidTimespan(0)));
        assert_eq!(scale_difficulty(&"f".repeat(65), 1, 1), Err(TargetError::TooWide(65)));
    }

    #[test]
    fn test_target_padding_and_order() {
        let target = Target::from_hex("0000ffff").unwrap();
        assert_eq!(target.as_str().len(), DIFFICULTY_HEX_LEN);
        assert_eq!(target.leading_zeros(), 60);

        assert!(meets_difficulty(&padded("fffe"), target.as_str()));
        assert!(!meets_difficulty(&padded("ffff"), target.as_str()));
        assert!(!meets_difficulty(&padded("10000"), target.as_str()));
    }

    #[test]
    fn test_meets_difficulty_is_strict() {
        let d = padded("abc");
        assert!(meets_difficulty(&padded("abb"), &d));
        assert!(!meets_difficulty(&d, &d));
    }

    #[test]
    fn test_random_nonce_width() {
        let nonce = random_nonce(&mut rand::thread_rng());
        assert_eq!(nonce.len(), 16);
        assert!(hex::decode(&nonce).is_ok());
    }

    fn easy_block() -> Block {
        let mut tx = Transaction::new(1, TxType::Normal, vec![], vec![Output::new(1, Script::default(), "a")], vec![]);
        tx.update_hash().unwrap();
        Block::new(1000, String::new(), 0, vec![tx], format!("0fff{}", "f".repeat(60))).unwrap()
    }

    #[test]
    fn test_mine_easy_block() {
        let block = easy_block();
        let result = mine(&block, 16, || false);

        let found = result.found.expect("easy target");
        assert!(result.attempts >= 1);
        assert_eq!(block.hash_with(&found.nonce), found.hash);
        assert!(meets_difficulty(&found.hash, &block.difficulty));
    }

    #[test]
    fn test_mine_cancellation() {
        let mut block = easy_block();
        block.difficulty = "0".repeat(64);

        let polls = AtomicU64::new(0);
        let result = mine(&block, 8, || polls.fetch_add(1, Ordering::SeqCst) >= 3);

        assert!(result.found.is_none());
        assert_eq!(result.attempts, 24);
    }
}
