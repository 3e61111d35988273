use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use super::commitment::{meets_difficulty, HASH_HEX_LEN};

/// How many hashes a worker computes between deadline checks
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

/// Errors that can occur while mining
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MiningError {
    #[error("Invalid difficulty: {0} (expected 0..={max})", max = HASH_HEX_LEN)]
    InvalidDifficulty(i64),

    #[error("Mining timed out after {attempts} attempts ({elapsed:?})")]
    TimedOut { attempts: u64, elapsed: Duration },
}

pub(crate) mod sealing {
    /// Stores a nonce and the hash recomputed for it
    ///
    /// Only reachable inside the crate, so outside callers cannot re-nonce a
    /// block that already sits in a ledger.
    pub trait Seal {
        fn seal(&mut self, nonce: u64);
    }
}

use sealing::Seal;

/// Anything whose hash can be searched over a nonce
pub trait Mineable: Seal {
    /// Current proof of work counter
    fn nonce(&self) -> u64;

    /// Stored hash
    fn hash(&self) -> &str;

    /// Hash the block would have with the given nonce
    fn hash_with_nonce(&self, nonce: u64) -> String;
}

/// Number of leading target symbols a hash must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Difficulty(u32);

impl Difficulty {
    /// Creates a difficulty, rejecting levels no hex digest can reach
    pub fn new(level: u32) -> Result<Self, MiningError> {
        if level as usize > HASH_HEX_LEN {
            return Err(MiningError::InvalidDifficulty(i64::from(level)));
        }

        Ok(Difficulty(level))
    }

    pub fn level(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for Difficulty {
    type Error = MiningError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        let level = u32::try_from(level).map_err(|_| MiningError::InvalidDifficulty(level))?;
        Difficulty::new(level)
    }
}

/// Outcome of a successful search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningReport {
    /// Winning nonce stored in the block
    pub nonce: u64,

    /// Winning hash stored in the block
    pub hash: String,

    /// Number of hashes computed
    pub attempts: u64,

    /// Wall-clock time spent searching
    pub elapsed: Duration,
}

/// Brute-force proof of work search
#[derive(Debug, Clone)]
pub struct ProofOfWorkMiner {
    difficulty: Difficulty,
    timeout: Option<Duration>,
    workers: usize,
}

impl ProofOfWorkMiner {
    /// Creates a single-threaded miner with no timeout
    pub fn new(difficulty: Difficulty) -> Self {
        ProofOfWorkMiner {
            difficulty,
            timeout: None,
            workers: 1,
        }
    }

    /// Gives up with [`MiningError::TimedOut`] once the search runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Same miner at another difficulty
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Splits the nonce space between `workers` parallel searches
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Mines a block in place
    ///
    /// Searches upward from the block's current nonce until its hash starts
    /// with the required number of target symbols, then stores the winning
    /// nonce and hash. On error the block is left unchanged.
    ///
    /// # Arguments
    ///
    /// * `block` - The block to mine
    ///
    /// # Returns
    ///
    /// A report with the winning nonce and hash
    pub fn mine<B: Mineable + Sync>(&self, block: &mut B) -> Result<MiningReport, MiningError> {
        let started = Instant::now();

        if self.difficulty.level() == 0 {
            return Ok(MiningReport {
                nonce: block.nonce(),
                hash: block.hash().to_string(),
                attempts: 0,
                elapsed: started.elapsed(),
            });
        }

        debug!(
            "Mining at difficulty {} from nonce {} with {} worker(s)",
            self.difficulty.level(),
            block.nonce(),
            self.workers
        );

        let result = if self.workers > 1 {
            self.search_parallel(block, started)
        } else {
            self.search(block, started)
        };

        let (nonce, hash, attempts) = match result {
            Ok(found) => found,
            Err(err) => {
                warn!("{}", err);
                return Err(err);
            }
        };

        block.seal(nonce);
        debug_assert_eq!(block.hash(), hash);

        let report = MiningReport {
            nonce,
            hash,
            attempts,
            elapsed: started.elapsed(),
        };

        info!(
            "Block mined! Nonce: {}, Hash: {} ({} attempts in {:.2?})",
            report.nonce, report.hash, report.attempts, report.elapsed
        );

        Ok(report)
    }

    fn search<B: Mineable>(
        &self,
        block: &B,
        started: Instant,
    ) -> Result<(u64, String, u64), MiningError> {
        let level = self.difficulty.level();
        let mut nonce = block.nonce();
        let mut attempts = 0u64;

        loop {
            let hash = block.hash_with_nonce(nonce);
            attempts += 1;

            if meets_difficulty(&hash, level) {
                return Ok((nonce, hash, attempts));
            }

            if attempts % DEADLINE_CHECK_INTERVAL == 0 && self.deadline_passed(started) {
                return Err(MiningError::TimedOut {
                    attempts,
                    elapsed: started.elapsed(),
                });
            }

            nonce = nonce.wrapping_add(1);
        }
    }

    /// Worker `w` tries nonces `start + w`, `start + w + workers`, ...
    fn search_parallel<B: Mineable + Sync>(
        &self,
        block: &B,
        started: Instant,
    ) -> Result<(u64, String, u64), MiningError> {
        let level = self.difficulty.level();
        let start = block.nonce();
        let stride = self.workers as u64;

        let stop = AtomicBool::new(false);
        let attempts = AtomicU64::new(0);

        let winner = (0..stride).into_par_iter().find_map_any(|worker| {
            let mut nonce = start.wrapping_add(worker);
            let mut local_attempts = 0u64;

            let found = loop {
                if stop.load(Ordering::Relaxed) {
                    break None;
                }

                let hash = block.hash_with_nonce(nonce);
                local_attempts += 1;

                if meets_difficulty(&hash, level) {
                    stop.store(true, Ordering::Relaxed);
                    break Some((nonce, hash));
                }

                if local_attempts % DEADLINE_CHECK_INTERVAL == 0 && self.deadline_passed(started) {
                    stop.store(true, Ordering::Relaxed);
                    break None;
                }

                nonce = nonce.wrapping_add(stride);
            };

            attempts.fetch_add(local_attempts, Ordering::Relaxed);
            found
        });

        let attempts = attempts.into_inner();

        match winner {
            Some((nonce, hash)) => Ok((nonce, hash, attempts)),
            None => Err(MiningError::TimedOut {
                attempts,
                elapsed: started.elapsed(),
            }),
        }
    }

    fn deadline_passed(&self, started: Instant) -> bool {
        self.timeout
            .map_or(false, |timeout| started.elapsed() >= timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::block::Block;
    use chrono::Utc;
    use serde_json::json;

    fn test_block() -> Block {
        Block::new(1, Utc::now(), json!("Important Data"), "0".to_string())
    }

    fn miner(level: u32) -> ProofOfWorkMiner {
        ProofOfWorkMiner::new(Difficulty::new(level).unwrap())
    }

    #[test]
    fn test_difficulty_bounds() {
        assert_eq!(Difficulty::try_from(0).unwrap().level(), 0);
        assert_eq!(Difficulty::try_from(4).unwrap().level(), 4);
        assert_eq!(Difficulty::try_from(64).unwrap().level(), 64);
        assert_eq!(Difficulty::try_from(-1), Err(MiningError::InvalidDifficulty(-1)));
        assert_eq!(Difficulty::try_from(65), Err(MiningError::InvalidDifficulty(65)));
        assert_eq!(Difficulty::new(100), Err(MiningError::InvalidDifficulty(100)));
    }

    #[test]
    fn test_mine_satisfies_difficulty() {
        let mut block = test_block();
        let report = miner(2).mine(&mut block).unwrap();

        assert!(block.hash().starts_with("00"));
        assert_eq!(block.hash(), report.hash);
        assert_eq!(block.nonce(), report.nonce);
        assert_eq!(block.calculate_hash(), block.hash());
        assert!(report.attempts >= 1);
    }

    #[test]
    fn test_mine_finds_first_satisfying_nonce() {
        let mut block = test_block();
        let report = miner(1).mine(&mut block).unwrap();

        for nonce in 0..report.nonce {
            assert!(!block.hash_with_nonce(nonce).starts_with('0'));
        }
        assert_eq!(report.attempts, report.nonce + 1);
    }

    #[test]
    fn test_zero_difficulty_is_noop() {
        let mut block = test_block();
        let before = block.clone();

        let report = miner(0).mine(&mut block).unwrap();

        assert_eq!(report.attempts, 0);
        assert_eq!(report.nonce, 0);
        assert_eq!(block, before);
    }

    #[test]
    fn test_mine_resumes_from_current_nonce() {
        let mut block = test_block();
        let first = miner(1).mine(&mut block).unwrap();

        // Already satisfying: the current nonce wins straight away
        let again = miner(1).mine(&mut block).unwrap();
        assert_eq!(again.nonce, first.nonce);
        assert_eq!(again.attempts, 1);
    }

    #[test]
    fn test_parallel_mine_is_verifiable() {
        let mut block = test_block();
        let report = miner(3).with_workers(4).mine(&mut block).unwrap();

        assert!(block.hash().starts_with("000"));
        assert_eq!(block.nonce(), report.nonce);
        assert_eq!(block.calculate_hash(), report.hash);
    }

    #[test]
    fn test_timeout_leaves_block_unchanged() {
        let mut block = test_block();
        let before = block.clone();

        let result = miner(64)
            .with_timeout(Duration::from_millis(20))
            .mine(&mut block);

        assert!(matches!(result, Err(MiningError::TimedOut { attempts, .. }) if attempts > 0));
        assert_eq!(block, before);
    }

    #[test]
    fn test_parallel_timeout() {
        let mut block = test_block();
        let result = miner(64)
            .with_workers(2)
            .with_timeout(Duration::from_millis(20))
            .mine(&mut block);

        assert!(matches!(result, Err(MiningError::TimedOut { .. })));
        assert_eq!(block.nonce(), 0);
    }

    #[test]
    fn test_workers_never_zero() {
        assert_eq!(miner(1).with_workers(0).workers(), 1);
    }
}
