// Blockchain module
//
// This module contains the hash-linked ledger including:
// - Hash commitment over a block's fields
// - Block structure
// - Proof of work miner
// - Ledger (chain) with append and validation
// - A link-free block for mining on its own

pub mod block;
pub mod chain;
pub mod commitment;
pub mod miner;
pub mod standalone;

// Re-export main components for easier access
pub use block::{Block, BlockSummary, Payload};
pub use chain::{Ledger, LedgerError, Validation, Violation};
pub use miner::{Difficulty, Mineable, MiningError, MiningReport, ProofOfWorkMiner};
pub use standalone::StandaloneBlock;
