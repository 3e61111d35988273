use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::block::{Block, BlockSummary, Payload};
use super::miner::{MiningError, MiningReport, ProofOfWorkMiner};

/// Errors that can occur during ledger operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Ledger has no blocks")]
    EmptyLedger,

    #[error("Mining error: {0}")]
    Mining(#[from] MiningError),

    #[error("Candidate block {index} no longer extends the chain tip")]
    StaleCandidate { index: u64 },
}

/// Why a block failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    /// The stored hash no longer matches the block's fields
    HashMismatch,

    /// The previous hash does not match the predecessor's stored hash
    BrokenLink,
}

/// Result of walking the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid { index: u64, violation: Violation },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// Represents the ledger
#[derive(Debug, Clone)]
pub struct Ledger {
    /// The chain of blocks
    blocks: Vec<Block>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Creates a new ledger holding only the genesis block
    pub fn new() -> Self {
        let genesis = Block::genesis();
        info!("Created ledger with genesis block {}", genesis.hash());

        Ledger {
            blocks: vec![genesis],
        }
    }

    /// Same as [`Ledger::new`]
    pub fn genesis() -> Self {
        Self::new()
    }

    /// Wraps an externally built sequence of blocks
    ///
    /// Nothing is checked here; call [`Ledger::validate`] to find out whether
    /// the sequence holds together.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Ledger { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> Result<&Block, LedgerError> {
        self.blocks.last().ok_or(LedgerError::EmptyLedger)
    }

    /// Mutable access to a block, for tampering with it
    ///
    /// Outside this crate a block only exposes [`Block::rewrite_payload`] and
    /// [`Block::reseal`] as mutations, so this cannot reorder or remove
    /// anything. Re-nonceing through sealing is reserved for the miner.
    pub fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    /// Appends a new block without mining it
    ///
    /// # Arguments
    ///
    /// * `payload` - The data to be stored in the new block
    ///
    /// # Returns
    ///
    /// The newly appended block
    pub fn append(&mut self, payload: Payload) -> Result<Block, LedgerError> {
        let block = self.candidate(payload)?;
        self.push(block.clone());

        Ok(block)
    }

    /// Appends a new block after mining it
    ///
    /// If mining fails nothing is appended.
    ///
    /// # Arguments
    ///
    /// * `payload` - The data to be stored in the new block
    /// * `miner` - The miner that admits the block
    ///
    /// # Returns
    ///
    /// The newly appended block and the mining report
    pub fn append_mined(
        &mut self,
        payload: Payload,
        miner: &ProofOfWorkMiner,
    ) -> Result<(Block, MiningReport), LedgerError> {
        let mut block = self.candidate(payload)?;
        let report = miner.mine(&mut block)?;
        self.push(block.clone());

        Ok((block, report))
    }

    /// Builds the block that would extend the current tip
    ///
    /// Nothing is appended. Mine it, then hand it to [`Ledger::admit`].
    pub fn candidate(&self, payload: Payload) -> Result<Block, LedgerError> {
        let last_block = self.last_block()?;

        Ok(Block::new(
            self.blocks.len() as u64,
            Utc::now(),
            payload,
            last_block.hash().to_string(),
        ))
    }

    /// Appends a block built by [`Ledger::candidate`]
    ///
    /// Fails with [`LedgerError::StaleCandidate`] if the chain grew since the
    /// candidate was built.
    pub fn admit(&mut self, block: Block) -> Result<(), LedgerError> {
        let last_block = self.last_block()?;

        let extends_tip = block.previous_hash() == last_block.hash()
            && block.index() == self.blocks.len() as u64;

        if !extends_tip {
            return Err(LedgerError::StaleCandidate {
                index: block.index(),
            });
        }

        self.push(block);
        Ok(())
    }

    /// Validates the ledger
    ///
    /// Stops at the first block whose stored hash is stale or whose link
    /// to its predecessor is broken. The genesis block has no predecessor
    /// and is not checked.
    pub fn validate(&self) -> Result<Validation, LedgerError> {
        if self.blocks.is_empty() {
            return Err(LedgerError::EmptyLedger);
        }

        for (i, pair) in self.blocks.windows(2).enumerate() {
            let previous_block = &pair[0];
            let current_block = &pair[1];
            let position = (i + 1) as u64;

            // Check if the hash is correct
            if !current_block.is_sealed() {
                return Ok(self.invalid(position, Violation::HashMismatch));
            }

            // Check if the previous hash is correct
            if current_block.previous_hash() != previous_block.hash() {
                return Ok(self.invalid(position, Violation::BrokenLink));
            }
        }

        Ok(Validation::Valid)
    }

    /// Whether the ledger is non-empty and passes [`Ledger::validate`]
    pub fn is_valid(&self) -> bool {
        matches!(self.validate(), Ok(Validation::Valid))
    }

    /// Summaries of all blocks in order
    pub fn display(&self) -> Vec<BlockSummary> {
        self.blocks.iter().map(Block::summary).collect()
    }

    fn push(&mut self, block: Block) {
        debug!("Appending block {} with hash {}", block.index(), block.hash());
        self.blocks.push(block);
    }

    fn invalid(&self, position: u64, violation: Violation) -> Validation {
        warn!("Block at position {} failed validation: {:?}", position, violation);

        Validation::Invalid {
            index: position,
            violation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::miner::Difficulty;
    use serde_json::json;
    use std::time::Duration;

    fn three_block_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.append(json!("Second Block")).unwrap();
        ledger.append(json!("Third Block")).unwrap();
        ledger
    }

    #[test]
    fn test_new_ledger() {
        let ledger = Ledger::new();

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.blocks()[0].index(), 0);
        assert_eq!(ledger.blocks()[0].previous_hash(), "0");
        assert!(ledger.is_valid());
        assert_eq!(ledger.validate(), Ok(Validation::Valid));
    }

    #[test]
    fn test_append_preserves_validity() {
        let mut ledger = Ledger::new();

        for i in 0..10 {
            let previous_hash = ledger.last_block().unwrap().hash().to_string();
            let block = ledger.append(json!({ "n": i })).unwrap();

            assert_eq!(block.index(), i + 1);
            assert_eq!(block.previous_hash(), previous_hash);
            assert_eq!(block.nonce(), 0);
            assert!(ledger.is_valid());
        }

        assert_eq!(ledger.len(), 11);
    }

    #[test]
    fn test_append_returns_stored_block() {
        let mut ledger = Ledger::new();
        let block = ledger.append(json!("Second Block")).unwrap();

        assert_eq!(ledger.last_block().unwrap(), &block);
    }

    #[test]
    fn test_stale_hash_is_detected() {
        let mut ledger = three_block_ledger();

        ledger
            .block_mut(1)
            .unwrap()
            .rewrite_payload(json!("Tampered Data"));

        assert!(!ledger.is_valid());
        assert_eq!(
            ledger.validate(),
            Ok(Validation::Invalid {
                index: 1,
                violation: Violation::HashMismatch
            })
        );
    }

    #[test]
    fn test_resealed_block_breaks_link() {
        let mut ledger = three_block_ledger();
        let original_hash = ledger.blocks()[1].hash().to_string();

        let block = ledger.block_mut(1).unwrap();
        block.rewrite_payload(json!("Tampered Data"));
        block.reseal();

        assert!(ledger.blocks()[1].is_sealed());
        assert!(!ledger.is_valid());
        assert_eq!(
            ledger.validate(),
            Ok(Validation::Invalid {
                index: 2,
                violation: Violation::BrokenLink
            })
        );
        assert_eq!(ledger.blocks()[2].previous_hash(), original_hash);
    }

    #[test]
    fn test_tampered_last_block_is_detected() {
        let mut ledger = three_block_ledger();

        ledger
            .block_mut(2)
            .unwrap()
            .rewrite_payload(json!("Tampered Data"));

        assert_eq!(
            ledger.validate(),
            Ok(Validation::Invalid {
                index: 2,
                violation: Violation::HashMismatch
            })
        );
    }

    #[test]
    fn test_genesis_is_not_checked() {
        let mut ledger = Ledger::new();

        ledger
            .block_mut(0)
            .unwrap()
            .rewrite_payload(json!("Rewritten Genesis"));

        assert!(ledger.is_valid());
    }

    #[test]
    fn test_empty_ledger() {
        let mut ledger = Ledger::from_blocks(Vec::new());

        assert!(ledger.is_empty());
        assert_eq!(ledger.validate(), Err(LedgerError::EmptyLedger));
        assert!(!ledger.is_valid());
        assert_eq!(ledger.append(json!("data")), Err(LedgerError::EmptyLedger));
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn test_append_mined() {
        let mut ledger = Ledger::new();
        let miner = ProofOfWorkMiner::new(Difficulty::new(2).unwrap());

        let (block, report) = ledger.append_mined(json!("Mined Block"), &miner).unwrap();

        assert!(block.hash().starts_with("00"));
        assert_eq!(block.nonce(), report.nonce);
        assert_eq!(block.previous_hash(), ledger.blocks()[0].hash());
        assert_eq!(ledger.len(), 2);
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_failed_mining_appends_nothing() {
        let mut ledger = Ledger::new();
        let miner = ProofOfWorkMiner::new(Difficulty::new(64).unwrap())
            .with_timeout(Duration::from_millis(10));

        let result = ledger.append_mined(json!("Never Mined"), &miner);

        assert!(matches!(
            result,
            Err(LedgerError::Mining(MiningError::TimedOut { .. }))
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_candidate_then_admit() {
        let mut ledger = Ledger::new();
        let miner = ProofOfWorkMiner::new(Difficulty::new(1).unwrap());

        let mut block = ledger.candidate(json!("Mined Block")).unwrap();
        assert_eq!(ledger.len(), 1);

        miner.mine(&mut block).unwrap();
        ledger.admit(block.clone()).unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.last_block().unwrap(), &block);
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_stale_candidate_is_rejected() {
        let mut ledger = Ledger::new();
        let block = ledger.candidate(json!("Late Block")).unwrap();

        ledger.append(json!("Early Block")).unwrap();

        assert_eq!(
            ledger.admit(block),
            Err(LedgerError::StaleCandidate { index: 1 })
        );
        assert_eq!(ledger.len(), 2);
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_validation_reports_position_not_stored_index() {
        let genesis = Block::genesis();
        let linked = Block::new(7, Utc::now(), json!("a"), genesis.hash().to_string());
        let unlinked = Block::new(9, Utc::now(), json!("b"), "bogus".to_string());
        let ledger = Ledger::from_blocks(vec![genesis, linked, unlinked]);

        assert_eq!(
            ledger.validate(),
            Ok(Validation::Invalid {
                index: 2,
                violation: Violation::BrokenLink
            })
        );
    }

    #[test]
    fn test_display() {
        let ledger = three_block_ledger();
        let summaries = ledger.display();

        let indices: Vec<u64> = summaries.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(summaries[1].payload, json!("Second Block"));
        assert_eq!(summaries[2].previous_hash, summaries[1].hash);
    }
}
