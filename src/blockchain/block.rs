use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::commitment::{canonical_payload, canonical_timestamp, commit, GENESIS_PREVIOUS_HASH};
use super::miner::sealing::Seal;
use super::miner::Mineable;

/// Opaque content stored in a block
pub type Payload = Value;

/// Payload carried by the genesis block
pub const GENESIS_PAYLOAD: &str = "Genesis Block";

/// Represents a block in the ledger
///
/// Fields are only readable from outside. The stored hash can drift from the
/// fields it commits over only through [`Block::rewrite_payload`], which is
/// what validation is there to catch. A new nonce is only ever stored by the
/// miner.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Index of the block in the chain
    index: u64,

    /// Timestamp when the block was created
    timestamp: DateTime<Utc>,

    /// Content stored in the block
    payload: Payload,

    /// Hash of the previous block
    previous_hash: String,

    /// Proof of work counter
    nonce: u64,

    /// Hash of the current block (calculated)
    hash: String,
}

impl Block {
    /// Creates a new block
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `timestamp` - The creation time of the block
    /// * `payload` - The content to store in the block
    /// * `previous_hash` - The hash of the previous block
    ///
    /// # Returns
    ///
    /// A new Block with a zero nonce and its hash already computed
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        payload: Payload,
        previous_hash: String,
    ) -> Self {
        let mut block = Block {
            index,
            timestamp,
            payload,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };

        block.hash = block.calculate_hash();
        block
    }

    /// Creates the genesis block (first block in the chain)
    pub fn genesis() -> Self {
        Block::new(
            0,
            Utc::now(),
            Payload::String(GENESIS_PAYLOAD.to_string()),
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    /// Calculates the hash of the block from its current fields
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Whether the stored hash still matches the block's fields
    pub fn is_sealed(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Replaces the payload without touching the stored hash
    ///
    /// The block reads as tampered until [`Block::reseal`] is called.
    pub fn rewrite_payload(&mut self, payload: Payload) {
        self.payload = payload;
    }

    /// Recomputes the hash from the current fields and stores it
    ///
    /// # Returns
    ///
    /// The newly stored hash
    pub fn reseal(&mut self) -> &str {
        self.hash = self.calculate_hash();
        &self.hash
    }

    /// Builds a display record of the block
    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            index: self.index,
            timestamp: self.timestamp,
            payload: self.payload.clone(),
            nonce: self.nonce,
            hash: self.hash.clone(),
            previous_hash: self.previous_hash.clone(),
        }
    }
}

impl Mineable for Block {
    fn nonce(&self) -> u64 {
        self.nonce
    }

    fn hash(&self) -> &str {
        &self.hash
    }

    fn hash_with_nonce(&self, nonce: u64) -> String {
        commit(&[
            &self.index.to_string(),
            &canonical_timestamp(&self.timestamp),
            &canonical_payload(&self.payload),
            &self.previous_hash,
            &nonce.to_string(),
        ])
    }
}

impl Seal for Block {
    fn seal(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = self.calculate_hash();
    }
}

/// Human-readable view of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BlockSummary {
    /// Index of the block in the chain
    pub index: u64,

    /// Timestamp when the block was created
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// Content stored in the block
    #[schema(value_type = Object)]
    pub payload: Payload,

    /// Proof of work counter
    pub nonce: u64,

    /// Hash of the block
    pub hash: String,

    /// Hash of the previous block
    pub previous_hash: String,
}

impl fmt::Display for BlockSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block {}:", self.index)?;
        writeln!(f, "  Timestamp: {}", canonical_timestamp(&self.timestamp))?;
        writeln!(f, "  Data: {}", canonical_payload(&self.payload))?;
        writeln!(f, "  Nonce: {}", self.nonce)?;
        writeln!(f, "  Hash: {}", self.hash)?;
        write!(f, "  Prev Hash: {}", self.previous_hash)
    }
}
