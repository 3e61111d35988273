use chrono::{DateTime, Utc};

use super::commitment::{canonical_timestamp, commit};
use super::miner::sealing::Seal;
use super::miner::Mineable;

/// A block with no place in a chain
///
/// Its hash covers only `timestamp + data + nonce`, so it carries no index
/// and no link to a predecessor. Used to show mining in isolation.
#[derive(Debug, Clone, PartialEq)]
pub struct StandaloneBlock {
    data: String,
    timestamp: DateTime<Utc>,
    nonce: u64,
    hash: String,
}

impl StandaloneBlock {
    /// Creates a block stamped with the current time
    pub fn new(data: impl Into<String>) -> Self {
        StandaloneBlock::with_timestamp(data, Utc::now())
    }

    pub fn with_timestamp(data: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let mut block = StandaloneBlock {
            data: data.into(),
            timestamp,
            nonce: 0,
            hash: String::new(),
        };

        block.hash = block.calculate_hash();
        block
    }

    pub fn calculate_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl Mineable for StandaloneBlock {
    fn nonce(&self) -> u64 {
        self.nonce
    }

    fn hash(&self) -> &str {
        &self.hash
    }

    fn hash_with_nonce(&self, nonce: u64) -> String {
        commit(&[
            &canonical_timestamp(&self.timestamp),
            &self.data,
            &nonce.to_string(),
        ])
    }
}

impl Seal for StandaloneBlock {
    fn seal(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = self.calculate_hash();
    }
}
