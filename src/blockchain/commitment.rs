use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Previous hash recorded by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Character a hash must start with to satisfy the proof of work
pub const TARGET_SYMBOL: char = '0';

/// Length of a SHA-256 digest rendered as hex
pub const HASH_HEX_LEN: usize = 64;

/// Hashes the concatenation of the given fields
///
/// The parts are fed to the hasher in order with no delimiter between them,
/// so `["1", "23"]` and `["12", "3"]` commit to the same bytes.
///
/// # Returns
///
/// The SHA-256 digest as a lowercase hexadecimal string
pub fn commit(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();

    for part in parts {
        hasher.update(part.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

/// Canonical string form of a timestamp (RFC 3339, nanoseconds, `Z` suffix)
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Canonical string form of a payload
///
/// A string payload commits to its raw text; anything else commits to its
/// compact JSON rendering.
pub fn canonical_payload(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Checks whether a hash starts with `difficulty` target symbols
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let required = difficulty as usize;

    hash.len() >= required && hash.chars().take(required).all(|c| c == TARGET_SYMBOL)
}
