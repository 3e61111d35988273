//! A hash-linked, tamper-evident ledger.
//!
//! Every block stores a SHA-256 commitment over its own fields plus the
//! commitment of the block before it, so rewriting any block shows up when
//! the chain is validated. New blocks can be admitted through a brute-force
//! proof of work search.
//!
//! - `blockchain`: commitments, blocks, the miner and the ledger
//! - `api`: REST endpoints over a shared ledger
//! - `config`: TOML configuration for the node
//! - `selection`: toy winner selection by maximum score, unrelated to the chain
//! - `demo`: console walkthroughs used by the binary

pub mod api;
pub mod blockchain;
pub mod config;
pub mod demo;
pub mod selection;
