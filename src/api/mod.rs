// API module
//
// This module contains the REST API over the ledger

pub mod handlers;
pub mod routes;

// Re-export main components for easier access
pub use handlers::{ApiError, LedgerData, MinerData};
pub use routes::configure_routes;
