use std::sync::Mutex;
use std::time::Duration;

use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::blockchain::{
    BlockSummary, Difficulty, Ledger, LedgerError, MiningError, Payload, ProofOfWorkMiner,
    Validation, Violation,
};
use crate::config::DEFAULT_MINE_TIMEOUT_MS;

/// Data structure for the ledger state
pub type LedgerData = web::Data<Mutex<Ledger>>;

/// Miner configured for the node
pub type MinerData = web::Data<ProofOfWorkMiner>;

/// Errors returned by the API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Ledger lock poisoned")]
    LockPoisoned,

    #[error("{0}")]
    Ledger(#[from] LedgerError),

    #[error("Mining task failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl From<MiningError> for ApiError {
    fn from(err: MiningError) -> Self {
        ApiError::Ledger(LedgerError::Mining(err))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Ledger(LedgerError::Mining(MiningError::InvalidDifficulty(_))) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Ledger(LedgerError::Mining(MiningError::TimedOut { .. })) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Ledger(LedgerError::EmptyLedger)
            | ApiError::Ledger(LedgerError::StaleCandidate { .. }) => StatusCode::CONFLICT,
            ApiError::LockPoisoned | ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<BlockSummary>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the append endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct AppendRequest {
    /// The data to store in the new block
    #[schema(value_type = Object)]
    pub payload: Payload,
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// The data to store in the new block
    #[schema(value_type = Object)]
    pub payload: Payload,

    /// Overrides the node's configured difficulty
    pub difficulty: Option<i64>,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The newly mined block
    pub block: BlockSummary,

    /// Difficulty the block was mined at
    pub difficulty: u32,

    /// Number of hashes computed
    pub attempts: u64,

    /// Time spent mining in milliseconds
    pub elapsed_ms: u64,
}

/// Response for the validate endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ValidationResponse {
    /// Whether the chain is valid
    pub is_valid: bool,

    /// Index of the first block that failed validation
    pub invalid_index: Option<u64>,

    /// Why that block failed
    pub violation: Option<Violation>,
}

impl From<Validation> for ValidationResponse {
    fn from(validation: Validation) -> Self {
        match validation {
            Validation::Valid => ValidationResponse {
                is_valid: true,
                invalid_index: None,
                violation: None,
            },
            Validation::Invalid { index, violation } => ValidationResponse {
                is_valid: false,
                invalid_index: Some(index),
                violation: Some(violation),
            },
        }
    }
}

/// Get the full chain
///
/// Returns every block in order and the chain's validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Chain retrieved successfully", body = ChainResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_chain(ledger: LedgerData) -> Result<HttpResponse, ApiError> {
    let ledger = ledger.lock().map_err(|_| ApiError::LockPoisoned)?;
    let chain = ledger.display();

    let response = ChainResponse {
        length: chain.len(),
        chain,
        is_valid: ledger.is_valid(),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Append a block
///
/// Adds a new block holding the payload, without mining it
#[utoipa::path(
    post,
    path = "/api/v1/blocks",
    request_body = AppendRequest,
    responses(
        (status = 201, description = "Block appended successfully", body = BlockSummary),
        (status = 409, description = "Ledger has no blocks"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn append_block(
    ledger: LedgerData,
    append_req: web::Json<AppendRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut ledger = ledger.lock().map_err(|_| ApiError::LockPoisoned)?;
    let block = ledger.append(append_req.into_inner().payload)?;

    Ok(HttpResponse::Created().json(block.summary()))
}

/// Mine a new block
///
/// Mines a block holding the payload and appends it to the chain. The ledger
/// stays readable while the search runs; if another block lands first the
/// mined one is discarded with 409.
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 400, description = "Invalid difficulty"),
        (status = 409, description = "Chain tip moved while mining"),
        (status = 503, description = "Mining timed out"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(
    ledger: LedgerData,
    miner: MinerData,
    mine_req: web::Json<MineRequest>,
) -> Result<HttpResponse, ApiError> {
    let MineRequest {
        payload,
        difficulty,
    } = mine_req.into_inner();

    let mut miner = match difficulty {
        Some(level) => miner
            .get_ref()
            .clone()
            .with_difficulty(Difficulty::try_from(level)?),
        None => miner.get_ref().clone(),
    };

    // Requests never mine unbounded
    if miner.timeout().is_none() {
        miner = miner.with_timeout(Duration::from_millis(DEFAULT_MINE_TIMEOUT_MS));
    }

    let difficulty = miner.difficulty().level();

    let mut block = {
        let ledger = ledger.lock().map_err(|_| ApiError::LockPoisoned)?;
        ledger.candidate(payload)?
    };

    // Mining is CPU bound; keep it off the async workers and outside the lock.
    let (block, report) = web::block(move || -> Result<_, ApiError> {
        let report = miner.mine(&mut block)?;
        Ok((block, report))
    })
    .await??;

    let mut ledger = ledger.lock().map_err(|_| ApiError::LockPoisoned)?;
    let summary = block.summary();
    ledger.admit(block)?;

    let response = MineResponse {
        message: "New Block Mined".to_string(),
        block: summary,
        difficulty,
        attempts: report.attempts,
        elapsed_ms: report.elapsed.as_millis() as u64,
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Check if the chain is valid
///
/// Validates the entire chain and reports the first offending block
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Chain validation status", body = ValidationResponse),
        (status = 409, description = "Ledger has no blocks"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn validate_chain(ledger: LedgerData) -> Result<HttpResponse, ApiError> {
    let ledger = ledger.lock().map_err(|_| ApiError::LockPoisoned)?;
    let validation = ledger.validate()?;

    Ok(HttpResponse::Ok().json(ValidationResponse::from(validation)))
}
