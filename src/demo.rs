//! Console walkthroughs of the ledger, the miner and winner selection.

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use crate::blockchain::{Ledger, LedgerError, MiningError, ProofOfWorkMiner, StandaloneBlock};
use crate::selection::{self, SelectionError, Standings};

/// Seed used by the selection walkthrough
pub const SELECTION_SEED: u64 = 42;

/// What the tamper walkthrough observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TamperOutcome {
    pub valid_before: bool,
    pub valid_after: bool,
    pub original_hash: String,
    pub tampered_hash: String,
    pub link_in_next_block: String,
}

/// Builds a three-block ledger, tampers with block 1 and re-validates
pub fn run_tamper_demo() -> Result<TamperOutcome, LedgerError> {
    let mut ledger = Ledger::new();
    ledger.append(json!("Second Block"))?;
    ledger.append(json!("Third Block"))?;

    println!("Initial Blockchain:");
    print_chain(&ledger);

    let valid_before = ledger.is_valid();
    println!("Blockchain valid: {}", valid_before);

    println!("\nTampering with Block 1...");
    let original_hash = ledger.blocks()[1].hash().to_string();
    let tampered_hash = match ledger.block_mut(1) {
        Some(block) => {
            block.rewrite_payload(json!("Tampered Data"));
            block.reseal().to_string()
        }
        None => return Err(LedgerError::EmptyLedger),
    };

    println!("\nAfter Tampering:");
    print_chain(&ledger);

    let valid_after = ledger.is_valid();
    let link_in_next_block = ledger.blocks()[2].previous_hash().to_string();

    println!("Blockchain valid after tampering: {}", valid_after);
    println!(
        "Hash in Block 2 still points to original Block 1 hash: {}",
        link_in_next_block
    );

    Ok(TamperOutcome {
        valid_before,
        valid_after,
        original_hash,
        tampered_hash,
        link_in_next_block,
    })
}

/// Mines a block that belongs to no chain
pub fn run_mining_demo(miner: &ProofOfWorkMiner) -> Result<StandaloneBlock, MiningError> {
    let mut block = StandaloneBlock::new("Important Data");

    println!("Mining block...");
    let report = miner.mine(&mut block)?;

    println!("Block mined! Nonce: {}, Hash: {}", report.nonce, report.hash);
    println!("Time taken: {:.2} seconds", report.elapsed.as_secs_f64());

    Ok(block)
}

/// Runs the three selection rounds with a fixed seed
pub fn run_selection_demo() -> Result<(), SelectionError> {
    let mut rng = StdRng::seed_from_u64(SELECTION_SEED);
    info!("Running selection rounds with seed {}", SELECTION_SEED);

    println!("WINNER SELECTION DEMO\n");

    let power = selection::draw_scores(&["Alice", "Bob", "Carol"], &mut rng)?;
    print_standings("Random score", &power, "computational power");

    let stake = selection::draw_scores(&["Charlie", "Dave", "Eve"], &mut rng)?;
    print_standings("Random score", &stake, "stake amount");

    let tally = selection::tally_votes(
        &["Frank", "Grace", "Heidi", "Ivan"],
        &[40, 30, 20, 10],
        10,
        &mut rng,
    )?;
    println!("[Weighted vote]");
    println!("Votes: {:?}", tally.votes);
    println!("Vote distribution: {:?}", tally.standings.scores);
    println!("Total voters: {}", tally.voters());
    println!(
        "Winner: {} ({} votes received)\n",
        tally.standings.winner, tally.standings.score
    );

    Ok(())
}

fn print_chain(ledger: &Ledger) {
    for summary in ledger.display() {
        println!("{}\n", summary);
    }
}

fn print_standings(round: &str, standings: &Standings, metric: &str) {
    println!("[{}]", round);
    for (name, score) in &standings.scores {
        println!("{}: {} {}", name, score, metric);
    }
    println!(
        "Winner: {} ({} {})\n",
        standings.winner, standings.score, metric
    );
}
