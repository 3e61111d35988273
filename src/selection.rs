//! Winner selection by maximum score.
//!
//! A toy illustration of picking a block producer: every candidate gets a
//! score, either drawn at random, supplied by the caller, or counted from
//! weighted votes, and the highest score wins. Nothing here talks to the
//! ledger or to other nodes.

use std::cmp::Reverse;
use std::ops::RangeInclusive;

use rand::distributions::{Distribution, WeightedError, WeightedIndex};
use rand::Rng;
use thiserror::Error;

/// Range random scores are drawn from
pub const SCORE_RANGE: RangeInclusive<u32> = 1..=100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Candidate pool is empty")]
    EmptyPool,

    #[error("Expected {expected} weights, got {got}")]
    WeightMismatch { expected: usize, got: usize },

    #[error("Invalid weights: {0}")]
    InvalidWeights(#[from] WeightedError),

    #[error("At least one voter is required")]
    NoVoters,
}

/// Scores per candidate and the winner among them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standings {
    /// Candidates and their scores, in pool order
    pub scores: Vec<(String, u32)>,

    /// Candidate with the highest score
    ///
    /// Fixed and drawn scores break ties by pool order, vote tallies by who
    /// received a vote first.
    pub winner: String,

    /// Winning score
    pub score: u32,
}

impl Standings {
    /// Builds standings from fixed scores
    pub fn from_scores<S, I>(scores: I) -> Result<Self, SelectionError>
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, u32)>,
    {
        let scores: Vec<(String, u32)> = scores
            .into_iter()
            .map(|(name, score)| (name.into(), score))
            .collect();

        let (winner, score) = leader(&scores)
            .map(|(name, score)| (name.clone(), *score))
            .ok_or(SelectionError::EmptyPool)?;

        Ok(Standings {
            scores,
            winner,
            score,
        })
    }
}

/// Outcome of a weighted vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTally {
    /// Every vote cast, in draw order
    pub votes: Vec<String>,

    /// Votes received per candidate, in pool order
    pub standings: Standings,
}

impl VoteTally {
    pub fn voters(&self) -> usize {
        self.votes.len()
    }
}

/// Draws a uniform score from [`SCORE_RANGE`] for every candidate
pub fn draw_scores<R: Rng>(
    candidates: &[&str],
    rng: &mut R,
) -> Result<Standings, SelectionError> {
    if candidates.is_empty() {
        return Err(SelectionError::EmptyPool);
    }

    Standings::from_scores(
        candidates
            .iter()
            .map(|name| (*name, rng.gen_range(SCORE_RANGE))),
    )
}

/// Casts `voters` votes, each drawn from the pool with the given weights
pub fn tally_votes<R: Rng>(
    candidates: &[&str],
    weights: &[u32],
    voters: usize,
    rng: &mut R,
) -> Result<VoteTally, SelectionError> {
    if candidates.is_empty() {
        return Err(SelectionError::EmptyPool);
    }
    if weights.len() != candidates.len() {
        return Err(SelectionError::WeightMismatch {
            expected: candidates.len(),
            got: weights.len(),
        });
    }
    if voters == 0 {
        return Err(SelectionError::NoVoters);
    }

    let distribution = WeightedIndex::new(weights)?;
    let choices: Vec<usize> = (0..voters).map(|_| distribution.sample(rng)).collect();

    let standings = count_votes(candidates, &choices)?;
    let votes = choices
        .iter()
        .map(|&choice| candidates[choice].to_string())
        .collect();

    Ok(VoteTally { votes, standings })
}

/// Tallies votes given as pool indices, in the order they were cast
fn count_votes(candidates: &[&str], choices: &[usize]) -> Result<Standings, SelectionError> {
    let mut counts = vec![0u32; candidates.len()];
    let mut first_vote = vec![usize::MAX; candidates.len()];

    for (position, &choice) in choices.iter().enumerate() {
        counts[choice] += 1;
        first_vote[choice] = first_vote[choice].min(position);
    }

    let winner = (0..candidates.len())
        .filter(|&i| counts[i] > 0)
        .min_by_key(|&i| (Reverse(counts[i]), first_vote[i]))
        .ok_or(SelectionError::NoVoters)?;

    Ok(Standings {
        scores: candidates
            .iter()
            .map(|name| name.to_string())
            .zip(counts.iter().copied())
            .collect(),
        winner: candidates[winner].to_string(),
        score: counts[winner],
    })
}

// Iterator::max_by_key keeps the last maximum; the earliest is wanted here.
fn leader(scores: &[(String, u32)]) -> Option<&(String, u32)> {
    scores
        .iter()
        .reduce(|best, next| if next.1 > best.1 { next } else { best })
}
