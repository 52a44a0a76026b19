//! Live and final tallies.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Response of `GET /sessions/:id/live-results`.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveResults {
    pub session: LiveSessionHeader,
    #[serde(default)]
    pub total_votes: u64,
    /// Server time of the tally
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results: Vec<PositionResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveSessionHeader {
    pub title: String,
    #[serde(default)]
    pub is_live: bool,
}

/// Response of `GET /results/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct FinalResults {
    pub session: FinalSessionHeader,
    #[serde(default)]
    pub total_valid_votes: u64,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default)]
    pub results: Vec<PositionResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinalSessionHeader {
    pub title: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results_public: bool,
}

/// Tally for one position.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionResult {
    pub position: String,
    #[serde(default)]
    pub total_votes: u64,
    #[serde(default)]
    pub candidates: Vec<CandidateResult>,
}

impl PositionResult {
    /// Candidates flagged as leading (several on a tie).
    pub fn leaders(&self) -> impl Iterator<Item = &CandidateResult> {
        self.candidates.iter().filter(|c| c.is_leading)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateResult {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub is_leading: bool,
    pub is_winner: Option<bool>,
}

/// Cached live results together with the local time they arrived.
///
/// Held behind an `Arc` and replaced as a whole, so readers never observe a
/// mix of two polls.
#[derive(Debug, Clone)]
pub struct LiveResultsSnapshot {
    pub session_id: String,
    pub results: LiveResults,
    pub last_updated: DateTime<Utc>,
}
