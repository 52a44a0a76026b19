// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ballot submission payload and read-only vote records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the `choices` array sent to `POST /vote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub candidate_id: String,
    /// Position key, exactly as it appears in the session
    pub category: String,
}

/// Body of `POST /vote`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPayload {
    pub session_id: String,
    pub choices: Vec<Choice>,
    pub image_url: String,
    pub lat: f64,
    pub lng: f64,
    pub device_id: String,
}

/// Acknowledgement of an accepted ballot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoteReceipt {
    #[serde(default)]
    pub message: Option<String>,
    /// Ids of the vote records the server created, when it reports them
    #[serde(default)]
    pub votes: Vec<serde_json::Value>,
}

/// One session the student voted in, from `GET /vote/history`.
#[derive(Debug, Clone, Deserialize)]
pub struct VoteHistoryRecord {
    pub session: HistorySession,
    #[serde(default)]
    pub votes: Vec<CastVote>,
    pub voted_at: DateTime<Utc>,
}

impl VoteHistoryRecord {
    /// The candidate chosen for `position`, if any.
    pub fn vote_for(&self, position: &str) -> Option<&CastVote> {
        self.votes.iter().find(|v| v.position == position)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistorySession {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastVote {
    #[serde(alias = "_id")]
    pub id: String,
    pub position: String,
    pub candidate: CandidateSnapshot,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateSnapshot {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub photo_url: String,
}

/// A single vote record from `GET /vote/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct VoteDetail {
    #[serde(alias = "_id")]
    pub id: String,
    pub student: Option<VoteStudent>,
    pub session: Option<VoteSession>,
    pub candidate: Option<VoteCandidate>,
    pub position: String,
    pub geo_location: Option<VoteLocation>,
    pub face_match_score: Option<f64>,
    #[serde(default)]
    pub face_verification_passed: bool,
    pub status: String,
    pub device_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteStudent {
    #[serde(alias = "_id")]
    pub id: String,
    pub matric_no: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteSession {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteCandidate {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub photo_url: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VoteLocation {
    pub lat: f64,
    pub lng: f64,
}
