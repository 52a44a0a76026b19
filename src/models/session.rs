// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Voting sessions and their candidates.
//!
//! `status` always comes from the server. Nothing here compares the session
//! window with the local clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::services::geofence::GeoPoint;

/// Server-reported lifecycle of a session (upcoming → active → ended).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Upcoming,
    Active,
    Ended,
}

/// Circular area a session may restrict voting to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub latitude: f64,
    pub longitude: f64,
    /// Allowed radius in meters
    pub radius: f64,
}

impl Geofence {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Whether the signed-in student may vote in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Eligibility {
    pub eligible: bool,
    pub reason: Option<String>,
}

/// Session entry from `GET /sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSummary {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub location: Option<Geofence>,
    #[serde(default)]
    pub is_off_campus_allowed: bool,
    pub eligible_college: Option<String>,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default)]
    pub candidate_count: u32,
}

/// Full session from `GET /sessions/:id`, with candidates grouped by position.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionDetail {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    #[serde(default)]
    pub categories: Vec<String>,
    pub location: Option<Geofence>,
    #[serde(default)]
    pub is_off_campus_allowed: bool,
    pub eligible: bool,
    pub eligibility_reason: Option<String>,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default)]
    pub candidates_by_position: BTreeMap<String, Vec<Candidate>>,
}

impl SessionDetail {
    /// Position keys a complete ballot must cover.
    pub fn positions(&self) -> impl Iterator<Item = &str> {
        self.candidates_by_position.keys().map(String::as_str)
    }

    /// The geofence the client must pre-check, if any.
    pub fn geofence(&self) -> Option<&Geofence> {
        self.location.as_ref()
    }

    pub fn eligibility(&self) -> Eligibility {
        Eligibility {
            eligible: self.eligible,
            reason: self.eligibility_reason.clone(),
        }
    }

    /// Find a candidate listed under `position`.
    pub fn candidate(&self, position: &str, candidate_id: &str) -> Option<&Candidate> {
        self.candidates_by_position
            .get(position)?
            .iter()
            .find(|c| c.id == candidate_id)
    }

    /// Voting is offered only for active sessions the student is eligible
    /// for and has not voted in yet.
    pub fn accepts_ballot(&self) -> bool {
        self.status == SessionStatus::Active && self.eligible && !self.has_voted
    }
}

/// A candidate standing for one position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub photo_url: String,
    pub bio: Option<String>,
    pub manifesto: Option<String>,
    /// Present only in detail and result contexts
    pub vote_count: Option<u64>,
}
