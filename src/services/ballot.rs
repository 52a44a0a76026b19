// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-progress ballot for one session.

use crate::error::{ClientError, Result};
use crate::models::{Choice, SessionDetail};
use std::collections::{BTreeMap, BTreeSet};

/// The candidate picked for one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub candidate_id: String,
    pub candidate_name: String,
}

/// Per-position selections, scoped to exactly one session.
///
/// Holds at most one selection per position. The draft is moved into the
/// submission pipeline and dropped after a successful vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotDraft {
    session_id: String,
    /// Position key -> ids of the candidates standing for it
    positions: BTreeMap<String, BTreeSet<String>>,
    selections: BTreeMap<String, Selection>,
}

impl BallotDraft {
    /// Start an empty draft keyed by the session's positions.
    pub fn new(session: &SessionDetail) -> Self {
        let positions = session
            .candidates_by_position
            .iter()
            .map(|(position, candidates)| {
                let ids = candidates.iter().map(|c| c.id.clone()).collect();
                (position.clone(), ids)
            })
            .collect();

        Self {
            session_id: session.id.clone(),
            positions,
            selections: BTreeMap::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Position keys of the session.
    pub fn positions(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    /// Pick `candidate_id` for `position`, replacing any earlier pick.
    ///
    /// Re-selecting the current candidate leaves the draft unchanged.
    pub fn select(
        &mut self,
        position: &str,
        candidate_id: &str,
        candidate_name: &str,
    ) -> Result<()> {
        let candidates = self.positions.get(position).ok_or_else(|| {
            ClientError::Validation(format!("Unknown position: {}", position))
        })?;

        if !candidates.contains(candidate_id) {
            return Err(ClientError::Validation(format!(
                "Candidate {} is not standing for {}",
                candidate_id, position
            )));
        }

        self.selections.insert(
            position.to_string(),
            Selection {
                candidate_id: candidate_id.to_string(),
                candidate_name: candidate_name.to_string(),
            },
        );
        Ok(())
    }

    /// Drop the pick for `position`, if any.
    pub fn deselect(&mut self, position: &str) -> Option<Selection> {
        self.selections.remove(position)
    }

    pub fn selection(&self, position: &str) -> Option<&Selection> {
        self.selections.get(position)
    }

    pub fn is_selected(&self, position: &str, candidate_id: &str) -> bool {
        self.selections
            .get(position)
            .is_some_and(|s| s.candidate_id == candidate_id)
    }

    /// True iff every session position has a selection.
    pub fn is_complete(&self) -> bool {
        self.selections.len() == self.positions.len()
            && self.positions.keys().all(|p| self.selections.contains_key(p))
    }

    /// Positions still lacking a selection.
    pub fn missing_positions(&self) -> Vec<&str> {
        self.positions
            .keys()
            .filter(|p| !self.selections.contains_key(*p))
            .map(String::as_str)
            .collect()
    }

    /// Fail unless the draft can be submitted.
    pub fn require_complete(&self) -> Result<()> {
        if self.positions.is_empty() {
            return Err(ClientError::Validation(
                "This session has no positions to vote for".to_string(),
            ));
        }
        if !self.is_complete() {
            return Err(ClientError::Validation(
                "Please select a candidate for each position".to_string(),
            ));
        }
        Ok(())
    }

    /// Selections as the `choices` list of the vote payload, one entry per
    /// position.
    pub fn choices(&self) -> Vec<Choice> {
        self.selections
            .iter()
            .map(|(position, selection)| Choice {
                candidate_id: selection.candidate_id.clone(),
                category: position.clone(),
            })
            .collect()
    }

    /// `(position, candidate name)` pairs for the confirmation message.
    pub fn summary(&self) -> Vec<(&str, &str)> {
        self.selections
            .iter()
            .map(|(p, s)| (p.as_str(), s.candidate_name.as_str()))
            .collect()
    }
}
