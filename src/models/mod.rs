// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Wire and domain models for the voting API.

pub mod results;
pub mod session;
pub mod user;
pub mod vote;

pub use results::{CandidateResult, FinalResults, LiveResults, LiveResultsSnapshot, PositionResult};
pub use session::{Candidate, Eligibility, Geofence, SessionDetail, SessionStatus, SessionSummary};
pub use user::{Student, User};
pub use vote::{Choice, SubmissionPayload, VoteDetail, VoteHistoryRecord, VoteReceipt};
