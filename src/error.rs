// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client fault taxonomy and its user-visible projection.

use serde::Serialize;

/// Every fault the client can surface to a caller.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Not signed in")]
    Unauthenticated,

    /// The server rejected the session token because the account signed in
    /// elsewhere. Local credentials are already wiped when this is returned.
    #[error("Session invalidated by a sign-in on another device")]
    DeviceInvalidated,

    #[error("Password change required")]
    FirstLoginRequired,

    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error("Step out of order: {0}")]
    StageOrder(&'static str),

    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Photo capture failed: {0}")]
    Capture(String),

    #[error("Photo upload failed: {0}")]
    Upload(String),

    #[error("Location unavailable: {0}")]
    Location(String),

    #[error("A vote for this session is already being submitted")]
    SubmissionInProgress,

    #[error("Already voted in this session")]
    AlreadyVoted,

    /// Raised locally by the geofence pre-check (both fields set) or
    /// returned by the server (fields set only when the server sends them).
    #[error("Outside the voting area")]
    GeofenceViolation {
        distance_m: Option<f64>,
        radius_m: Option<f64>,
    },

    #[error("No registered reference photo on file")]
    NoRegisteredFace,

    #[error("Face verification failed")]
    FaceVerificationFailed { confidence: Option<f64> },

    #[error("Vote submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Short title plus optional detail, ready for a toast or alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Notice {
    pub fn new(title: &str, detail: Option<String>) -> Self {
        Self {
            title: title.to_string(),
            detail,
        }
    }
}

impl ClientError {
    /// True for the faults raised by the vote endpoint (or its local
    /// pre-checks) rather than by transport or session handling.
    pub fn is_submission_fault(&self) -> bool {
        matches!(
            self,
            ClientError::AlreadyVoted
                | ClientError::GeofenceViolation { .. }
                | ClientError::NoRegisteredFace
                | ClientError::FaceVerificationFailed { .. }
                | ClientError::SubmissionFailed(_)
        )
    }

    /// True when the caller must send the user back to sign in.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthenticated | ClientError::DeviceInvalidated
        )
    }

    /// Map the fault to what the user sees.
    pub fn notice(&self) -> Notice {
        match self {
            ClientError::Unauthenticated => Notice::new(
                "Not signed in",
                Some("Please sign in to continue".to_string()),
            ),
            ClientError::DeviceInvalidated => Notice::new(
                "Session Expired",
                Some("You have been logged in on another device".to_string()),
            ),
            ClientError::FirstLoginRequired => Notice::new(
                "Password Change Required",
                Some("Please create a new password".to_string()),
            ),
            ClientError::Network(msg) => Notice::new("Connection problem", Some(msg.clone())),
            ClientError::Server { message, .. } => Notice::new("Request failed", Some(message.clone())),
            ClientError::Validation(msg) => Notice::new("Check your input", Some(msg.clone())),
            ClientError::InvalidState(msg) => Notice::new("Action unavailable", Some(msg.to_string())),
            ClientError::StageOrder(msg) => Notice::new("Step required", Some(msg.to_string())),
            ClientError::Storage(msg) => {
                tracing::error!(error = %msg, "Token storage error");
                Notice::new("Storage error", None)
            }
            ClientError::Capture(_) => Notice::new(
                "Failed to capture photo",
                Some("Please try again".to_string()),
            ),
            ClientError::Upload(msg) => Notice::new("Upload Failed", Some(msg.clone())),
            ClientError::Location(_) => Notice::new(
                "Location Required",
                Some("Location access is required to vote".to_string()),
            ),
            ClientError::SubmissionInProgress => Notice::new(
                "Submitting",
                Some("Your vote is already being submitted".to_string()),
            ),
            ClientError::AlreadyVoted => Notice::new(
                "Already Voted",
                Some("You have already voted in this session".to_string()),
            ),
            ClientError::GeofenceViolation {
                distance_m,
                radius_m,
            } => {
                let detail = match (distance_m, radius_m) {
                    (Some(distance), Some(radius)) => format!(
                        "You must be within {}m of the voting location to vote. You are currently {}m away.",
                        radius.round(),
                        distance.round()
                    ),
                    _ => "You must be within the voting location to vote".to_string(),
                };
                Notice::new("Location Error", Some(detail))
            }
            ClientError::NoRegisteredFace => Notice::new(
                "No Registered Photo",
                Some("No reference photo is on file for your account".to_string()),
            ),
            ClientError::FaceVerificationFailed { confidence } => {
                let detail = match confidence {
                    Some(c) => format!("Your photo did not match our records (confidence {c:.1})"),
                    None => "Your photo did not match our records".to_string(),
                };
                Notice::new("Face Verification Failed", Some(detail))
            }
            ClientError::SubmissionFailed(msg) => Notice::new("Vote Failed", Some(msg.clone())),
            ClientError::Internal(err) => {
                tracing::error!(error = %err, "Internal client error");
                Notice::new(
                    "Error",
                    Some("An unexpected error occurred. Please try again.".to_string()),
                )
            }
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
