// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - client logic layer.

pub mod api;
pub mod auth;
pub mod ballot;
pub mod catalog;
pub mod device;
pub mod geofence;
pub mod store;
pub mod submission;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthSession, AuthState, LoginOutcome};
pub use ballot::BallotDraft;
pub use catalog::{LiveResultsPoller, RefreshMode, SessionFilter, VotingCatalog};
pub use device::{DeviceIdentity, DevicePlatform, StaticPlatform};
pub use geofence::GeoPoint;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use submission::{
    CaptureDevices, CloudinaryUploader, Locator, PhotoCapture, PhotoUploader, PipelineStage,
    SubmissionOutcome, VoteSubmissionPipeline,
};
