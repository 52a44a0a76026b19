// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! UniVote client: authentication and ballot submission for university
//! elections.
//!
//! This crate holds the client-side logic of the voting app: the auth
//! session with device binding, the cached view of sessions and results,
//! ballot drafting and the verified vote submission pipeline. Rendering,
//! navigation and the server itself are out of scope.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

use config::Config;
use error::Result;
use models::SessionDetail;
use services::submission::SubmissionRegistry;
use services::{
    ApiClient, AuthSession, BallotDraft, CaptureDevices, DeviceIdentity, DevicePlatform,
    LiveResultsPoller, TokenStore, VoteSubmissionPipeline, VotingCatalog,
};
use std::sync::Arc;

/// Shared client context, passed explicitly to whatever needs it.
#[derive(Clone)]
pub struct VotingClient {
    pub config: Config,
    pub auth: AuthSession,
    pub catalog: VotingCatalog,
    api: ApiClient,
    submissions: SubmissionRegistry,
}

impl VotingClient {
    pub fn new(
        config: Config,
        platform: Arc<dyn DevicePlatform>,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        let api = ApiClient::new(&config.api_base_url, config.http_timeout)?;
        let device = DeviceIdentity::new(platform);
        let auth = AuthSession::new(api.clone(), store, device);
        let catalog = VotingCatalog::new(api.clone(), auth.clone());

        Ok(Self {
            config,
            auth,
            catalog,
            api,
            submissions: Arc::new(dashmap::DashSet::new()),
        })
    }

    /// HTTP client shared by API calls, for building a photo uploader.
    pub fn http(&self) -> &reqwest::Client {
        self.api.http()
    }

    /// Start a submission attempt, taking ownership of a complete draft.
    pub fn begin_submission(
        &self,
        session: Arc<SessionDetail>,
        draft: BallotDraft,
        devices: CaptureDevices,
    ) -> Result<VoteSubmissionPipeline> {
        VoteSubmissionPipeline::new(
            session,
            draft,
            self.api.clone(),
            self.auth.clone(),
            self.catalog.clone(),
            devices,
            self.submissions.clone(),
        )
    }

    /// Restore a persisted session at start-up. Cached voting data is
    /// dropped when the session turns out to be invalidated.
    pub async fn initialize(&self) -> Result<Option<models::User>> {
        let result = self.auth.initialize().await;
        if matches!(result, Err(error::ClientError::DeviceInvalidated)) {
            self.catalog.clear();
        }
        result
    }

    /// Poll live results at the configured interval.
    pub fn watch_live_results(&self, session_id: &str) -> LiveResultsPoller {
        self.catalog
            .poll_live_results(session_id, self.config.live_results_poll_interval)
    }

    /// Sign out and forget all cached voting data.
    pub async fn logout(&self) {
        self.auth.logout().await;
        self.catalog.clear();
    }
}
