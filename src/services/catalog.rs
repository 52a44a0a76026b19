// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-mostly cache over the session, candidate, results and history
//! endpoints.
//!
//! Every fetch asks the auth session for a fresh token, replaces its cache
//! slot wholesale on success and leaves all other slots alone on failure.

use crate::error::{ClientError, Result};
use crate::models::{
    Candidate, FinalResults, LiveResults, LiveResultsSnapshot, SessionDetail, SessionSummary,
    VoteDetail, VoteHistoryRecord,
};
use crate::services::api::ApiClient;
use crate::services::auth::AuthSession;
use chrono::Utc;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Status filter for the session list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionFilter {
    #[default]
    All,
    Active,
    Upcoming,
    Ended,
}

impl SessionFilter {
    /// Value of the `status` query parameter; `None` when the filter does
    /// not narrow the list.
    pub fn status_param(&self) -> Option<&'static str> {
        match self {
            SessionFilter::All => None,
            SessionFilter::Active => Some("active"),
            SessionFilter::Upcoming => Some("upcoming"),
            SessionFilter::Ended => Some("ended"),
        }
    }
}

impl FromStr for SessionFilter {
    type Err = ClientError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(SessionFilter::All),
            "active" => Ok(SessionFilter::Active),
            "upcoming" => Ok(SessionFilter::Upcoming),
            "ended" => Ok(SessionFilter::Ended),
            other => Err(ClientError::Validation(format!("Unknown session filter: {}", other))),
        }
    }
}

/// Who asked for a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// User action: failures are returned.
    Explicit,
    /// Timer tick: failures are logged and swallowed.
    Silent,
}

#[derive(Deserialize)]
struct SessionsResponse {
    sessions: Vec<SessionSummary>,
}

#[derive(Deserialize)]
struct SessionResponse {
    session: SessionDetail,
}

#[derive(Deserialize)]
struct CandidateResponse {
    candidate: Candidate,
}

#[derive(Deserialize)]
struct HistoryResponse {
    history: Vec<VoteHistoryRecord>,
}

#[derive(Deserialize)]
struct VoteResponse {
    vote: VoteDetail,
}

type Slot<T> = RwLock<Option<Arc<T>>>;

#[derive(Default)]
struct CatalogCache {
    sessions: Slot<Vec<SessionSummary>>,
    session_detail: Slot<SessionDetail>,
    candidate: Slot<Candidate>,
    live_results: Slot<LiveResultsSnapshot>,
    final_results: Slot<FinalResults>,
    history: Slot<Vec<VoteHistoryRecord>>,
    vote_detail: Slot<VoteDetail>,
    /// Bumped by `clear`; fetches started under an older generation do not
    /// write their results.
    generation: AtomicU64,
}

fn read_slot<T>(slot: &Slot<T>) -> Option<Arc<T>> {
    slot.read().unwrap_or_else(|e| e.into_inner()).clone()
}

fn write_slot<T>(slot: &Slot<T>, value: Option<Arc<T>>) {
    *slot.write().unwrap_or_else(|e| e.into_inner()) = value;
}

/// Voting data cache. Clones share the same cache.
#[derive(Clone)]
pub struct VotingCatalog {
    api: ApiClient,
    auth: AuthSession,
    cache: Arc<CatalogCache>,
}

impl VotingCatalog {
    pub fn new(api: ApiClient, auth: AuthSession) -> Self {
        Self {
            api,
            auth,
            cache: Arc::new(CatalogCache::default()),
        }
    }

    fn generation(&self) -> u64 {
        self.cache.generation.load(Ordering::SeqCst)
    }

    /// Store `value` unless the cache was cleared since `generation`.
    fn commit<T>(&self, slot: &Slot<T>, generation: u64, value: Arc<T>) -> bool {
        if self.generation() != generation {
            tracing::debug!("Cache cleared during fetch, discarding result");
            return false;
        }
        write_slot(slot, Some(value));
        true
    }

    // ─── Fetches ─────────────────────────────────────────────────────────────

    /// Fetch the session list, narrowed by `filter`.
    pub async fn fetch_sessions(&self, filter: SessionFilter) -> Result<Arc<Vec<SessionSummary>>> {
        let generation = self.generation();
        let token = self.auth.bearer_token()?;

        let query: Vec<(&str, &str)> = filter
            .status_param()
            .map(|status| vec![("status", status)])
            .unwrap_or_default();

        let response: SessionsResponse = self
            .api
            .get_json_with_query("/sessions", &token, &query)
            .await
            .map_err(|e| e.into_client_error("Failed to fetch sessions"))?;

        let sessions = Arc::new(response.sessions);
        tracing::debug!(count = sessions.len(), ?filter, "Sessions fetched");
        self.commit(&self.cache.sessions, generation, sessions.clone());
        Ok(sessions)
    }

    /// Fetch one session with its candidates grouped by position.
    pub async fn fetch_session_detail(&self, session_id: &str) -> Result<Arc<SessionDetail>> {
        let generation = self.generation();
        let token = self.auth.bearer_token()?;
        let path = format!("/sessions/{}", urlencoding::encode(session_id));

        let response: SessionResponse = self
            .api
            .get_json(&path, &token)
            .await
            .map_err(|e| e.into_client_error("Failed to fetch session details"))?;

        let session = Arc::new(response.session);
        self.commit(&self.cache.session_detail, generation, session.clone());
        Ok(session)
    }

    pub async fn fetch_candidate_detail(&self, candidate_id: &str) -> Result<Arc<Candidate>> {
        let generation = self.generation();
        let token = self.auth.bearer_token()?;
        let path = format!("/sessions/candidates/{}", urlencoding::encode(candidate_id));

        let response: CandidateResponse = self
            .api
            .get_json(&path, &token)
            .await
            .map_err(|e| e.into_client_error("Failed to fetch candidate details"))?;

        let candidate = Arc::new(response.candidate);
        self.commit(&self.cache.candidate, generation, candidate.clone());
        Ok(candidate)
    }

    /// Fetch live results without touching the cache.
    async fn load_live_results(&self, session_id: &str) -> Result<LiveResultsSnapshot> {
        let token = self.auth.bearer_token()?;
        let path = format!("/sessions/{}/live-results", urlencoding::encode(session_id));

        let results: LiveResults = self
            .api
            .get_json(&path, &token)
            .await
            .map_err(|e| e.into_client_error("Failed to fetch live results"))?;

        Ok(LiveResultsSnapshot {
            session_id: session_id.to_string(),
            results,
            last_updated: Utc::now(),
        })
    }

    /// Fetch live results and swap them into the cache as one snapshot.
    ///
    /// In `Silent` mode a failure is logged and `Ok(None)` returned; the
    /// previous snapshot stays in place.
    pub async fn refresh_live_results(
        &self,
        session_id: &str,
        mode: RefreshMode,
    ) -> Result<Option<Arc<LiveResultsSnapshot>>> {
        let generation = self.generation();

        match self.load_live_results(session_id).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.commit(&self.cache.live_results, generation, snapshot.clone());
                Ok(Some(snapshot))
            }
            Err(e) if mode == RefreshMode::Silent => {
                tracing::warn!(session_id, error = %e, "Background live results refresh failed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn fetch_final_results(&self, session_id: &str) -> Result<Arc<FinalResults>> {
        let generation = self.generation();
        let token = self.auth.bearer_token()?;
        let path = format!("/results/{}", urlencoding::encode(session_id));

        let results: FinalResults = self
            .api
            .get_json(&path, &token)
            .await
            .map_err(|e| e.into_client_error("Failed to fetch final results"))?;

        let results = Arc::new(results);
        self.commit(&self.cache.final_results, generation, results.clone());
        Ok(results)
    }

    pub async fn fetch_vote_history(&self) -> Result<Arc<Vec<VoteHistoryRecord>>> {
        let generation = self.generation();
        let token = self.auth.bearer_token()?;

        let response: HistoryResponse = self
            .api
            .get_json("/vote/history", &token)
            .await
            .map_err(|e| e.into_client_error("Failed to fetch voting history"))?;

        let history = Arc::new(response.history);
        self.commit(&self.cache.history, generation, history.clone());
        Ok(history)
    }

    /// Fetch a single recorded vote.
    pub async fn fetch_vote_detail(&self, vote_id: &str) -> Result<Arc<VoteDetail>> {
        let generation = self.generation();
        let token = self.auth.bearer_token()?;
        let path = format!("/vote/{}", urlencoding::encode(vote_id));

        let response: VoteResponse = self
            .api
            .get_json(&path, &token)
            .await
            .map_err(|e| e.into_client_error("Failed to fetch vote details"))?;

        let vote = Arc::new(response.vote);
        self.commit(&self.cache.vote_detail, generation, vote.clone());
        Ok(vote)
    }

    // ─── Cached views ────────────────────────────────────────────────────────

    pub fn sessions(&self) -> Option<Arc<Vec<SessionSummary>>> {
        read_slot(&self.cache.sessions)
    }

    /// `has_voted` for a session as last reported by the session list.
    pub fn has_voted(&self, session_id: &str) -> Option<bool> {
        self.sessions()?
            .iter()
            .find(|s| s.id == session_id)
            .map(|s| s.has_voted)
    }

    pub fn session_detail(&self) -> Option<Arc<SessionDetail>> {
        read_slot(&self.cache.session_detail)
    }

    pub fn candidate(&self) -> Option<Arc<Candidate>> {
        read_slot(&self.cache.candidate)
    }

    pub fn live_results(&self) -> Option<Arc<LiveResultsSnapshot>> {
        read_slot(&self.cache.live_results)
    }

    pub fn final_results(&self) -> Option<Arc<FinalResults>> {
        read_slot(&self.cache.final_results)
    }

    pub fn vote_history(&self) -> Option<Arc<Vec<VoteHistoryRecord>>> {
        read_slot(&self.cache.history)
    }

    pub fn vote_detail(&self) -> Option<Arc<VoteDetail>> {
        read_slot(&self.cache.vote_detail)
    }

    /// Drop everything, e.g. after logout. Fetches still in flight will not
    /// repopulate the cache.
    pub fn clear(&self) {
        self.cache.generation.fetch_add(1, Ordering::SeqCst);
        write_slot(&self.cache.sessions, None);
        write_slot(&self.cache.session_detail, None);
        write_slot(&self.cache.candidate, None);
        write_slot(&self.cache.live_results, None);
        write_slot(&self.cache.final_results, None);
        write_slot(&self.cache.history, None);
        write_slot(&self.cache.vote_detail, None);
    }

    /// Start polling live results for `session_id` every `interval`.
    pub fn poll_live_results(&self, session_id: &str, interval: Duration) -> LiveResultsPoller {
        LiveResultsPoller::start(self.clone(), session_id.to_string(), interval)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LiveResultsPoller - timer-driven silent refresh
// ─────────────────────────────────────────────────────────────────────────────

/// Background refresh of live results, stopped with [`stop`](Self::stop) or
/// on drop.
///
/// A request in flight when the poller stops is allowed to finish but its
/// result is discarded.
pub struct LiveResultsPoller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl LiveResultsPoller {
    fn start(catalog: VotingCatalog, session_id: String, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(session_id = %session_id, ?interval, "Live results polling started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let generation = catalog.generation();
                let result = catalog.load_live_results(&session_id).await;

                if token.is_cancelled() {
                    tracing::debug!(session_id = %session_id, "Poller stopped, discarding response");
                    break;
                }

                match result {
                    Ok(snapshot) => {
                        catalog.commit(&catalog.cache.live_results, generation, Arc::new(snapshot));
                    }
                    Err(e) => {
                        tracing::warn!(session_id = %session_id, error = %e, "Live results poll failed");
                    }
                }
            }

            tracing::debug!(session_id = %session_id, "Live results polling stopped");
        });

        Self { cancel, handle }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for LiveResultsPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_narrowing_filters_add_status() {
        assert_eq!(SessionFilter::All.status_param(), None);
        assert_eq!(SessionFilter::Active.status_param(), Some("active"));
        assert_eq!(SessionFilter::Upcoming.status_param(), Some("upcoming"));
        assert_eq!(SessionFilter::Ended.status_param(), Some("ended"));
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("ALL".parse::<SessionFilter>().unwrap(), SessionFilter::All);
        assert_eq!(" ended ".parse::<SessionFilter>().unwrap(), SessionFilter::Ended);
        assert!("closed".parse::<SessionFilter>().is_err());
    }
}
