// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session catalog, results and history caching against a mock API.

mod common;

use axum::http::Method;
use common::{
    campus_geofence, session_detail_json, sessions_json, signed_in_client, test_client,
    MockBackend,
};
use serde_json::{json, Value};
use std::time::Duration;
use univote_client::error::ClientError;
use univote_client::models::SessionStatus;
use univote_client::services::{RefreshMode, SessionFilter};

fn live_results_json(president_votes: u64) -> Value {
    json!({
        "session": { "title": "SRC Elections 2026", "is_live": true },
        "total_votes": president_votes,
        "last_updated": "2026-10-16T10:00:00Z",
        "results": [{
            "position": "President",
            "total_votes": president_votes,
            "candidates": [
                { "id": "cand-p1", "name": "Tunde Bello", "vote_count": president_votes, "percentage": 100.0, "is_leading": true },
                { "id": "cand-p2", "name": "Ngozi Eze", "vote_count": 0, "percentage": 0.0, "is_leading": false }
            ]
        }]
    })
}

#[tokio::test]
async fn test_fetch_without_session_makes_no_request() {
    let backend = MockBackend::start().await;
    let (client, _store) = test_client(&backend);

    let err = client
        .catalog
        .fetch_sessions(SessionFilter::All)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Unauthenticated));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_fetch_sessions_with_filter() {
    let backend = MockBackend::start().await;
    let (client, _store) = signed_in_client(&backend).await;
    backend.stub(Method::GET, "/sessions", 200, sessions_json(false));

    let sessions = client
        .catalog
        .fetch_sessions(SessionFilter::Active)
        .await
        .unwrap();

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "sess-1");
    assert_eq!(sessions[0].status, SessionStatus::Active);
    assert_eq!(client.catalog.has_voted("sess-1"), Some(false));

    let request = &backend.requests_to(Method::GET, "/sessions")[0];
    assert_eq!(request.query.as_deref(), Some("status=active"));
    assert_eq!(request.authorization.as_deref(), Some("Bearer tok-1"));

    client.catalog.fetch_sessions(SessionFilter::All).await.unwrap();
    let requests = backend.requests_to(Method::GET, "/sessions");
    assert_eq!(requests[1].query, None);
}

#[tokio::test]
async fn test_failed_fetch_keeps_cached_data() {
    let backend = MockBackend::start().await;
    let (client, _store) = signed_in_client(&backend).await;
    backend.stub(Method::GET, "/sessions", 200, sessions_json(false));
    client.catalog.fetch_sessions(SessionFilter::All).await.unwrap();

    backend.stub(
        Method::GET,
        "/sessions",
        500,
        json!({ "error": "Database unavailable" }),
    );
    let err = client
        .catalog
        .fetch_sessions(SessionFilter::All)
        .await
        .unwrap_err();

    match err {
        ClientError::Server { message, .. } => assert_eq!(message, "Database unavailable"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.catalog.sessions().map(|s| s.len()), Some(1));
}

#[tokio::test]
async fn test_fetch_error_without_message_uses_fallback() {
    let backend = MockBackend::start().await;
    let (client, _store) = signed_in_client(&backend).await;
    backend.stub(Method::GET, "/results/sess-1", 403, json!({}));

    let err = client
        .catalog
        .fetch_final_results("sess-1")
        .await
        .unwrap_err();

    match err {
        ClientError::Server { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Failed to fetch final results");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(client.catalog.final_results().is_none());
    // Catalog errors never end the session.
    assert!(client.auth.is_authenticated());
}

#[tokio::test]
async fn test_session_detail_groups_candidates_by_position() {
    let backend = MockBackend::start().await;
    let (client, _store) = signed_in_client(&backend).await;
    backend.stub(
        Method::GET,
        "/sessions/sess-1",
        200,
        json!({ "session": session_detail_json(Some(campus_geofence())) }),
    );

    let session = client.catalog.fetch_session_detail("sess-1").await.unwrap();

    assert_eq!(
        session.positions().collect::<Vec<_>>(),
        vec!["President", "Treasurer"]
    );
    assert_eq!(session.geofence().map(|g| g.radius), Some(200.0));
    assert!(session.accepts_ballot());
    assert!(session.candidate("President", "cand-p2").is_some());
    assert!(session.candidate("Treasurer", "cand-p2").is_none());
    assert_eq!(client.catalog.session_detail().map(|s| s.id.clone()), Some("sess-1".to_string()));
}

#[tokio::test]
async fn test_live_results_refresh_modes() {
    let backend = MockBackend::start().await;
    let (client, _store) = signed_in_client(&backend).await;
    backend.stub(
        Method::GET,
        "/sessions/sess-1/live-results",
        200,
        live_results_json(12),
    );

    let snapshot = client
        .catalog
        .refresh_live_results("sess-1", RefreshMode::Explicit)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.results.total_votes, 12);
    let leaders: Vec<_> = snapshot.results.results[0].leaders().map(|c| c.id.as_str()).collect();
    assert_eq!(leaders, vec!["cand-p1"]);

    backend.stub(
        Method::GET,
        "/sessions/sess-1/live-results",
        503,
        json!({ "error": "Results unavailable" }),
    );

    let silent = client
        .catalog
        .refresh_live_results("sess-1", RefreshMode::Silent)
        .await
        .unwrap();
    assert!(silent.is_none());
    assert_eq!(
        client.catalog.live_results().map(|s| s.results.total_votes),
        Some(12)
    );

    let explicit = client
        .catalog
        .refresh_live_results("sess-1", RefreshMode::Explicit)
        .await;
    assert!(matches!(explicit, Err(ClientError::Server { status: 503, .. })));
}

#[tokio::test]
async fn test_live_results_poller_stops() {
    let backend = MockBackend::start().await;
    let (client, _store) = signed_in_client(&backend).await;
    backend.stub(
        Method::GET,
        "/sessions/sess-1/live-results",
        200,
        live_results_json(3),
    );

    let poller = client
        .catalog
        .poll_live_results("sess-1", Duration::from_millis(20));

    let mut waited = 0;
    while backend.requests_to(Method::GET, "/sessions/sess-1/live-results").len() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
        assert!(waited < 300, "poller never refreshed");
    }
    assert!(client.catalog.live_results().is_some());

    poller.stop();
    let mut waited = 0;
    while !poller.is_finished() {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
        assert!(waited < 300, "poller did not stop");
    }

    let count = backend.requests_to(Method::GET, "/sessions/sess-1/live-results").len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        backend.requests_to(Method::GET, "/sessions/sess-1/live-results").len(),
        count
    );
}

#[tokio::test]
async fn test_vote_history_and_detail() {
    let backend = MockBackend::start().await;
    let (client, _store) = signed_in_client(&backend).await;
    backend.stub(
        Method::GET,
        "/vote/history",
        200,
        json!({
            "history": [{
                "session": { "_id": "sess-1", "title": "SRC Elections 2026" },
                "votes": [{
                    "_id": "vote-1",
                    "position": "President",
                    "candidate": { "_id": "cand-p1", "name": "Tunde Bello" }
                }],
                "voted_at": "2026-10-16T09:30:00Z"
            }]
        }),
    );
    backend.stub(
        Method::GET,
        "/vote/vote-1",
        200,
        json!({
            "vote": {
                "_id": "vote-1",
                "position": "President",
                "candidate": { "_id": "cand-p1", "name": "Tunde Bello", "position": "President" },
                "geo_location": { "lat": 6.5244, "lng": 3.3792 },
                "face_match_score": 91.2,
                "face_verification_passed": true,
                "status": "valid"
            }
        }),
    );

    let history = client.catalog.fetch_vote_history().await.unwrap();
    assert_eq!(history.len(), 1);
    let vote = history[0].vote_for("President").unwrap();
    assert_eq!(vote.candidate.name, "Tunde Bello");
    assert!(history[0].vote_for("Treasurer").is_none());

    let detail = client.catalog.fetch_vote_detail(&vote.id).await.unwrap();
    assert!(detail.face_verification_passed);
    assert_eq!(detail.geo_location.map(|l| l.lat), Some(6.5244));
}

#[tokio::test]
async fn test_logout_clears_catalog() {
    let backend = MockBackend::start().await;
    let (client, _store) = signed_in_client(&backend).await;
    backend.stub(Method::GET, "/sessions", 200, sessions_json(true));
    backend.stub(Method::POST, "/auth/logout", 200, json!({}));
    client.catalog.fetch_sessions(SessionFilter::All).await.unwrap();
    assert_eq!(client.catalog.has_voted("sess-1"), Some(true));

    client.logout().await;

    assert!(client.catalog.sessions().is_none());
    assert_eq!(client.catalog.has_voted("sess-1"), None);
}
