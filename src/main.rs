// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! UniVote command-line smoke client.
//!
//! Restores (or creates) a session against the configured API and lists
//! voting sessions. Usage: `univote [all|active|upcoming|ended]`.
//! Credentials for a fresh sign-in come from `UNIVOTE_MATRIC_NO` and
//! `UNIVOTE_PASSWORD`.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use univote_client::{
    config::Config,
    error::ClientError,
    services::{FileTokenStore, LoginOutcome, SessionFilter, StaticPlatform},
    VotingClient,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(api = %config.api_base_url, "Starting UniVote client");

    let filter: SessionFilter = std::env::args()
        .nth(1)
        .unwrap_or_default()
        .parse()?;

    let platform = StaticPlatform::host(
        &config.app_version,
        std::env::var("UNIVOTE_INSTALLATION_ID").ok(),
    );
    let store = FileTokenStore::new(&config.token_dir);
    let client = VotingClient::new(config, Arc::new(platform), Arc::new(store))?;

    match client.initialize().await {
        Ok(Some(user)) => tracing::info!(matric_no = %user.matric_no, "Session restored"),
        Ok(None) => sign_in(&client).await?,
        Err(ClientError::DeviceInvalidated) => {
            let notice = ClientError::DeviceInvalidated.notice();
            tracing::warn!(title = %notice.title, detail = ?notice.detail, "Session ended");
            sign_in(&client).await?;
        }
        Err(e) => return Err(e.into()),
    }

    let sessions = client.catalog.fetch_sessions(filter).await?;
    for session in sessions.iter() {
        tracing::info!(
            id = %session.id,
            title = %session.title,
            status = ?session.status,
            has_voted = session.has_voted,
            "Session"
        );
    }

    Ok(())
}

async fn sign_in(client: &VotingClient) -> Result<(), ClientError> {
    let (Ok(matric_no), Ok(password)) = (
        std::env::var("UNIVOTE_MATRIC_NO"),
        std::env::var("UNIVOTE_PASSWORD"),
    ) else {
        return Err(ClientError::Unauthenticated);
    };

    let outcome = client.auth.login(&matric_no, &password).await?;
    let notice = outcome.notice();
    tracing::info!(title = %notice.title, detail = ?notice.detail, "Sign-in");

    if outcome == LoginOutcome::PasswordChangeRequired {
        return Err(ClientError::FirstLoginRequired);
    }
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("univote_client=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
