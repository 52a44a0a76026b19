// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON transport for the voting API.
//!
//! Handles:
//! - Bearer authentication on every call except login
//! - Decoding of the server's error body (`error`, `message`, `code`, ...)
//! - Mapping transport and status failures to [`ApiError`]

use crate::error::ClientError;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Voting API client.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the API rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Internal(anyhow::anyhow!("HTTP client setup: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Underlying HTTP client, shared with the photo uploader.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET with JSON response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, ApiError> {
        self.get_json_with_query(path, token, &[]).await
    }

    /// GET with query parameters and JSON response.
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        tracing::debug!(path, "API GET");

        let mut request = self.http.get(self.url(path)).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Send a JSON body and parse a JSON response. `token` is `None` only
    /// for login.
    pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ApiError> {
        tracing::debug!(%method, path, "API request");

        let mut request = self.http.request(method, self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// POST without a body, ignoring any response body.
    pub async fn post_empty(&self, path: &str, token: &str) -> Result<(), ApiError> {
        tracing::debug!(path, "API POST");

        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(Self::status_error(response).await)
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        // Some endpoints acknowledge with an empty body.
        let body: &[u8] = if bytes.is_empty() { b"{}" } else { &bytes };

        serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn status_error(response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let body = ErrorBody::parse(&text);

        tracing::debug!(status, code = ?body.code, "API error response");
        ApiError::Status { status, body }
    }
}

/// Error body sent by the server with non-2xx responses.
///
/// Fields are read one by one, so a field of an unexpected type is dropped
/// without losing the others.
#[derive(Debug, Clone, Default)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
    /// Machine-readable code such as `FIRST_LOGIN` or `ALREADY_VOTED`
    pub code: Option<String>,
    /// Face-match confidence for `FACE_VERIFICATION_FAILED`
    pub confidence: Option<f64>,
    /// First-login token for `FIRST_LOGIN`
    pub token: Option<String>,
    /// Measured distance for `GEOFENCE_VIOLATION`, when reported
    pub distance: Option<f64>,
    /// Allowed radius for `GEOFENCE_VIOLATION`, when reported
    pub allowed_radius: Option<f64>,
}

impl ErrorBody {
    /// Read an error body. Anything that is not a JSON object yields an
    /// empty body.
    pub fn parse(text: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return Self::default();
        };

        Self {
            error: text_field(&value, "error"),
            message: text_field(&value, "message"),
            code: text_field(&value, "code"),
            confidence: number_field(&value, "confidence"),
            token: text_field(&value, "token"),
            distance: number_field(&value, "distance"),
            allowed_radius: number_field(&value, "allowed_radius"),
        }
    }

    /// Human-readable server message, if any.
    pub fn server_message(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(str::to_string)
}

/// Numbers may arrive as strings (e.g. `"38.20"`).
fn number_field(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Failure of a single API call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}")]
    Status { status: u16, body: ErrorBody },

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } => body.code.as_deref(),
            _ => None,
        }
    }

    /// Generic mapping: the server message verbatim, or `fallback` when the
    /// server sent none.
    pub fn into_client_error(self, fallback: &str) -> ClientError {
        match self {
            ApiError::Transport(msg) => ClientError::Network(msg),
            ApiError::Status { status, body } => ClientError::Server {
                status,
                message: body.server_message().unwrap_or(fallback).to_string(),
            },
            ApiError::Decode(msg) => {
                ClientError::Internal(anyhow::anyhow!("{}: {}", fallback, msg))
            }
        }
    }
}
