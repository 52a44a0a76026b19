// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vote submission pipeline.
//!
//! Handles the workflow:
//! 1. Capture a verification photo (device-local URI)
//! 2. Upload it (immutable remote URL)
//! 3. Acquire the current location and pre-check the session geofence
//! 4. Submit the ballot and interpret the server's verdict
//! 5. Refresh the session list so `has_voted` is current
//!
//! Each step is started by the user and nothing is retried automatically.

use crate::error::{ClientError, Notice, Result};
use crate::models::{SessionDetail, SessionStatus, SubmissionPayload, VoteReceipt};
use crate::services::api::{ApiClient, ApiError};
use crate::services::auth::AuthSession;
use crate::services::ballot::BallotDraft;
use crate::services::catalog::{SessionFilter, VotingCatalog};
use crate::services::geofence::{check_geofence, GeoPoint};
use dashmap::DashSet;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;

/// Front camera of the device.
#[async_trait::async_trait]
pub trait PhotoCapture: Send + Sync {
    /// Take a photo and return its device-local URI.
    async fn capture(&self) -> Result<String>;
}

/// Remote image storage for verification photos.
#[async_trait::async_trait]
pub trait PhotoUploader: Send + Sync {
    /// Upload the photo at `local_uri` and return its public URL.
    async fn upload(&self, local_uri: &str) -> Result<String>;
}

/// Device location provider.
#[async_trait::async_trait]
pub trait Locator: Send + Sync {
    /// A high-accuracy fix taken now.
    async fn current_position(&self) -> Result<GeoPoint>;
}

/// Device capabilities the pipeline drives.
#[derive(Clone)]
pub struct CaptureDevices {
    pub camera: Arc<dyn PhotoCapture>,
    pub uploader: Arc<dyn PhotoUploader>,
    pub locator: Arc<dyn Locator>,
}

// ─────────────────────────────────────────────────────────────────────────────
// CloudinaryUploader
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Deserialize, Default)]
struct UploadErrorResponse {
    error: Option<UploadErrorDetail>,
}

#[derive(Deserialize)]
struct UploadErrorDetail {
    message: Option<String>,
}

/// Unsigned Cloudinary image upload.
#[derive(Clone)]
pub struct CloudinaryUploader {
    http: reqwest::Client,
    endpoint: String,
    upload_preset: String,
}

impl CloudinaryUploader {
    pub fn new(http: reqwest::Client, base_url: &str, cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            http,
            endpoint: format!(
                "{}/{}/image/upload",
                base_url.trim_end_matches('/'),
                urlencoding::encode(cloud_name)
            ),
            upload_preset: upload_preset.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// File name and MIME type for a local photo URI.
fn photo_file_meta(local_uri: &str) -> (String, String) {
    let filename = local_uri
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("photo.jpg")
        .to_string();

    let mime = match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!("image/{}", ext.to_ascii_lowercase()),
        _ => "image/jpeg".to_string(),
    };

    (filename, mime)
}

#[async_trait::async_trait]
impl PhotoUploader for CloudinaryUploader {
    async fn upload(&self, local_uri: &str) -> Result<String> {
        let path = local_uri.strip_prefix("file://").unwrap_or(local_uri);
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Upload(format!("cannot read photo: {}", e)))?;

        let (filename, mime) = photo_file_meta(local_uri);
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str(&mime)
            .map_err(|e| ClientError::Upload(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: UploadErrorResponse = response.json().await.unwrap_or_default();
            let message = body
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "Upload failed".to_string());
            tracing::warn!(status = %status, error = %message, "Photo upload rejected");
            return Err(ClientError::Upload(message));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Upload(format!("unexpected upload response: {}", e)))?;

        tracing::info!("Verification photo uploaded");
        Ok(uploaded.secure_url)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline state
// ─────────────────────────────────────────────────────────────────────────────

/// Where a submission attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    CapturingPhoto,
    PhotoCaptured,
    Uploading,
    Uploaded,
    AwaitingGeolocation,
    Submitting,
    Succeeded,
    Failed,
}

/// Photo and location gathered for one attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capture {
    photo_local_uri: Option<String>,
    remote_image_url: Option<String>,
    location: Option<GeoPoint>,
}

impl Capture {
    pub fn photo_local_uri(&self) -> Option<&str> {
        self.photo_local_uri.as_deref()
    }

    pub fn remote_image_url(&self) -> Option<&str> {
        self.remote_image_url.as_deref()
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }
}

/// Result of an accepted ballot.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub receipt: VoteReceipt,
    /// `(position, candidate name)` pairs that were cast
    pub votes: Vec<(String, String)>,
    /// False when the follow-up session list refresh failed
    pub sessions_refreshed: bool,
}

impl SubmissionOutcome {
    pub fn notice(&self) -> Notice {
        let list = self
            .votes
            .iter()
            .map(|(position, name)| format!("• {}: {}", position, name))
            .collect::<Vec<_>>()
            .join("\n");
        Notice::new(
            "Vote Submitted Successfully!",
            Some(format!(
                "You voted for:\n{}\n\nThank you for participating!",
                list
            )),
        )
    }
}

/// Sessions with a submission currently in flight.
pub type SubmissionRegistry = Arc<DashSet<String>>;

/// Marks a session as submitting until dropped.
struct InFlight {
    registry: SubmissionRegistry,
    session_id: String,
}

impl InFlight {
    fn acquire(registry: &SubmissionRegistry, session_id: &str) -> Option<Self> {
        registry.insert(session_id.to_string()).then(|| Self {
            registry: registry.clone(),
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.registry.remove(&self.session_id);
    }
}

/// Map a vote endpoint failure to its fault kind.
fn submission_error(err: ApiError) -> ClientError {
    match err {
        ApiError::Status { status, body } => match body.code.as_deref() {
            Some("ALREADY_VOTED") => ClientError::AlreadyVoted,
            Some("GEOFENCE_VIOLATION") => ClientError::GeofenceViolation {
                distance_m: body.distance,
                radius_m: body.allowed_radius,
            },
            Some("NO_REGISTERED_FACE") => ClientError::NoRegisteredFace,
            Some("FACE_VERIFICATION_FAILED") => ClientError::FaceVerificationFailed {
                confidence: body.confidence,
            },
            code => {
                tracing::warn!(status, ?code, "Vote rejected");
                ClientError::SubmissionFailed(
                    body.server_message()
                        .unwrap_or("Failed to submit vote")
                        .to_string(),
                )
            }
        },
        ApiError::Transport(msg) => ClientError::Network(msg),
        ApiError::Decode(msg) => ClientError::Internal(anyhow::anyhow!("vote response: {}", msg)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// VoteSubmissionPipeline
// ─────────────────────────────────────────────────────────────────────────────

/// One submission attempt for one session, owning its ballot draft.
///
/// A failed attempt leaves the draft, the capture and the cached session
/// list untouched; the user retries explicitly.
pub struct VoteSubmissionPipeline {
    session: Arc<SessionDetail>,
    /// Taken once the ballot is accepted
    draft: Option<BallotDraft>,
    capture: Capture,
    stage: PipelineStage,
    last_failure: Option<Notice>,
    api: ApiClient,
    auth: AuthSession,
    catalog: VotingCatalog,
    devices: CaptureDevices,
    registry: SubmissionRegistry,
}

impl VoteSubmissionPipeline {
    pub(crate) fn new(
        session: Arc<SessionDetail>,
        draft: BallotDraft,
        api: ApiClient,
        auth: AuthSession,
        catalog: VotingCatalog,
        devices: CaptureDevices,
        registry: SubmissionRegistry,
    ) -> Result<Self> {
        if draft.session_id() != session.id {
            return Err(ClientError::Validation(
                "Ballot draft belongs to a different session".to_string(),
            ));
        }
        if session.status != SessionStatus::Active {
            return Err(ClientError::InvalidState("session is not open for voting"));
        }
        let eligibility = session.eligibility();
        if !eligibility.eligible {
            return Err(ClientError::Validation(
                eligibility
                    .reason
                    .unwrap_or_else(|| "You are not eligible to vote in this session".to_string()),
            ));
        }
        draft.require_complete()?;

        Ok(Self {
            session,
            draft: Some(draft),
            capture: Capture::default(),
            stage: PipelineStage::Idle,
            last_failure: None,
            api,
            auth,
            catalog,
            devices,
            registry,
        })
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    /// The ballot, until it has been accepted.
    pub fn draft(&self) -> Option<&BallotDraft> {
        self.draft.as_ref()
    }

    /// Give the ballot back, e.g. when the user leaves the confirmation
    /// screen to change a selection.
    pub fn into_draft(self) -> Option<BallotDraft> {
        self.draft
    }

    pub fn session(&self) -> &SessionDetail {
        &self.session
    }

    /// What the user saw for the last failed step.
    pub fn last_failure(&self) -> Option<&Notice> {
        self.last_failure.as_ref()
    }

    /// Whether the submit action should be offered.
    pub fn can_submit(&self) -> bool {
        self.capture.remote_image_url.is_some()
            && matches!(self.stage, PipelineStage::Uploaded | PipelineStage::Failed)
            && !self.registry.contains(&self.session.id)
    }

    fn fail(&mut self, err: ClientError) -> ClientError {
        self.stage = PipelineStage::Failed;
        self.last_failure = Some(err.notice());
        err
    }

    fn ensure_not_submitted(&self) -> Result<()> {
        if self.stage == PipelineStage::Succeeded {
            return Err(ClientError::InvalidState("ballot already submitted"));
        }
        Ok(())
    }

    /// Take (or retake) the verification photo. Any earlier photo and its
    /// upload are discarded.
    pub async fn capture_photo(&mut self) -> Result<String> {
        self.ensure_not_submitted()?;

        self.capture = Capture::default();
        self.last_failure = None;
        self.stage = PipelineStage::CapturingPhoto;

        match self.devices.camera.capture().await {
            Ok(uri) => {
                tracing::debug!(session_id = %self.session.id, "Verification photo captured");
                self.capture.photo_local_uri = Some(uri.clone());
                self.stage = PipelineStage::PhotoCaptured;
                Ok(uri)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Drop the current photo and return to `Idle`.
    pub fn discard_photo(&mut self) -> Result<()> {
        self.ensure_not_submitted()?;
        self.capture = Capture::default();
        self.stage = PipelineStage::Idle;
        Ok(())
    }

    /// Upload the captured photo. Once uploaded, the URL is fixed until the
    /// photo is retaken.
    pub async fn upload_photo(&mut self) -> Result<String> {
        self.ensure_not_submitted()?;

        if let Some(url) = &self.capture.remote_image_url {
            return Ok(url.clone());
        }

        let local_uri = self
            .capture
            .photo_local_uri
            .clone()
            .ok_or(ClientError::StageOrder("Please take a photo first"))?;

        self.stage = PipelineStage::Uploading;

        match self.devices.uploader.upload(&local_uri).await {
            Ok(url) if url.starts_with("https://") || url.starts_with("http://") => {
                self.capture.remote_image_url = Some(url.clone());
                self.stage = PipelineStage::Uploaded;
                self.last_failure = None;
                Ok(url)
            }
            Ok(url) => Err(self.fail(ClientError::Upload(format!(
                "upload returned a non-remote URL: {}",
                url
            )))),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Locate the device, pre-check the geofence and submit the ballot.
    pub async fn submit(&mut self) -> Result<SubmissionOutcome> {
        self.ensure_not_submitted()?;

        if self.capture.photo_local_uri.is_none() {
            return Err(ClientError::StageOrder(
                "Please take a photo to verify your identity",
            ));
        }
        let image_url = self
            .capture
            .remote_image_url
            .clone()
            .ok_or(ClientError::StageOrder("Please upload your photo first"))?;

        let session_id = self.session.id.clone();
        let _in_flight = InFlight::acquire(&self.registry, &session_id)
            .ok_or(ClientError::SubmissionInProgress)?;

        // Location
        self.stage = PipelineStage::AwaitingGeolocation;
        let point = match self.devices.locator.current_position().await {
            Ok(point) => point,
            Err(e) => return Err(self.fail(e)),
        };
        if let Err(e) = point.validate() {
            return Err(self.fail(e));
        }
        self.capture.location = Some(point);

        if let Err(e) = check_geofence(self.session.geofence(), &point) {
            return Err(self.fail(e));
        }

        // Payload
        let (choices, votes) = match &self.draft {
            Some(draft) => (
                draft.choices(),
                draft
                    .summary()
                    .into_iter()
                    .map(|(p, n)| (p.to_string(), n.to_string()))
                    .collect::<Vec<_>>(),
            ),
            None => return Err(ClientError::InvalidState("ballot already submitted")),
        };

        let payload = SubmissionPayload {
            session_id: session_id.clone(),
            choices,
            image_url,
            lat: point.lat,
            lng: point.lng,
            device_id: self.auth.device_identity(),
        };

        // Submit
        self.stage = PipelineStage::Submitting;
        let token = match self.auth.bearer_token() {
            Ok(token) => token,
            Err(e) => return Err(self.fail(e)),
        };

        tracing::info!(
            session_id = %session_id,
            choices = payload.choices.len(),
            "Submitting ballot"
        );

        let response: std::result::Result<serde_json::Value, ApiError> = self
            .api
            .send_json(Method::POST, "/vote", Some(&token), &payload)
            .await;

        let receipt = match response {
            Ok(body) => serde_json::from_value(body).unwrap_or_default(),
            Err(e) => {
                let err = submission_error(e);
                tracing::warn!(session_id = %session_id, error = %err, "Ballot rejected");
                return Err(self.fail(err));
            }
        };

        self.stage = PipelineStage::Succeeded;
        self.last_failure = None;
        self.draft = None;
        tracing::info!(session_id = %session_id, "Ballot accepted");

        // has_voted must come from the server, not be set locally.
        let sessions_refreshed = match self.catalog.fetch_sessions(SessionFilter::All).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Session list refresh after voting failed");
                false
            }
        };

        Ok(SubmissionOutcome {
            receipt,
            votes,
            sessions_refreshed,
        })
    }
}
