// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User-facing notices for client faults.

use univote_client::error::{ClientError, Notice};

#[test]
fn test_submission_faults_are_distinct_from_transport() {
    let submission = [
        ClientError::AlreadyVoted,
        ClientError::GeofenceViolation {
            distance_m: None,
            radius_m: None,
        },
        ClientError::NoRegisteredFace,
        ClientError::FaceVerificationFailed { confidence: None },
        ClientError::SubmissionFailed("Session has ended".to_string()),
    ];
    for err in &submission {
        assert!(err.is_submission_fault(), "{err:?}");
        assert!(!err.requires_sign_in(), "{err:?}");
    }

    let other = [
        ClientError::Network("connection refused".to_string()),
        ClientError::Unauthenticated,
        ClientError::Upload("Upload failed".to_string()),
        ClientError::SubmissionInProgress,
    ];
    for err in &other {
        assert!(!err.is_submission_fault(), "{err:?}");
    }
}

#[test]
fn test_sign_in_required() {
    assert!(ClientError::Unauthenticated.requires_sign_in());
    assert!(ClientError::DeviceInvalidated.requires_sign_in());
    assert!(!ClientError::FirstLoginRequired.requires_sign_in());
}

#[test]
fn test_device_invalidated_notice() {
    assert_eq!(
        ClientError::DeviceInvalidated.notice(),
        Notice::new(
            "Session Expired",
            Some("You have been logged in on another device".to_string())
        )
    );
}

#[test]
fn test_geofence_notice_rounds_distances() {
    let notice = ClientError::GeofenceViolation {
        distance_m: Some(220.87),
        radius_m: Some(200.0),
    }
    .notice();

    assert_eq!(notice.title, "Location Error");
    assert_eq!(
        notice.detail.as_deref(),
        Some("You must be within 200m of the voting location to vote. You are currently 221m away.")
    );
}

#[test]
fn test_face_verification_notice_includes_confidence() {
    let notice = ClientError::FaceVerificationFailed {
        confidence: Some(38.21),
    }
    .notice();
    assert_eq!(notice.title, "Face Verification Failed");
    assert!(notice.detail.unwrap().contains("38.2"));
}

#[test]
fn test_internal_error_hides_details() {
    let err = ClientError::from(anyhow::anyhow!("decoder exploded at byte 17"));
    let notice = err.notice();

    assert_eq!(notice.title, "Error");
    assert!(!notice.detail.unwrap().contains("decoder"));
}

#[test]
fn test_notice_serialization_omits_empty_detail() {
    let json = serde_json::to_value(Notice::new("Storage error", None)).unwrap();
    assert_eq!(json, serde_json::json!({ "title": "Storage error" }));
}
