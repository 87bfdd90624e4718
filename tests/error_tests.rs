// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use pawtrack::error::{is_connectivity_message, AppError, FaultKind};
use pawtrack::models::NewHealthNote;
use validator::Validate;

#[test]
fn test_is_connectivity_message_matches() {
    assert!(is_connectivity_message("TypeError: Failed to fetch"));
    assert!(is_connectivity_message("error sending request: connection refused"));
    assert!(is_connectivity_message("Network Error"));
    assert!(is_connectivity_message("operation timed out"));
}

#[test]
fn test_is_connectivity_message_no_match() {
    assert!(!is_connectivity_message("JWT expired"));
    assert!(!is_connectivity_message("permission denied for table activities"));
    assert!(!is_connectivity_message(""));
}

#[test]
fn test_rejected_has_no_status() {
    let err = AppError::rejected("Remote row returned without id");
    assert!(matches!(err, AppError::Rejected { status: None, .. }));
    assert_eq!(err.kind(), FaultKind::Rejection);
}

#[test]
fn test_validation_errors_convert() {
    let input = NewHealthNote {
        text: "Ate well".to_string(),
        date: None,
        weight: None,
        body_condition_score: Some(12),
    };
    let err: AppError = input.validate().unwrap_err().into();

    assert_eq!(err.kind(), FaultKind::Validation);
    assert!(err.to_string().contains("Body Condition Score"));
}

#[test]
fn test_serialization_error_is_rejection() {
    let err: AppError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert_eq!(err.kind(), FaultKind::Rejection);
}
