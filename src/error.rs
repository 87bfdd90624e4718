// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types and fault classification for the sync core.
//!
//! Every failure the core can observe falls into one of four classes (see
//! [`FaultKind`]). The class, not the concrete variant, decides what happens
//! next: validation faults are returned to the caller, everything else is
//! absorbed into the unsynced flag.

/// Fault classes that drive retry-vs-surface decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Local Store read/write failure.
    Storage,
    /// The request never reached a decision on the remote side.
    Connectivity,
    /// The remote store reached a decision and declined.
    Rejection,
    /// The caller supplied an invalid mutation.
    Validation,
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Remote store unreachable: {0}")]
    Offline(String),

    #[error("Remote store rejected the request: {message}")]
    Rejected {
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid mutation: {0}")]
    Validation(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Transport-level messages that mean the request never got an answer.
    pub const CONNECTIVITY_MARKERS: &'static [&'static str] = &[
        "network request failed",
        "failed to fetch",
        "fetch failed",
        "network error",
        "timed out",
        "timeout",
        "connection refused",
        "connection reset",
        "dns error",
        "offline",
    ];

    /// Classify this error.
    pub fn kind(&self) -> FaultKind {
        match self {
            AppError::Storage(_) => FaultKind::Storage,
            AppError::Offline(_) => FaultKind::Connectivity,
            AppError::Validation(_) => FaultKind::Validation,
            AppError::Rejected { .. }
            | AppError::NotFound(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => FaultKind::Rejection,
        }
    }

    /// Whether this is a connectivity fault (the only kind that triggers
    /// automatic retry on reconnect).
    pub fn is_connectivity(&self) -> bool {
        self.kind() == FaultKind::Connectivity
    }

    /// Build a rejection error without an HTTP status.
    pub fn rejected(message: impl Into<String>) -> Self {
        AppError::Rejected {
            status: None,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP response.
    ///
    /// Gateway errors mean the data service itself was never reached, so they
    /// count as connectivity faults. Everything else is a decision.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            502..=504 => AppError::Offline(format!("HTTP {}: {}", status, body)),
            _ => AppError::Rejected {
                status: Some(status),
                message: format!("HTTP {}: {}", status, body),
            },
        }
    }

    /// Classify an error from an opaque source by its message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_connectivity_message(&message) {
            AppError::Offline(message)
        } else {
            AppError::rejected(message)
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            return AppError::Offline(err.to_string());
        }
        if let Some(status) = err.status() {
            return AppError::from_status(status.as_u16(), &err.to_string());
        }
        if err.is_decode() {
            return AppError::rejected(format!("Malformed response: {}", err));
        }
        AppError::from_message(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Check whether a free-form error message describes a connectivity failure.
pub fn is_connectivity_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    AppError::CONNECTIVITY_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, AppError>;
