// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the plant scanner

use crate::backends::{AcquisitionFailure, DetectionError, VerifyError};
use crate::fl;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Errors outside the scan session: configuration, registry files, CLI input
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// Plant registry could not be read or parsed
    #[error("Registry error: {0}")]
    Registry(String),
    /// Image could not be loaded
    #[error("Image error: {0}")]
    Image(String),
    /// Storage/filesystem errors
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

/// What ended a scan session (or parked it in `permission-denied`)
///
/// This is the ErrorDetail carried alongside the `error` and
/// `permission-denied` states.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// Camera could not be acquired
    #[error("camera acquisition failed: {0}")]
    Acquisition(AcquisitionFailure),
    /// Render surface reported an error or refused to play
    #[error("video surface error: {0}")]
    Surface(String),
    /// Detector raised an unclassified error
    #[error("detection failed: {0}")]
    Detection(String),
    /// Frame source disappeared mid-scan
    #[error("video source detached")]
    SourceDetached,
    /// No confirmed caller identity when a code needed verifying
    #[error("caller is not authenticated")]
    NotAuthenticated,
    /// Backing store missing or unreachable
    #[error("plant store is unreachable")]
    StoreUnavailable,
    /// Existence check raised an error
    #[error("verification failed: {0}")]
    Verification(VerifyError),
}

impl ScanError {
    /// Short localized message shown next to the retry/close action
    pub fn user_message(&self) -> String {
        match self {
            ScanError::Acquisition(failure) => match failure {
                AcquisitionFailure::UserDenied => fl!("camera-permission-denied"),
                AcquisitionFailure::NoDeviceFound => fl!("camera-not-found"),
                AcquisitionFailure::DeviceBusyOrUnreadable => fl!("camera-busy"),
                AcquisitionFailure::Unknown(reason) => {
                    fl!("camera-unknown-error", reason = reason.clone())
                }
            },
            ScanError::Surface(reason) => fl!("camera-playback-failed", reason = reason.clone()),
            ScanError::Detection(reason) => {
                fl!("scanner-detection-failed", reason = reason.clone())
            }
            ScanError::SourceDetached => fl!("scanner-source-detached"),
            ScanError::NotAuthenticated => fl!("scanner-not-authenticated"),
            ScanError::StoreUnavailable => fl!("scanner-store-unavailable"),
            ScanError::Verification(err) => {
                fl!("scanner-verification-failed", reason = err.to_string())
            }
        }
    }

    /// Whether the UI should offer "try again" rather than only "close"
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScanError::Acquisition(_))
    }
}

impl From<AcquisitionFailure> for ScanError {
    fn from(failure: AcquisitionFailure) -> Self {
        ScanError::Acquisition(failure)
    }
}

impl From<VerifyError> for ScanError {
    fn from(err: VerifyError) -> Self {
        ScanError::Verification(err)
    }
}

impl From<DetectionError> for ScanError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::SourceDetached => ScanError::SourceDetached,
            other => ScanError::Detection(other.to_string()),
        }
    }
}
