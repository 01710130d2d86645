// SPDX-License-Identifier: GPL-3.0-only

//! Camera acquisition
//!
//! Environment-facing camera first; one unconstrained retry when that
//! request fails for any reason other than a refusal.

use crate::backends::{AcquisitionFailure, CaptureHandle, FacingPreference, VideoCapture};
use crate::scanner::{CaptureSession, Message, Scanner, ScannerState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

impl Scanner {
    /// Start a fresh session and request a camera for it
    pub(crate) fn begin_acquisition(&mut self) {
        // A new session only ever follows a full release of the previous one
        self.release_session();

        let epoch = self.next_epoch();
        self.session = Some(CaptureSession::new(epoch));
        self.transition(ScannerState::PermissionPending);

        let camera = Arc::clone(&self.caps.camera);
        let preference = self.settings.preferred_facing;
        let timeout = self.settings.acquisition_timeout;
        let tx = self.tx.clone();

        debug!(epoch, %preference, "Requesting camera");
        tokio::spawn(async move {
            let result = acquire_with_timeout(camera.as_ref(), preference, timeout).await;
            let _ = tx.send(Message::Acquired { epoch, result });
        });
    }

    pub(crate) fn handle_acquired(
        &mut self,
        epoch: u64,
        result: Result<CaptureHandle, AcquisitionFailure>,
    ) {
        if !self.is_current(epoch) || self.state != ScannerState::PermissionPending {
            // Cancelled while the prompt was open
            if let Ok(handle) = result {
                debug!(epoch, device = %handle.label, "Releasing camera acquired for a closed session");
                self.caps.camera.stop(&handle);
            }
            return;
        }

        match result {
            Ok(handle) => {
                let mirrored = handle.is_front_facing();
                info!(device = %handle.label, facing = %handle.facing, mirrored, "Camera acquired");

                if let Some(session) = self.session.as_mut() {
                    session.handle = Some(handle.clone());
                    session.mirrored = mirrored;
                }
                self.transition(ScannerState::Initializing);
                self.bind_surface(epoch, &handle, mirrored);
            }
            Err(failure) => {
                warn!(error = %failure, "Camera acquisition failed");
                self.release_session();
                self.error = Some(failure.into());
                self.transition(ScannerState::PermissionDenied);
            }
        }
    }
}

async fn acquire_with_timeout(
    camera: &dyn VideoCapture,
    preference: FacingPreference,
    timeout: Option<Duration>,
) -> Result<CaptureHandle, AcquisitionFailure> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, acquire_with_fallback(camera, preference))
            .await
            .unwrap_or_else(|_| {
                warn!(timeout_ms = limit.as_millis(), "Camera acquisition timed out");
                Err(AcquisitionFailure::Unknown(
                    "timed out waiting for the camera".to_string(),
                ))
            }),
        None => acquire_with_fallback(camera, preference).await,
    }
}

/// Request the preferred camera, then any camera once
pub(crate) async fn acquire_with_fallback(
    camera: &dyn VideoCapture,
    preference: FacingPreference,
) -> Result<CaptureHandle, AcquisitionFailure> {
    match camera.request(preference).await {
        Ok(handle) => Ok(handle),
        Err(failure) if preference == FacingPreference::Environment && failure.allows_fallback() => {
            info!(error = %failure, "Environment camera unavailable, trying any camera");
            camera.request(FacingPreference::Any).await
        }
        Err(failure) => Err(failure),
    }
}
