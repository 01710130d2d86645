// SPDX-License-Identifier: GPL-3.0-only

//! Still-image virtual camera
//!
//! Serves image files as if they were camera streams. Each configured image is
//! one "device" with a facing mode, so the environment-then-any acquisition
//! policy can be exercised without real hardware.

use super::types::{
    AcquisitionFailure, CameraFrame, CaptureHandle, FacingMode, FacingPreference, FrameSource,
    PixelFormat,
};
use super::VideoCapture;
use crate::constants::file_formats;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Load an image file as an RGBA frame
pub fn load_image_as_frame(path: &Path) -> AppResult<CameraFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !file_formats::is_image_extension(&extension) {
        return Err(AppError::Image(format!(
            "Unsupported file format: {}",
            extension
        )));
    }

    info!(path = %path.display(), "Loading image file");

    let img = image::open(path)
        .map_err(|e| AppError::Image(format!("Failed to load image '{}': {}", path.display(), e)))?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();

    debug!(width, height, "Image loaded successfully");

    Ok(CameraFrame::packed(
        width,
        height,
        PixelFormat::Rgba,
        rgba.into_raw(),
    ))
}

/// One image-backed "device"
#[derive(Debug, Clone)]
pub struct StillImageDevice {
    pub path: PathBuf,
    pub facing: FacingMode,
}

/// Frame source that keeps presenting the same decoded image
struct StillFrameSource {
    frame: Arc<CameraFrame>,
    live: AtomicBool,
}

impl FrameSource for StillFrameSource {
    fn latest_frame(&self) -> Option<Arc<CameraFrame>> {
        self.is_live().then(|| Arc::clone(&self.frame))
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn stop(&self) {
        self.live.store(false, Ordering::Release);
    }
}

/// Virtual camera over still images
pub struct StillImageCamera {
    devices: Vec<StillImageDevice>,
    /// Handle id -> device path for streams that have not been stopped
    in_use: Mutex<HashMap<Uuid, PathBuf>>,
}

impl StillImageCamera {
    pub fn new(devices: Vec<StillImageDevice>) -> Self {
        Self {
            devices,
            in_use: Mutex::new(HashMap::new()),
        }
    }

    /// Number of streams acquired and not yet stopped
    pub fn active_streams(&self) -> usize {
        self.in_use
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn candidates(&self, preference: FacingPreference) -> impl Iterator<Item = &StillImageDevice> {
        self.devices.iter().filter(move |d| match preference {
            FacingPreference::Environment => d.facing == FacingMode::Environment,
            FacingPreference::Any => true,
        })
    }

    fn is_busy(&self, path: &Path) -> bool {
        self.in_use
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|p| p == path)
    }
}

#[async_trait]
impl VideoCapture for StillImageCamera {
    async fn request(
        &self,
        preference: FacingPreference,
    ) -> Result<CaptureHandle, AcquisitionFailure> {
        let mut matched = false;
        let device = self
            .candidates(preference)
            .inspect(|_| matched = true)
            .find(|d| !self.is_busy(&d.path))
            .cloned();
        let Some(device) = device else {
            if matched {
                debug!(%preference, "Every matching still image is in use");
                return Err(AcquisitionFailure::DeviceBusyOrUnreadable);
            }
            debug!(%preference, "No still image matches facing preference");
            return Err(AcquisitionFailure::NoDeviceFound);
        };

        let path = device.path.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            if !path.exists() {
                return Err(AcquisitionFailure::NoDeviceFound);
            }
            load_image_as_frame(&path).map_err(|e| {
                warn!(error = %e, "Still image unreadable");
                AcquisitionFailure::DeviceBusyOrUnreadable
            })
        })
        .await
        .map_err(|e| AcquisitionFailure::Unknown(format!("image loader panicked: {}", e)))??;

        let source = Arc::new(StillFrameSource {
            frame: Arc::new(loaded),
            live: AtomicBool::new(true),
        });
        let handle = CaptureHandle::new(
            device.path.display().to_string(),
            device.facing,
            source,
        );

        self.in_use
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.id, device.path.clone());

        info!(device = %handle.label, facing = %handle.facing, "Still image camera opened");
        Ok(handle)
    }

    fn stop(&self, handle: &CaptureHandle) {
        handle.source.stop();
        let removed = self
            .in_use
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id);
        if removed.is_some() {
            debug!(device = %handle.label, "Still image camera stopped");
        }
    }
}
