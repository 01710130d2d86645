// SPDX-License-Identifier: GPL-3.0-only

//! Scanner capability abstraction
//!
//! The scanner never talks to a camera, a display or a database directly.
//! Everything it needs from the outside world is one of these traits:
//!
//! ```text
//! ┌─────────────────────┐
//! │  Scanner (state     │
//! │  machine + runtime) │
//! └──────────┬──────────┘
//!            │
//!    ┌───────┼──────────┬──────────────┬───────────────┐
//!    ▼       ▼          ▼              ▼               ▼
//! VideoCapture  RenderSurface  BarcodeDetector  ResourceVerifier  NavigationSink
//! ```
//!
//! Concrete implementations in this crate: [`file_source::StillImageCamera`],
//! [`headless::HeadlessSurface`], [`crate::frame_processor::QrDetector`],
//! [`crate::registry::PlantRegistry`] and the sinks in [`crate::navigation`].

pub mod file_source;
pub mod headless;
pub mod types;

pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Camera device access
#[async_trait]
pub trait VideoCapture: Send + Sync {
    /// Ask for a live camera stream matching the facing preference.
    ///
    /// May suspend for as long as the permission prompt is open.
    async fn request(
        &self,
        preference: FacingPreference,
    ) -> Result<CaptureHandle, AcquisitionFailure>;

    /// Stop every track of an acquired stream
    fn stop(&self, handle: &CaptureHandle);
}

/// Something that displays a capture stream and can hand back its current frame
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Bind a stream to the surface. Readiness, stall and error signals for
    /// this binding go to `events`.
    fn attach(&self, handle: &CaptureHandle, mirrored: bool, events: SurfaceEventSink);

    /// Start playback. Resolves once playback has been accepted.
    async fn play(&self) -> Result<(), String>;

    /// Unbind whatever stream is attached. No-op when nothing is.
    fn detach(&self);

    fn is_attached(&self) -> bool;

    fn is_paused(&self) -> bool;

    fn is_ended(&self) -> bool;

    /// Intrinsic frame size; (0, 0) until metadata is known
    fn frame_size(&self) -> (u32, u32);

    /// Enough data buffered to read the current frame
    fn has_enough_data(&self) -> bool;

    /// The frame currently on screen
    fn current_frame(&self) -> Option<Arc<CameraFrame>>;
}

/// Pull-based barcode detection over a single frame
#[async_trait]
pub trait BarcodeDetector: Send + Sync {
    /// Whether detection works at all on this platform
    fn is_supported(&self) -> bool {
        true
    }

    /// Decoded payloads found in the frame, in detector order
    async fn detect(&self, frame: Arc<CameraFrame>) -> Result<Vec<String>, DetectionError>;
}

/// Existence and ownership lookup for decoded identifiers
#[async_trait]
pub trait ResourceVerifier: Send + Sync {
    /// Whether the backing store can be reached at all
    fn is_reachable(&self) -> bool {
        true
    }

    /// True when `identifier` names a resource owned by `caller`
    async fn exists(&self, identifier: &str, caller: &CallerIdentity) -> Result<bool, VerifyError>;
}

/// Receives the identifier to open once the scan dialog has closed
pub trait NavigationSink: Send + Sync {
    fn navigate_to(&self, identifier: &str);
}

/// The full set of collaborators a scanner is built from
#[derive(Clone)]
pub struct Capabilities {
    pub camera: Arc<dyn VideoCapture>,
    pub surface: Arc<dyn RenderSurface>,
    pub detector: Arc<dyn BarcodeDetector>,
    /// `None` when no backing store is configured
    pub verifier: Option<Arc<dyn ResourceVerifier>>,
    pub navigator: Arc<dyn NavigationSink>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("detector_supported", &self.detector.is_supported())
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}
