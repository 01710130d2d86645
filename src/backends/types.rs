// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the scanner capability abstraction

//! Shared types for scanner capabilities

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Pixel layout of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGBA, 4 bytes per pixel
    Rgba,
    /// 8-bit luma, 1 byte per pixel
    Gray,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::Rgba => 4,
            PixelFormat::Gray => 1,
        }
    }
}

/// A single video frame as read from a render surface
#[derive(Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Timestamp when the frame was read
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a tightly packed frame (stride = width * bpp)
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel(),
            format,
            data: Arc::from(data.into_boxed_slice()),
            captured_at: Instant::now(),
        }
    }

    /// Whether the frame has usable dimensions
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Debug for CameraFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("stride", &self.stride)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Which way a camera points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointing away from the user
    Environment,
    /// Front camera, pointing at the user
    User,
    /// Facing could not be determined (webcams, virtual devices)
    #[default]
    Unknown,
}

impl FacingMode {
    /// Front-facing previews are mirrored
    pub fn is_front(&self) -> bool {
        matches!(self, FacingMode::User)
    }
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::Environment => write!(f, "environment"),
            FacingMode::User => write!(f, "user"),
            FacingMode::Unknown => write!(f, "unknown"),
        }
    }
}

/// Constraint passed with a camera request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingPreference {
    /// Only an environment-facing camera satisfies the request
    #[default]
    Environment,
    /// Any camera
    Any,
}

impl std::fmt::Display for FacingPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingPreference::Environment => write!(f, "environment"),
            FacingPreference::Any => write!(f, "any"),
        }
    }
}

/// Live frame producer behind a capture handle
pub trait FrameSource: Send + Sync {
    /// Most recent frame, if the source has produced one
    fn latest_frame(&self) -> Option<Arc<CameraFrame>>;

    /// False once the source's tracks have been stopped or unplugged
    fn is_live(&self) -> bool;

    /// Stop all underlying tracks
    fn stop(&self);
}

/// Reference to an acquired camera stream
#[derive(Clone)]
pub struct CaptureHandle {
    pub id: Uuid,
    /// Human-readable device label
    pub label: String,
    pub facing: FacingMode,
    pub source: Arc<dyn FrameSource>,
}

impl CaptureHandle {
    pub fn new(label: impl Into<String>, facing: FacingMode, source: Arc<dyn FrameSource>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            facing,
            source,
        }
    }

    /// Whether the preview for this handle should be mirrored
    pub fn is_front_facing(&self) -> bool {
        self.facing.is_front()
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("facing", &self.facing)
            .field("live", &self.source.is_live())
            .finish()
    }
}

/// Why a camera could not be acquired
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionFailure {
    /// The user (or a policy) refused camera access
    #[error("camera permission denied")]
    UserDenied,
    /// No camera matches the request
    #[error("no camera found")]
    NoDeviceFound,
    /// Camera exists but is in use or could not be read
    #[error("camera busy or unreadable")]
    DeviceBusyOrUnreadable,
    /// Anything else
    #[error("{0}")]
    Unknown(String),
}

impl AcquisitionFailure {
    /// Classify a platform error by its name (DOMException names in browsers)
    pub fn from_platform(name: &str, message: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => Self::UserDenied,
            "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError"
            | "ConstraintNotSatisfiedError" => Self::NoDeviceFound,
            "NotReadableError" | "TrackStartError" | "AbortError" => Self::DeviceBusyOrUnreadable,
            _ if message.is_empty() => Self::Unknown(name.to_string()),
            _ => Self::Unknown(message.to_string()),
        }
    }

    /// Whether an unconstrained request is worth trying after this failure.
    ///
    /// A refusal is a refusal regardless of which camera was asked for.
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, Self::UserDenied)
    }
}

/// Benign detector error kinds, expected around stream setup and teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    NotSupported,
    InvalidState,
    OperationError,
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientKind::NotSupported => write!(f, "not supported"),
            TransientKind::InvalidState => write!(f, "invalid state"),
            TransientKind::OperationError => write!(f, "operation error"),
        }
    }
}

/// Barcode detection failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    /// Safe to ignore; the next tick will try again
    #[error("transient detection error: {0}")]
    Transient(TransientKind),
    /// The frame source went away
    #[error("video source detached")]
    SourceDetached,
    /// Anything else; ends the session
    #[error("{0}")]
    Fatal(String),
}

impl DetectionError {
    /// Classify a platform error by its name
    pub fn from_platform(name: &str, message: &str) -> Self {
        match name {
            "NotSupportedError" => Self::Transient(TransientKind::NotSupported),
            "InvalidStateError" => Self::Transient(TransientKind::InvalidState),
            "OperationError" => Self::Transient(TransientKind::OperationError),
            _ if message.is_empty() => Self::Fatal(name.to_string()),
            _ => Self::Fatal(format!("{}: {}", name, message)),
        }
    }

    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Existence check failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Backend/network failure
    #[error("backend error: {0}")]
    Backend(String),
    /// Lookup did not answer in time
    #[error("lookup timed out")]
    Timeout,
}

/// Authenticated caller on whose behalf codes are verified
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub user_id: String,
}

impl CallerIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Readiness and failure signals raised by a render surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    MetadataLoaded,
    CanPlay,
    Playing,
    /// Playback stalled or is waiting for data
    Stalled,
    Error(String),
}

impl SurfaceEvent {
    /// Events that may mean frames are now readable
    pub fn is_readiness(&self) -> bool {
        matches!(
            self,
            SurfaceEvent::MetadataLoaded | SurfaceEvent::CanPlay | SurfaceEvent::Playing
        )
    }
}

/// Surface event as it travels to the scanner, tagged with its session
#[derive(Debug, Clone)]
pub struct TaggedSurfaceEvent {
    pub epoch: u64,
    pub event: SurfaceEvent,
}

/// Where a render surface delivers its events
///
/// Each sink is bound to the session that attached the surface; events from a
/// session that has since been torn down are dropped by the scanner.
#[derive(Debug, Clone)]
pub struct SurfaceEventSink {
    epoch: u64,
    tx: mpsc::UnboundedSender<TaggedSurfaceEvent>,
}

impl SurfaceEventSink {
    pub fn new(epoch: u64, tx: mpsc::UnboundedSender<TaggedSurfaceEvent>) -> Self {
        Self { epoch, tx }
    }

    /// Deliver an event. Returns false when the scanner is gone.
    pub fn emit(&self, event: SurfaceEvent) -> bool {
        self.tx
            .send(TaggedSurfaceEvent {
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_classification() {
        assert_eq!(
            AcquisitionFailure::from_platform("NotAllowedError", "Permission denied"),
            AcquisitionFailure::UserDenied
        );
        assert_eq!(
            AcquisitionFailure::from_platform("OverconstrainedError", ""),
            AcquisitionFailure::NoDeviceFound
        );
        assert_eq!(
            AcquisitionFailure::from_platform("NotReadableError", "Could not start video source"),
            AcquisitionFailure::DeviceBusyOrUnreadable
        );
        assert_eq!(
            AcquisitionFailure::from_platform("TypeError", "bad constraints"),
            AcquisitionFailure::Unknown("bad constraints".into())
        );
    }

    #[test]
    fn test_denial_never_falls_back() {
        assert!(!AcquisitionFailure::UserDenied.allows_fallback());
        assert!(AcquisitionFailure::DeviceBusyOrUnreadable.allows_fallback());
        assert!(AcquisitionFailure::NoDeviceFound.allows_fallback());
    }

    #[test]
    fn test_detection_classification() {
        assert!(DetectionError::from_platform("InvalidStateError", "").is_benign());
        assert!(DetectionError::from_platform("OperationError", "x").is_benign());
        assert!(DetectionError::from_platform("NotSupportedError", "").is_benign());
        assert!(!DetectionError::from_platform("UnknownError", "x").is_benign());
        assert!(!DetectionError::SourceDetached.is_benign());
    }

    #[test]
    fn test_packed_frame_stride() {
        let frame = CameraFrame::packed(4, 2, PixelFormat::Rgba, vec![0; 32]);
        assert_eq!(frame.stride, 16);
        assert!(frame.has_dimensions());
    }

    #[test]
    fn test_sink_tags_epoch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = SurfaceEventSink::new(7, tx);
        assert!(sink.emit(SurfaceEvent::Playing));
        let tagged = rx.try_recv().unwrap();
        assert_eq!(tagged.epoch, 7);
        assert_eq!(tagged.event, SurfaceEvent::Playing);
    }
}
