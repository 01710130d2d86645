// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Scanner timing defaults
pub mod timing {
    use super::Duration;

    /// Detection poll cadence
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Lower bound for a configured poll cadence
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Longest wait for the camera permission prompt / device open
    pub const ACQUISITION_TIMEOUT: Duration = Duration::from_secs(20);

    /// Longest wait for the plant ownership lookup
    pub const VERIFICATION_TIMEOUT: Duration = Duration::from_secs(10);

    /// Pause before polling resumes after a code that matched no plant
    pub const RESCAN_DELAY: Duration = Duration::from_millis(1500);
}

/// QR detection tuning
pub mod detection {
    /// Frames are downscaled so neither side exceeds this before detection
    pub const MAX_DIMENSION: u32 = 640;

    /// Smallest frame side the detector will bother looking at
    pub const MIN_DIMENSION: u32 = 21;
}

/// Supported still image formats for the virtual camera
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Capacity of the scanner event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Placeholder substituted with the plant id in detail URL templates
pub const DETAIL_URL_PLACEHOLDER: &str = "{id}";

/// Default detail view URL template
pub const DEFAULT_DETAIL_URL_TEMPLATE: &str = "https://app.growdiary.org/plants/{id}";
