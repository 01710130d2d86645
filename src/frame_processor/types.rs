// SPDX-License-Identifier: GPL-3.0-only

//! Core types for frame processing results

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions,
/// so overlays can be drawn regardless of preview scaling or mirroring.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            x: x as f32 / frame_width as f32,
            y: y as f32 / frame_height as f32,
            width: width as f32 / frame_width as f32,
            height: height as f32 / frame_height as f32,
        }
    }

    /// Same region as seen in a horizontally mirrored preview
    pub fn mirrored(&self) -> Self {
        Self {
            x: (1.0 - self.x - self.width).max(0.0),
            ..self.clone()
        }
    }
}

/// A decoded QR code with its location
#[derive(Debug, Clone, PartialEq)]
pub struct QrDetection {
    /// Bounding box in normalized frame coordinates
    pub bounds: FrameRegion,
    /// Payload decoded from the code
    pub content: String,
}

impl QrDetection {
    pub fn new(bounds: FrameRegion, content: String) -> Self {
        Self { bounds, content }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_region_from_pixels() {
        let region = FrameRegion::from_pixels(100, 50, 200, 100, 1000, 500);
        assert!((region.x - 0.1).abs() < 0.001);
        assert!((region.y - 0.1).abs() < 0.001);
        assert!((region.width - 0.2).abs() < 0.001);
        assert!((region.height - 0.2).abs() < 0.001);
    }

    #[test]
    fn test_frame_region_mirrored() {
        let region = FrameRegion::from_pixels(100, 0, 200, 100, 1000, 500).mirrored();
        assert!((region.x - 0.7).abs() < 0.001);
        assert!((region.width - 0.2).abs() < 0.001);
    }
}
