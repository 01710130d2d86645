// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! Implements QR code detection with the rqrr crate. Camera frames are
//! reduced to a single luma plane (downscaled for speed), searched for QR
//! grids, and each grid is decoded. Results keep detector order.

use crate::backends::types::{CameraFrame, DetectionError, PixelFormat, TransientKind};
use crate::backends::BarcodeDetector;
use crate::constants::detection;
use crate::frame_processor::types::{FrameRegion, QrDetection};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// QR code detector
///
/// Optimized for real-time processing with frame downscaling.
#[derive(Debug, Clone)]
pub struct QrDetector {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDetector {
    /// Create a new QR detector with default settings
    pub fn new() -> Self {
        Self {
            max_dimension: detection::MAX_DIMENSION,
        }
    }

    /// Create a QR detector with custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(detection::MIN_DIMENSION),
        }
    }

    /// Detect QR codes in a frame, with their locations
    ///
    /// CPU-heavy work runs in a blocking task so the event loop keeps
    /// serving surface events and timer ticks.
    pub async fn detect_regions(
        &self,
        frame: Arc<CameraFrame>,
    ) -> Result<Vec<QrDetection>, DetectionError> {
        if !frame.has_dimensions() {
            return Err(DetectionError::Transient(TransientKind::InvalidState));
        }

        let max_dim = self.max_dimension;
        tokio::task::spawn_blocking(move || detect_sync(&frame, max_dim))
            .await
            .map_err(|e| {
                warn!(error = %e, "QR detection task panicked");
                DetectionError::Transient(TransientKind::OperationError)
            })
    }
}

#[async_trait]
impl BarcodeDetector for QrDetector {
    async fn detect(&self, frame: Arc<CameraFrame>) -> Result<Vec<String>, DetectionError> {
        let detections = self.detect_regions(frame).await?;
        Ok(detections.into_iter().map(|d| d.content).collect())
    }
}

/// Synchronous QR detection (runs in blocking task)
pub fn detect_sync(frame: &CameraFrame, max_dimension: u32) -> Vec<QrDetection> {
    let start = std::time::Instant::now();

    let width = frame.width;
    let height = frame.height;

    let (luma, proc_width, proc_height, scale) = if width > max_dimension || height > max_dimension
    {
        let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
        let new_width = ((width as f32 / scale) as u32).max(1);
        let new_height = ((height as f32 / scale) as u32).max(1);
        (
            downscale_luma(frame, new_width, new_height),
            new_width,
            new_height,
            scale,
        )
    } else {
        (luma_without_stride(frame), width, height, 1.0)
    };

    trace!(
        proc_width,
        proc_height,
        scale,
        conversion_ms = start.elapsed().as_millis(),
        "Prepared luma plane for processing"
    );

    let stride = proc_width as usize;
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(proc_width as usize, proc_height as usize, |x, y| {
            luma.get(y * stride + x).copied().unwrap_or(0)
        });
    let grids = prepared.detect_grids();

    trace!(count = grids.len(), "QR grid search complete");

    let mut detections = Vec::with_capacity(grids.len());

    for grid in grids {
        let content = match grid.decode() {
            Ok((_meta, content)) => content,
            Err(e) => {
                debug!(error = %e, "Failed to decode QR code");
                continue;
            }
        };

        let xs = grid.bounds.iter().map(|p| p.x);
        let ys = grid.bounds.iter().map(|p| p.y);
        let min_x = xs.clone().min().unwrap_or(0).max(0) as f32;
        let max_x = xs.max().unwrap_or(0).min(proc_width as i32) as f32;
        let min_y = ys.clone().min().unwrap_or(0).max(0) as f32;
        let max_y = ys.max().unwrap_or(0).min(proc_height as i32) as f32;

        // Scale back to original frame coordinates
        let region = FrameRegion::from_pixels(
            (min_x * scale) as u32,
            (min_y * scale) as u32,
            ((max_x - min_x) * scale) as u32,
            ((max_y - min_y) * scale) as u32,
            width,
            height,
        );

        debug!(
            content = %content,
            x = region.x,
            y = region.y,
            width = region.width,
            height = region.height,
            "Detected QR code"
        );

        detections.push(QrDetection::new(region, content));
    }

    if !detections.is_empty() {
        debug!(
            count = detections.len(),
            total_ms = start.elapsed().as_millis(),
            "QR detection found codes"
        );
    }

    detections
}

/// Luma of one pixel at a byte offset
fn luma_at(frame: &CameraFrame, offset: usize) -> u8 {
    match frame.format {
        PixelFormat::Gray => frame.data.get(offset).copied().unwrap_or(0),
        PixelFormat::Rgba => {
            let r = frame.data.get(offset).copied().unwrap_or(0) as u32;
            let g = frame.data.get(offset + 1).copied().unwrap_or(0) as u32;
            let b = frame.data.get(offset + 2).copied().unwrap_or(0) as u32;
            ((r * 299 + g * 587 + b * 114) / 1000) as u8
        }
    }
}

/// Extract a tightly packed luma plane, dropping stride padding
fn luma_without_stride(frame: &CameraFrame) -> Vec<u8> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride as usize;
    let bpp = frame.format.bytes_per_pixel() as usize;

    let mut result = Vec::with_capacity(width * height);

    for y in 0..height {
        let row_start = y * stride;
        for x in 0..width {
            result.push(luma_at(frame, row_start + x * bpp));
        }
    }

    result
}

/// Downscale to a luma plane using bilinear interpolation
fn downscale_luma(frame: &CameraFrame, dst_width: u32, dst_height: u32) -> Vec<u8> {
    let src_width = frame.width as usize;
    let src_height = frame.height as usize;
    let stride = frame.stride as usize;
    let bpp = frame.format.bytes_per_pixel() as usize;

    let mut result = Vec::with_capacity((dst_width * dst_height) as usize);

    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;

    let sample = |px: usize, py: usize| -> f32 { luma_at(frame, py * stride + px * bpp) as f32 };

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = src_x as usize;
            let y0 = src_y as usize;
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let value = sample(x0, y0) * (1.0 - x_frac) * (1.0 - y_frac)
                + sample(x1, y0) * x_frac * (1.0 - y_frac)
                + sample(x0, y1) * (1.0 - x_frac) * y_frac
                + sample(x1, y1) * x_frac * y_frac;

            result.push(value as u8);
        }
    }

    result
}
