// SPDX-License-Identifier: GPL-3.0-only

//! Frame analysis
//!
//! Turns single camera frames into decoded QR payloads. The scanner's poller
//! feeds this one frame per tick through the [`crate::backends::BarcodeDetector`]
//! trait.

pub mod tasks;
pub mod types;

pub use tasks::QrDetector;
pub use types::{FrameRegion, QrDetection};
