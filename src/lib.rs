// SPDX-License-Identifier: GPL-3.0-only

//! Plantscan - QR code scanning for plant records
//!
//! Opens a camera, watches it for a QR code, checks that the code names a
//! plant owned by the signed-in user and hands the plant id to navigation
//! once the scan dialog has closed.
//!
//! # Architecture
//!
//! - [`scanner`]: The scan state machine and its message runtime
//! - [`backends`]: Capability traits (camera, surface, detector, verifier, navigation)
//!   plus still-image and headless implementations
//! - [`frame_processor`]: QR detection on camera frames
//! - [`registry`]: JSON-backed plant ownership lookup
//! - [`navigation`]: Where a verified plant id goes
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let runtime = ScannerRuntime::new(caps, ScannerSettings::default(), Some(identity));
//! let handle = runtime.handle();
//! handle.open();
//! let scanner = runtime.run().await;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_processor;
pub mod i18n;
pub mod navigation;
pub mod registry;
pub mod scanner;

// Re-export commonly used types
pub use backends::{CallerIdentity, Capabilities};
pub use config::{Config, ScannerSettings};
pub use errors::{AppError, AppResult, ScanError};
pub use frame_processor::{QrDetection, QrDetector};
pub use scanner::{Message, Scanner, ScannerHandle, ScannerRuntime, ScannerState};
