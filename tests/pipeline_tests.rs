// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end scan over the bundled implementations: still-image camera,
//! headless surface, rqrr detector and JSON plant registry

use chrono::Utc;
use plantscan::backends::file_source::{StillImageCamera, StillImageDevice};
use plantscan::backends::headless::HeadlessSurface;
use plantscan::backends::{CallerIdentity, Capabilities, FacingMode};
use plantscan::config::ScannerSettings;
use plantscan::frame_processor::QrDetector;
use plantscan::navigation::RecordingNavigator;
use plantscan::registry::{Plant, PlantRegistry};
use plantscan::scanner::{Notice, ScannerRuntime, ScannerState};
use qrcode::{Color, QrCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Write a QR code for `payload` as a grayscale PNG
fn write_qr_png(dir: &Path, payload: &str) -> PathBuf {
    let code = QrCode::new(payload.as_bytes()).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let module_px = 6;
    let quiet = 4;
    let side = (modules + quiet * 2) * module_px;

    let img = image::GrayImage::from_fn(side, side, |x, y| {
        let mx = (x / module_px) as i64 - quiet as i64;
        let my = (y / module_px) as i64 - quiet as i64;
        let inside = (0..modules as i64).contains(&mx) && (0..modules as i64).contains(&my);
        if inside && colors[(my as u32 * modules + mx as u32) as usize] == Color::Dark {
            image::Luma([0u8])
        } else {
            image::Luma([255u8])
        }
    });

    let path = dir.join(format!("{}.png", payload));
    img.save(&path).unwrap();
    path
}

fn registry() -> PlantRegistry {
    PlantRegistry::from_plants([Plant {
        id: "plant-abc-123".to_string(),
        name: "Northern Lights #1".to_string(),
        owner_id: "alice".to_string(),
        environment_id: Some("tent-1".to_string()),
        created_at: Utc::now(),
    }])
}

fn runtime_for(image: PathBuf, facing: FacingMode) -> (ScannerRuntime, Arc<RecordingNavigator>, Arc<StillImageCamera>) {
    let camera = Arc::new(StillImageCamera::new(vec![StillImageDevice {
        path: image,
        facing,
    }]));
    let navigator = Arc::new(RecordingNavigator::new());
    let caps = Capabilities {
        camera: camera.clone(),
        surface: Arc::new(HeadlessSurface::new()),
        detector: Arc::new(QrDetector::new()),
        verifier: Some(Arc::new(registry())),
        navigator: navigator.clone(),
    };
    let settings = ScannerSettings {
        poll_interval: Duration::from_millis(50),
        rescan_delay: Duration::from_millis(50),
        ..ScannerSettings::default()
    };
    let runtime = ScannerRuntime::new(caps, settings, Some(CallerIdentity::new("alice")));
    (runtime, navigator, camera)
}

#[tokio::test]
async fn test_scan_owned_plant_navigates() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_qr_png(dir.path(), "plant-abc-123");
    let (mut runtime, navigator, camera) = runtime_for(image, FacingMode::Environment);

    runtime.handle().open();
    tokio::time::timeout(Duration::from_secs(10), async {
        while navigator.visited().is_empty() {
            assert!(runtime.step().await);
        }
    })
    .await
    .expect("scan did not complete");

    assert_eq!(navigator.visited(), vec!["plant-abc-123".to_string()]);
    assert_eq!(runtime.scanner().state(), ScannerState::Idle);
    assert_eq!(camera.active_streams(), 0);

    runtime.handle().teardown();
    let scanner = runtime.run().await;
    assert_eq!(scanner.state(), ScannerState::Idle);
}

#[tokio::test]
async fn test_scan_foreign_code_keeps_scanning() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_qr_png(dir.path(), "ghost-999");
    let (mut runtime, navigator, camera) = runtime_for(image, FacingMode::User);

    runtime.handle().open();
    tokio::time::timeout(Duration::from_secs(10), async {
        while runtime.scanner().notice().is_none() {
            assert!(runtime.step().await);
        }
    })
    .await
    .expect("code was never rejected");

    let scanner = runtime.scanner();
    assert_eq!(
        scanner.notice(),
        Some(&Notice::PlantNotFound("ghost-999".to_string()))
    );
    assert!(scanner.snapshot().mirrored);
    assert!(scanner.has_capture());
    assert_eq!(camera.active_streams(), 1);
    assert!(navigator.visited().is_empty());

    runtime.handle().close();
    runtime.handle().teardown();
    runtime.run().await;
    assert_eq!(camera.active_streams(), 0);
}
