// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Decoding QR codes in an image file
//! - Running a full scan session against an image-backed camera
//! - Showing the effective configuration

use plantscan::backends::file_source::{StillImageCamera, StillImageDevice, load_image_as_frame};
use plantscan::backends::headless::HeadlessSurface;
use plantscan::backends::{
    CallerIdentity, Capabilities, FacingMode, NavigationSink, ResourceVerifier,
};
use plantscan::frame_processor::QrDetector;
use plantscan::frame_processor::tasks::qr_detector::detect_sync;
use plantscan::navigation::{RecordingNavigator, UrlNavigator};
use plantscan::registry::PlantRegistry;
use plantscan::scanner::{ScannerEvent, ScannerRuntime, ScannerState};
use plantscan::{AppError, AppResult, Config, ScanError, fl};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options for `plantscan scan`
pub struct ScanArgs {
    pub user: Option<String>,
    pub registry: Option<PathBuf>,
    pub image: Vec<PathBuf>,
    pub front: Vec<PathBuf>,
    pub no_open: bool,
}

/// Load the config from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> AppResult<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };
    config.validate()?;
    Ok(config)
}

/// Print every QR code found in an image
pub fn decode_image(config: &Config, image: &Path) -> AppResult<()> {
    let frame = load_image_as_frame(image)?;
    let detections = detect_sync(&frame, config.max_detect_dimension);

    if detections.is_empty() {
        println!("No QR codes found.");
        return Ok(());
    }

    for detection in &detections {
        let b = &detection.bounds;
        println!(
            "{}  (at {:.2},{:.2} size {:.2}x{:.2})",
            detection.content, b.x, b.y, b.width, b.height
        );
    }
    Ok(())
}

/// Print the effective configuration as JSON
pub fn print_config(config: &Config) -> AppResult<()> {
    if let Some(path) = Config::default_path() {
        println!("# {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Open a scan dialog over the given images and run it to completion.
///
/// Ends once the dialog closes: after a verified plant, an error, a denied
/// camera, or Ctrl+C.
pub fn run_scan(config: &Config, args: ScanArgs) -> AppResult<()> {
    let devices: Vec<StillImageDevice> = args
        .image
        .iter()
        .map(|path| (path, FacingMode::Environment))
        .chain(args.front.iter().map(|path| (path, FacingMode::User)))
        .map(|(path, facing)| StillImageDevice {
            path: path.clone(),
            facing,
        })
        .collect();
    if devices.is_empty() {
        return Err(AppError::Other(
            "at least one --image or --front file is required".to_string(),
        ));
    }
    let camera_count = devices.len();
    let camera = StillImageCamera::new(devices);

    let verifier: Option<Arc<dyn ResourceVerifier>> =
        match args.registry.as_ref().or(config.registry_path.as_ref()) {
            Some(path) => Some(Arc::new(PlantRegistry::load(path)?)),
            None => {
                eprintln!("No plant registry configured, verification will fail.");
                None
            }
        };

    let url_navigator = UrlNavigator::new(config.detail_url_template.clone());
    let navigator: Arc<dyn NavigationSink> = if args.no_open {
        Arc::new(RecordingNavigator::new())
    } else {
        Arc::new(url_navigator.clone())
    };

    let caps = Capabilities {
        camera: Arc::new(camera),
        surface: Arc::new(HeadlessSurface::new()),
        detector: Arc::new(QrDetector::with_max_dimension(config.max_detect_dimension)),
        verifier,
        navigator,
    };
    let identity = args.user.map(CallerIdentity::new);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::Other(format!("Failed to start async runtime: {}", e)))?;

    rt.block_on(async move {
        let mut runtime = ScannerRuntime::new(caps, config.scanner_settings(), identity);
        let handle = runtime.handle();
        let mut events = runtime.subscribe();

        let ctrlc_handle = handle.clone();
        ctrlc::set_handler(move || {
            ctrlc_handle.close();
        })
        .map_err(|e| AppError::Other(format!("Failed to install Ctrl+C handler: {}", e)))?;

        println!("{}: scanning with {} camera(s) ...", fl!("app-title"), camera_count);
        handle.open();

        let mut error_reported = false;
        let mut tearing_down = false;
        while runtime.step().await {
            while let Ok(event) = events.try_recv() {
                match event {
                    ScannerEvent::StateChanged { to, .. } => println!("[{}] {}", to, to.label()),
                    ScannerEvent::Notice(notice) => println!("{}", notice.message()),
                    ScannerEvent::Navigated(plant_id) => {
                        println!("Plant: {}", url_navigator.detail_url(&plant_id));
                    }
                }
            }

            let scanner = runtime.scanner();
            if tearing_down {
                continue;
            }
            match scanner.state() {
                ScannerState::Error | ScannerState::PermissionDenied if !error_reported => {
                    if let Some(message) = scanner.error().map(ScanError::user_message) {
                        eprintln!("{}", message);
                    }
                    error_reported = true;
                    handle.close();
                }
                ScannerState::Idle if !scanner.is_dialog_open() => {
                    tearing_down = true;
                    handle.teardown();
                }
                _ => {}
            }
        }

        Ok::<_, AppError>(())
    })
}
