// SPDX-License-Identifier: GPL-3.0-only

//! Scanner state, session resources and messages

use crate::backends::{
    AcquisitionFailure, CaptureHandle, DetectionError, TaggedSurfaceEvent, VerifyError,
};
use crate::errors::ScanError;
use crate::fl;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Scanner lifecycle state
///
/// Exactly one is active. See [`ScannerState::can_transition_to`] for the
/// allowed edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScannerState {
    #[default]
    Idle,
    PermissionPending,
    PermissionDenied,
    Initializing,
    Scanning,
    Stopped,
    Error,
}

impl ScannerState {
    pub const ALL: [ScannerState; 7] = [
        ScannerState::Idle,
        ScannerState::PermissionPending,
        ScannerState::PermissionDenied,
        ScannerState::Initializing,
        ScannerState::Scanning,
        ScannerState::Stopped,
        ScannerState::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScannerState::Idle => "idle",
            ScannerState::PermissionPending => "permission-pending",
            ScannerState::PermissionDenied => "permission-denied",
            ScannerState::Initializing => "initializing",
            ScannerState::Scanning => "scanning",
            ScannerState::Stopped => "stopped",
            ScannerState::Error => "error",
        }
    }

    /// Localized status line for the dialog
    pub fn label(&self) -> String {
        match self {
            ScannerState::Idle => fl!("state-idle"),
            ScannerState::PermissionPending => fl!("state-permission-pending"),
            ScannerState::PermissionDenied => fl!("state-permission-denied"),
            ScannerState::Initializing => fl!("state-initializing"),
            ScannerState::Scanning => fl!("state-scanning"),
            ScannerState::Stopped => fl!("state-stopped"),
            ScannerState::Error => fl!("state-error"),
        }
    }

    /// States that carry an ErrorDetail
    pub fn carries_error(&self) -> bool {
        matches!(self, ScannerState::Error | ScannerState::PermissionDenied)
    }

    /// Whether `next` is reachable from `self` in one step.
    ///
    /// Closing reaches `idle` from anywhere; `error` is reachable from any
    /// state with a live session.
    pub fn can_transition_to(&self, next: ScannerState) -> bool {
        use ScannerState::*;

        if *self == next {
            return false;
        }

        match (self, next) {
            (_, Idle) => true,
            (Idle, Error) => false,
            (_, Error) => true,
            (Idle, PermissionPending) | (PermissionDenied, PermissionPending) => true,
            (PermissionPending, Initializing) | (PermissionPending, PermissionDenied) => true,
            (Initializing, Scanning) => true,
            (Scanning, Stopped) | (Scanning, Initializing) => true,
            (Stopped, Initializing) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ScannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who asked for the dialog to close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOrigin {
    /// Cancel button, escape, click outside
    User,
    /// The scanner itself after a verified code
    Handoff,
}

/// Informational messages that do not end the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Barcode detection is not available here
    Unsupported,
    /// Opening requires a signed-in user
    SignInRequired,
    /// Scanned code matches none of the caller's plants
    PlantNotFound(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::Unsupported => fl!("scanner-unsupported"),
            Notice::SignInRequired => fl!("scanner-sign-in-required"),
            Notice::PlantNotFound(code) => fl!("scanner-plant-not-found", code = code.clone()),
        }
    }
}

/// Broadcast to observers of the scanner
#[derive(Debug, Clone, PartialEq)]
pub enum ScannerEvent {
    StateChanged {
        from: ScannerState,
        to: ScannerState,
    },
    Notice(Notice),
    /// Close completed with a staged plant id
    Navigated(String),
}

/// Everything the dialog needs to render
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerSnapshot {
    pub state: ScannerState,
    pub dialog_open: bool,
    pub error: Option<ScanError>,
    /// Localized ErrorDetail
    pub error_message: Option<String>,
    pub notice: Option<Notice>,
    /// Preview should be drawn mirrored (front camera)
    pub mirrored: bool,
    /// Offer "try again" rather than only "close"
    pub retryable: bool,
}

impl ScannerSnapshot {
    /// Label for the dialog's primary button
    pub fn action_label(&self) -> String {
        if self.retryable {
            fl!("action-try-again")
        } else {
            fl!("action-close")
        }
    }
}

/// Scanner input
///
/// User intents come from the dialog; the rest are completions of work the
/// scanner started, tagged with the session epoch they belong to.
#[derive(Debug, Clone)]
pub enum Message {
    // ===== Dialog =====
    /// Dialog opened
    Open,
    /// Dialog closing
    Close(CloseOrigin),
    /// "Try again" from permission-denied
    Retry,
    /// Dialog finished closing
    CloseCompleted,
    /// Owning view is going away
    Teardown,
    /// Signed-in user changed
    SetIdentity(Option<crate::backends::CallerIdentity>),

    // ===== Acquisition =====
    Acquired {
        epoch: u64,
        result: Result<CaptureHandle, AcquisitionFailure>,
    },

    // ===== Surface =====
    Surface(TaggedSurfaceEvent),
    PlayRejected {
        epoch: u64,
        reason: String,
    },

    // ===== Polling =====
    Tick {
        epoch: u64,
    },
    Detected {
        epoch: u64,
        result: Result<Vec<String>, DetectionError>,
    },
    /// Rescan delay after an unknown code has elapsed
    ResumeScanning {
        epoch: u64,
    },

    // ===== Verification =====
    Verified {
        epoch: u64,
        payload: String,
        result: Result<bool, VerifyError>,
    },
}

/// Fixed-cadence tick source for the detection poller
///
/// Aborted on cancel or drop, so no tick outlives its session.
#[derive(Debug)]
pub struct PollTimer {
    task: JoinHandle<()>,
}

impl PollTimer {
    /// Start ticking every `period`, first tick one period from now
    pub fn start(period: Duration, epoch: u64, tx: mpsc::UnboundedSender<Message>) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(Message::Tick { epoch }).is_err() {
                    break;
                }
            }
        });

        debug!(epoch, period_ms = period.as_millis(), "Poll timer started");
        Self { task }
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Resources of one acquisition episode
///
/// Created when acquisition starts, released in full by the guardian.
#[derive(Debug)]
pub struct CaptureSession {
    pub epoch: u64,
    pub handle: Option<CaptureHandle>,
    pub surface_bound: bool,
    pub timer: Option<PollTimer>,
    pub mirrored: bool,
    pub detect_in_flight: bool,
    pub verify_in_flight: bool,
    /// Pending rescan-delay wakeup
    pub resume: Option<JoinHandle<()>>,
}

impl CaptureSession {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            handle: None,
            surface_bound: false,
            timer: None,
            mirrored: false,
            detect_in_flight: false,
            verify_in_flight: false,
            resume: None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_some()
    }
}
