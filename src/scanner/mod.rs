// SPDX-License-Identifier: GPL-3.0-only

//! Plant QR scanner state machine
//!
//! One scanner drives one scan dialog. It acquires a camera, binds it to a
//! render surface, polls the surface for QR codes, verifies the first code
//! against the plant store and hands the plant id over to navigation once
//! the dialog has closed.
//!
//! All input arrives as [`Message`]s processed one at a time by
//! [`Scanner::update`]. Work that has to wait on the outside world (camera
//! permission, playback start, detection, lookup) runs in a spawned task
//! that posts its result back as another message, tagged with the session
//! epoch so results from a torn-down session are discarded.
//!
//! # Handler Modules
//!
//! - `handlers::lifecycle`: open, close, retry, teardown and the resource guardian
//! - `handlers::acquire`: camera request with environment-then-any fallback
//! - `handlers::surface`: binding to the render surface and its readiness signals
//! - `handlers::poll`: fixed-cadence detection ticks
//! - `handlers::verify`: ownership check and navigation handoff

mod handlers;
pub mod runtime;
pub mod state;

pub use runtime::{ScannerHandle, ScannerRuntime};
pub use state::{
    CaptureSession, CloseOrigin, Message, Notice, PollTimer, ScannerEvent, ScannerSnapshot,
    ScannerState,
};

use crate::backends::{CallerIdentity, Capabilities, TaggedSurfaceEvent};
use crate::config::ScannerSettings;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::errors::ScanError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// QR scan state machine for one dialog
pub struct Scanner {
    caps: Capabilities,
    settings: ScannerSettings,
    identity: Option<CallerIdentity>,

    state: ScannerState,
    error: Option<ScanError>,
    notice: Option<Notice>,
    dialog_open: bool,
    session: Option<CaptureSession>,
    last_epoch: u64,
    /// Plant id staged for the close-completion handler
    pending_handoff: Option<String>,

    tx: mpsc::UnboundedSender<Message>,
    surface_tx: mpsc::UnboundedSender<TaggedSurfaceEvent>,
    events: broadcast::Sender<ScannerEvent>,
}

impl Scanner {
    /// Create a scanner posting its own follow-up messages to `tx` and
    /// surface events to `surface_tx`
    pub fn new(
        caps: Capabilities,
        settings: ScannerSettings,
        identity: Option<CallerIdentity>,
        tx: mpsc::UnboundedSender<Message>,
        surface_tx: mpsc::UnboundedSender<TaggedSurfaceEvent>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            caps,
            settings,
            identity,
            state: ScannerState::Idle,
            error: None,
            notice: None,
            dialog_open: false,
            session: None,
            last_epoch: 0,
            pending_handoff: None,
            tx,
            surface_tx,
            events,
        }
    }

    /// Main message handler - routes messages to handler methods.
    pub fn update(&mut self, message: Message) {
        match message {
            // ===== Dialog =====
            Message::Open => self.handle_open(),
            Message::Close(origin) => self.handle_close(origin),
            Message::Retry => self.handle_retry(),
            Message::CloseCompleted => self.handle_close_completed(),
            Message::Teardown => self.handle_teardown(),
            Message::SetIdentity(identity) => {
                debug!(signed_in = identity.is_some(), "Caller identity changed");
                self.identity = identity;
            }

            // ===== Acquisition =====
            Message::Acquired { epoch, result } => self.handle_acquired(epoch, result),

            // ===== Surface =====
            Message::Surface(tagged) => self.handle_surface_event(tagged),
            Message::PlayRejected { epoch, reason } => self.handle_play_rejected(epoch, reason),

            // ===== Polling =====
            Message::Tick { epoch } => self.handle_tick(epoch),
            Message::Detected { epoch, result } => self.handle_detected(epoch, result),
            Message::ResumeScanning { epoch } => self.handle_resume_scanning(epoch),

            // ===== Verification =====
            Message::Verified {
                epoch,
                payload,
                result,
            } => self.handle_verified(epoch, payload, result),
        }
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    /// ErrorDetail for `error` / `permission-denied`
    pub fn error(&self) -> Option<&ScanError> {
        self.error.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn is_dialog_open(&self) -> bool {
        self.dialog_open
    }

    /// Plant id staged for navigation, if any
    pub fn pending_handoff(&self) -> Option<&str> {
        self.pending_handoff.as_deref()
    }

    pub fn is_polling(&self) -> bool {
        self.session.as_ref().is_some_and(CaptureSession::is_polling)
    }

    /// Whether a capture handle is currently held
    pub fn has_capture(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.handle.is_some())
    }

    pub fn settings(&self) -> &ScannerSettings {
        &self.settings
    }

    /// Observe state changes, notices and navigations
    pub fn subscribe(&self) -> broadcast::Receiver<ScannerEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> ScannerSnapshot {
        ScannerSnapshot {
            state: self.state,
            dialog_open: self.dialog_open,
            error: self.error.clone(),
            error_message: self.error.as_ref().map(ScanError::user_message),
            notice: self.notice.clone(),
            mirrored: self.session.as_ref().is_some_and(|s| s.mirrored),
            retryable: self.error.as_ref().is_some_and(ScanError::is_retryable),
        }
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    /// Move to `next` if the edge exists. ErrorDetail is cleared whenever the
    /// new state does not carry one.
    fn transition(&mut self, next: ScannerState) -> bool {
        if self.state == next {
            return true;
        }
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Ignoring invalid scanner transition");
            return false;
        }

        let from = std::mem::replace(&mut self.state, next);
        if !next.carries_error() {
            self.error = None;
        }

        info!(from = %from, to = %next, "Scanner state changed");
        let _ = self.events.send(ScannerEvent::StateChanged { from, to: next });
        true
    }

    /// End the session with an error: release everything, then enter `error`.
    ///
    /// A handoff staged earlier in the session is dropped; a failed session
    /// never navigates.
    fn fail(&mut self, error: ScanError) {
        warn!(error = %error, state = %self.state, "Scan session failed");
        self.release_session();
        if let Some(plant_id) = self.pending_handoff.take() {
            debug!(plant_id = %plant_id, "Dropping staged handoff after failure");
        }
        self.error = Some(error);
        self.transition(ScannerState::Error);
    }

    fn set_notice(&mut self, notice: Notice) {
        info!(notice = ?notice, "Scanner notice");
        self.notice = Some(notice.clone());
        let _ = self.events.send(ScannerEvent::Notice(notice));
    }

    /// Whether `epoch` names the live session
    fn is_current(&self, epoch: u64) -> bool {
        self.session.as_ref().is_some_and(|s| s.epoch == epoch)
    }

    fn next_epoch(&mut self) -> u64 {
        self.last_epoch += 1;
        self.last_epoch
    }

    /// Post a follow-up message to our own queue
    fn post(&self, message: Message) {
        if self.tx.send(message).is_err() {
            debug!("Scanner queue closed, dropping message");
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        if self.session.is_some() {
            debug!("Scanner dropped with a live session, releasing");
            self.release_session();
        }
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("state", &self.state)
            .field("dialog_open", &self.dialog_open)
            .field("epoch", &self.session.as_ref().map(|s| s.epoch))
            .field("polling", &self.is_polling())
            .field("pending_handoff", &self.pending_handoff)
            .finish()
    }
}
