// SPDX-License-Identifier: GPL-3.0-only

//! Dialog lifecycle and the resource guardian
//!
//! Every exit path (cancel, handoff, error, denial, teardown) funnels through
//! [`Scanner::release_session`].

use crate::scanner::{CloseOrigin, Message, Notice, Scanner, ScannerEvent, ScannerState};
use tracing::{debug, info};

impl Scanner {
    // =========================================================================
    // Dialog Handlers
    // =========================================================================

    pub(crate) fn handle_open(&mut self) {
        if self.dialog_open {
            debug!("Scan dialog already open");
            return;
        }
        if self.pending_handoff.is_some() {
            debug!("Open ignored, navigation handoff still pending");
            return;
        }
        if !self.caps.detector.is_supported() {
            self.set_notice(Notice::Unsupported);
            return;
        }
        if self.identity.is_none() {
            self.set_notice(Notice::SignInRequired);
            return;
        }

        info!("Scan dialog opened");
        self.dialog_open = true;
        self.notice = None;
        self.begin_acquisition();
    }

    pub(crate) fn handle_retry(&mut self) {
        if !self.dialog_open || self.state != ScannerState::PermissionDenied {
            debug!(state = %self.state, "Retry ignored");
            return;
        }

        info!("Retrying camera acquisition");
        self.begin_acquisition();
    }

    pub(crate) fn handle_close(&mut self, origin: CloseOrigin) {
        if !self.dialog_open && self.session.is_none() {
            debug!(?origin, "Close ignored, dialog not open");
            return;
        }

        info!(?origin, state = %self.state, "Closing scan dialog");
        self.release_session();
        self.dialog_open = false;
        self.notice = None;
        self.transition(ScannerState::Idle);
        self.post(Message::CloseCompleted);
    }

    /// Sole consumer of the staged handoff
    pub(crate) fn handle_close_completed(&mut self) {
        let Some(plant_id) = self.pending_handoff.take() else {
            debug!("Dialog closed without a handoff");
            return;
        };

        info!(plant_id = %plant_id, "Navigating to scanned plant");
        self.caps.navigator.navigate_to(&plant_id);
        let _ = self.events.send(ScannerEvent::Navigated(plant_id));
    }

    pub(crate) fn handle_teardown(&mut self) {
        info!(state = %self.state, "Scanner torn down");
        self.release_session();
        self.dialog_open = false;
        self.notice = None;
        if let Some(plant_id) = self.pending_handoff.take() {
            debug!(plant_id = %plant_id, "Dropping staged handoff on teardown");
        }
        self.transition(ScannerState::Idle);
    }

    // =========================================================================
    // Guardian
    // =========================================================================

    /// Release the session's timer, surface binding and camera, in that order.
    ///
    /// Safe to call with nothing acquired.
    pub(crate) fn release_session(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        if let Some(timer) = session.timer.take() {
            timer.cancel();
        }
        if let Some(resume) = session.resume.take() {
            resume.abort();
        }
        if session.surface_bound {
            self.caps.surface.detach();
        }
        if let Some(handle) = session.handle.take() {
            self.caps.camera.stop(&handle);
            debug!(epoch = session.epoch, device = %handle.label, "Camera released");
        }

        debug!(epoch = session.epoch, "Capture session released");
    }
}
