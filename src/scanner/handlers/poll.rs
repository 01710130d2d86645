// SPDX-License-Identifier: GPL-3.0-only

//! Detection polling
//!
//! One timer per session at a fixed cadence. Each tick reads the surface's
//! current frame and runs one detection; ticks landing while a detection is
//! still running are skipped.

use crate::backends::DetectionError;
use crate::errors::ScanError;
use crate::scanner::{Message, PollTimer, Scanner, ScannerState};
use std::sync::Arc;
use tracing::{debug, info, trace};

impl Scanner {
    /// Start the poll timer if the session is ready for it. Idempotent.
    pub(crate) fn ensure_polling(&mut self) {
        if !self.dialog_open
            || !matches!(
                self.state,
                ScannerState::Initializing | ScannerState::Scanning
            )
        {
            return;
        }
        if !self.surface_ready() {
            trace!("Surface not ready, polling deferred");
            return;
        }

        let period = self.settings.poll_interval;
        let tx = self.tx.clone();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.timer.is_some() || session.verify_in_flight || session.handle.is_none() {
            return;
        }

        session.timer = Some(PollTimer::start(period, session.epoch, tx));
        info!(period_ms = period.as_millis(), "Detection polling started");
        self.transition(ScannerState::Scanning);
    }

    pub(crate) fn stop_polling(&mut self) {
        if let Some(timer) = self.session.as_mut().and_then(|s| s.timer.take()) {
            timer.cancel();
            debug!("Detection polling stopped");
        }
    }

    pub(crate) fn handle_tick(&mut self, epoch: u64) {
        if !self.is_current(epoch) {
            return;
        }
        if !self.dialog_open || self.state != ScannerState::Scanning {
            self.stop_polling();
            return;
        }

        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.detect_in_flight {
            trace!("Detection still running, skipping tick");
            return;
        }

        let source_live = session
            .handle
            .as_ref()
            .is_some_and(|handle| handle.source.is_live());
        let surface = Arc::clone(&self.caps.surface);
        if !surface.is_attached() || surface.is_ended() || !source_live {
            self.fail(ScanError::SourceDetached);
            return;
        }

        let (width, height) = surface.frame_size();
        if surface.is_paused() || width == 0 || height == 0 || !surface.has_enough_data() {
            trace!(width, height, "Surface not readable, skipping tick");
            return;
        }
        let Some(frame) = surface.current_frame() else {
            trace!("No frame on surface, skipping tick");
            return;
        };

        if let Some(session) = self.session.as_mut() {
            session.detect_in_flight = true;
        }
        let detector = Arc::clone(&self.caps.detector);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = detector.detect(frame).await;
            let _ = tx.send(Message::Detected { epoch, result });
        });
    }

    pub(crate) fn handle_detected(
        &mut self,
        epoch: u64,
        result: Result<Vec<String>, DetectionError>,
    ) {
        let Some(session) = self.session.as_mut().filter(|s| s.epoch == epoch) else {
            return;
        };
        session.detect_in_flight = false;

        // A code already accepted this session wins over anything later
        if self.state != ScannerState::Scanning {
            debug!(state = %self.state, "Ignoring detection outside scanning");
            return;
        }

        match result {
            Ok(payloads) => {
                let Some(payload) = payloads
                    .iter()
                    .map(|p| p.trim())
                    .find(|p| !p.is_empty())
                    .map(str::to_string)
                else {
                    return;
                };

                info!(payload = %payload, candidates = payloads.len(), "QR code detected");
                self.stop_polling();
                self.transition(ScannerState::Stopped);
                self.begin_verification(payload);
            }
            Err(e) if e.is_benign() => {
                debug!(error = %e, "Ignoring transient detection error");
            }
            Err(e) => self.fail(e.into()),
        }
    }

    pub(crate) fn handle_resume_scanning(&mut self, epoch: u64) {
        let Some(session) = self.session.as_mut().filter(|s| s.epoch == epoch) else {
            return;
        };
        session.resume = None;
        debug!("Rescan delay elapsed");
        self.ensure_polling();
    }
}
