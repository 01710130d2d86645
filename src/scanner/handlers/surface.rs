// SPDX-License-Identifier: GPL-3.0-only

//! Render surface binding and readiness signals

use crate::backends::{CaptureHandle, SurfaceEvent, SurfaceEventSink, TaggedSurfaceEvent};
use crate::errors::ScanError;
use crate::scanner::{Message, Scanner, ScannerState};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Scanner {
    /// Attach the acquired stream to the surface and start playback
    pub(crate) fn bind_surface(&mut self, epoch: u64, handle: &CaptureHandle, mirrored: bool) {
        let sink = SurfaceEventSink::new(epoch, self.surface_tx.clone());
        self.caps.surface.attach(handle, mirrored, sink);
        if let Some(session) = self.session.as_mut() {
            session.surface_bound = true;
        }
        debug!(epoch, mirrored, "Surface bound");

        let surface = Arc::clone(&self.caps.surface);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(reason) = surface.play().await {
                let _ = tx.send(Message::PlayRejected { epoch, reason });
            }
        });
    }

    pub(crate) fn handle_surface_event(&mut self, tagged: TaggedSurfaceEvent) {
        if !self.is_current(tagged.epoch) {
            debug!(epoch = tagged.epoch, event = ?tagged.event, "Dropping stale surface event");
            return;
        }

        match tagged.event {
            event if event.is_readiness() => {
                debug!(?event, "Surface readiness signal");
                self.ensure_polling();
            }
            SurfaceEvent::Stalled => {
                if self.state == ScannerState::Scanning {
                    info!("Surface stalled, pausing detection");
                    self.stop_polling();
                    self.transition(ScannerState::Initializing);
                }
            }
            SurfaceEvent::Error(reason) => {
                self.fail(ScanError::Surface(reason));
            }
            // Readiness variants are matched by the guard above
            _ => {}
        }
    }

    pub(crate) fn handle_play_rejected(&mut self, epoch: u64, reason: String) {
        if !self.is_current(epoch) {
            return;
        }
        warn!(reason = %reason, "Surface refused to play");
        self.fail(ScanError::Surface(reason));
    }

    /// Whether the surface can hand out a detectable frame right now
    pub(crate) fn surface_ready(&self) -> bool {
        let surface = &self.caps.surface;
        let (width, height) = surface.frame_size();
        surface.is_attached()
            && !surface.is_paused()
            && !surface.is_ended()
            && surface.has_enough_data()
            && width > 0
            && height > 0
    }
}
