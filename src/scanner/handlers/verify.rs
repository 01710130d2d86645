// SPDX-License-Identifier: GPL-3.0-only

//! Code verification and navigation handoff

use crate::backends::VerifyError;
use crate::errors::ScanError;
use crate::scanner::{CloseOrigin, Message, Notice, Scanner, ScannerState};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Scanner {
    /// Check that `payload` names a plant the caller owns
    pub(crate) fn begin_verification(&mut self, payload: String) {
        let Some(identity) = self.identity.clone() else {
            self.fail(ScanError::NotAuthenticated);
            return;
        };
        let verifier = match &self.caps.verifier {
            Some(verifier) if verifier.is_reachable() => Arc::clone(verifier),
            _ => {
                self.fail(ScanError::StoreUnavailable);
                return;
            }
        };

        let timeout = self.settings.verification_timeout;
        let tx = self.tx.clone();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.verify_in_flight = true;
        let epoch = session.epoch;

        debug!(epoch, payload = %payload, "Verifying scanned code");
        tokio::spawn(async move {
            let lookup = verifier.exists(&payload, &identity);
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, lookup)
                    .await
                    .unwrap_or(Err(VerifyError::Timeout)),
                None => lookup.await,
            };
            let _ = tx.send(Message::Verified {
                epoch,
                payload,
                result,
            });
        });
    }

    pub(crate) fn handle_verified(
        &mut self,
        epoch: u64,
        payload: String,
        result: Result<bool, VerifyError>,
    ) {
        let Some(session) = self.session.as_mut().filter(|s| s.epoch == epoch) else {
            debug!(epoch, "Dropping verification for a closed session");
            return;
        };
        session.verify_in_flight = false;

        if self.state != ScannerState::Stopped {
            return;
        }

        match result {
            Ok(true) => {
                if self.pending_handoff.is_some() {
                    return;
                }
                info!(plant_id = %payload, "Plant verified, closing dialog");
                self.pending_handoff = Some(payload);
                self.post(Message::Close(CloseOrigin::Handoff));
            }
            Ok(false) => {
                info!(code = %payload, "Scanned code matches no plant of the caller");
                self.set_notice(Notice::PlantNotFound(payload));
                self.transition(ScannerState::Initializing);
                self.schedule_resume(epoch);
            }
            Err(e) => {
                warn!(error = %e, "Plant lookup failed");
                self.fail(ScanError::Verification(e));
            }
        }
    }

    /// Restart polling once the rescan delay has passed
    fn schedule_resume(&mut self, epoch: u64) {
        let delay = self.settings.rescan_delay;
        let tx = self.tx.clone();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(previous) = session.resume.take() {
            previous.abort();
        }
        session.resume = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Message::ResumeScanning { epoch });
        }));
    }
}
