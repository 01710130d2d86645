// SPDX-License-Identifier: GPL-3.0-only

//! Single-threaded message pump for a [`Scanner`]
//!
//! Handlers never block: anything slow runs in a spawned task and comes back
//! through the queue. The runtime owns both receiving ends and feeds the
//! scanner one message at a time.

use crate::backends::{CallerIdentity, Capabilities, TaggedSurfaceEvent};
use crate::config::ScannerSettings;
use crate::scanner::{CloseOrigin, Message, Scanner, ScannerEvent};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Cloneable sender for dialog intents
#[derive(Debug, Clone)]
pub struct ScannerHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl ScannerHandle {
    /// Queue a message. Returns false once the runtime is gone.
    pub fn send(&self, message: Message) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn open(&self) -> bool {
        self.send(Message::Open)
    }

    /// User-initiated close (cancel, escape, click outside)
    pub fn close(&self) -> bool {
        self.send(Message::Close(CloseOrigin::User))
    }

    pub fn retry(&self) -> bool {
        self.send(Message::Retry)
    }

    pub fn teardown(&self) -> bool {
        self.send(Message::Teardown)
    }

    pub fn set_identity(&self, identity: Option<CallerIdentity>) -> bool {
        self.send(Message::SetIdentity(identity))
    }
}

/// Owns a scanner and the queues feeding it
pub struct ScannerRuntime {
    scanner: Scanner,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    surface_rx: mpsc::UnboundedReceiver<TaggedSurfaceEvent>,
}

impl ScannerRuntime {
    pub fn new(
        caps: Capabilities,
        settings: ScannerSettings,
        identity: Option<CallerIdentity>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (surface_tx, surface_rx) = mpsc::unbounded_channel();
        let scanner = Scanner::new(caps, settings, identity, tx.clone(), surface_tx);
        Self {
            scanner,
            tx,
            rx,
            surface_rx,
        }
    }

    pub fn handle(&self) -> ScannerHandle {
        ScannerHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut Scanner {
        &mut self.scanner
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScannerEvent> {
        self.scanner.subscribe()
    }

    /// Wait for the next message from either queue
    pub async fn next_message(&mut self) -> Option<Message> {
        // The runtime holds a sender, so the message queue never closes
        tokio::select! {
            message = self.rx.recv() => message,
            Some(tagged) = self.surface_rx.recv() => Some(Message::Surface(tagged)),
        }
    }

    /// Process one message. Returns false once the scanner has been torn down.
    pub async fn step(&mut self) -> bool {
        let Some(message) = self.next_message().await else {
            return false;
        };
        let teardown = matches!(message, Message::Teardown);
        self.scanner.update(message);
        !teardown
    }

    /// Process messages already queued without waiting for new ones
    pub fn drain(&mut self) -> usize {
        let mut processed = 0;
        loop {
            let message = match self.rx.try_recv() {
                Ok(message) => message,
                Err(_) => match self.surface_rx.try_recv() {
                    Ok(tagged) => Message::Surface(tagged),
                    Err(_) => break,
                },
            };
            self.scanner.update(message);
            processed += 1;
        }
        processed
    }

    /// Run until a teardown message has been handled
    pub async fn run(mut self) -> Scanner {
        while self.step().await {}
        debug!("Scanner runtime finished");
        self.scanner
    }
}

impl std::fmt::Debug for ScannerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerRuntime")
            .field("scanner", &self.scanner)
            .finish()
    }
}
