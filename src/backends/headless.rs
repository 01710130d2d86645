// SPDX-License-Identifier: GPL-3.0-only

//! Render surface without a display
//!
//! Plays a capture handle's frame source into nowhere, raising the same
//! readiness signals a video element would. Used by the CLI scanner.

use super::types::{CameraFrame, CaptureHandle, SurfaceEvent, SurfaceEventSink};
use super::RenderSurface;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

struct Binding {
    handle: CaptureHandle,
    events: SurfaceEventSink,
    mirrored: bool,
}

/// Display-less render surface
#[derive(Default)]
pub struct HeadlessSurface {
    binding: Mutex<Option<Binding>>,
    playing: AtomicBool,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the bound stream is shown mirrored
    pub fn is_mirrored(&self) -> bool {
        self.with_binding(|b| b.mirrored).unwrap_or(false)
    }

    fn with_binding<T>(&self, f: impl FnOnce(&Binding) -> T) -> Option<T> {
        self.binding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
    }

    fn emit(&self, event: SurfaceEvent) {
        self.with_binding(|b| b.events.emit(event));
    }
}

#[async_trait]
impl RenderSurface for HeadlessSurface {
    fn attach(&self, handle: &CaptureHandle, mirrored: bool, events: SurfaceEventSink) {
        debug!(device = %handle.label, mirrored, "Attaching stream to headless surface");
        self.playing.store(false, Ordering::Release);
        *self.binding.lock().unwrap_or_else(PoisonError::into_inner) = Some(Binding {
            handle: handle.clone(),
            events,
            mirrored,
        });

        if handle.source.latest_frame().is_some() {
            self.emit(SurfaceEvent::MetadataLoaded);
        }
    }

    async fn play(&self) -> Result<(), String> {
        let live = self
            .with_binding(|b| b.handle.source.is_live())
            .ok_or_else(|| "no stream attached".to_string())?;
        if !live {
            return Err("stream has ended".to_string());
        }

        self.playing.store(true, Ordering::Release);
        self.emit(SurfaceEvent::CanPlay);
        self.emit(SurfaceEvent::Playing);
        Ok(())
    }

    fn detach(&self) {
        let previous = self
            .binding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.playing.store(false, Ordering::Release);
        if let Some(binding) = previous {
            debug!(device = %binding.handle.label, "Detached stream from headless surface");
        }
    }

    fn is_attached(&self) -> bool {
        self.with_binding(|_| ()).is_some()
    }

    fn is_paused(&self) -> bool {
        !self.playing.load(Ordering::Acquire)
    }

    fn is_ended(&self) -> bool {
        self.with_binding(|b| !b.handle.source.is_live())
            .unwrap_or(false)
    }

    fn frame_size(&self) -> (u32, u32) {
        self.with_binding(|b| b.handle.source.latest_frame())
            .flatten()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0))
    }

    fn has_enough_data(&self) -> bool {
        self.frame_size() != (0, 0)
    }

    fn current_frame(&self) -> Option<Arc<CameraFrame>> {
        if self.is_paused() {
            return None;
        }
        self.with_binding(|b| b.handle.source.latest_frame())
            .flatten()
    }
}
