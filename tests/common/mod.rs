// SPDX-License-Identifier: GPL-3.0-only

//! Scriptable capability fakes and a paused-clock harness for scanner tests

#![allow(dead_code)]

use async_trait::async_trait;
use plantscan::backends::{
    AcquisitionFailure, BarcodeDetector, CallerIdentity, CameraFrame, Capabilities,
    CaptureHandle, DetectionError, FacingMode, FacingPreference, FrameSource, PixelFormat,
    RenderSurface, ResourceVerifier, SurfaceEvent, SurfaceEventSink, VerifyError, VideoCapture,
};
use plantscan::config::ScannerSettings;
use plantscan::navigation::RecordingNavigator;
use plantscan::scanner::{ScannerEvent, ScannerRuntime};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};

pub const POLL: Duration = Duration::from_millis(500);

fn test_frame() -> Arc<CameraFrame> {
    Arc::new(CameraFrame::packed(4, 4, PixelFormat::Gray, vec![128; 16]))
}

// ===== Camera =====

pub struct FakeSource {
    live: AtomicBool,
    frame: Arc<CameraFrame>,
}

impl FakeSource {
    /// Simulate the device being unplugged
    pub fn unplug(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

impl FrameSource for FakeSource {
    fn latest_frame(&self) -> Option<Arc<CameraFrame>> {
        self.is_live().then(|| Arc::clone(&self.frame))
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

/// Camera answering requests from a script; unscripted requests succeed
/// with an environment-facing device
#[derive(Default)]
pub struct FakeCamera {
    script: Mutex<VecDeque<Result<FacingMode, AcquisitionFailure>>>,
    requests: Mutex<Vec<FacingPreference>>,
    sources: Mutex<Vec<Arc<FakeSource>>>,
    acquired: AtomicUsize,
    stopped: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(
        results: impl IntoIterator<Item = Result<FacingMode, AcquisitionFailure>>,
    ) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Requests wait until the returned gate is notified, like an open
    /// permission prompt
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn push(&self, result: Result<FacingMode, AcquisitionFailure>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn requests(&self) -> Vec<FacingPreference> {
        self.requests.lock().unwrap().clone()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Handles acquired and not yet stopped
    pub fn active(&self) -> usize {
        self.acquired() - self.stopped()
    }

    pub fn last_source(&self) -> Option<Arc<FakeSource>> {
        self.sources.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl VideoCapture for FakeCamera {
    async fn request(
        &self,
        preference: FacingPreference,
    ) -> Result<CaptureHandle, AcquisitionFailure> {
        self.requests.lock().unwrap().push(preference);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let next = self.script.lock().unwrap().pop_front();
        let facing = next.unwrap_or(Ok(FacingMode::Environment))?;

        let source = Arc::new(FakeSource {
            live: AtomicBool::new(true),
            frame: test_frame(),
        });
        self.sources.lock().unwrap().push(Arc::clone(&source));
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(CaptureHandle::new(format!("fake-{}", facing), facing, source))
    }

    fn stop(&self, handle: &CaptureHandle) {
        handle.source.stop();
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

// ===== Surface =====

/// Surface that reports itself ready as soon as playback starts
pub struct FakeSurface {
    bound: Mutex<Option<CaptureHandle>>,
    sinks: Mutex<Vec<SurfaceEventSink>>,
    mirrored: AtomicBool,
    playing: AtomicBool,
    paused: AtomicBool,
    ended: AtomicBool,
    auto_ready: AtomicBool,
    play_error: Mutex<Option<String>>,
    size: Mutex<(u32, u32)>,
    attaches: AtomicUsize,
    detaches: AtomicUsize,
}

impl Default for FakeSurface {
    fn default() -> Self {
        Self {
            bound: Mutex::new(None),
            sinks: Mutex::new(Vec::new()),
            mirrored: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            auto_ready: AtomicBool::new(true),
            play_error: Mutex::new(None),
            size: Mutex::new((640, 480)),
            attaches: AtomicUsize::new(0),
            detaches: AtomicUsize::new(0),
        }
    }
}

impl FakeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Playback starts without raising any readiness signal
    pub fn silent() -> Self {
        let surface = Self::default();
        surface.auto_ready.store(false, Ordering::SeqCst);
        surface
    }

    pub fn rejecting_play(reason: &str) -> Self {
        let surface = Self::default();
        *surface.play_error.lock().unwrap() = Some(reason.to_string());
        surface
    }

    /// Raise an event on the most recent binding
    pub fn emit(&self, event: SurfaceEvent) {
        if let Some(sink) = self.sinks.lock().unwrap().last() {
            sink.emit(event);
        }
    }

    /// Raise an event on the `index`-th binding ever made
    pub fn emit_on(&self, index: usize, event: SurfaceEvent) {
        if let Some(sink) = self.sinks.lock().unwrap().get(index) {
            sink.emit(event);
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn set_size(&self, width: u32, height: u32) {
        *self.size.lock().unwrap() = (width, height);
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored.load(Ordering::SeqCst)
    }

    pub fn attaches(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn detaches(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderSurface for FakeSurface {
    fn attach(&self, handle: &CaptureHandle, mirrored: bool, events: SurfaceEventSink) {
        *self.bound.lock().unwrap() = Some(handle.clone());
        self.sinks.lock().unwrap().push(events);
        self.mirrored.store(mirrored, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        self.attaches.fetch_add(1, Ordering::SeqCst);
    }

    async fn play(&self) -> Result<(), String> {
        if let Some(reason) = self.play_error.lock().unwrap().clone() {
            return Err(reason);
        }
        self.playing.store(true, Ordering::SeqCst);
        if self.auto_ready.load(Ordering::SeqCst) {
            self.emit(SurfaceEvent::Playing);
        }
        Ok(())
    }

    fn detach(&self) {
        if self.bound.lock().unwrap().take().is_some() {
            self.detaches.fetch_add(1, Ordering::SeqCst);
        }
        self.playing.store(false, Ordering::SeqCst);
    }

    fn is_attached(&self) -> bool {
        self.bound.lock().unwrap().is_some()
    }

    fn is_paused(&self) -> bool {
        !self.playing.load(Ordering::SeqCst) || self.paused.load(Ordering::SeqCst)
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    fn frame_size(&self) -> (u32, u32) {
        *self.size.lock().unwrap()
    }

    fn has_enough_data(&self) -> bool {
        self.is_attached()
    }

    fn current_frame(&self) -> Option<Arc<CameraFrame>> {
        if self.is_paused() {
            return None;
        }
        self.bound
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|handle| handle.source.latest_frame())
    }
}

// ===== Detector =====

/// Detector answering from a script; unscripted calls see no code
pub struct FakeDetector {
    supported: bool,
    script: Mutex<VecDeque<Result<Vec<String>, DetectionError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for FakeDetector {
    fn default() -> Self {
        Self {
            supported: true,
            script: Mutex::new(VecDeque::new()),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl FakeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::default()
        }
    }

    /// Every detection takes `delay` of (paused) time
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn push(&self, result: Result<Vec<String>, DetectionError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn push_codes(&self, codes: &[&str]) {
        self.push(Ok(codes.iter().map(|c| c.to_string()).collect()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BarcodeDetector for FakeDetector {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn detect(&self, _frame: Arc<CameraFrame>) -> Result<Vec<String>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.script.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ===== Verifier =====

/// Ownership lookup over a fixed set of (plant, owner) pairs
#[derive(Default)]
pub struct FakeVerifier {
    owned: HashSet<(String, String)>,
    reachable: AtomicBool,
    failure: Mutex<Option<VerifyError>>,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeVerifier {
    pub fn owning(owner: &str, plants: &[&str]) -> Self {
        Self {
            owned: plants
                .iter()
                .map(|p| (p.to_string(), owner.to_string()))
                .collect(),
            reachable: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn failing(error: VerifyError) -> Self {
        let verifier = Self::owning("nobody", &[]);
        *verifier.failure.lock().unwrap() = Some(error);
        verifier
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// (identifier, user id) of every lookup
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceVerifier for FakeVerifier {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    async fn exists(&self, identifier: &str, caller: &CallerIdentity) -> Result<bool, VerifyError> {
        self.calls
            .lock()
            .unwrap()
            .push((identifier.to_string(), caller.user_id.clone()));

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .owned
            .contains(&(identifier.to_string(), caller.user_id.clone())))
    }
}

// ===== Harness =====

pub const USER: &str = "user-1";

pub struct Harness {
    pub runtime: ScannerRuntime,
    pub camera: Arc<FakeCamera>,
    pub surface: Arc<FakeSurface>,
    pub detector: Arc<FakeDetector>,
    pub verifier: Option<Arc<FakeVerifier>>,
    pub navigator: Arc<RecordingNavigator>,
    pub events: broadcast::Receiver<ScannerEvent>,
}

impl Harness {
    /// Signed-in harness with a verifier owning `plant-abc-123`
    pub fn new() -> Self {
        Self::build(
            FakeCamera::new(),
            FakeSurface::new(),
            FakeDetector::new(),
            Some(FakeVerifier::owning(USER, &["plant-abc-123"])),
            Some(CallerIdentity::new(USER)),
        )
    }

    pub fn build(
        camera: FakeCamera,
        surface: FakeSurface,
        detector: FakeDetector,
        verifier: Option<FakeVerifier>,
        identity: Option<CallerIdentity>,
    ) -> Self {
        Self::with_settings(
            camera,
            surface,
            detector,
            verifier,
            identity,
            ScannerSettings::default(),
        )
    }

    pub fn with_settings(
        camera: FakeCamera,
        surface: FakeSurface,
        detector: FakeDetector,
        verifier: Option<FakeVerifier>,
        identity: Option<CallerIdentity>,
        settings: ScannerSettings,
    ) -> Self {
        let camera = Arc::new(camera);
        let surface = Arc::new(surface);
        let detector = Arc::new(detector);
        let verifier = verifier.map(Arc::new);
        let navigator = Arc::new(RecordingNavigator::new());

        let caps = Capabilities {
            camera: camera.clone(),
            surface: surface.clone(),
            detector: detector.clone(),
            verifier: verifier
                .clone()
                .map(|v| v as Arc<dyn ResourceVerifier>),
            navigator: navigator.clone(),
        };
        let runtime = ScannerRuntime::new(caps, settings, identity);
        let events = runtime.subscribe();

        Self {
            runtime,
            camera,
            surface,
            detector,
            verifier,
            navigator,
            events,
        }
    }

    /// Process queued messages until nothing new arrives
    pub async fn settle(&mut self) {
        let mut idle_rounds = 0;
        while idle_rounds < 5 {
            tokio::task::yield_now().await;
            if self.runtime.drain() == 0 {
                idle_rounds += 1;
            } else {
                idle_rounds = 0;
            }
        }
    }

    /// Advance the paused clock in small steps, settling after each
    pub async fn advance(&mut self, duration: Duration) {
        let step = Duration::from_millis(10);
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            tokio::time::advance(step).await;
            self.settle().await;
            elapsed += step;
        }
    }

    pub async fn open(&mut self) {
        self.runtime.handle().open();
        self.settle().await;
    }

    pub async fn close(&mut self) {
        self.runtime.handle().close();
        self.settle().await;
    }

    /// Every event broadcast so far
    pub fn drain_events(&mut self) -> Vec<ScannerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn verifier(&self) -> &FakeVerifier {
        self.verifier
            .as_deref()
            .expect("harness built without a verifier")
    }
}
