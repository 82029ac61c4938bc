//! Fixtures and fakes shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use async_channel::Receiver;
use image::{Rgb, RgbImage};
use tokio::sync::Notify;

use crate::camera::{
    CameraBackend, CameraSessionManager, OpenSignal, StreamConstraints, TrackState, VideoFrame,
    VideoTrack,
};
use crate::classifier::GestureLabel;
use crate::controller::{ControllerEvent, ControllerSettings, FrameStep, HandGestureController};
use crate::dispatch::{ElementId, Page, PointerEventKind};
use crate::error::{CameraError, LandmarkError};
use crate::landmarks::{index, Finger, FrameSize, LandmarkSet, Point, LANDMARK_COUNT};
use crate::pipeline::FrameClock;
use crate::provider::LandmarkProvider;

// ── Hand fixtures ──

#[derive(Debug, Clone, Copy, PartialEq)]
enum Orientation {
    Upright,
    Inverted,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FingerPose {
    Curled,
    Extended,
    HalfBent,
    /// Index only: bent toward the thumb tip.
    Pinching,
}

/// Builds 21-point hands in normalised coordinates.
#[derive(Debug, Clone)]
pub struct HandBuilder {
    orientation: Orientation,
    fingers: [FingerPose; 4],
    pinch_gap: f32,
    index_tip_at: Option<(f32, f32)>,
}

impl HandBuilder {
    fn with(orientation: Orientation) -> Self {
        Self {
            orientation,
            fingers: [FingerPose::Curled; 4],
            pinch_gap: 0.02,
            index_tip_at: None,
        }
    }

    /// Fingers up, wrist at the bottom; all fingers curled.
    pub fn upright() -> Self {
        Self::with(Orientation::Upright)
    }

    /// Fingers down, wrist at the top; all fingers curled.
    pub fn inverted() -> Self {
        Self::with(Orientation::Inverted)
    }

    /// Index pointing sideways.
    pub fn horizontal() -> Self {
        let mut b = Self::with(Orientation::Horizontal);
        b.fingers[0] = FingerPose::Extended;
        b
    }

    pub fn extend(mut self, fingers: &[Finger]) -> Self {
        for f in fingers {
            self.fingers[Self::slot(*f)] = FingerPose::Extended;
        }
        self
    }

    pub fn half_bend(mut self, fingers: &[Finger]) -> Self {
        for f in fingers {
            self.fingers[Self::slot(*f)] = FingerPose::HalfBent;
        }
        self
    }

    pub fn pinch(self) -> Self {
        self.pinch_gap(0.02)
    }

    /// Index bent toward the thumb, tips `gap` apart.
    pub fn pinch_gap(mut self, gap: f32) -> Self {
        self.fingers[0] = FingerPose::Pinching;
        self.pinch_gap = gap;
        self
    }

    /// Translate the whole hand so the index tip lands at a normalised point.
    pub fn place_index_tip(mut self, x: f32, y: f32) -> Self {
        self.index_tip_at = Some((x, y));
        self
    }

    fn slot(finger: Finger) -> usize {
        match finger {
            Finger::Index => 0,
            Finger::Middle => 1,
            Finger::Ring => 2,
            Finger::Pinky => 3,
        }
    }

    fn normalized_points(&self) -> Vec<Point> {
        let mut pts = vec![Point::default(); LANDMARK_COUNT];
        match self.orientation {
            Orientation::Upright => {
                pts[index::WRIST] = Point::new(0.5, 0.9);
                pts[index::THUMB_CMC] = Point::new(0.42, 0.82);
                pts[index::THUMB_MCP] = Point::new(0.36, 0.75);
                pts[index::THUMB_IP] = Point::new(0.32, 0.68);
                pts[index::THUMB_TIP] = Point::new(0.30, 0.62);
                for (i, finger) in Finger::ALL.iter().enumerate() {
                    let x = 0.42 + 0.06 * i as f32;
                    let (pip, dip, tip) = match self.fingers[i] {
                        FingerPose::Extended => (0.48, 0.40, 0.33),
                        FingerPose::Curled => (0.52, 0.58, 0.64),
                        FingerPose::HalfBent => (0.50, 0.50, 0.52),
                        FingerPose::Pinching => (0.50, 0.52, 0.55),
                    };
                    let bend = if self.fingers[i] == FingerPose::Pinching { -0.02 } else { 0.0 };
                    pts[finger.mcp()] = Point::new(x, 0.60);
                    pts[finger.pip()] = Point::new(x, pip);
                    pts[finger.pip() + 1] = Point::new(x + bend, dip);
                    pts[finger.tip()] = Point::new(x + 2.0 * bend, tip);
                }
                if self.fingers[0] == FingerPose::Pinching {
                    let tip = pts[index::INDEX_TIP];
                    pts[index::THUMB_TIP] = Point::new(tip.x - self.pinch_gap, tip.y);
                }
            }
            Orientation::Inverted => {
                pts[index::WRIST] = Point::new(0.5, 0.1);
                pts[index::THUMB_CMC] = Point::new(0.42, 0.18);
                pts[index::THUMB_MCP] = Point::new(0.36, 0.25);
                pts[index::THUMB_IP] = Point::new(0.32, 0.32);
                pts[index::THUMB_TIP] = Point::new(0.30, 0.38);
                for (i, finger) in Finger::ALL.iter().enumerate() {
                    let x = 0.42 + 0.06 * i as f32;
                    let (pip, dip, tip) = match self.fingers[i] {
                        FingerPose::Extended => (0.52, 0.60, 0.67),
                        FingerPose::HalfBent => (0.50, 0.50, 0.48),
                        FingerPose::Curled | FingerPose::Pinching => (0.48, 0.42, 0.36),
                    };
                    pts[finger.mcp()] = Point::new(x, 0.40);
                    pts[finger.pip()] = Point::new(x, pip);
                    pts[finger.pip() + 1] = Point::new(x, dip);
                    pts[finger.tip()] = Point::new(x, tip);
                }
            }
            Orientation::Horizontal => {
                pts[index::WRIST] = Point::new(0.2, 0.5);
                pts[index::THUMB_CMC] = Point::new(0.25, 0.58);
                pts[index::THUMB_MCP] = Point::new(0.30, 0.60);
                pts[index::THUMB_IP] = Point::new(0.35, 0.62);
                pts[index::THUMB_TIP] = Point::new(0.40, 0.63);
                for (i, finger) in Finger::ALL.iter().enumerate() {
                    let y = 0.44 + 0.04 * i as f32;
                    let (pip, dip, tip) = match self.fingers[i] {
                        FingerPose::Extended => (0.55, 0.62, 0.68),
                        _ => (0.52, 0.50, 0.47),
                    };
                    pts[finger.mcp()] = Point::new(0.45, y);
                    pts[finger.pip()] = Point::new(pip, y);
                    pts[finger.pip() + 1] = Point::new(dip, y);
                    pts[finger.tip()] = Point::new(tip, y);
                }
            }
        }

        if let Some((x, y)) = self.index_tip_at {
            let tip = pts[index::INDEX_TIP];
            let (dx, dy) = (x - tip.x, y - tip.y);
            for p in &mut pts {
                *p = Point::new(p.x + dx, p.y + dy);
            }
        }
        pts
    }

    pub fn build(&self, frame: FrameSize) -> LandmarkSet {
        LandmarkSet::from_normalized(&self.normalized_points(), frame)
    }
}

/// A canonical hand that classifies as `label`.
pub fn hand_for(label: GestureLabel, frame: FrameSize) -> LandmarkSet {
    let builder = match label {
        GestureLabel::None => HandBuilder::upright(),
        GestureLabel::PointUp => HandBuilder::upright().extend(&[Finger::Index]),
        GestureLabel::PointDown => HandBuilder::inverted().extend(&[Finger::Index]),
        GestureLabel::OpenPalm => HandBuilder::upright().extend(&Finger::ALL),
        GestureLabel::Pinch => HandBuilder::upright().pinch(),
        GestureLabel::Peace => HandBuilder::upright().extend(&[Finger::Index, Finger::Middle]),
        GestureLabel::ThreeFingers => {
            HandBuilder::upright().extend(&[Finger::Index, Finger::Middle, Finger::Ring])
        }
    };
    builder.build(frame)
}

pub fn solid_frame(width: u32, height: u32, sequence: u64) -> VideoFrame {
    VideoFrame::new(RgbImage::from_pixel(width, height, Rgb([40, 40, 40])), sequence)
}

// ── Camera fakes ──

#[derive(Debug, Default)]
struct TrackRecord {
    stops: u32,
    ended: bool,
    frame: Option<VideoFrame>,
    stopped_at_opens: Option<usize>,
}

#[derive(Debug, Default)]
struct BackendInner {
    tracks: Vec<Rc<RefCell<TrackRecord>>>,
    opens: usize,
    fail: Option<CameraError>,
    no_tracks: bool,
    deferred: bool,
    openers: Vec<async_channel::Sender<Result<(), CameraError>>>,
}

/// Camera backend whose tracks record how often they are stopped.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    inner: Rc<RefCell<BackendInner>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(err: CameraError) -> Self {
        let backend = Self::new();
        backend.inner.borrow_mut().fail = Some(err);
        backend
    }

    pub fn without_tracks() -> Self {
        let backend = Self::new();
        backend.inner.borrow_mut().no_tracks = true;
        backend
    }

    /// Tracks come back before their device has opened; see [`Self::finish_open`].
    pub fn deferred() -> Self {
        let backend = Self::new();
        backend.inner.borrow_mut().deferred = true;
        backend
    }

    /// Resolve the background open of the `i`-th deferred track.
    pub fn finish_open(&self, i: usize, result: Result<(), CameraError>) {
        let inner = self.inner.borrow();
        let _ = inner.openers[i].try_send(result);
    }

    /// As if every opening thread died without reporting.
    pub fn drop_openers(&self) {
        self.inner.borrow_mut().openers.clear();
    }

    pub fn opens(&self) -> usize {
        self.inner.borrow().opens
    }

    /// The `i`-th track ever opened.
    pub fn track(&self, i: usize) -> FakeTrackHandle {
        FakeTrackHandle(self.inner.borrow().tracks[i].clone())
    }

    pub fn latest_track(&self) -> Option<FakeTrackHandle> {
        self.inner.borrow().tracks.last().cloned().map(FakeTrackHandle)
    }
}

impl CameraBackend for FakeBackend {
    fn open(
        &mut self,
        _constraints: &StreamConstraints,
    ) -> Result<Vec<Box<dyn VideoTrack>>, CameraError> {
        let mut inner = self.inner.borrow_mut();
        if let Some(err) = inner.fail.clone() {
            return Err(err);
        }
        inner.opens += 1;
        if inner.no_tracks {
            return Ok(Vec::new());
        }
        let record = Rc::new(RefCell::new(TrackRecord::default()));
        inner.tracks.push(record.clone());
        let open_signal = inner.deferred.then(|| {
            let (tx, rx) = async_channel::bounded(1);
            inner.openers.push(tx);
            rx
        });
        Ok(vec![Box::new(FakeTrack {
            label: format!("fake camera {}", inner.opens),
            record,
            backend: self.inner.clone(),
            open_signal,
        })])
    }
}

struct FakeTrack {
    label: String,
    record: Rc<RefCell<TrackRecord>>,
    backend: Rc<RefCell<BackendInner>>,
    open_signal: Option<OpenSignal>,
}

impl VideoTrack for FakeTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> TrackState {
        let record = self.record.borrow();
        if record.ended || record.stops > 0 {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }

    fn latest_frame(&self) -> Option<VideoFrame> {
        self.record.borrow().frame.clone()
    }

    fn stop(&mut self) {
        let mut record = self.record.borrow_mut();
        record.stops += 1;
        assert_eq!(record.stops, 1, "{} stopped twice", self.label);
        record.stopped_at_opens = Some(self.backend.borrow().opens);
    }

    fn take_open_signal(&mut self) -> Option<OpenSignal> {
        self.open_signal.take()
    }
}

#[derive(Debug, Clone)]
pub struct FakeTrackHandle(Rc<RefCell<TrackRecord>>);

impl FakeTrackHandle {
    pub fn stops(&self) -> u32 {
        self.0.borrow().stops
    }

    pub fn push_frame(&self, frame: VideoFrame) {
        self.0.borrow_mut().frame = Some(frame);
    }

    /// Simulate the device going away.
    pub fn end(&self) {
        self.0.borrow_mut().ended = true;
    }

    /// Whether this track was stopped before the `n`-th (zero-based) open.
    pub fn stopped_before_open(&self, n: usize) -> bool {
        self.0.borrow().stopped_at_opens.is_some_and(|opens| opens <= n)
    }
}

// ── Page fake ──

#[derive(Debug, Clone, PartialEq)]
pub enum PageCall {
    OverlaysHidden(bool),
    HitTest(f64, f64),
    Pointer(ElementId, PointerEventKind, f64, f64),
    Cancel,
    Activate(ElementId),
    Scroll(f64),
    Ripple(f64, f64),
}

#[derive(Debug, Default)]
struct PageInner {
    calls: Vec<PageCall>,
    elements: Vec<(ElementId, (f64, f64, f64, f64))>,
    ancestors: HashMap<ElementId, ElementId>,
    close: Option<ElementId>,
}

/// A page with rectangular elements that records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingPage {
    inner: Rc<RefCell<PageInner>>,
}

impl RecordingPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element covering `(left, top, right, bottom)`; later ones are on top.
    pub fn place(&self, id: ElementId, rect: (f64, f64, f64, f64)) {
        self.inner.borrow_mut().elements.push((id, rect));
    }

    pub fn set_ancestor(&self, child: ElementId, ancestor: ElementId) {
        self.inner.borrow_mut().ancestors.insert(child, ancestor);
    }

    pub fn set_close_affordance(&self, id: ElementId) {
        self.inner.borrow_mut().close = Some(id);
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.inner.borrow().calls.clone()
    }

    pub fn pointer_events(&self) -> Vec<PageCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, PageCall::Pointer(..)))
            .collect()
    }

    pub fn scrolled(&self) -> f64 {
        self.calls()
            .iter()
            .map(|c| match c {
                PageCall::Scroll(dy) => *dy,
                _ => 0.0,
            })
            .sum()
    }

    fn record(&self, call: PageCall) {
        self.inner.borrow_mut().calls.push(call);
    }
}

impl Page for RecordingPage {
    fn set_overlays_hidden(&mut self, hidden: bool) {
        self.record(PageCall::OverlaysHidden(hidden));
    }

    fn element_at(&mut self, x: f64, y: f64) -> Option<ElementId> {
        self.record(PageCall::HitTest(x, y));
        self.inner
            .borrow()
            .elements
            .iter()
            .rev()
            .find(|(_, (l, t, r, b))| x >= *l && x <= *r && y >= *t && y <= *b)
            .map(|(id, _)| *id)
    }

    fn interactive_ancestor(&mut self, element: ElementId) -> Option<ElementId> {
        self.inner.borrow().ancestors.get(&element).copied()
    }

    fn dispatch_pointer(&mut self, target: ElementId, kind: PointerEventKind, x: f64, y: f64) {
        self.record(PageCall::Pointer(target, kind, x, y));
    }

    fn dispatch_cancel(&mut self) {
        self.record(PageCall::Cancel);
    }

    fn close_affordance(&mut self) -> Option<ElementId> {
        self.inner.borrow().close
    }

    fn activate(&mut self, element: ElementId) {
        self.record(PageCall::Activate(element));
    }

    fn scroll_by(&mut self, dy: f64) {
        self.record(PageCall::Scroll(dy));
    }

    fn show_click_ripple(&mut self, x: f64, y: f64) {
        self.record(PageCall::Ripple(x, y));
    }
}

// ── Providers ──

/// Returns the canonical hand for a fixed label on every frame.
pub struct ScriptedProvider {
    label: Option<GestureLabel>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Never sees a hand.
    pub fn empty() -> Self {
        Self {
            label: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn repeating(label: GestureLabel) -> Self {
        Self {
            label: Some(label),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LandmarkProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn estimate(&self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, LandmarkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.label.map(|label| hand_for(label, frame.size())))
    }
}

/// Blocks inside `estimate` until the test releases it.
pub struct GatedProvider {
    label: GestureLabel,
    started: Arc<Notify>,
    release: Mutex<mpsc::Receiver<()>>,
}

pub struct Gate {
    started: Arc<Notify>,
    release: mpsc::Sender<()>,
}

impl GatedProvider {
    pub fn new(label: GestureLabel) -> (Self, Gate) {
        let started = Arc::new(Notify::new());
        let (tx, rx) = mpsc::channel();
        let provider = Self {
            label,
            started: started.clone(),
            release: Mutex::new(rx),
        };
        (provider, Gate { started, release: tx })
    }
}

impl Gate {
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

impl LandmarkProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    fn estimate(&self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, LandmarkError> {
        self.started.notify_one();
        if let Ok(rx) = self.release.lock() {
            let _ = rx.recv();
        }
        Ok(Some(hand_for(self.label, frame.size())))
    }
}

// ── Clocks ──

/// Ticks `limit` times, pushing a fresh frame into the newest fake track first.
pub struct FeedingClock {
    backend: FakeBackend,
    limit: usize,
    ticks: Cell<usize>,
}

impl FeedingClock {
    pub fn new(backend: FakeBackend, limit: usize) -> Self {
        Self {
            backend,
            limit,
            ticks: Cell::new(0),
        }
    }

    pub fn ticks(&self) -> usize {
        self.ticks.get()
    }
}

impl FrameClock for FeedingClock {
    async fn next_frame(&self) -> bool {
        tokio::task::yield_now().await;
        if self.ticks.get() >= self.limit {
            return false;
        }
        self.ticks.set(self.ticks.get() + 1);
        if let Some(track) = self.backend.latest_track() {
            track.push_frame(solid_frame(320, 240, self.ticks.get() as u64));
        }
        true
    }
}

/// Ticks `limit` times.
pub struct TickClock {
    limit: usize,
    ticks: Cell<usize>,
}

impl TickClock {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ticks: Cell::new(0),
        }
    }
}

impl FrameClock for TickClock {
    async fn next_frame(&self) -> bool {
        tokio::task::yield_now().await;
        if self.ticks.get() >= self.limit {
            return false;
        }
        self.ticks.set(self.ticks.get() + 1);
        true
    }
}

// ── Controller rig ──

/// A controller wired to fakes, driven frame by frame.
pub struct ControllerRig {
    pub controller: HandGestureController,
    pub backend: FakeBackend,
    pub page: RecordingPage,
    pub events: Receiver<ControllerEvent>,
    pub generation: u64,
    sequence: u64,
}

impl ControllerRig {
    fn build(backend: FakeBackend, settings: ControllerSettings, viewport: (f64, f64)) -> Self {
        let (tx, rx) = async_channel::unbounded();
        let page = RecordingPage::new();
        let cameras =
            CameraSessionManager::new(Box::new(backend.clone()), StreamConstraints::default());
        let controller =
            HandGestureController::new(settings, cameras, Box::new(page.clone()), tx, viewport);
        Self {
            controller,
            backend,
            page,
            events: rx,
            generation: 0,
            sequence: 0,
        }
    }

    /// Mode is Requesting; nothing opened yet.
    pub fn requesting() -> Self {
        let mut rig = Self::build(FakeBackend::new(), ControllerSettings::default(), (1280.0, 720.0));
        rig.controller.enter_mode();
        rig
    }

    pub fn requesting_with_backend(backend: FakeBackend) -> Self {
        let mut rig = Self::build(backend, ControllerSettings::default(), (1280.0, 720.0));
        rig.controller.enter_mode();
        rig
    }

    pub fn requesting_with_failing_camera(err: CameraError) -> Self {
        Self::requesting_with_backend(FakeBackend::failing(err))
    }

    /// Mode is Active with the camera open.
    pub fn active() -> Self {
        Self::with_settings(ControllerSettings::default(), (1280.0, 720.0))
    }

    /// Mode is Active and the camera was acquired, but its device is still
    /// opening; the rig has already taken the open signals.
    pub fn active_while_opening() -> (Self, Vec<OpenSignal>) {
        let mut rig = Self::requesting_with_backend(FakeBackend::deferred());
        rig.generation = rig.controller.on_permission_granted().expect("permission granted");
        assert!(rig.controller.start_capture(rig.generation).expect("camera acquired"));
        let signals = rig.controller.take_camera_open_signals();
        (rig, signals)
    }

    pub fn active_with_viewport(viewport: (f64, f64)) -> Self {
        Self::with_settings(ControllerSettings::default(), viewport)
    }

    pub fn with_settings(settings: ControllerSettings, viewport: (f64, f64)) -> Self {
        let mut rig = Self::build(FakeBackend::new(), settings, viewport);
        rig.controller.enter_mode();
        rig.generation = rig.controller.on_permission_granted().expect("permission granted");
        assert!(rig.controller.start_capture(rig.generation).expect("camera opened"));
        rig
    }

    /// Push a fresh frame and run the first half of a tick.
    pub fn next_frame(&mut self) -> FrameStep {
        self.sequence += 1;
        if let Some(track) = self.backend.latest_track() {
            track.push_frame(solid_frame(320, 240, self.sequence));
        }
        self.controller.begin_frame(self.generation)
    }

    pub fn feed_with(&mut self, n: usize, hand: impl Fn(FrameSize) -> Option<LandmarkSet>) {
        for _ in 0..n {
            let FrameStep::Infer(frame) = self.next_frame() else {
                panic!("capture loop is not running");
            };
            self.controller
                .complete_frame(self.generation, Ok(hand(frame.size())));
        }
    }

    pub fn feed(&mut self, label: GestureLabel, n: usize) {
        self.feed_with(n, |size| Some(hand_for(label, size)));
    }

    pub fn feed_builder(&mut self, builder: &HandBuilder, n: usize) {
        self.feed_with(n, |size| Some(builder.build(size)));
    }

    pub fn feed_none(&mut self, n: usize) {
        self.feed_with(n, |_| None);
    }

    pub fn drain_events(&self) -> Vec<ControllerEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    /// Count matching events since the last drain.
    pub fn count_events(&self, pred: impl Fn(&ControllerEvent) -> bool) -> usize {
        self.drain_events().iter().filter(|e| pred(e)).count()
    }

    /// Epoch of the most recent scroll loop started since the last drain.
    pub fn scroll_epoch(&self) -> Option<u64> {
        self.drain_events().into_iter().rev().find_map(|e| match e {
            ControllerEvent::ScrollStarted { epoch, .. } => Some(epoch),
            _ => None,
        })
    }
}
