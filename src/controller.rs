//! The hands-free controller: mode, camera, classification and dispatch.
//!
//! Everything here runs on the host's single UI thread. The host drives two
//! loops from its frame clock: the capture loop ([`HandGestureController::begin_frame`]
//! then, after off-thread inference, [`HandGestureController::complete_frame`])
//! and the scroll loop ([`HandGestureController::scroll_step`]). Both carry a
//! token (generation or epoch) so work scheduled before a teardown is ignored.

use async_channel::Sender;
use log::{debug, info, warn};

use crate::camera::{CameraSessionManager, FramePoll, OpenSignal, VideoFrame};
use crate::classifier::{ClassifierTuning, GestureClassifier, GestureLabel};
use crate::config::Config;
use crate::dispatch::{ActionDispatcher, DispatchOutcome, Page, ScrollDirection, DEFAULT_STEP_PX};
use crate::error::{CameraError, GestureError};
use crate::landmarks::LandmarkSet;
use crate::mode::{ModeMachine, ModeState};
use crate::preview::{PreviewFrame, LOADING_MESSAGE, NO_SIGNAL_MESSAGE};
use crate::stabilizer::{Stabilizer, DEFAULT_STABILITY_FRAMES};

/// Notifications for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    ModeChanged(ModeState),
    /// The confirmed gesture changed; `None` while nothing is confirmed.
    GestureChanged(GestureLabel),
    CursorMoved { x: f64, y: f64 },
    Clicked { x: f64, y: f64 },
    Dismissed,
    /// A new scroll loop needs stepping once per frame with this epoch.
    ScrollStarted { epoch: u64, direction: ScrollDirection },
    ScrollStopped,
    Error(GestureError),
}

/// Per-frame decision of the capture loop.
#[derive(Debug, Clone)]
pub enum FrameStep {
    /// The loop is over; do not reschedule.
    Stop,
    /// Nothing to infer this frame; reschedule.
    Skip,
    /// Run the landmark model on this frame.
    Infer(VideoFrame),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub tuning: ClassifierTuning,
    pub stability_frames: u32,
    pub scroll_step_px: f64,
    /// Leave the mode on stream loss instead of idling with an error shown.
    pub exit_on_stream_loss: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            tuning: ClassifierTuning::default(),
            stability_frames: DEFAULT_STABILITY_FRAMES,
            scroll_step_px: DEFAULT_STEP_PX,
            exit_on_stream_loss: false,
        }
    }
}

impl From<&Config> for ControllerSettings {
    fn from(config: &Config) -> Self {
        Self {
            tuning: config.gesture.classifier_tuning(),
            stability_frames: config.gesture.stability_frames(),
            scroll_step_px: config.scroll.step_px,
            exit_on_stream_loss: config.exit_on_stream_loss,
        }
    }
}

pub struct HandGestureController {
    settings: ControllerSettings,
    mode: ModeMachine,
    cameras: CameraSessionManager,
    classifier: GestureClassifier,
    stabilizer: Stabilizer,
    dispatcher: ActionDispatcher,
    page: Box<dyn Page>,
    events: Sender<ControllerEvent>,
    viewport: (f64, f64),
    cursor: (f64, f64),
    gesture: GestureLabel,
    generation: u64,
    capturing: bool,
    preview: PreviewFrame,
}

impl HandGestureController {
    pub fn new(
        settings: ControllerSettings,
        cameras: CameraSessionManager,
        page: Box<dyn Page>,
        events: Sender<ControllerEvent>,
        viewport: (f64, f64),
    ) -> Self {
        Self {
            classifier: GestureClassifier::new(settings.tuning),
            stabilizer: Stabilizer::new(settings.stability_frames),
            dispatcher: ActionDispatcher::new(settings.scroll_step_px),
            settings,
            mode: ModeMachine::new(),
            cameras,
            page,
            events,
            viewport,
            cursor: (viewport.0 / 2.0, viewport.1 / 2.0),
            gesture: GestureLabel::None,
            generation: 0,
            capturing: false,
            preview: PreviewFrame::default(),
        }
    }

    pub fn mode(&self) -> ModeState {
        self.mode.state()
    }

    pub fn gesture(&self) -> GestureLabel {
        self.gesture
    }

    pub fn cursor(&self) -> (f64, f64) {
        self.cursor
    }

    pub fn viewport(&self) -> (f64, f64) {
        self.viewport
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = (width, height);
    }

    pub fn preview(&self) -> &PreviewFrame {
        &self.preview
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn is_scrolling(&self) -> bool {
        self.dispatcher.scroll().is_running()
    }

    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        self.dispatcher.scroll().direction()
    }

    // ── Mode transitions ──

    /// Off -> Requesting. The host then asks the user for camera access.
    pub fn enter_mode(&mut self) {
        if self.mode.enter() {
            self.emit(ControllerEvent::ModeChanged(ModeState::Requesting));
        }
    }

    pub fn toggle_mode(&mut self) {
        match self.mode.state() {
            ModeState::Off => self.enter_mode(),
            ModeState::Requesting => self.cancel_request(),
            ModeState::Active => self.exit_mode(),
        }
    }

    /// Requesting -> Off without a decision on camera access. A no-op in any
    /// other state, so a prompt closing late cannot stop a running activation.
    pub fn cancel_request(&mut self) {
        if self.mode.state() != ModeState::Requesting {
            return;
        }
        self.teardown();
        if self.mode.cancel() {
            self.emit(ControllerEvent::ModeChanged(ModeState::Off));
        }
    }

    /// Tear everything down and go to Off. Every stop flag is flipped before
    /// returning, so frame callbacks already queued find nothing to do.
    pub fn exit_mode(&mut self) {
        self.teardown();
        if self.mode.exit() {
            self.emit(ControllerEvent::ModeChanged(ModeState::Off));
        }
    }

    /// Requesting -> Active. Returns the generation the host must pass to the
    /// activation it starts now.
    pub fn on_permission_granted(&mut self) -> Option<u64> {
        if !self.mode.grant() {
            return None;
        }
        self.generation += 1;
        self.stabilizer.reset();
        self.cursor = (self.viewport.0 / 2.0, self.viewport.1 / 2.0);
        self.emit(ControllerEvent::ModeChanged(ModeState::Active));
        self.emit(ControllerEvent::CursorMoved {
            x: self.cursor.0,
            y: self.cursor.1,
        });
        Some(self.generation)
    }

    pub fn on_permission_denied(&mut self) {
        if self.mode.state() == ModeState::Off {
            return;
        }
        self.emit(ControllerEvent::Error(GestureError::PermissionDenied));
        self.teardown();
        if self.mode.deny() {
            self.emit(ControllerEvent::ModeChanged(ModeState::Off));
        }
    }

    // ── Capture loop ──

    /// The generation of the running activation, if any.
    pub fn active_generation(&self) -> Option<u64> {
        self.mode.is_active().then_some(self.generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.mode.is_active() && generation == self.generation
    }

    /// Acquire the camera for `generation`. `Ok(false)` means the activation
    /// was superseded and nothing was opened.
    pub fn start_capture(&mut self, generation: u64) -> Result<bool, GestureError> {
        if !self.is_current(generation) {
            debug!("Skipping camera start for stale generation {generation}");
            return Ok(false);
        }
        if let Err(e) = self.cameras.acquire() {
            let err = GestureError::from(e);
            self.fail_capture(err.clone());
            return Err(err);
        }
        self.capturing = true;
        self.preview = PreviewFrame::placeholder(LOADING_MESSAGE);
        Ok(true)
    }

    /// Signals for camera devices still opening after [`Self::start_capture`].
    /// The host awaits them off the UI thread before starting the capture loop.
    pub fn take_camera_open_signals(&mut self) -> Vec<OpenSignal> {
        self.cameras.take_open_signals()
    }

    /// The camera for `generation` failed to open in the background.
    /// Ignored once the activation has been superseded.
    pub fn on_camera_open_failed(&mut self, generation: u64, err: CameraError) {
        if !self.is_current(generation) {
            debug!("Dropping camera open failure for stale generation {generation}: {err}");
            return;
        }
        self.capturing = false;
        self.cameras.release();
        self.preview = PreviewFrame::default();
        self.fail_capture(GestureError::from(err));
    }

    fn fail_capture(&mut self, err: GestureError) {
        warn!("Camera acquisition failed: {err}");
        if err == GestureError::PermissionDenied {
            self.on_permission_denied();
        } else {
            self.emit(ControllerEvent::Error(err));
        }
    }

    /// First half of a capture tick: decide whether there is a frame to infer.
    pub fn begin_frame(&mut self, generation: u64) -> FrameStep {
        if !self.is_current(generation) || !self.capturing {
            return FrameStep::Stop;
        }
        if let Some(err) = self.cameras.check_health() {
            self.on_stream_lost(err);
            return FrameStep::Stop;
        }
        match self.cameras.poll_frame() {
            FramePoll::Detached => FrameStep::Stop,
            FramePoll::Pending => {
                self.preview = PreviewFrame::placeholder(LOADING_MESSAGE);
                FrameStep::Skip
            }
            FramePoll::NoSignal => {
                self.preview = PreviewFrame::placeholder(NO_SIGNAL_MESSAGE);
                FrameStep::Skip
            }
            FramePoll::Unchanged => FrameStep::Skip,
            FramePoll::Ready(frame) => {
                let keypoints = std::mem::take(&mut self.preview.keypoints);
                self.preview = PreviewFrame::mirrored(&frame);
                self.preview.keypoints = keypoints;
                FrameStep::Infer(frame)
            }
        }
    }

    /// Second half of a capture tick, after inference. Results for a stale
    /// generation are discarded. Returns whether the loop should continue.
    pub fn complete_frame(
        &mut self,
        generation: u64,
        result: Result<Option<LandmarkSet>, GestureError>,
    ) -> bool {
        if !self.is_current(generation) || !self.capturing {
            debug!("Discarding inference result for generation {generation}");
            return false;
        }
        let hand = match result {
            Ok(hand) => hand.filter(LandmarkSet::is_complete),
            Err(e) if e.is_transient() => {
                warn!("Skipping frame: {e}");
                return true;
            }
            Err(e) => {
                self.capturing = false;
                self.dispatcher.stop_scroll();
                self.emit(ControllerEvent::Error(e));
                return false;
            }
        };

        self.preview.set_landmarks(hand.as_ref());
        let label = match &hand {
            Some(hand) => {
                self.track_cursor(hand);
                self.classifier.classify(hand)
            }
            None => GestureLabel::None,
        };
        self.process_label(label)
    }

    fn track_cursor(&mut self, hand: &LandmarkSet) {
        if let Some((x, y)) = hand.mirrored_index_tip(self.viewport) {
            self.cursor = (x, y);
            self.emit(ControllerEvent::CursorMoved { x, y });
        }
    }

    /// Stabilize and dispatch one frame's label.
    fn process_label(&mut self, label: GestureLabel) -> bool {
        let event = self.stabilizer.observe(label);
        let confirmed = self.stabilizer.confirmed().unwrap_or(GestureLabel::None);

        if confirmed != self.gesture {
            // A released pointing gesture stops scrolling on this frame.
            if self.dispatcher.stop_scroll() {
                self.emit(ControllerEvent::ScrollStopped);
            }
            self.gesture = confirmed;
            self.emit(ControllerEvent::GestureChanged(confirmed));
        }

        let Some(event) = event else {
            return true;
        };
        match self.dispatcher.dispatch(event, self.cursor, self.page.as_mut()) {
            DispatchOutcome::Nothing => {}
            DispatchOutcome::ScrollStarted { epoch, direction } => {
                self.emit(ControllerEvent::ScrollStarted { epoch, direction });
            }
            DispatchOutcome::ScrollStopped => self.emit(ControllerEvent::ScrollStopped),
            DispatchOutcome::Clicked { x, y, .. } => self.emit(ControllerEvent::Clicked { x, y }),
            DispatchOutcome::Dismissed => self.emit(ControllerEvent::Dismissed),
            DispatchOutcome::Exit => {
                self.exit_mode();
                return false;
            }
        }
        true
    }

    /// One scroll frame for the loop started with `epoch`. Returns whether
    /// to reschedule.
    pub fn scroll_step(&mut self, epoch: u64) -> bool {
        if !self.mode.is_active() {
            return false;
        }
        self.dispatcher.scroll_step(epoch, self.page.as_mut())
    }

    /// The model could not be loaded for `generation`. The mode stays active
    /// with the error shown until the user exits.
    pub fn report_model_failure(&mut self, generation: u64, err: GestureError) {
        if !self.is_current(generation) {
            return;
        }
        self.capturing = false;
        self.cameras.release();
        self.preview = PreviewFrame::default();
        self.emit(ControllerEvent::Error(err));
    }

    fn on_stream_lost(&mut self, err: GestureError) {
        self.capturing = false;
        if self.dispatcher.stop_scroll() {
            self.emit(ControllerEvent::ScrollStopped);
        }
        self.preview = PreviewFrame::placeholder(NO_SIGNAL_MESSAGE);
        self.emit(ControllerEvent::Error(err));
        if self.settings.exit_on_stream_loss {
            self.exit_mode();
        }
    }

    fn teardown(&mut self) {
        self.generation += 1;
        self.capturing = false;
        if self.dispatcher.stop_scroll() {
            self.emit(ControllerEvent::ScrollStopped);
        }
        self.stabilizer.reset();
        if self.cameras.release() {
            info!("Camera released on exit");
        }
        self.preview = PreviewFrame::default();
        if self.gesture != GestureLabel::None {
            self.gesture = GestureLabel::None;
            self.emit(ControllerEvent::GestureChanged(GestureLabel::None));
        }
    }

    fn emit(&self, event: ControllerEvent) {
        if self.events.try_send(event).is_err() {
            debug!("Controller event dropped: receiver closed");
        }
    }
}
