//! Camera session lifecycle.
//!
//! A [`CameraSessionManager`] owns at most one [`CameraSession`] at a time.
//! The session owns its video tracks exclusively; releasing it stops every
//! track exactly once and detaches the frame sink. Release is guarded by the
//! session's [`SessionState`] so repeated or overlapping teardown is a no-op.

pub mod webcam;

use std::sync::Arc;

use image::RgbImage;
use log::{debug, info, warn};

use crate::error::{CameraError, GestureError};
use crate::landmarks::FrameSize;

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

/// What to ask the camera for. Video only; the model runs on small frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub facing: FacingMode,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 320,
            height: 240,
            frame_rate: 30,
            facing: FacingMode::User,
        }
    }
}

/// One decoded RGB frame, as captured (not mirrored).
#[derive(Debug, Clone)]
pub struct VideoFrame {
    image: Arc<RgbImage>,
    sequence: u64,
}

impl VideoFrame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self {
            image: Arc::new(image),
            sequence,
        }
    }

    pub fn image(&self) -> &Arc<RgbImage> {
        &self.image
    }

    /// Monotonic per track; repeated values mean no new frame arrived.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }

    /// A frame with zero width or height cannot be used.
    pub fn is_decodable(&self) -> bool {
        !self.size().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    /// Stopped, or ended by the device or the OS.
    Ended,
}

/// A single video track of an open stream.
pub trait VideoTrack {
    fn label(&self) -> &str;
    fn state(&self) -> TrackState;
    /// The most recent decoded frame, if one has arrived.
    fn latest_frame(&self) -> Option<VideoFrame>;
    /// Stop capture and free the device. Called at most once per track.
    /// Must not block on the device.
    fn stop(&mut self);
    /// For tracks whose device is still opening in the background: resolves
    /// with the open result. Handed out once.
    fn take_open_signal(&mut self) -> Option<OpenSignal> {
        None
    }
}

/// Resolves once a track's device has opened, or failed to.
pub type OpenSignal = async_channel::Receiver<Result<(), CameraError>>;

/// Wait until every signalled track has opened its device.
pub async fn wait_until_open(signals: Vec<OpenSignal>) -> Result<(), CameraError> {
    for signal in signals {
        match signal.recv().await {
            Ok(result) => result?,
            Err(_) => {
                return Err(CameraError::DeviceUnavailable(
                    "capture thread exited before opening the camera".into(),
                ))
            }
        }
    }
    Ok(())
}

/// Opens camera streams. `open` runs on the UI thread and must return
/// without waiting for the device; slow opens report through
/// [`VideoTrack::take_open_signal`].
pub trait CameraBackend {
    fn open(
        &mut self,
        constraints: &StreamConstraints,
    ) -> Result<Vec<Box<dyn VideoTrack>>, CameraError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Live,
    Released,
}

/// Exclusive owner of one open stream.
pub struct CameraSession {
    id: u64,
    state: SessionState,
    tracks: Vec<Box<dyn VideoTrack>>,
    sink_attached: bool,
    loss_reported: bool,
    last_sequence: Option<u64>,
}

impl CameraSession {
    fn new(id: u64) -> Self {
        Self {
            id,
            state: SessionState::Uninitialized,
            tracks: Vec::new(),
            sink_attached: false,
            loss_reported: false,
            last_sequence: None,
        }
    }

    fn attach(&mut self, tracks: Vec<Box<dyn VideoTrack>>) {
        self.tracks = tracks;
        self.sink_attached = true;
        self.state = SessionState::Live;
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == SessionState::Live
    }

    pub fn sink_attached(&self) -> bool {
        self.sink_attached
    }

    pub fn track_labels(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.label().to_string()).collect()
    }

    /// Stop every track and detach the sink. Returns `false` if the session
    /// was already released.
    pub fn release(&mut self) -> bool {
        if self.state == SessionState::Released {
            debug!("Camera session {} already released", self.id);
            return false;
        }
        // Draining hands each track out once, so none is stopped twice.
        for mut track in self.tracks.drain(..) {
            if track.state() == TrackState::Ended {
                debug!("Track {} had already ended", track.label());
            }
            track.stop();
        }
        self.sink_attached = false;
        self.last_sequence = None;
        self.state = SessionState::Released;
        info!("Camera session {} released", self.id);
        true
    }

    fn poll_frame(&mut self) -> FramePoll {
        if !self.is_live() || !self.sink_attached {
            return FramePoll::Detached;
        }
        let Some(frame) = self.tracks.first().and_then(|t| t.latest_frame()) else {
            return FramePoll::Pending;
        };
        if !frame.is_decodable() {
            return FramePoll::NoSignal;
        }
        if self.last_sequence == Some(frame.sequence()) {
            return FramePoll::Unchanged;
        }
        self.last_sequence = Some(frame.sequence());
        FramePoll::Ready(frame)
    }

    fn take_open_signals(&mut self) -> Vec<OpenSignal> {
        self.tracks
            .iter_mut()
            .filter_map(|t| t.take_open_signal())
            .collect()
    }

    fn check_health(&mut self) -> Option<GestureError> {
        if !self.is_live() || self.loss_reported {
            return None;
        }
        let ended = self
            .tracks
            .iter()
            .find(|t| t.state() == TrackState::Ended)?;
        warn!("Camera track {} ended unexpectedly", ended.label());
        self.loss_reported = true;
        Some(GestureError::StreamLost)
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        if self.state == SessionState::Live {
            self.release();
        }
    }
}

/// Result of asking the live session for a frame.
#[derive(Debug, Clone)]
pub enum FramePoll {
    /// No session, or its sink is detached.
    Detached,
    /// The stream is open but no frame has arrived yet.
    Pending,
    /// A frame arrived but has no pixels.
    NoSignal,
    /// Same frame as last time.
    Unchanged,
    Ready(VideoFrame),
}

/// Acquires and releases the single camera session.
pub struct CameraSessionManager {
    backend: Box<dyn CameraBackend>,
    constraints: StreamConstraints,
    session: Option<CameraSession>,
    next_id: u64,
}

impl CameraSessionManager {
    pub fn new(backend: Box<dyn CameraBackend>, constraints: StreamConstraints) -> Self {
        Self {
            backend,
            constraints,
            session: None,
            next_id: 1,
        }
    }

    pub fn constraints(&self) -> &StreamConstraints {
        &self.constraints
    }

    pub fn session(&self) -> Option<&CameraSession> {
        self.session.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.session.as_ref().is_some_and(CameraSession::is_live)
    }

    /// Open a new session. Any previous session is fully released first.
    pub fn acquire(&mut self) -> Result<&CameraSession, CameraError> {
        if self.release() {
            debug!("Released lingering camera session before acquiring");
        }
        let mut session = CameraSession::new(self.next_id);
        self.next_id += 1;

        let tracks = self.backend.open(&self.constraints)?;
        if tracks.is_empty() {
            return Err(CameraError::NoVideoTrack);
        }
        session.attach(tracks);
        info!(
            "Camera session {} live ({})",
            session.id(),
            session.track_labels().join(", ")
        );
        Ok(self.session.insert(session))
    }

    /// Release the current session if there is one. Safe to call repeatedly.
    pub fn release(&mut self) -> bool {
        match self.session.take() {
            Some(mut session) => session.release(),
            None => false,
        }
    }

    pub fn poll_frame(&mut self) -> FramePoll {
        match self.session.as_mut() {
            Some(session) => session.poll_frame(),
            None => FramePoll::Detached,
        }
    }

    /// Open signals of the live session's tracks; empty once taken.
    pub fn take_open_signals(&mut self) -> Vec<OpenSignal> {
        match self.session.as_mut() {
            Some(session) if session.is_live() => session.take_open_signals(),
            _ => Vec::new(),
        }
    }

    /// Report an unexpectedly ended track, once per session.
    pub fn check_health(&mut self) -> Option<GestureError> {
        self.session.as_mut()?.check_health()
    }
}
