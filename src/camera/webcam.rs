//! Webcam capture through `nokhwa`.
//!
//! The platform camera handle is not `Send` on every backend, so each track
//! opens its camera on a dedicated capture thread. The track is handed out
//! at once and reports the open result through its open signal; opening can
//! take long (macOS shows its permission prompt here). Decoded frames are
//! published into a single shared slot; consumers only ever see the latest one.
//!
//! Stopping only flags the thread. It finishes its current read, closes the
//! stream and exits on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::{Camera, NokhwaError};

use super::{CameraBackend, OpenSignal, StreamConstraints, TrackState, VideoFrame, VideoTrack};
use crate::error::CameraError;

/// Consecutive failed reads before the track is considered ended.
const MAX_READ_FAILURES: u32 = 30;

/// Opens the system webcam.
#[derive(Debug, Default)]
pub struct NokhwaBackend;

impl NokhwaBackend {
    pub fn new() -> Self {
        Self
    }

    /// Human-readable names of the attached cameras.
    pub fn list_devices() -> Vec<String> {
        match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
            Ok(cameras) => cameras.iter().map(|c| c.human_name()).collect(),
            Err(e) => {
                log::warn!("Camera query failed: {e}");
                Vec::new()
            }
        }
    }
}

impl CameraBackend for NokhwaBackend {
    fn open(
        &mut self,
        constraints: &StreamConstraints,
    ) -> Result<Vec<Box<dyn VideoTrack>>, CameraError> {
        let track = NokhwaTrack::spawn(constraints.clone())?;
        Ok(vec![Box::new(track)])
    }
}

/// A webcam stream backed by a capture thread.
pub struct NokhwaTrack {
    label: String,
    latest: Arc<Mutex<Option<VideoFrame>>>,
    stop: Arc<AtomicBool>,
    ended: Arc<AtomicBool>,
    open_signal: Option<OpenSignal>,
    thread: Option<JoinHandle<()>>,
}

impl NokhwaTrack {
    fn spawn(constraints: StreamConstraints) -> Result<Self, CameraError> {
        let latest = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));
        let ended = Arc::new(AtomicBool::new(false));
        let (opened_tx, opened_rx) = async_channel::bounded(1);
        let label = format!("camera {}", constraints.device_index);

        let thread = {
            let latest = latest.clone();
            let stop = stop.clone();
            let ended = ended.clone();
            thread::Builder::new()
                .name("camera-capture".into())
                .spawn(move || capture_loop(constraints, latest, stop, ended, opened_tx))
                .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?
        };

        Ok(Self {
            label,
            latest,
            stop,
            ended,
            open_signal: Some(opened_rx),
            thread: Some(thread),
        })
    }
}

impl VideoTrack for NokhwaTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> TrackState {
        if self.ended.load(Ordering::SeqCst) {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }

    fn latest_frame(&self) -> Option<VideoFrame> {
        self.latest.lock().ok()?.clone()
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.ended.store(true, Ordering::SeqCst);
        // Detach: a device stuck in open or read must not hold up the caller.
        if self.thread.take().is_some() {
            log::debug!("Capture thread for {} told to stop", self.label);
        }
    }

    fn take_open_signal(&mut self) -> Option<OpenSignal> {
        self.open_signal.take()
    }
}

impl Drop for NokhwaTrack {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
        }
    }
}

fn capture_loop(
    constraints: StreamConstraints,
    latest: Arc<Mutex<Option<VideoFrame>>>,
    stop: Arc<AtomicBool>,
    ended: Arc<AtomicBool>,
    opened: async_channel::Sender<Result<(), CameraError>>,
) {
    let mut camera = match open_camera(&constraints) {
        Ok(camera) => camera,
        Err(e) => {
            log::error!("Failed to open camera {}: {e}", constraints.device_index);
            ended.store(true, Ordering::SeqCst);
            let _ = opened.send_blocking(Err(map_error(e)));
            return;
        }
    };
    log::info!(
        "Camera opened: {} ({:?})",
        camera.info().human_name(),
        camera.camera_format()
    );
    if opened.send_blocking(Ok(())).is_err() {
        log::debug!("Nobody waited for camera {} to open", constraints.device_index);
    }
    drop(opened);

    let mut sequence = 0u64;
    let mut failures = 0u32;
    while !stop.load(Ordering::SeqCst) {
        match camera.frame().and_then(|buffer| buffer.decode_image::<RgbFormat>()) {
            Ok(decoded) => {
                failures = 0;
                sequence += 1;
                let (width, height) = (decoded.width(), decoded.height());
                // Empty buffers become a zero-size frame so the loop shows "No video signal".
                let image = RgbImage::from_raw(width, height, decoded.into_raw())
                    .unwrap_or_else(|| RgbImage::new(0, 0));
                if let Ok(mut slot) = latest.lock() {
                    *slot = Some(VideoFrame::new(image, sequence));
                }
            }
            Err(e) => {
                failures += 1;
                log::debug!("Camera read failed ({failures}): {e}");
                if failures >= MAX_READ_FAILURES {
                    log::warn!("Camera stopped delivering frames: {e}");
                    ended.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    if let Err(e) = camera.stop_stream() {
        log::debug!("Camera stop_stream: {e}");
    }
}

fn open_camera(constraints: &StreamConstraints) -> Result<Camera, NokhwaError> {
    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(constraints.width, constraints.height),
            FrameFormat::MJPEG,
            constraints.frame_rate,
        ),
    ));
    let mut camera = Camera::new(CameraIndex::Index(constraints.device_index), format)?;
    camera.open_stream()?;
    Ok(camera)
}

fn map_error(e: NokhwaError) -> CameraError {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("not authorized") {
        CameraError::PermissionDenied
    } else {
        CameraError::DeviceUnavailable(message)
    }
}
