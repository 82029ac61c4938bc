use thiserror::Error;

/// Errors surfaced to the host while hands-free mode is running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GestureError {
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Camera stream lost")]
    StreamLost,
    #[error("Failed to load hand tracking model: {0}")]
    ModelLoadFailure(String),
    #[error("Hand tracking failed on a frame: {0}")]
    InferenceFrameError(String),
}

impl GestureError {
    /// Per-frame errors are logged and skipped; everything else is shown.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::InferenceFrameError(_))
    }

    /// Text for the error label in the UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Camera access was denied. Allow camera access in your system settings to use hands-free mode.".into()
            }
            Self::DeviceUnavailable(detail) => format!("No usable camera found ({detail})."),
            Self::StreamLost => "Camera stream lost".into(),
            Self::ModelLoadFailure(_) => {
                "Failed to load hand tracking. Check your connection and try again.".into()
            }
            Self::InferenceFrameError(detail) => detail.clone(),
        }
    }
}

/// Failures while opening or running a camera.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("{0}")]
    DeviceUnavailable(String),
    #[error("stream opened without a video track")]
    NoVideoTrack,
}

impl From<CameraError> for GestureError {
    fn from(e: CameraError) -> Self {
        match e {
            CameraError::PermissionDenied => GestureError::PermissionDenied,
            CameraError::DeviceUnavailable(detail) => GestureError::DeviceUnavailable(detail),
            CameraError::NoVideoTrack => GestureError::DeviceUnavailable(e.to_string()),
        }
    }
}

/// Failures inside a landmark provider.
#[derive(Debug, Error)]
pub enum LandmarkError {
    #[error("model load failed: {0}")]
    Load(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<LandmarkError> for GestureError {
    fn from(e: LandmarkError) -> Self {
        match e {
            LandmarkError::Inference(detail) => GestureError::InferenceFrameError(detail),
            other => GestureError::ModelLoadFailure(other.to_string()),
        }
    }
}
