use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use hands_free::camera::webcam::NokhwaBackend;
use hands_free::camera::CameraSessionManager;
use hands_free::config::{Config, HotkeyConfig};
use hands_free::controller::{ControllerEvent, ControllerSettings, HandGestureController};
use hands_free::pipeline::SharedController;
use hands_free::provider::download::DownloadGate;
use hands_free::ModeState;

use crate::desktop::DesktopPage;
use crate::ui::dashboard::DashboardWidgets;
use crate::ui::overlay::OverlayWidgets;

/// Events delivered to the GTK main thread.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    HotkeyTriggered,
    /// The dashboard switch was flipped by the user.
    ModeSwitchToggled(bool),
    PermissionGranted,
    /// The permission prompt was cancelled or closed. Leaves the mode quietly.
    PermissionCancelled,
    ModelDownloadProgress(u64, u64),
    ModelDownloadComplete,
    ModelDownloadFailed(String),
    Controller(ControllerEvent),
}

/// Application status shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    Idle,
    ModelDownloading,
    Requesting,
    Active,
}

impl AppStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AppStatus::Idle => "Off",
            AppStatus::ModelDownloading => "Downloading model...",
            AppStatus::Requesting => "Waiting for camera permission",
            AppStatus::Active => "Watching for gestures",
        }
    }

    /// What the dashboard shows for `mode` given the model download.
    pub fn derive(mode: ModeState, model: &DownloadGate) -> Self {
        match mode {
            ModeState::Requesting => AppStatus::Requesting,
            ModeState::Active if model.parked().is_some() => AppStatus::ModelDownloading,
            ModeState::Active => AppStatus::Active,
            ModeState::Off if model.is_downloading() => AppStatus::ModelDownloading,
            ModeState::Off => AppStatus::Idle,
        }
    }
}

/// Central application state. Lives on the GTK main thread inside Rc<RefCell<>>.
pub struct AppState {
    pub status: AppStatus,
    pub config: Config,
    pub shared_hotkey: Arc<Mutex<HotkeyConfig>>,
    pub tokio_rt: tokio::runtime::Runtime,
    pub controller: SharedController,
    pub backend_sender: async_channel::Sender<BackendEvent>,

    /// Model file state and the activation parked behind its download.
    pub model: DownloadGate,
    /// Camera permission prompt while in `Requesting`.
    pub permission_dialog: Option<libadwaita::AlertDialog>,

    // UI handles
    pub dashboard: Option<DashboardWidgets>,
    pub overlay: Option<OverlayWidgets>,
}

impl AppState {
    pub fn new(
        config: Config,
        tokio_rt: tokio::runtime::Runtime,
        sender: async_channel::Sender<BackendEvent>,
        controller_events: async_channel::Sender<ControllerEvent>,
        page: DesktopPage,
        viewport: (f64, f64),
    ) -> Self {
        let shared_hotkey = Arc::new(Mutex::new(config.hotkey.clone()));
        let cameras = CameraSessionManager::new(
            Box::new(NokhwaBackend::new()),
            config.camera.constraints(),
        );
        let controller = HandGestureController::new(
            ControllerSettings::from(&config),
            cameras,
            Box::new(page),
            controller_events,
            viewport,
        );

        Self {
            status: AppStatus::Idle,
            config,
            shared_hotkey,
            tokio_rt,
            controller: Rc::new(RefCell::new(controller)),
            backend_sender: sender,
            model: DownloadGate::new(false),
            permission_dialog: None,
            dashboard: None,
            overlay: None,
        }
    }
}

/// Helper to update status label and state.
pub fn update_status(state: &Rc<RefCell<AppState>>, status: AppStatus) {
    let mut s = state.borrow_mut();
    s.status = status;
    if let Some(ref dash) = s.dashboard {
        dash.status_label.set_text(status.label());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hands_free::provider::download::GrantAction;

    #[test]
    fn parked_activation_shows_the_download() {
        let mut model = DownloadGate::new(false);
        model.begin_download();
        assert_eq!(AppStatus::derive(ModeState::Off, &model), AppStatus::ModelDownloading);

        model.on_granted(1);
        assert_eq!(AppStatus::derive(ModeState::Active, &model), AppStatus::ModelDownloading);

        model.on_download_complete();
        assert_eq!(AppStatus::derive(ModeState::Active, &model), AppStatus::Active);
    }

    #[test]
    fn failed_download_does_not_claim_to_be_downloading() {
        let mut model = DownloadGate::new(false);
        model.begin_download();
        model.on_download_failed();
        assert_eq!(AppStatus::derive(ModeState::Off, &model), AppStatus::Idle);

        // Granting afterwards restarts the download, which the status reflects.
        assert_eq!(model.on_granted(2), GrantAction::StartDownload);
        assert_eq!(AppStatus::derive(ModeState::Active, &model), AppStatus::ModelDownloading);
    }
}
