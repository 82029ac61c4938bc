use std::cell::RefCell;
use std::rc::Rc;

use hands_free::provider::onnx;

use super::state::{update_status, AppState, AppStatus, BackendEvent};

/// Make sure the hand landmark model is on disk, downloading it if needed.
/// Loading happens lazily on the first activation.
pub fn ensure_hand_model(state: &Rc<RefCell<AppState>>) {
    let model = state.borrow().config.model.clone();
    if onnx::model_exists(&model) {
        log::info!("Hand landmark model found at {}", onnx::model_path(&model).display());
        state.borrow_mut().model.on_download_complete();
        return;
    }

    log::info!("Hand landmark model not found, starting download");
    if state.borrow_mut().model.begin_download() {
        spawn_download(state);
    }
}

/// Run one download on the tokio runtime. The caller has already marked it
/// as running in the download gate.
pub fn spawn_download(state: &Rc<RefCell<AppState>>) {
    update_status(state, AppStatus::ModelDownloading);
    let s = state.borrow();
    let model = s.config.model.clone();
    let sender = s.backend_sender.clone();
    let progress_sender = sender.clone();

    s.tokio_rt.spawn(async move {
        let result = onnx::download_model(&model, move |downloaded, total| {
            let _ = progress_sender.try_send(BackendEvent::ModelDownloadProgress(downloaded, total));
        })
        .await;

        let event = match result {
            Ok(()) => BackendEvent::ModelDownloadComplete,
            Err(e) => BackendEvent::ModelDownloadFailed(e.to_string()),
        };
        let _ = sender.send(event).await;
    });
}
