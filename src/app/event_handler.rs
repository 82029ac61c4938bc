use std::cell::RefCell;
use std::rc::Rc;

use gtk4::prelude::*;
use libadwaita::prelude::*;

use hands_free::controller::ControllerEvent;
use hands_free::provider::download::GrantAction;
use hands_free::{GestureError, ModeState};

use super::activation::{start_activation, start_scroll_loop};
use super::model::spawn_download;
use super::state::{update_status, AppState, AppStatus, BackendEvent};
use crate::audio_feedback::{play_cue, Cue};
use crate::ui::dashboard::show_error;
use crate::ui::overlay::{self, gesture_title};
use crate::ui::permission_dialog::{show_error_notice, show_permission_dialog};

/// Handle a backend event. This is the core state machine.
pub fn handle_backend_event(state: &Rc<RefCell<AppState>>, event: BackendEvent) {
    match event {
        BackendEvent::HotkeyTriggered => {
            let controller = state.borrow().controller.clone();
            controller.borrow_mut().toggle_mode();
        }
        BackendEvent::ModeSwitchToggled(on) => {
            let controller = state.borrow().controller.clone();
            let mut controller = controller.borrow_mut();
            if on {
                controller.enter_mode();
            } else {
                controller.exit_mode();
            }
        }
        BackendEvent::PermissionGranted => on_permission_granted(state),
        BackendEvent::PermissionCancelled => {
            let controller = state.borrow().controller.clone();
            controller.borrow_mut().cancel_request();
        }
        BackendEvent::ModelDownloadProgress(downloaded, total) => {
            if let Some(ref dash) = state.borrow().dashboard {
                dash.progress_bar.set_visible(true);
                if total > 0 {
                    dash.progress_bar.set_fraction(downloaded as f64 / total as f64);
                    let mb_done = downloaded as f64 / 1_048_576.0;
                    let mb_total = total as f64 / 1_048_576.0;
                    dash.progress_bar.set_text(Some(&format!(
                        "Downloading model: {mb_done:.1} / {mb_total:.1} MB"
                    )));
                } else {
                    dash.progress_bar.pulse();
                }
            }
        }
        BackendEvent::ModelDownloadComplete => {
            log::info!("Hand landmark model downloaded");
            let pending = {
                let mut s = state.borrow_mut();
                if let Some(ref dash) = s.dashboard {
                    dash.progress_bar.set_visible(false);
                }
                s.model.on_download_complete()
            };
            sync_status(state);
            if let Some(generation) = pending {
                start_activation(state, generation);
            }
        }
        BackendEvent::ModelDownloadFailed(err) => {
            log::error!("Model download failed: {err}");
            let (pending, controller) = {
                let mut s = state.borrow_mut();
                if let Some(ref dash) = s.dashboard {
                    dash.progress_bar.set_visible(false);
                }
                (s.model.on_download_failed(), s.controller.clone())
            };
            sync_status(state);
            match pending {
                Some(generation) => controller
                    .borrow_mut()
                    .report_model_failure(generation, GestureError::ModelLoadFailure(err)),
                None => {
                    if let Some(ref dash) = state.borrow().dashboard {
                        show_error(dash, Some(&GestureError::ModelLoadFailure(err).user_message()));
                    }
                }
            }
        }
        BackendEvent::Controller(event) => on_controller_event(state, event),
    }
}

fn on_permission_granted(state: &Rc<RefCell<AppState>>) {
    let controller = state.borrow().controller.clone();
    let Some(generation) = controller.borrow_mut().on_permission_granted() else {
        log::debug!("Permission granted outside of a request; ignoring");
        return;
    };

    let action = state.borrow_mut().model.on_granted(generation);
    match action {
        GrantAction::Activate(generation) => start_activation(state, generation),
        GrantAction::Wait => log::info!("Activation {generation} waits for the model download"),
        GrantAction::StartDownload => spawn_download(state),
    }
    sync_status(state);
}

fn on_controller_event(state: &Rc<RefCell<AppState>>, event: ControllerEvent) {
    match event {
        ControllerEvent::ModeChanged(mode) => on_mode_changed(state, mode),
        ControllerEvent::GestureChanged(gesture) => {
            let s = state.borrow();
            if let Some(ref overlay) = s.overlay {
                overlay::set_gesture(overlay, gesture);
            }
            if let Some(ref dash) = s.dashboard {
                dash.gesture_label.set_text(gesture_title(gesture));
            }
        }
        ControllerEvent::CursorMoved { x, y } => {
            if let Some(ref overlay) = state.borrow().overlay {
                overlay::move_cursor(overlay, x, y);
            }
        }
        ControllerEvent::Clicked { x, y } => {
            log::debug!("Click delivered at ({x:.0}, {y:.0})");
            if state.borrow().config.sound_cues {
                play_cue(Cue::Click);
            }
        }
        ControllerEvent::Dismissed => log::debug!("Dismiss delivered"),
        ControllerEvent::ScrollStarted { epoch, direction } => {
            let s = state.borrow();
            let Some(ref overlay) = s.overlay else {
                return;
            };
            overlay::set_scroll(overlay, Some(direction));
            start_scroll_loop(s.controller.clone(), overlay.cursor_area.clone(), epoch);
        }
        ControllerEvent::ScrollStopped => {
            if let Some(ref overlay) = state.borrow().overlay {
                overlay::set_scroll(overlay, None);
            }
        }
        ControllerEvent::Error(err) => {
            log::warn!("Hands-free error: {err}");
            let s = state.borrow();
            let Some(ref dash) = s.dashboard else {
                return;
            };
            show_error(dash, Some(&err.user_message()));
            if err == GestureError::PermissionDenied {
                show_error_notice(&dash.window, &err);
            }
        }
    }
}

fn on_mode_changed(state: &Rc<RefCell<AppState>>, mode: ModeState) {
    log::info!("Hands-free mode: {}", mode.as_str());
    {
        let mut s = state.borrow_mut();
        if let Some(ref dash) = s.dashboard {
            dash.mode_switch.set_active(mode != ModeState::Off);
        }
        if mode == ModeState::Off {
            s.model.unpark();
        }
        if let Some(dialog) = s.permission_dialog.take() {
            dialog.close();
        }
    }

    match mode {
        ModeState::Requesting => {
            if let Some(ref dash) = state.borrow().dashboard {
                show_error(dash, None);
            }
            let Some(window) = state.borrow().dashboard.as_ref().map(|d| d.window.clone()) else {
                return;
            };
            window.present();
            let sender = state.borrow().backend_sender.clone();
            let dialog = show_permission_dialog(&window, move |granted| {
                let _ = sender.try_send(permission_event(granted));
            });
            state.borrow_mut().permission_dialog = Some(dialog);
        }
        ModeState::Active => {
            if let Some(ref overlay) = state.borrow().overlay {
                overlay::show_overlays(overlay, true);
            }
            if state.borrow().config.sound_cues {
                play_cue(Cue::Enter);
            }
        }
        ModeState::Off => {
            let was_active = state.borrow().status == AppStatus::Active;
            if let Some(ref overlay) = state.borrow().overlay {
                overlay::show_overlays(overlay, false);
            }
            if was_active && state.borrow().config.sound_cues {
                play_cue(Cue::Exit);
            }
        }
    }
    sync_status(state);
}

/// Backing out of the prompt is a cancel, not a denial: camera denial only
/// comes from the backend and is reported by the controller.
fn permission_event(granted: bool) -> BackendEvent {
    if granted {
        BackendEvent::PermissionGranted
    } else {
        BackendEvent::PermissionCancelled
    }
}

/// Derive the dashboard status from the mode and the model download.
fn sync_status(state: &Rc<RefCell<AppState>>) {
    let status = {
        let s = state.borrow();
        let mode = s.controller.borrow().mode();
        AppStatus::derive(mode, &s.model)
    };
    update_status(state, status);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declined_prompt_cancels_instead_of_denying() {
        assert!(matches!(permission_event(true), BackendEvent::PermissionGranted));
        assert!(matches!(permission_event(false), BackendEvent::PermissionCancelled));
    }
}
