mod app;
mod audio_feedback;
mod desktop;
mod hotkey;
mod ui;

use std::cell::RefCell;
use std::rc::Rc;

use gtk4::gio;
use gtk4::prelude::*;
use libadwaita::prelude::*;

use hands_free::camera::webcam::NokhwaBackend;
use hands_free::config::Config;
use hands_free::controller::ControllerEvent;
use hands_free::ModeState;

use app::{AppState, BackendEvent};
use desktop::DesktopPage;

/// Used when the monitor geometry cannot be read.
const FALLBACK_VIEWPORT: (f64, f64) = (1280.0, 720.0);

fn main() {
    env_logger::init();
    log::info!("Hands-free starting");

    let application = libadwaita::Application::builder()
        .application_id("com.github.tr4m0ryp.hands-free")
        .build();

    application.connect_activate(on_activate);
    application.run();
}

fn on_activate(app: &libadwaita::Application) {
    let tokio_rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to create tokio runtime: {e}");
            app.quit();
            return;
        }
    };

    // Backend → UI, controller → UI and hotkey → UI channels
    let (backend_tx, backend_rx) = async_channel::unbounded::<BackendEvent>();
    let (controller_tx, controller_rx) = async_channel::unbounded::<ControllerEvent>();
    let (hotkey_tx, hotkey_rx) = async_channel::unbounded::<()>();

    let config = Config::load();
    if !Config::exists() {
        if let Err(e) = config.save() {
            log::warn!("Failed to write default config: {e}");
        }
    }
    let cameras = NokhwaBackend::list_devices();
    if cameras.is_empty() {
        log::warn!("No cameras detected");
    } else {
        log::info!("Cameras: {}", cameras.join(", "));
    }

    let overlay = ui::overlay::build_overlay(app);
    let (viewport, scale_factor) = monitor_geometry().unwrap_or_else(|| {
        log::warn!("Monitor geometry unavailable, assuming {FALLBACK_VIEWPORT:?}");
        (FALLBACK_VIEWPORT, 1.0)
    });
    log::info!("Viewport {}x{} @{scale_factor}x", viewport.0, viewport.1);

    let mut page = DesktopPage::new(overlay.surface(), config.scroll.wheel_notch_px);
    page.set_scale_factor(scale_factor);

    let dashboard = ui::dashboard::build_dashboard(
        app,
        app::AppStatus::Idle.label(),
        &config.hotkey.display_name,
    );

    let state = Rc::new(RefCell::new(AppState::new(
        config,
        tokio_rt,
        backend_tx,
        controller_tx,
        page,
        viewport,
    )));
    let controller = state.borrow().controller.clone();

    ui::dashboard::connect_preview(&dashboard.preview, controller.clone());

    // The switch only reports user changes; programmatic syncs match the mode already.
    {
        let sender = state.borrow().backend_sender.clone();
        let controller = controller.clone();
        dashboard.mode_switch.connect_active_notify(move |switch| {
            let on = switch.is_active();
            let mode_on = controller
                .try_borrow()
                .map(|c| c.mode() != ModeState::Off)
                .unwrap_or(on);
            if on != mode_on {
                let _ = sender.try_send(BackendEvent::ModeSwitchToggled(on));
            }
        });
    }

    // Closing the dashboard leaves the mode and quits.
    {
        let controller = controller.clone();
        let app = app.clone();
        dashboard.window.connect_close_request(move |_| {
            if let Ok(mut controller) = controller.try_borrow_mut() {
                controller.exit_mode();
            }
            app.quit();
            gtk4::glib::Propagation::Proceed
        });
    }

    install_actions(app, &dashboard.window);

    {
        let mut s = state.borrow_mut();
        s.dashboard = Some(dashboard);
        s.overlay = Some(overlay);
    }

    if let Some(ref dash) = state.borrow().dashboard {
        dash.window.present();
    }

    // Start hotkey listener
    {
        let shared_hotkey = state.borrow().shared_hotkey.clone();
        hotkey::start_listener(hotkey_tx, shared_hotkey);
    }

    // Forward hotkey triggers to backend event channel
    {
        let sender = state.borrow().backend_sender.clone();
        gtk4::glib::spawn_future_local(async move {
            while hotkey_rx.recv().await.is_ok() {
                let _ = sender.send(BackendEvent::HotkeyTriggered).await;
            }
        });
    }

    // Forward controller notifications the same way, keeping one ordered stream
    {
        let sender = state.borrow().backend_sender.clone();
        gtk4::glib::spawn_future_local(async move {
            while let Ok(event) = controller_rx.recv().await {
                let _ = sender.send(BackendEvent::Controller(event)).await;
            }
        });
    }

    // Attach backend event handler
    {
        let state_clone = state.clone();
        gtk4::glib::spawn_future_local(async move {
            while let Ok(event) = backend_rx.recv().await {
                app::handle_backend_event(&state_clone, event);
            }
        });
    }

    app::ensure_hand_model(&state);
}

/// Logical size and scale factor of the first monitor.
fn monitor_geometry() -> Option<((f64, f64), f64)> {
    let display = gtk4::gdk::Display::default()?;
    let monitor = display
        .monitors()
        .item(0)?
        .downcast::<gtk4::gdk::Monitor>()
        .ok()?;
    let geometry = monitor.geometry();
    Some((
        (geometry.width() as f64, geometry.height() as f64),
        monitor.scale_factor() as f64,
    ))
}

fn install_actions(app: &libadwaita::Application, window: &libadwaita::ApplicationWindow) {
    let quit = gio::SimpleAction::new("quit", None);
    {
        let app = app.clone();
        quit.connect_activate(move |_, _| app.quit());
    }

    let hide = gio::SimpleAction::new("hide-window", None);
    {
        let window = window.clone();
        hide.connect_activate(move |_, _| window.set_visible(false));
    }

    let about = gio::SimpleAction::new("about", None);
    {
        let window = window.clone();
        about.connect_activate(move |_, _| {
            let dialog = libadwaita::AboutDialog::builder()
                .application_name("Hands-free")
                .version(env!("CARGO_PKG_VERSION"))
                .comments("Scroll, click and dismiss with hand gestures in front of your webcam.")
                .license_type(gtk4::License::MitX11)
                .build();
            dialog.present(Some(&window));
        });
    }

    app.add_action(&quit);
    app.add_action(&hide);
    app.add_action(&about);
    app.set_accels_for_action("app.quit", &["<Ctrl>q"]);
}
