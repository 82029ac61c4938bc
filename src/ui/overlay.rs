use std::cell::RefCell;
use std::f64::consts::PI;
use std::rc::Rc;
use std::time::{Duration, Instant};

use gtk4::prelude::*;
use gtk4::{self, Align};
#[cfg(target_os = "linux")]
use gtk4_layer_shell::LayerShell;

use hands_free::dispatch::ScrollDirection;
use hands_free::GestureLabel;

const RIPPLE_DURATION: Duration = Duration::from_millis(300);
const CURSOR_RADIUS: f64 = 14.0;

/// What the cursor layer paints.
#[derive(Debug, Clone)]
pub struct CursorState {
    pub position: (f64, f64),
    pub gesture: GestureLabel,
    pub scroll: Option<ScrollDirection>,
    pub ripple: Option<(f64, f64, Instant)>,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            position: (0.0, 0.0),
            gesture: GestureLabel::None,
            scroll: None,
            ripple: None,
        }
    }
}

impl CursorState {
    /// Ripple progress in `[0, 1)`, or `None` once it has faded.
    fn ripple_progress(&self, now: Instant) -> Option<(f64, f64, f64)> {
        let (x, y, started) = self.ripple?;
        let elapsed = now.saturating_duration_since(started);
        if elapsed >= RIPPLE_DURATION {
            return None;
        }
        Some((x, y, elapsed.as_secs_f64() / RIPPLE_DURATION.as_secs_f64()))
    }
}

/// Handles returned from building the gesture overlays.
pub struct OverlayWidgets {
    pub indicator: gtk4::Window,
    pub gesture_label: gtk4::Label,
    pub action_label: gtk4::Label,
    pub cursor_window: gtk4::Window,
    pub cursor_area: gtk4::DrawingArea,
    pub cursor_state: Rc<RefCell<CursorState>>,
}

impl OverlayWidgets {
    /// The parts of the overlays the desktop input layer needs to touch.
    pub fn surface(&self) -> OverlaySurface {
        OverlaySurface {
            windows: vec![self.indicator.clone(), self.cursor_window.clone()],
            cursor_area: self.cursor_area.clone(),
            cursor_state: self.cursor_state.clone(),
        }
    }
}

/// Cheap clone of the overlay windows, used while synthesising a click.
#[derive(Clone)]
pub struct OverlaySurface {
    windows: Vec<gtk4::Window>,
    cursor_area: gtk4::DrawingArea,
    cursor_state: Rc<RefCell<CursorState>>,
}

impl OverlaySurface {
    pub fn set_hidden(&self, hidden: bool) {
        let opacity = if hidden { 0.0 } else { 1.0 };
        for window in &self.windows {
            window.set_opacity(opacity);
        }
    }

    pub fn show_ripple(&self, x: f64, y: f64) {
        self.cursor_state.borrow_mut().ripple = Some((x, y, Instant::now()));
        self.cursor_area.queue_draw();
    }
}

pub fn show_overlays(overlay: &OverlayWidgets, visible: bool) {
    if !visible {
        *overlay.cursor_state.borrow_mut() = CursorState::default();
    }
    overlay.indicator.set_visible(visible);
    overlay.cursor_window.set_visible(visible);
}

pub fn set_gesture(overlay: &OverlayWidgets, gesture: GestureLabel) {
    overlay.gesture_label.set_text(gesture_title(gesture));
    overlay.action_label.set_text(gesture.action_label());
    if gesture == GestureLabel::None {
        overlay.indicator.remove_css_class("gesture-confirmed");
    } else {
        overlay.indicator.add_css_class("gesture-confirmed");
    }
    overlay.cursor_state.borrow_mut().gesture = gesture;
    overlay.cursor_area.queue_draw();
}

pub fn move_cursor(overlay: &OverlayWidgets, x: f64, y: f64) {
    overlay.cursor_state.borrow_mut().position = (x, y);
    overlay.cursor_area.queue_draw();
}

pub fn set_scroll(overlay: &OverlayWidgets, direction: Option<ScrollDirection>) {
    overlay.cursor_state.borrow_mut().scroll = direction;
    overlay.cursor_area.queue_draw();
}

/// Short human name for a gesture.
pub fn gesture_title(gesture: GestureLabel) -> &'static str {
    match gesture {
        GestureLabel::None => "No gesture",
        GestureLabel::PointUp => "Point up",
        GestureLabel::PointDown => "Point down",
        GestureLabel::OpenPalm => "Open palm",
        GestureLabel::Pinch => "Pinch",
        GestureLabel::Peace => "Peace",
        GestureLabel::ThreeFingers => "Three fingers",
    }
}

/// Build the gesture indicator panel and the full-screen cursor layer.
pub fn build_overlay(app: &libadwaita::Application) -> OverlayWidgets {
    load_css();

    let indicator = gtk4::Window::builder()
        .application(app)
        .title("Hands-free")
        .decorated(false)
        .resizable(false)
        .default_width(240)
        .default_height(56)
        .build();
    indicator.add_css_class("gesture-overlay");

    let panel = gtk4::Box::new(gtk4::Orientation::Vertical, 2);
    panel.set_halign(Align::Center);
    panel.set_valign(Align::Center);
    panel.add_css_class("gesture-panel");

    let gesture_label = gtk4::Label::new(Some(gesture_title(GestureLabel::None)));
    gesture_label.add_css_class("gesture-name");
    let action_label = gtk4::Label::new(Some(GestureLabel::None.action_label()));
    action_label.add_css_class("gesture-action");

    panel.append(&gesture_label);
    panel.append(&action_label);
    indicator.set_child(Some(&panel));

    let cursor_window = gtk4::Window::builder()
        .application(app)
        .title("Hands-free cursor")
        .decorated(false)
        .build();
    cursor_window.add_css_class("gesture-overlay");

    let cursor_state = Rc::new(RefCell::new(CursorState::default()));
    let cursor_area = gtk4::DrawingArea::new();
    cursor_area.set_hexpand(true);
    cursor_area.set_vexpand(true);
    cursor_area.set_can_target(false);
    let state_for_draw = cursor_state.clone();
    cursor_area.set_draw_func(move |_area, cr, _width, _height| {
        draw_cursor(cr, &state_for_draw.borrow(), Instant::now());
    });
    // Keep the ripple animating while the layer is mapped.
    cursor_area.add_tick_callback(|area, _clock| {
        area.queue_draw();
        gtk4::glib::ControlFlow::Continue
    });
    cursor_window.set_child(Some(&cursor_area));

    // Pointer input passes straight through the cursor layer.
    cursor_window.connect_realize(|window| {
        if let Some(surface) = window.surface() {
            surface.set_input_region(&gtk4::cairo::Region::create());
        }
    });

    place_windows(&indicator, &cursor_window);

    for window in [&indicator, &cursor_window] {
        window.set_visible(false);
        window.connect_close_request(|w| {
            w.set_visible(false);
            gtk4::glib::Propagation::Stop
        });
    }

    OverlayWidgets {
        indicator,
        gesture_label,
        action_label,
        cursor_window,
        cursor_area,
        cursor_state,
    }
}

fn load_css() {
    let Some(display) = gtk4::gdk::Display::default() else {
        log::warn!("No display available for overlay styling");
        return;
    };
    let css_provider = gtk4::CssProvider::new();
    css_provider.load_from_string(
        r#"
        window.gesture-overlay {
            background-color: transparent;
        }
        .gesture-panel {
            background-color: rgba(30, 30, 30, 0.88);
            border-radius: 18px;
            padding: 8px 22px;
        }
        window.gesture-confirmed .gesture-panel {
            background-color: rgba(40, 90, 160, 0.92);
        }
        .gesture-name {
            color: white;
            font-weight: bold;
            font-size: 15px;
        }
        .gesture-action {
            color: rgba(255, 255, 255, 0.75);
            font-size: 12px;
        }
        "#,
    );
    gtk4::style_context_add_provider_for_display(
        &display,
        &css_provider,
        gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
    );
}

fn place_windows(indicator: &gtk4::Window, cursor_window: &gtk4::Window) {
    #[cfg(target_os = "linux")]
    {
        let is_wayland = std::env::var("XDG_SESSION_TYPE")
            .map(|s| s == "wayland")
            .unwrap_or(false);

        if is_wayland && gtk4_layer_shell::is_supported() {
            indicator.init_layer_shell();
            indicator.set_layer(gtk4_layer_shell::Layer::Overlay);
            indicator.set_anchor(gtk4_layer_shell::Edge::Bottom, true);
            indicator.set_margin(gtk4_layer_shell::Edge::Bottom, 30);

            cursor_window.init_layer_shell();
            cursor_window.set_layer(gtk4_layer_shell::Layer::Overlay);
            for edge in [
                gtk4_layer_shell::Edge::Top,
                gtk4_layer_shell::Edge::Bottom,
                gtk4_layer_shell::Edge::Left,
                gtk4_layer_shell::Edge::Right,
            ] {
                cursor_window.set_anchor(edge, true);
            }
            cursor_window.set_exclusive_zone(-1);
            return;
        }
    }

    indicator.set_decorated(false);
    cursor_window.maximize();
}

fn draw_cursor(cr: &gtk4::cairo::Context, state: &CursorState, now: Instant) {
    let (x, y) = state.position;

    if let Some((rx, ry, progress)) = state.ripple_progress(now) {
        cr.set_source_rgba(0.3, 0.6, 1.0, 0.6 * (1.0 - progress));
        cr.set_line_width(3.0);
        cr.arc(rx, ry, CURSOR_RADIUS + 30.0 * progress, 0.0, 2.0 * PI);
        let _ = cr.stroke();
    }

    let (r, g, b) = match state.gesture {
        GestureLabel::Pinch => (0.3, 0.6, 1.0),
        GestureLabel::PointUp | GestureLabel::PointDown => (0.3, 0.85, 0.45),
        _ => (1.0, 1.0, 1.0),
    };
    cr.set_source_rgba(r, g, b, 0.85);
    cr.arc(x, y, CURSOR_RADIUS, 0.0, 2.0 * PI);
    let _ = cr.fill_preserve();
    cr.set_source_rgba(0.0, 0.0, 0.0, 0.5);
    cr.set_line_width(2.0);
    let _ = cr.stroke();

    if let Some(direction) = state.scroll {
        draw_scroll_arrow(cr, x + CURSOR_RADIUS * 2.0, y, direction);
    }
}

fn draw_scroll_arrow(cr: &gtk4::cairo::Context, x: f64, y: f64, direction: ScrollDirection) {
    let size = 10.0;
    let tip = y + direction.sign() * size;
    let base = y - direction.sign() * size;
    cr.set_source_rgba(0.3, 0.85, 0.45, 0.9);
    cr.move_to(x, tip);
    cr.line_to(x - size, base);
    cr.line_to(x + size, base);
    cr.close_path();
    let _ = cr.fill();
}
