//! The user's desktop as a gesture target.
//!
//! The compositor owns hit testing on a real desktop, so every point
//! resolves to the screen itself and the synthetic press lands on whatever
//! window is underneath the cursor.

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use hands_free::dispatch::{ElementId, Page, PointerEventKind};

use crate::ui::overlay::OverlaySurface;

/// The whole screen; the only element a desktop hit test can return.
pub const SCREEN: ElementId = ElementId(0);

/// Accumulates pixel scroll steps into whole wheel notches.
#[derive(Debug, Clone)]
pub struct WheelAccumulator {
    notch_px: f64,
    pending: f64,
}

impl WheelAccumulator {
    pub fn new(notch_px: f64) -> Self {
        Self {
            notch_px: notch_px.max(1.0),
            pending: 0.0,
        }
    }

    /// Add `dy` pixels; returns the whole notches to send now (positive is down).
    pub fn push(&mut self, dy: f64) -> i32 {
        self.pending += dy;
        let notches = (self.pending / self.notch_px).trunc();
        self.pending -= notches * self.notch_px;
        notches as i32
    }
}

pub struct DesktopPage {
    enigo: Option<Enigo>,
    overlays: OverlaySurface,
    wheel: WheelAccumulator,
    /// Logical-to-device pixel factor for the monitor the cursor layer covers.
    scale_factor: f64,
}

impl DesktopPage {
    pub fn new(overlays: OverlaySurface, wheel_notch_px: f64) -> Self {
        let enigo = match Enigo::new(&Settings::default()) {
            Ok(enigo) => Some(enigo),
            Err(e) => {
                log::error!("Input synthesis unavailable: {e:?}");
                None
            }
        };
        Self {
            enigo,
            overlays,
            wheel: WheelAccumulator::new(wheel_notch_px),
            scale_factor: 1.0,
        }
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor.max(1.0);
    }

    fn with_enigo<F>(&mut self, what: &str, f: F)
    where
        F: FnOnce(&mut Enigo) -> enigo::InputResult<()>,
    {
        let Some(enigo) = self.enigo.as_mut() else {
            log::debug!("Skipping {what}: no input backend");
            return;
        };
        if let Err(e) = f(enigo) {
            log::warn!("Failed to {what}: {e:?}");
        }
    }
}

impl Page for DesktopPage {
    fn set_overlays_hidden(&mut self, hidden: bool) {
        self.overlays.set_hidden(hidden);
    }

    fn element_at(&mut self, _x: f64, _y: f64) -> Option<ElementId> {
        Some(SCREEN)
    }

    fn interactive_ancestor(&mut self, _element: ElementId) -> Option<ElementId> {
        None
    }

    fn dispatch_pointer(&mut self, _target: ElementId, kind: PointerEventKind, x: f64, y: f64) {
        let px = (x * self.scale_factor).round() as i32;
        let py = (y * self.scale_factor).round() as i32;
        match kind {
            PointerEventKind::Down => self.with_enigo("press", |enigo| {
                enigo.move_mouse(px, py, Coordinate::Abs)?;
                enigo.button(Button::Left, Direction::Press)
            }),
            PointerEventKind::Up => {
                self.with_enigo("release", |enigo| enigo.button(Button::Left, Direction::Release))
            }
            // The OS turns press + release into a click.
            PointerEventKind::Click => {}
        }
    }

    fn dispatch_cancel(&mut self) {
        self.with_enigo("send Escape", |enigo| enigo.key(Key::Escape, Direction::Click));
    }

    fn close_affordance(&mut self) -> Option<ElementId> {
        None
    }

    fn activate(&mut self, _element: ElementId) {}

    fn scroll_by(&mut self, dy: f64) {
        let notches = self.wheel.push(dy);
        if notches != 0 {
            self.with_enigo("scroll", |enigo| enigo.scroll(notches, Axis::Vertical));
        }
    }

    fn show_click_ripple(&mut self, x: f64, y: f64) {
        self.overlays.show_ripple(x, y);
    }
}
