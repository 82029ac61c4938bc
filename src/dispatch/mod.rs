//! Turns confirmed gestures into effects on the page.

mod scroll;

pub use scroll::{ScrollDirection, ScrollLoop, DEFAULT_STEP_PX};

use log::{debug, info};

use crate::classifier::GestureLabel;
use crate::stabilizer::StableEvent;

/// Opaque handle to something on the page that can receive events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventKind {
    Down,
    Up,
    Click,
}

/// The surface gestures act on.
///
/// Coordinates are viewport pixels. Elements marked as gesture overlays
/// (cursor, indicator) must be excluded from hit testing while hidden.
pub trait Page {
    /// Hide or restore every gesture overlay.
    fn set_overlays_hidden(&mut self, hidden: bool);
    /// Topmost element at a point.
    fn element_at(&mut self, x: f64, y: f64) -> Option<ElementId>;
    /// Nearest link, button or form control containing `element`, itself included.
    fn interactive_ancestor(&mut self, element: ElementId) -> Option<ElementId>;
    fn dispatch_pointer(&mut self, target: ElementId, kind: PointerEventKind, x: f64, y: f64);
    /// Send a cancel/escape signal to whatever has focus.
    fn dispatch_cancel(&mut self);
    /// A visible close button, if any.
    fn close_affordance(&mut self) -> Option<ElementId>;
    fn activate(&mut self, element: ElementId);
    /// Scroll the page by `dy` pixels; positive is down.
    fn scroll_by(&mut self, dy: f64);
    fn show_click_ripple(&mut self, x: f64, y: f64);
}

/// What dispatching one event did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatchOutcome {
    Nothing,
    /// A new scroll loop started; the host schedules steps with `epoch`.
    ScrollStarted { epoch: u64, direction: ScrollDirection },
    ScrollStopped,
    Clicked { x: f64, y: f64, target: Option<ElementId> },
    Dismissed,
    /// The user asked to leave hands-free mode.
    Exit,
}

/// Maps [`StableEvent`]s to page effects.
#[derive(Debug, Default)]
pub struct ActionDispatcher {
    scroll: ScrollLoop,
}

impl ActionDispatcher {
    pub fn new(step_px: f64) -> Self {
        Self {
            scroll: ScrollLoop::new(step_px),
        }
    }

    pub fn scroll(&self) -> &ScrollLoop {
        &self.scroll
    }

    pub fn dispatch(
        &mut self,
        event: StableEvent,
        cursor: (f64, f64),
        page: &mut dyn Page,
    ) -> DispatchOutcome {
        match event {
            StableEvent::Continuous { gesture, .. } => match gesture {
                GestureLabel::PointUp => self.start_scroll(ScrollDirection::Up),
                GestureLabel::PointDown => self.start_scroll(ScrollDirection::Down),
                _ => self.stop_outcome(),
            },
            StableEvent::OneShot(GestureLabel::Pinch) => {
                self.scroll.stop();
                let (x, y) = cursor;
                let target = click_at(page, x, y);
                DispatchOutcome::Clicked { x, y, target }
            }
            StableEvent::OneShot(GestureLabel::ThreeFingers) => {
                self.scroll.stop();
                dismiss(page);
                DispatchOutcome::Dismissed
            }
            StableEvent::OneShot(GestureLabel::Peace) => {
                self.scroll.stop();
                info!("Exit gesture confirmed");
                DispatchOutcome::Exit
            }
            StableEvent::OneShot(other) => {
                debug!("No one-shot action for {other}");
                DispatchOutcome::Nothing
            }
        }
    }

    /// Stop scrolling, e.g. when the confirmed gesture is released.
    pub fn stop_scroll(&mut self) -> bool {
        self.scroll.stop()
    }

    /// Run one scroll frame for the loop started with `epoch`. Returns whether
    /// the loop should reschedule.
    pub fn scroll_step(&mut self, epoch: u64, page: &mut dyn Page) -> bool {
        match self.scroll.step(epoch) {
            Some(dy) => {
                page.scroll_by(dy);
                true
            }
            None => false,
        }
    }

    fn start_scroll(&mut self, direction: ScrollDirection) -> DispatchOutcome {
        match self.scroll.start(direction) {
            Some(epoch) => {
                debug!("Scroll loop {epoch} started ({direction:?})");
                DispatchOutcome::ScrollStarted { epoch, direction }
            }
            None => DispatchOutcome::Nothing,
        }
    }

    fn stop_outcome(&mut self) -> DispatchOutcome {
        if self.scroll.stop() {
            DispatchOutcome::ScrollStopped
        } else {
            DispatchOutcome::Nothing
        }
    }
}

/// Hit-test beneath the overlays and send down/up/click to the best target.
pub fn click_at(page: &mut dyn Page, x: f64, y: f64) -> Option<ElementId> {
    page.set_overlays_hidden(true);
    let hit = page.element_at(x, y);
    page.set_overlays_hidden(false);
    page.show_click_ripple(x, y);

    let Some(element) = hit else {
        debug!("Click at ({x:.0}, {y:.0}) hit nothing");
        return None;
    };
    let target = page.interactive_ancestor(element).unwrap_or(element);
    for kind in [PointerEventKind::Down, PointerEventKind::Up, PointerEventKind::Click] {
        page.dispatch_pointer(target, kind, x, y);
    }
    info!("Clicked {target:?} at ({x:.0}, {y:.0})");
    Some(target)
}

/// Cancel signal first, then any visible close button.
pub fn dismiss(page: &mut dyn Page) {
    page.dispatch_cancel();
    if let Some(close) = page.close_affordance() {
        debug!("Activating close affordance {close:?}");
        page.activate(close);
    }
}
