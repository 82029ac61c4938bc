//! Temporal debouncing of per-frame gesture labels.
//!
//! A label is confirmed once it has been observed on `threshold` consecutive
//! frames. Any different label restarts the count. Continuous gestures
//! (pointing, open palm, none) report on every confirmed frame; one-shot
//! gestures (pinch, peace, three fingers) report once per continuous hold and
//! re-arm only after a different label has been observed.

use crate::classifier::GestureLabel;

/// Default confirmation window, in frames.
pub const DEFAULT_STABILITY_FRAMES: u32 = 10;

/// What a confirmed label asks of the dispatcher on this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StableEvent {
    /// A continuous gesture is held. `first` is set on the confirming frame.
    Continuous { gesture: GestureLabel, first: bool },
    /// A one-shot gesture was confirmed; emitted once per hold.
    OneShot(GestureLabel),
}

impl StableEvent {
    pub fn gesture(&self) -> GestureLabel {
        match self {
            Self::Continuous { gesture, .. } => *gesture,
            Self::OneShot(gesture) => *gesture,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stabilizer {
    threshold: u32,
    current: GestureLabel,
    count: u32,
    fired: bool,
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(DEFAULT_STABILITY_FRAMES)
    }
}

impl Stabilizer {
    /// `threshold` is clamped to at least one frame.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            current: GestureLabel::None,
            count: 0,
            fired: false,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn current(&self) -> GestureLabel {
        self.current
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// The label currently past the threshold, if any.
    pub fn confirmed(&self) -> Option<GestureLabel> {
        (self.count >= self.threshold).then_some(self.current)
    }

    /// Feed one frame's label.
    pub fn observe(&mut self, label: GestureLabel) -> Option<StableEvent> {
        if label != self.current {
            self.current = label;
            self.count = 1;
            self.fired = false;
        } else {
            self.count = self.count.saturating_add(1);
        }

        if self.count < self.threshold {
            return None;
        }
        if label.is_one_shot() {
            if self.fired {
                return None;
            }
            self.fired = true;
            return Some(StableEvent::OneShot(label));
        }
        Some(StableEvent::Continuous {
            gesture: label,
            first: self.count == self.threshold,
        })
    }

    pub fn reset(&mut self) {
        self.current = GestureLabel::None;
        self.count = 0;
        self.fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(stabilizer: &mut Stabilizer, label: GestureLabel, n: usize) -> Vec<StableEvent> {
        (0..n).filter_map(|_| stabilizer.observe(label)).collect()
    }

    #[test]
    fn nothing_before_threshold() {
        let mut s = Stabilizer::new(10);
        assert!(feed(&mut s, GestureLabel::PointUp, 9).is_empty());
        assert_eq!(s.confirmed(), None);
        assert_eq!(
            s.observe(GestureLabel::PointUp),
            Some(StableEvent::Continuous { gesture: GestureLabel::PointUp, first: true })
        );
        assert_eq!(s.confirmed(), Some(GestureLabel::PointUp));
    }

    #[test]
    fn continuous_reports_every_frame_after_confirmation() {
        let mut s = Stabilizer::new(3);
        let events = feed(&mut s, GestureLabel::OpenPalm, 6);
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], StableEvent::Continuous { first: true, .. }));
        assert!(events[1..]
            .iter()
            .all(|e| matches!(e, StableEvent::Continuous { first: false, .. })));
    }

    #[test]
    fn one_shot_fires_once_per_hold() {
        let mut s = Stabilizer::new(10);
        let events = feed(&mut s, GestureLabel::Pinch, 25);
        assert_eq!(events, vec![StableEvent::OneShot(GestureLabel::Pinch)]);

        // Release and hold again re-arms.
        feed(&mut s, GestureLabel::None, 1);
        let events = feed(&mut s, GestureLabel::Pinch, 10);
        assert_eq!(events, vec![StableEvent::OneShot(GestureLabel::Pinch)]);
    }

    #[test]
    fn interleaved_labels_never_confirm() {
        let mut s = Stabilizer::new(10);
        for _ in 0..50 {
            assert!(s.observe(GestureLabel::PointUp).is_none());
            assert!(s.observe(GestureLabel::PointDown).is_none());
        }
        assert_eq!(s.count(), 1);
    }

    #[test]
    fn single_different_frame_restarts_count() {
        let mut s = Stabilizer::new(5);
        feed(&mut s, GestureLabel::Peace, 4);
        s.observe(GestureLabel::None);
        assert!(feed(&mut s, GestureLabel::Peace, 4).is_empty());
        assert_eq!(
            s.observe(GestureLabel::Peace),
            Some(StableEvent::OneShot(GestureLabel::Peace))
        );
    }

    #[test]
    fn zero_threshold_is_clamped_to_one() {
        let mut s = Stabilizer::new(0);
        assert_eq!(s.threshold(), 1);
        assert_eq!(
            s.observe(GestureLabel::ThreeFingers),
            Some(StableEvent::OneShot(GestureLabel::ThreeFingers))
        );
        assert_eq!(s.observe(GestureLabel::ThreeFingers), None);
    }

    #[test]
    fn reset_forgets_progress() {
        let mut s = Stabilizer::new(3);
        feed(&mut s, GestureLabel::Pinch, 3);
        s.reset();
        assert_eq!(s.confirmed(), None);
        assert_eq!(feed(&mut s, GestureLabel::Pinch, 3).len(), 1);
    }
}
