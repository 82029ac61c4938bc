//! Hand-gesture front-end for hands-free mode.
//!
//! Camera frames go through a landmark model, a geometric classifier and a
//! temporal stabilizer; confirmed gestures are dispatched to a [`dispatch::Page`]
//! as scrolling, synthetic clicks, dismissal or mode exit. Nothing in this crate
//! depends on a particular UI toolkit: hosts receive [`controller::ControllerEvent`]s
//! over a channel and drive the per-frame loops from their own frame clock.

pub mod camera;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod landmarks;
pub mod mode;
pub mod pipeline;
pub mod preview;
pub mod provider;
pub mod stabilizer;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{classify, GestureClassifier, GestureLabel};
pub use controller::{ControllerEvent, HandGestureController};
pub use error::GestureError;
pub use landmarks::{FrameSize, LandmarkSet, Point};
pub use mode::ModeState;
pub use stabilizer::{StableEvent, Stabilizer};
