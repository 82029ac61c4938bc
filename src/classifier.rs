//! Geometric gesture classification from a single [`LandmarkSet`].
//!
//! Pure and stateless: the same landmarks always give the same label. Finger
//! extension is judged by the fingertip's vertical offset from its PIP joint,
//! in the direction the hand is held (tip above PIP for an upright hand, below
//! it for an inverted one). All thresholds are in normalised frame units, so
//! the result does not depend on the capture resolution.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::landmarks::{index, Finger, LandmarkSet};

/// The closed gesture vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    #[default]
    None,
    /// Upright hand, only the index finger extended.
    PointUp,
    /// Inverted hand, only the index finger extended downward.
    PointDown,
    /// Upright hand, all four fingers extended.
    OpenPalm,
    /// Thumb and index tips together, middle and ring not extended.
    Pinch,
    /// Index and middle extended, ring and pinky curled.
    Peace,
    /// Index, middle and ring extended, pinky curled.
    ThreeFingers,
}

impl GestureLabel {
    pub const ALL: [GestureLabel; 7] = [
        Self::None,
        Self::PointUp,
        Self::PointDown,
        Self::OpenPalm,
        Self::Pinch,
        Self::Peace,
        Self::ThreeFingers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PointUp => "point_up",
            Self::PointDown => "point_down",
            Self::OpenPalm => "open_palm",
            Self::Pinch => "pinch",
            Self::Peace => "peace",
            Self::ThreeFingers => "three_fingers",
        }
    }

    /// Discrete gestures fire their action once per continuous hold.
    pub fn is_one_shot(&self) -> bool {
        matches!(self, Self::Pinch | Self::Peace | Self::ThreeFingers)
    }

    /// What the gesture does while it is confirmed.
    pub fn action_label(&self) -> &'static str {
        match self {
            Self::None => "Waiting...",
            Self::PointUp => "Scrolling Up",
            Self::PointDown => "Scrolling Down",
            Self::OpenPalm => "Paused",
            Self::Pinch => "Click!",
            Self::Peace => "Exiting...",
            Self::ThreeFingers => "Dismiss",
        }
    }
}

impl std::fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification thresholds, in normalised frame units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierTuning {
    /// How far a fingertip must be past its PIP to count as extended.
    pub extension_margin: f32,
    /// Wrist-to-finger vertical margin for the upright/inverted decision.
    pub orientation_margin: f32,
    /// Maximum thumb-tip to index-tip distance for a pinch.
    pub pinch_threshold: f32,
}

impl Default for ClassifierTuning {
    fn default() -> Self {
        Self {
            extension_margin: 0.03,
            orientation_margin: 0.08,
            pinch_threshold: 0.07,
        }
    }
}

/// Intermediate geometric signals for one hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandPose {
    /// Wrist clearly below the middle-finger MCP.
    pub upright: bool,
    /// Wrist clearly above the middle fingertip.
    pub inverted: bool,
    /// Per finger (index, middle, ring, pinky): tip above PIP.
    pub extended_up: [bool; 4],
    /// Per finger: tip below PIP.
    pub extended_down: [bool; 4],
    /// Per finger: tip below its MCP.
    pub curled: [bool; 4],
    pub pinch_distance: f32,
    pub pinching: bool,
}

/// Maps landmarks to a [`GestureLabel`].
#[derive(Debug, Clone, Default)]
pub struct GestureClassifier {
    pub tuning: ClassifierTuning,
}

impl GestureClassifier {
    pub fn new(tuning: ClassifierTuning) -> Self {
        Self { tuning }
    }

    /// Compute the geometric signals, or `None` for an incomplete hand.
    pub fn measure(&self, hand: &LandmarkSet) -> Option<HandPose> {
        if !hand.is_complete() {
            return None;
        }
        let t = &self.tuning;
        let wrist = hand.normalized(index::WRIST);
        let middle_mcp = hand.normalized(index::MIDDLE_MCP);
        let middle_tip = hand.normalized(index::MIDDLE_TIP);

        // Image y grows downward.
        let upright = wrist.y > middle_mcp.y + t.orientation_margin;
        let inverted = wrist.y < middle_tip.y - t.orientation_margin;

        let mut extended_up = [false; 4];
        let mut extended_down = [false; 4];
        let mut curled = [false; 4];
        for (i, finger) in Finger::ALL.iter().enumerate() {
            let tip = hand.normalized(finger.tip());
            let pip = hand.normalized(finger.pip());
            let mcp = hand.normalized(finger.mcp());
            extended_up[i] = tip.y < pip.y - t.extension_margin;
            extended_down[i] = tip.y > pip.y + t.extension_margin;
            curled[i] = tip.y > mcp.y;
        }

        let pinch_distance = hand
            .normalized(index::THUMB_TIP)
            .distance(&hand.normalized(index::INDEX_TIP));
        let pinching =
            pinch_distance < t.pinch_threshold && !extended_up[1] && !extended_up[2];

        Some(HandPose {
            upright,
            inverted,
            extended_up,
            extended_down,
            curled,
            pinch_distance,
            pinching,
        })
    }

    /// Classify one hand. Incomplete sets classify as [`GestureLabel::None`].
    pub fn classify(&self, hand: &LandmarkSet) -> GestureLabel {
        let Some(pose) = self.measure(hand) else {
            return GestureLabel::None;
        };
        let label = decide(&pose);
        if label != GestureLabel::None {
            debug!(
                "Gesture {label} | upright={} inverted={} up={:?} pinch={:.3}",
                pose.upright, pose.inverted, pose.extended_up, pose.pinch_distance
            );
        }
        label
    }
}

/// Priority-ordered decision list; the first matching rule wins.
fn decide(pose: &HandPose) -> GestureLabel {
    let [index_up, middle_up, ring_up, pinky_up] = pose.extended_up;
    let [index_down, middle_down, ring_down, pinky_down] = pose.extended_down;
    let [_, _, ring_curled, pinky_curled] = pose.curled;

    if pose.inverted && index_down && !middle_down && !ring_down && !pinky_down {
        return GestureLabel::PointDown;
    }
    if !pose.upright {
        return GestureLabel::None;
    }
    if index_up && !middle_up && !ring_up && !pinky_up {
        GestureLabel::PointUp
    } else if pose.pinching {
        GestureLabel::Pinch
    } else if index_up && middle_up && ring_up && pinky_up {
        GestureLabel::OpenPalm
    } else if index_up && middle_up && !ring_up && !pinky_up {
        if ring_curled && pinky_curled {
            GestureLabel::Peace
        } else {
            GestureLabel::None
        }
    } else if index_up && middle_up && ring_up && !pinky_up {
        if pinky_curled {
            GestureLabel::ThreeFingers
        } else {
            GestureLabel::None
        }
    } else {
        GestureLabel::None
    }
}

/// Classify with the standard tuning.
pub fn classify(hand: &LandmarkSet) -> GestureLabel {
    GestureClassifier::default().classify(hand)
}
