//! Hand landmark data produced by the landmark model.
//!
//! A [`LandmarkSet`] is the 21-point hand skeleton for a single frame, in pixel
//! coordinates of the capture frame it came from. Sets are produced fresh every
//! frame and consumed immediately.

/// Number of keypoints in a complete hand.
pub const LANDMARK_COUNT: usize = 21;

/// Keypoint indices (anatomical convention of the hand landmark model).
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// The four non-thumb fingers, in index/middle/ring/pinky order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    pub fn mcp(self) -> usize {
        match self {
            Self::Index => index::INDEX_MCP,
            Self::Middle => index::MIDDLE_MCP,
            Self::Ring => index::RING_MCP,
            Self::Pinky => index::PINKY_MCP,
        }
    }

    pub fn pip(self) -> usize {
        self.mcp() + 1
    }

    pub fn tip(self) -> usize {
        self.mcp() + 3
    }
}

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Pixel dimensions of a capture frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One hand's keypoints for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point>,
    frame: FrameSize,
}

impl LandmarkSet {
    /// Wrap pixel-space keypoints. The point count is not validated here;
    /// consumers treat anything other than [`LANDMARK_COUNT`] points as no hand.
    pub fn new(points: Vec<Point>, frame: FrameSize) -> Self {
        Self { points, frame }
    }

    /// Build from coordinates already normalised to `[0, 1]`.
    pub fn from_normalized(points: &[Point], frame: FrameSize) -> Self {
        let w = frame.width as f32;
        let h = frame.height as f32;
        let points = points
            .iter()
            .map(|p| Point::new(p.x * w, p.y * h))
            .collect();
        Self { points, frame }
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() >= LANDMARK_COUNT && !self.frame.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn frame(&self) -> FrameSize {
        self.frame
    }

    /// Pixel-space point, if present.
    pub fn get(&self, i: usize) -> Option<Point> {
        self.points.get(i).copied()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Point `i` divided by the frame dimensions. Panics if `i` is out of
    /// range; callers check [`is_complete`](Self::is_complete) first.
    pub fn normalized(&self, i: usize) -> Point {
        let p = self.points[i];
        Point::new(
            p.x / self.frame.width as f32,
            p.y / self.frame.height as f32,
        )
    }

    /// Index fingertip mirrored horizontally and scaled to a `viewport`.
    pub fn mirrored_index_tip(&self, viewport: (f64, f64)) -> Option<(f64, f64)> {
        let tip = self.get(index::INDEX_TIP)?;
        if self.frame.is_empty() {
            return None;
        }
        let w = self.frame.width as f64;
        let h = self.frame.height as f64;
        let mirrored_x = w - tip.x as f64;
        Some((mirrored_x / w * viewport.0, tip.y as f64 / h * viewport.1))
    }

    /// Keypoints mirrored horizontally within the frame, for drawing.
    pub fn mirrored_points(&self) -> Vec<Point> {
        let w = self.frame.width as f32;
        self.points
            .iter()
            .map(|p| Point::new(w - p.x, p.y))
            .collect()
    }
}
