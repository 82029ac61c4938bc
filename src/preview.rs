use std::sync::Arc;

use image::{imageops, RgbImage};

use crate::camera::VideoFrame;
use crate::landmarks::{FrameSize, LandmarkSet, Point};

pub const LOADING_MESSAGE: &str = "Loading camera...";
pub const NO_SIGNAL_MESSAGE: &str = "No video signal";

/// What the debug view should paint for the latest frame.
#[derive(Debug, Clone, Default)]
pub struct PreviewFrame {
    /// Mirrored camera image, or `None` while a placeholder is shown.
    pub image: Option<Arc<RgbImage>>,
    /// Mirrored keypoints in image pixels; empty when no hand is visible.
    pub keypoints: Vec<Point>,
    pub message: Option<&'static str>,
    pub size: Option<FrameSize>,
}

impl PreviewFrame {
    pub fn placeholder(message: &'static str) -> Self {
        Self {
            message: Some(message),
            ..Self::default()
        }
    }

    /// A mirrored copy of `frame`, so the view behaves like a mirror.
    pub fn mirrored(frame: &VideoFrame) -> Self {
        Self {
            image: Some(Arc::new(imageops::flip_horizontal(&**frame.image()))),
            keypoints: Vec::new(),
            message: None,
            size: Some(frame.size()),
        }
    }

    pub fn set_landmarks(&mut self, hand: Option<&LandmarkSet>) {
        self.keypoints = match hand {
            Some(set) if set.is_complete() => set.mirrored_points(),
            _ => Vec::new(),
        };
    }

    pub fn is_placeholder(&self) -> bool {
        self.message.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::index;
    use crate::testing::{hand_for, solid_frame};
    use crate::GestureLabel;

    #[test]
    fn mirrored_preview_flips_image() {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        let frame = VideoFrame::new(image, 1);

        let preview = PreviewFrame::mirrored(&frame);
        let mirrored = preview.image.unwrap();
        assert_eq!(mirrored.get_pixel(3, 0), &image::Rgb([255, 0, 0]));
        assert_eq!(preview.size, Some(FrameSize::new(4, 2)));
    }

    #[test]
    fn keypoints_are_mirrored() {
        let frame = solid_frame(320, 240, 1);
        let hand = hand_for(GestureLabel::PointUp, frame.size());
        let mut preview = PreviewFrame::mirrored(&frame);
        preview.set_landmarks(Some(&hand));

        let tip = hand.get(index::INDEX_TIP).unwrap();
        assert_eq!(preview.keypoints[index::INDEX_TIP], Point::new(320.0 - tip.x, tip.y));

        preview.set_landmarks(None);
        assert!(preview.keypoints.is_empty());
    }

    #[test]
    fn placeholder_carries_message() {
        let preview = PreviewFrame::placeholder(NO_SIGNAL_MESSAGE);
        assert!(preview.is_placeholder());
        assert!(preview.image.is_none());
    }
}
