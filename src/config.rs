use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::camera::StreamConstraints;
use crate::classifier::ClassifierTuning;
use crate::stabilizer::DEFAULT_STABILITY_FRAMES;

/// Toggle combo, as evdev key codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// Must all be held when `trigger` goes down.
    pub modifiers: Vec<u16>,
    pub trigger: u16,
    /// Shown in the dashboard and logs.
    pub display_name: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            modifiers: vec![29, 56], // KEY_LEFTCTRL, KEY_LEFTALT
            trigger: 35,             // KEY_H
            display_name: "Ctrl+Alt+H".into(),
        }
    }
}

/// Classifier and stabilizer thresholds, as a named set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningProfile {
    /// Tight pinch, ten-frame confirmation.
    #[default]
    Standard,
    /// Looser pinch, five-frame confirmation.
    Responsive,
}

impl TuningProfile {
    pub fn pinch_threshold(&self) -> f32 {
        match self {
            Self::Standard => 0.07,
            Self::Responsive => 0.10,
        }
    }

    pub fn stability_frames(&self) -> u32 {
        match self {
            Self::Standard => DEFAULT_STABILITY_FRAMES,
            Self::Responsive => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub profile: TuningProfile,
    /// Overrides the profile's confirmation window. Clamped to at least 1.
    pub stability_frames: Option<u32>,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            profile: TuningProfile::Standard,
            stability_frames: None,
        }
    }
}

impl GestureConfig {
    pub fn classifier_tuning(&self) -> ClassifierTuning {
        ClassifierTuning {
            pinch_threshold: self.profile.pinch_threshold(),
            ..ClassifierTuning::default()
        }
    }

    pub fn stability_frames(&self) -> u32 {
        self.stability_frames
            .unwrap_or_else(|| self.profile.stability_frames())
            .max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Index into the system's camera list.
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 320,
            height: 240,
            frame_rate: 30,
        }
    }
}

impl CameraConfig {
    pub fn constraints(&self) -> StreamConstraints {
        StreamConstraints {
            device_index: self.index,
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
            ..StreamConstraints::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Distance scrolled per displayed frame while pointing.
    pub step_px: f64,
    /// Pixels one wheel notch moves, used to convert steps for the desktop.
    pub wheel_notch_px: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            step_px: 24.0,
            wheel_notch_px: 48.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub url: String,
    pub filename: String,
    /// Side of the square model input, in pixels.
    pub input_size: u32,
    /// Minimum hand-presence score for a detection to count.
    pub min_presence: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: "https://huggingface.co/opencv/handpose_estimation_mediapipe/resolve/main/handpose_estimation_mediapipe_2023feb.onnx".into(),
            filename: "hand_landmark.onnx".into(),
            input_size: 224,
            min_presence: 0.5,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hotkey: HotkeyConfig,
    pub gesture: GestureConfig,
    pub camera: CameraConfig,
    pub scroll: ScrollConfig,
    pub model: ModelConfig,
    /// Leave hands-free mode when the camera stream ends instead of idling.
    pub exit_on_stream_loss: bool,
    /// Play a short tone on enter, exit and click.
    pub sound_cues: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: HotkeyConfig::default(),
            gesture: GestureConfig::default(),
            camera: CameraConfig::default(),
            scroll: ScrollConfig::default(),
            model: ModelConfig::default(),
            exit_on_stream_loss: false,
            sound_cues: true,
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/hands-free`, or the working directory without one.
    fn dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hands-free")
    }

    fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    pub fn exists() -> bool {
        Self::path().exists()
    }

    /// Missing or unreadable files yield the defaults.
    pub fn load() -> Self {
        fs::read_to_string(Self::path())
            .map(|data| Self::parse(&data))
            .unwrap_or_default()
    }

    fn parse(data: &str) -> Self {
        serde_json::from_str(data).unwrap_or_else(|e| {
            log::warn!("Ignoring invalid config: {e}");
            Self::default()
        })
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        fs::create_dir_all(Self::dir())?;
        fs::write(Self::path(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::parse(r#"{ "exit_on_stream_loss": true, "camera": { "index": 2 } }"#);
        assert!(config.exit_on_stream_loss);
        assert_eq!(config.camera.index, 2);
        assert_eq!(config.camera.width, 320);
        assert_eq!(config.hotkey, HotkeyConfig::default());
    }

    #[test]
    fn invalid_file_falls_back() {
        assert_eq!(Config::parse("not json"), Config::default());
    }

    #[test]
    fn responsive_profile_is_looser() {
        let gesture = GestureConfig {
            profile: TuningProfile::Responsive,
            stability_frames: None,
        };
        assert_eq!(gesture.stability_frames(), 5);
        assert_eq!(gesture.classifier_tuning().pinch_threshold, 0.10);
    }

    #[test]
    fn stability_override_is_clamped() {
        let gesture = GestureConfig {
            profile: TuningProfile::Standard,
            stability_frames: Some(0),
        };
        assert_eq!(gesture.stability_frames(), 1);
    }

    #[test]
    fn profile_serializes_snake_case() {
        let json = serde_json::to_string(&TuningProfile::Responsive).unwrap();
        assert_eq!(json, "\"responsive\"");
    }
}
