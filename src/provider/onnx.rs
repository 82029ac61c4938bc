//! Hand landmark model on ONNX Runtime.
//!
//! The model takes a square RGB image (NHWC, `f32` in `[0, 1]`) and produces
//! 21 `(x, y, z)` keypoints in input-pixel units plus a hand-presence score.
//! The whole frame is resized to the model input; there is no separate palm
//! detection stage, so the hand should fill a reasonable part of the view.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::LandmarkProvider;
use crate::camera::VideoFrame;
use crate::config::ModelConfig;
use crate::error::LandmarkError;
use crate::landmarks::{LandmarkSet, Point, LANDMARK_COUNT};

const LANDMARK_VALUES: usize = LANDMARK_COUNT * 3;

/// Directory for model storage: ~/.local/share/hands-free/models/
pub fn models_dir() -> PathBuf {
    let mut p = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("hands-free");
    p.push("models");
    p
}

pub fn model_path(config: &ModelConfig) -> PathBuf {
    models_dir().join(&config.filename)
}

/// Check whether the landmark model file exists.
pub fn model_exists(config: &ModelConfig) -> bool {
    model_path(config).exists()
}

/// Download the landmark model, sending progress events via the provided callback.
/// `on_progress(bytes_downloaded, total_bytes)`; total may be 0 if unknown.
pub async fn download_model<F>(
    config: &ModelConfig,
    on_progress: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Fn(u64, u64) + Send + 'static,
{
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let dir = models_dir();
    tokio::fs::create_dir_all(&dir).await?;

    let response = reqwest::get(&config.url).await?.error_for_status()?;
    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    // Write to a temporary name so an interrupted download never looks complete.
    let path = model_path(config);
    let partial = path.with_extension("part");
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        on_progress(downloaded, total);
    }

    file.flush().await?;
    tokio::fs::rename(&partial, &path).await?;
    log::info!("Model downloaded to {}", path.display());
    Ok(())
}

/// ONNX hand landmark estimator.
pub struct OnnxHandLandmarker {
    session: Mutex<Session>,
    input_name: String,
    output_names: Vec<String>,
    input_size: u32,
    min_presence: f32,
}

impl OnnxHandLandmarker {
    /// Load the model from disk. CPU-heavy; call from a blocking context.
    pub fn load(path: &Path, config: &ModelConfig) -> Result<Self, LandmarkError> {
        if !path.exists() {
            return Err(LandmarkError::Load(format!(
                "model file not found: {}",
                path.display()
            )));
        }
        let threads = std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(2);
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| LandmarkError::Load(e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| LandmarkError::Load("model has no inputs".into()))?;
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        log::info!(
            "Landmark model loaded: input {input_name}, outputs {}",
            output_names.join(", ")
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_names,
            input_size: config.input_size.max(1),
            min_presence: config.min_presence,
        })
    }

    fn input_tensor(&self, frame: &VideoFrame) -> Array4<f32> {
        let size = self.input_size;
        let resized = imageops::resize(&**frame.image(), size, size, FilterType::Triangle);
        let side = size as usize;
        Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        })
    }

    /// Run the model and return the flat landmark values and presence score.
    fn infer(&self, input: Array4<f32>) -> Result<(Vec<f32>, Option<f32>), LandmarkError> {
        let tensor = Tensor::from_array(input).map_err(|e| LandmarkError::Inference(e.to_string()))?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| LandmarkError::Inference("session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| LandmarkError::Inference(e.to_string()))?;

        let mut landmarks = None;
        let mut presence = None;
        for name in &self.output_names {
            let values: ndarray::ArrayViewD<f32> = match outputs[name.as_str()].try_extract_array() {
                Ok(v) => v,
                Err(_) => continue,
            };
            match values.len() {
                LANDMARK_VALUES if landmarks.is_none() => {
                    landmarks = Some(values.iter().copied().collect::<Vec<f32>>());
                }
                1 if presence.is_none() => presence = values.iter().next().copied(),
                _ => {}
            }
        }
        let landmarks = landmarks.ok_or_else(|| {
            LandmarkError::Inference(format!("no output with {LANDMARK_VALUES} values"))
        })?;
        Ok((landmarks, presence))
    }
}

impl LandmarkProvider for OnnxHandLandmarker {
    fn name(&self) -> &str {
        "onnx-hand-landmark"
    }

    fn estimate(&self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, LandmarkError> {
        if !frame.is_decodable() {
            return Ok(None);
        }
        let (values, presence) = self.infer(self.input_tensor(frame))?;
        if let Some(raw) = presence {
            let score = presence_probability(raw);
            if score < self.min_presence {
                return Ok(None);
            }
        }
        Ok(Some(to_frame_landmarks(&values, self.input_size, frame)))
    }
}

/// Some exports emit a logit instead of a probability.
fn presence_probability(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        1.0 / (1.0 + (-raw).exp())
    }
}

/// Rescale `(x, y, z)` triples from model-input pixels to frame pixels.
fn to_frame_landmarks(values: &[f32], input_size: u32, frame: &VideoFrame) -> LandmarkSet {
    let size = frame.size();
    let sx = size.width as f32 / input_size as f32;
    let sy = size.height as f32 / input_size as f32;
    let points = values
        .chunks_exact(3)
        .take(LANDMARK_COUNT)
        .map(|xyz| Point::new(xyz[0] * sx, xyz[1] * sy))
        .collect();
    LandmarkSet::new(points, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::solid_frame;

    #[test]
    fn landmarks_rescale_to_frame() {
        let frame = solid_frame(320, 240, 1);
        let mut values = vec![0.0; LANDMARK_VALUES];
        values[0] = 112.0;
        values[1] = 56.0;
        let set = to_frame_landmarks(&values, 224, &frame);
        assert_eq!(set.len(), LANDMARK_COUNT);
        assert_eq!(set.get(0), Some(Point::new(160.0, 60.0)));
        assert!(set.is_complete());
    }

    #[test]
    fn presence_logits_are_squashed() {
        assert_eq!(presence_probability(0.9), 0.9);
        assert!(presence_probability(-6.0) < 0.01);
        assert!(presence_probability(6.0) > 0.99);
    }

    #[test]
    fn missing_model_file_is_a_load_error() {
        let config = ModelConfig::default();
        let missing = std::env::temp_dir().join("hands-free-no-such-model.onnx");
        let result = OnnxHandLandmarker::load(&missing, &config);
        assert!(matches!(result, Err(LandmarkError::Load(_))));
    }

    #[test]
    fn model_lives_under_data_dir() {
        let config = ModelConfig::default();
        let path = model_path(&config);
        assert!(path.ends_with(format!("hands-free/models/{}", config.filename)));
    }
}
