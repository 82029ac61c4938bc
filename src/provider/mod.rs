//! Landmark providers and the process-wide model cache.
//!
//! The model is loaded at most once per process and then shared read-only by
//! every activation cycle. It is never released before exit.

pub mod download;
pub mod onnx;

use std::sync::{Arc, OnceLock};

use log::{error, info};
use tokio::runtime::Handle;
use tokio::sync::OnceCell;

use crate::camera::VideoFrame;
use crate::error::{GestureError, LandmarkError};
use crate::landmarks::LandmarkSet;

/// Estimates one hand's landmarks from a frame.
///
/// Implementations are CPU-heavy and are called from blocking threads.
pub trait LandmarkProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Landmarks in pixel coordinates of `frame`, or `None` when no hand is
    /// visible.
    fn estimate(&self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, LandmarkError>;
}

/// Loads a provider; runs on a blocking thread.
pub type ProviderLoader =
    Box<dyn FnOnce() -> Result<Arc<dyn LandmarkProvider>, LandmarkError> + Send + 'static>;

/// Initialise-once holder for the landmark model.
#[derive(Default)]
pub struct ModelCache {
    cell: OnceCell<Arc<dyn LandmarkProvider>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<dyn LandmarkProvider>> {
        self.cell.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Return the cached provider, loading it on `runtime`'s blocking pool if
    /// needed. Concurrent callers wait on the same in-flight load; a failed
    /// load leaves the cache empty so a later activation can retry.
    pub async fn get_or_load(
        &self,
        runtime: &Handle,
        load: ProviderLoader,
    ) -> Result<Arc<dyn LandmarkProvider>, GestureError> {
        let runtime = runtime.clone();
        self.cell
            .get_or_try_init(|| async move {
                info!("Loading hand landmark model");
                match runtime.spawn_blocking(load).await {
                    Ok(Ok(provider)) => {
                        info!("Hand landmark model ready ({})", provider.name());
                        Ok(provider)
                    }
                    Ok(Err(e)) => {
                        error!("Hand landmark model failed to load: {e}");
                        Err(GestureError::ModelLoadFailure(e.to_string()))
                    }
                    Err(e) => Err(GestureError::ModelLoadFailure(e.to_string())),
                }
            })
            .await
            .cloned()
    }
}

/// The cache shared by the whole process.
pub fn shared_model_cache() -> &'static ModelCache {
    static CACHE: OnceLock<ModelCache> = OnceLock::new();
    CACHE.get_or_init(ModelCache::new)
}
