//! Frame-driven loops on the UI thread.
//!
//! The controller lives in an `Rc<RefCell<_>>` on the host's main thread. The
//! loops here borrow it only between suspension points; the landmark model
//! runs on the tokio blocking pool and is the only await inside a capture tick.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, info};
use tokio::runtime::Handle;

use crate::camera::wait_until_open;
use crate::controller::{FrameStep, HandGestureController};
use crate::error::GestureError;
use crate::provider::{LandmarkProvider, ModelCache, ProviderLoader};

pub type SharedController = Rc<RefCell<HandGestureController>>;

/// Wakes once per displayed frame.
#[allow(async_fn_in_trait)]
pub trait FrameClock {
    /// Wait for the next frame. Returns `false` once the clock has stopped.
    async fn next_frame(&self) -> bool;
}

/// One activation: load (or reuse) the model, open the camera and wait for
/// it off the UI thread, then run the capture loop until the generation is
/// superseded.
pub async fn run_activation<C: FrameClock>(
    controller: SharedController,
    generation: u64,
    cache: &ModelCache,
    load: ProviderLoader,
    clock: &C,
    runtime: &Handle,
) {
    let provider = match cache.get_or_load(runtime, load).await {
        Ok(provider) => provider,
        Err(e) => {
            controller.borrow_mut().report_model_failure(generation, e);
            return;
        }
    };

    let started = controller.borrow_mut().start_capture(generation);
    match started {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            debug!("Activation {generation} ended before capture: {e}");
            return;
        }
    }

    // Devices finish opening on their own threads; the UI keeps running meanwhile.
    let signals = controller.borrow_mut().take_camera_open_signals();
    if let Err(e) = wait_until_open(signals).await {
        controller.borrow_mut().on_camera_open_failed(generation, e);
        return;
    }
    if controller.borrow().active_generation() != Some(generation) {
        debug!("Activation {generation} superseded while the camera opened");
        return;
    }

    info!("Capture loop {generation} started");
    run_capture_loop(controller, generation, provider, clock, runtime).await;
    info!("Capture loop {generation} stopped");
}

/// Per-frame capture: poll, infer off-thread, then classify and dispatch.
pub async fn run_capture_loop<C: FrameClock>(
    controller: SharedController,
    generation: u64,
    provider: Arc<dyn LandmarkProvider>,
    clock: &C,
    runtime: &Handle,
) {
    while clock.next_frame().await {
        let step = controller.borrow_mut().begin_frame(generation);
        let frame = match step {
            FrameStep::Stop => break,
            FrameStep::Skip => continue,
            FrameStep::Infer(frame) => frame,
        };

        let provider = provider.clone();
        let result = match runtime.spawn_blocking(move || provider.estimate(&frame)).await {
            Ok(result) => result.map_err(GestureError::from),
            Err(e) => Err(GestureError::InferenceFrameError(e.to_string())),
        };

        // The mode may have been torn down while inference ran.
        if !controller.borrow_mut().complete_frame(generation, result) {
            break;
        }
    }
}

/// Scroll one step per frame until the loop for `epoch` is stopped.
pub async fn run_scroll_loop<C: FrameClock>(controller: SharedController, epoch: u64, clock: &C) {
    while clock.next_frame().await {
        if !controller.borrow_mut().scroll_step(epoch) {
            break;
        }
    }
    debug!("Scroll loop {epoch} finished");
}
