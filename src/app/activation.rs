use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use gtk4::glib;
use gtk4::prelude::*;

use hands_free::pipeline::{run_activation, run_scroll_loop, FrameClock, SharedController};
use hands_free::provider::onnx::{self, OnnxHandLandmarker};
use hands_free::provider::{shared_model_cache, LandmarkProvider, ProviderLoader};

use super::state::AppState;

/// Wakes once per frame painted by a widget's frame clock.
pub struct WidgetFrameClock {
    ticks: async_channel::Receiver<()>,
}

impl WidgetFrameClock {
    pub fn new(widget: &impl IsA<gtk4::Widget>) -> Self {
        let (tx, rx) = async_channel::bounded(1);
        widget.add_tick_callback(move |_widget, _clock| {
            if tx.is_closed() {
                return glib::ControlFlow::Break;
            }
            // A full channel means the loop has not caught up; coalesce.
            let _ = tx.try_send(());
            glib::ControlFlow::Continue
        });
        Self { ticks: rx }
    }
}

impl FrameClock for WidgetFrameClock {
    async fn next_frame(&self) -> bool {
        self.ticks.recv().await.is_ok()
    }
}

/// Load the model (once per process), open the camera and run the capture
/// loop for `generation` on the main thread.
pub fn start_activation(state: &Rc<RefCell<AppState>>, generation: u64) {
    let s = state.borrow();
    let Some(widget) = s.overlay.as_ref().map(|o| o.cursor_area.clone()) else {
        log::error!("Cannot start capture without the cursor layer");
        return;
    };
    let controller = s.controller.clone();
    let runtime = s.tokio_rt.handle().clone();
    let model = s.config.model.clone();
    drop(s);

    let load: ProviderLoader = Box::new(move || {
        let provider = OnnxHandLandmarker::load(&onnx::model_path(&model), &model)?;
        Ok(Arc::new(provider) as Arc<dyn LandmarkProvider>)
    });

    log::info!("Starting activation {generation}");
    glib::spawn_future_local(async move {
        let clock = WidgetFrameClock::new(&widget);
        run_activation(controller, generation, shared_model_cache(), load, &clock, &runtime).await;
    });
}

/// Step the scroll loop started with `epoch` once per displayed frame.
pub fn start_scroll_loop(controller: SharedController, widget: gtk4::DrawingArea, epoch: u64) {
    glib::spawn_future_local(async move {
        let clock = WidgetFrameClock::new(&widget);
        run_scroll_loop(controller, epoch, &clock).await;
    });
}
