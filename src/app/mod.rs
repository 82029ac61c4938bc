mod activation;
mod event_handler;
mod model;
mod state;

pub use event_handler::handle_backend_event;
pub use model::ensure_hand_model;
pub use state::{AppState, AppStatus, BackendEvent};
