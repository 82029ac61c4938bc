pub mod dashboard;
pub mod overlay;
pub mod permission_dialog;
