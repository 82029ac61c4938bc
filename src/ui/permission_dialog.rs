use gtk4::prelude::*;
use libadwaita::prelude::*;

use hands_free::GestureError;

/// Ask the user whether hands-free mode may use the camera.
/// `on_result(true)` when access is granted, `false` when the prompt is
/// cancelled or closed.
/// The returned dialog can be closed if the request is withdrawn.
pub fn show_permission_dialog<F>(
    parent: &libadwaita::ApplicationWindow,
    on_result: F,
) -> libadwaita::AlertDialog
where
    F: Fn(bool) + 'static,
{
    let dialog = libadwaita::AlertDialog::builder()
        .heading("Use the Camera?")
        .body("Hands-free mode watches your hand through the webcam to scroll, click and dismiss.\n\nFrames are processed on this computer and never leave it.")
        .build();
    dialog.add_response("cancel", "Cancel");
    dialog.add_response("allow", "Enable Camera");
    dialog.set_response_appearance("allow", libadwaita::ResponseAppearance::Suggested);
    dialog.set_default_response(Some("allow"));
    dialog.set_close_response("cancel");

    let parent_widget: Option<&gtk4::Widget> = Some(parent.upcast_ref());
    dialog.clone().choose(parent_widget, None::<&gtk4::gio::Cancellable>, move |response| {
        on_result(response.as_str() == "allow");
    });
    dialog
}

/// Blocking notice for errors the user has to act on.
pub fn show_error_notice(parent: &libadwaita::ApplicationWindow, error: &GestureError) {
    let dialog = libadwaita::AlertDialog::builder()
        .heading("Hands-free Mode Stopped")
        .body(error.user_message())
        .build();
    dialog.add_response("ok", "OK");

    let parent_widget: Option<&gtk4::Widget> = Some(parent.upcast_ref());
    dialog.choose(parent_widget, None::<&gtk4::gio::Cancellable>, |_response| {});
}
