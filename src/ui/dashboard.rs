use gtk4::cairo;
use gtk4::prelude::*;
use libadwaita::prelude::*;

use hands_free::pipeline::SharedController;
use hands_free::preview::PreviewFrame;
use hands_free::landmarks::index;
use hands_free::GestureLabel;

use super::overlay::gesture_title;

const KEYPOINT_RADIUS: f64 = 3.0;
const INDEX_TIP_RADIUS: f64 = 6.0;

/// Handles returned from building the dashboard window.
pub struct DashboardWidgets {
    pub window: libadwaita::ApplicationWindow,
    pub status_label: gtk4::Label,
    pub mode_switch: gtk4::Switch,
    pub gesture_label: gtk4::Label,
    pub preview: gtk4::DrawingArea,
    pub error_label: gtk4::Label,
    pub progress_bar: gtk4::ProgressBar,
}

/// Build the main dashboard window.
pub fn build_dashboard(
    app: &libadwaita::Application,
    initial_status: &str,
    initial_hotkey: &str,
) -> DashboardWidgets {
    let window = libadwaita::ApplicationWindow::builder()
        .application(app)
        .title("Hands-free")
        .default_width(460)
        .default_height(640)
        .build();

    let toolbar_view = libadwaita::ToolbarView::new();
    let header = libadwaita::HeaderBar::new();

    let menu_button = gtk4::MenuButton::new();
    menu_button.set_icon_name("open-menu-symbolic");

    let menu = gtk4::gio::Menu::new();
    menu.append(Some("About Hands-free"), Some("app.about"));
    menu.append(Some("Hide Window"), Some("app.hide-window"));
    menu.append(Some("Quit"), Some("app.quit"));

    menu_button.set_menu_model(Some(&menu));
    header.pack_end(&menu_button);

    toolbar_view.add_top_bar(&header);

    let content = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
    content.set_margin_start(16);
    content.set_margin_end(16);
    content.set_margin_top(12);
    content.set_margin_bottom(12);

    let mode_switch = gtk4::Switch::builder()
        .valign(gtk4::Align::Center)
        .build();
    let status_label = dim_label(initial_status);
    let gesture_label = dim_label(gesture_title(GestureLabel::None));

    let mode_group = section("Hands-free Mode");
    let toggle_row = suffix_row("Enabled", &mode_switch);
    toggle_row.set_activatable_widget(Some(&mode_switch));
    mode_group.add(&toggle_row);
    mode_group.add(&suffix_row("Current State", &status_label));
    mode_group.add(&suffix_row("Gesture", &gesture_label));
    content.append(&mode_group);

    let error_label = gtk4::Label::builder()
        .wrap(true)
        .xalign(0.0)
        .visible(false)
        .css_classes(["error"])
        .build();
    content.append(&error_label);

    let preview = gtk4::DrawingArea::builder()
        .content_width(320)
        .content_height(240)
        .css_classes(["card"])
        .build();
    let camera_group = section("Camera");
    camera_group.add(&preview);
    content.append(&camera_group);

    let reference_group = section("Gestures");
    for gesture in GestureLabel::ALL
        .into_iter()
        .filter(|g| *g != GestureLabel::None)
    {
        reference_group.add(
            &libadwaita::ActionRow::builder()
                .title(gesture_title(gesture))
                .subtitle(gesture.action_label())
                .build(),
        );
    }
    content.append(&reference_group);

    let hotkey_group = section("Hotkey");
    hotkey_group.add(&suffix_row("Toggle Hands-free Mode", &dim_label(initial_hotkey)));
    content.append(&hotkey_group);

    let progress_bar = gtk4::ProgressBar::builder()
        .show_text(true)
        .text("Fetching hand landmark model")
        .visible(false)
        .build();
    content.append(&progress_bar);

    let scrolled = gtk4::ScrolledWindow::builder()
        .hscrollbar_policy(gtk4::PolicyType::Never)
        .child(&content)
        .build();
    toolbar_view.set_content(Some(&scrolled));
    window.set_content(Some(&toolbar_view));

    DashboardWidgets {
        window,
        status_label,
        mode_switch,
        gesture_label,
        preview,
        error_label,
        progress_bar,
    }
}

fn section(title: &str) -> libadwaita::PreferencesGroup {
    libadwaita::PreferencesGroup::builder().title(title).build()
}

fn dim_label(text: &str) -> gtk4::Label {
    let label = gtk4::Label::new(Some(text));
    label.add_css_class("dim-label");
    label
}

fn suffix_row(title: &str, suffix: &impl IsA<gtk4::Widget>) -> libadwaita::ActionRow {
    let row = libadwaita::ActionRow::builder().title(title).build();
    row.add_suffix(suffix);
    row
}

/// Paint the controller's preview into `area` on every displayed frame.
pub fn connect_preview(area: &gtk4::DrawingArea, controller: SharedController) {
    area.set_draw_func(move |_area, cr, width, height| {
        // Skip a frame rather than panic if a loop holds the controller.
        let Ok(controller) = controller.try_borrow() else {
            return;
        };
        draw_preview(cr, width as f64, height as f64, controller.preview());
    });
    area.add_tick_callback(|area, _clock| {
        area.queue_draw();
        gtk4::glib::ControlFlow::Continue
    });
}

pub fn show_error(dashboard: &DashboardWidgets, message: Option<&str>) {
    match message {
        Some(text) => {
            dashboard.error_label.set_text(text);
            dashboard.error_label.set_visible(true);
        }
        None => {
            dashboard.error_label.set_text("");
            dashboard.error_label.set_visible(false);
        }
    }
}

fn draw_preview(cr: &cairo::Context, width: f64, height: f64, preview: &PreviewFrame) {
    cr.set_source_rgb(0.1, 0.1, 0.1);
    let _ = cr.paint();

    let (Some(image), Some(size)) = (&preview.image, preview.size) else {
        if let Some(message) = preview.message {
            draw_message(cr, width, height, message);
        }
        return;
    };
    if size.is_empty() {
        return;
    }

    let (scale, ox, oy) = fit_rect(size.width as f64, size.height as f64, width, height);

    if let Some(surface) = image_surface(image) {
        let _ = cr.save();
        cr.translate(ox, oy);
        cr.scale(scale, scale);
        if cr.set_source_surface(&surface, 0.0, 0.0).is_ok() {
            let _ = cr.paint();
        }
        let _ = cr.restore();
    }

    for (i, point) in preview.keypoints.iter().enumerate() {
        let x = ox + point.x as f64 * scale;
        let y = oy + point.y as f64 * scale;
        let (radius, (r, g, b)) = keypoint_marker(i);
        cr.set_source_rgb(r, g, b);
        cr.arc(x, y, radius, 0.0, std::f64::consts::TAU);
        let _ = cr.fill();
    }
}

/// Radius and colour for the keypoint at landmark index `i`; the index tip
/// is the cursor anchor and stands out.
fn keypoint_marker(i: usize) -> (f64, (f64, f64, f64)) {
    if i == index::INDEX_TIP {
        (INDEX_TIP_RADIUS, (1.0, 0.25, 0.25))
    } else {
        (KEYPOINT_RADIUS, (0.2, 0.9, 0.4))
    }
}

fn draw_message(cr: &cairo::Context, width: f64, height: f64, message: &str) {
    cr.select_font_face("Sans", cairo::FontSlant::Normal, cairo::FontWeight::Normal);
    cr.set_font_size(14.0);
    cr.set_source_rgb(0.8, 0.8, 0.8);
    let Ok(extents) = cr.text_extents(message) else {
        return;
    };
    cr.move_to(
        (width - extents.width()) / 2.0,
        (height + extents.height()) / 2.0,
    );
    let _ = cr.show_text(message);
}

fn image_surface(image: &image::RgbImage) -> Option<cairo::ImageSurface> {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let stride = cairo::Format::Rgb24.stride_for_width(image.width()).ok()?;
    let data = rgb_to_cairo(image, stride as usize);
    match cairo::ImageSurface::create_for_data(data, cairo::Format::Rgb24, width, height, stride) {
        Ok(surface) => Some(surface),
        Err(e) => {
            log::debug!("Preview surface failed: {e}");
            None
        }
    }
}

/// Repack RGB pixels as cairo's native-endian xRGB words.
fn rgb_to_cairo(image: &image::RgbImage, stride: usize) -> Vec<u8> {
    let mut data = vec![0u8; stride * image.height() as usize];
    for (y, row) in image.rows().enumerate() {
        let line = &mut data[y * stride..];
        for (x, pixel) in row.enumerate() {
            let [r, g, b] = pixel.0;
            let word = u32::from_be_bytes([0xff, r, g, b]);
            line[x * 4..x * 4 + 4].copy_from_slice(&word.to_ne_bytes());
        }
    }
    data
}

/// Scale and offset that fit a `src` rectangle inside `dst`, centred.
fn fit_rect(src_w: f64, src_h: f64, dst_w: f64, dst_h: f64) -> (f64, f64, f64) {
    let scale = (dst_w / src_w).min(dst_h / src_h);
    let ox = (dst_w - src_w * scale) / 2.0;
    let oy = (dst_h - src_h * scale) / 2.0;
    (scale, ox, oy)
}
