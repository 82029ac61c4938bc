use evdev::{Device, EventType, KeyCode};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hands_free::config::HotkeyConfig;

use super::{current_hotkey, HotkeyMatcher};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Start the hotkey listener on a dedicated OS thread.
/// Sends `()` through the async channel each time the hotkey is triggered.
pub fn start_listener(sender: async_channel::Sender<()>, shared_hotkey: Arc<Mutex<HotkeyConfig>>) {
    let spawned = std::thread::Builder::new()
        .name("hotkey-listener".into())
        .spawn(move || {
            if let Err(e) = listener_loop(sender, shared_hotkey) {
                log::error!("Hotkey listener exited: {e}");
            }
        });
    if let Err(e) = spawned {
        log::error!("Failed to spawn hotkey thread: {e}");
    }
}

/// What the listener should do after a key event.
enum Step {
    Continue,
    Stop,
}

fn listener_loop(
    sender: async_channel::Sender<()>,
    shared_hotkey: Arc<Mutex<HotkeyConfig>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut keyboards = open_keyboards();
    if keyboards.is_empty() {
        return Err("no readable keyboards under /dev/input (add the user to the 'input' group)".into());
    }
    for keyboard in &keyboards {
        keyboard.set_nonblocking(true)?;
    }
    log::info!("Listening on {} keyboard(s)", keyboards.len());

    let mut matcher = HotkeyMatcher::default();
    loop {
        let mut idle = true;
        for keyboard in keyboards.iter_mut() {
            let Ok(events) = keyboard.fetch_events() else {
                continue;
            };
            for event in events.filter(|e| e.event_type() == EventType::KEY) {
                idle = false;
                let step = on_key(&mut matcher, event.code(), event.value(), &shared_hotkey, &sender);
                if let Step::Stop = step {
                    log::info!("Hotkey channel closed, stopping listener");
                    return Ok(());
                }
            }
        }
        if idle {
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Key values: 1 press, 0 release, 2 autorepeat (ignored).
fn on_key(
    matcher: &mut HotkeyMatcher,
    code: u16,
    value: i32,
    shared_hotkey: &Mutex<HotkeyConfig>,
    sender: &async_channel::Sender<()>,
) -> Step {
    match value {
        0 => matcher.release(code),
        1 => {
            let hotkey = current_hotkey(shared_hotkey);
            if matcher.press(code, &hotkey, Instant::now()) {
                log::info!("Hotkey triggered: {}", hotkey.display_name);
                if sender.try_send(()).is_err() && sender.is_closed() {
                    return Step::Stop;
                }
            }
        }
        _ => {}
    }
    Step::Continue
}

/// Event nodes under /dev/input that report letter keys.
fn open_keyboards() -> Vec<Device> {
    let Ok(entries) = std::fs::read_dir("/dev/input") else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("event"))
        })
        .filter_map(|path| {
            let device = Device::open(&path).ok()?;
            let types_ok = device.supported_events().contains(EventType::KEY);
            let letters_ok = device
                .supported_keys()
                .is_some_and(|keys| keys.contains(KeyCode::KEY_A));
            if !(types_ok && letters_ok) {
                return None;
            }
            log::debug!("Keyboard {} at {}", device.name().unwrap_or("?"), path.display());
            Some(device)
        })
        .collect()
}
