use std::sync::{Arc, Mutex};
use std::time::Instant;

use rdev::{listen, Event, EventType, Key};

use hands_free::config::HotkeyConfig;

use super::{current_hotkey, HotkeyMatcher};

/// Start the hotkey listener on a dedicated OS thread.
/// Sends `()` through the async channel each time the hotkey is triggered.
pub fn start_listener(sender: async_channel::Sender<()>, shared_hotkey: Arc<Mutex<HotkeyConfig>>) {
    let spawned = std::thread::Builder::new()
        .name("hotkey-listener".into())
        .spawn(move || {
            let mut matcher = HotkeyMatcher::default();

            let callback = move |event: Event| match event.event_type {
                EventType::KeyPress(key) => {
                    let hotkey = current_hotkey(&shared_hotkey);
                    if matcher.press(key_code(key), &hotkey, Instant::now()) {
                        log::info!("Hotkey triggered: {}", hotkey.display_name);
                        let _ = sender.try_send(());
                    }
                }
                EventType::KeyRelease(key) => matcher.release(key_code(key)),
                _ => {}
            };

            if let Err(e) = listen(callback) {
                log::error!("rdev listener error: {e:?}");
            }
        });
    if let Err(e) = spawned {
        log::error!("Failed to spawn hotkey thread: {e}");
    }
}

/// rdev keys and the evdev codes the config file uses for them.
const KEY_CODES: &[(Key, u16)] = &[
    (Key::ControlLeft, 29),
    (Key::ControlRight, 97),
    (Key::ShiftLeft, 42),
    (Key::ShiftRight, 54),
    (Key::Alt, 56),
    (Key::AltGr, 100),
    (Key::MetaLeft, 125),
    (Key::MetaRight, 126),
    (Key::Escape, 1),
    (Key::Tab, 15),
    (Key::Return, 28),
    (Key::Space, 57),
    (Key::KeyA, 30),
    (Key::KeyB, 48),
    (Key::KeyC, 46),
    (Key::KeyD, 32),
    (Key::KeyE, 18),
    (Key::KeyF, 33),
    (Key::KeyG, 34),
    (Key::KeyH, 35),
    (Key::KeyI, 23),
    (Key::KeyJ, 36),
    (Key::KeyK, 37),
    (Key::KeyL, 38),
    (Key::KeyM, 50),
    (Key::KeyN, 49),
    (Key::KeyO, 24),
    (Key::KeyP, 25),
    (Key::KeyQ, 16),
    (Key::KeyR, 19),
    (Key::KeyS, 31),
    (Key::KeyT, 20),
    (Key::KeyU, 22),
    (Key::KeyV, 47),
    (Key::KeyW, 17),
    (Key::KeyX, 45),
    (Key::KeyY, 21),
    (Key::KeyZ, 44),
    (Key::F1, 59),
    (Key::F2, 60),
    (Key::F3, 61),
    (Key::F4, 62),
    (Key::F5, 63),
    (Key::F6, 64),
    (Key::F7, 65),
    (Key::F8, 66),
    (Key::F9, 67),
    (Key::F10, 68),
    (Key::F11, 87),
    (Key::F12, 88),
];

/// Map an rdev key onto its evdev code; 0 for keys the hotkey cannot use.
fn key_code(key: Key) -> u16 {
    if let Key::Unknown(code) = key {
        return code as u16;
    }
    KEY_CODES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, code)| *code)
        .unwrap_or(0)
}
