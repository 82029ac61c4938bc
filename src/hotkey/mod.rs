//! Global toggle hotkey.
//!
//! Key codes are evdev codes on every platform so the saved config is
//! portable; the macOS listener maps rdev keys onto them.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use hands_free::config::HotkeyConfig;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
pub use linux::start_listener;
#[cfg(target_os = "macos")]
pub use macos::start_listener;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn start_listener(
    _sender: async_channel::Sender<()>,
    _shared_hotkey: std::sync::Arc<std::sync::Mutex<HotkeyConfig>>,
) {
    log::warn!("Global hotkey is not supported on this platform");
}

/// Snapshot of the configured hotkey; a poisoned lock still holds a valid config.
pub(crate) fn current_hotkey(shared: &Mutex<HotkeyConfig>) -> HotkeyConfig {
    shared
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Tracks held keys and decides when the combo fires.
#[derive(Debug)]
pub struct HotkeyMatcher {
    held: HashSet<u16>,
    last_trigger: Option<Instant>,
    debounce: Duration,
}

impl Default for HotkeyMatcher {
    fn default() -> Self {
        Self::new(DEBOUNCE)
    }
}

impl HotkeyMatcher {
    pub fn new(debounce: Duration) -> Self {
        Self {
            held: HashSet::new(),
            last_trigger: None,
            debounce,
        }
    }

    /// Record a key press. Returns true when it completes `hotkey` outside
    /// the debounce window.
    pub fn press(&mut self, code: u16, hotkey: &HotkeyConfig, now: Instant) -> bool {
        self.held.insert(code);
        let combo_held = hotkey.modifiers.iter().all(|m| self.held.contains(m))
            && self.held.contains(&hotkey.trigger);
        if !combo_held {
            return false;
        }
        if let Some(last) = self.last_trigger {
            if now.saturating_duration_since(last) <= self.debounce {
                return false;
            }
        }
        self.last_trigger = Some(now);
        true
    }

    pub fn release(&mut self, code: u16) {
        self.held.remove(&code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTRL: u16 = 29;
    const ALT: u16 = 56;
    const H: u16 = 35;

    #[test]
    fn fires_only_with_all_modifiers_held() {
        let hotkey = HotkeyConfig::default();
        let mut matcher = HotkeyMatcher::default();
        let now = Instant::now();

        assert!(!matcher.press(CTRL, &hotkey, now));
        assert!(!matcher.press(H, &hotkey, now));
        matcher.release(H);
        assert!(!matcher.press(ALT, &hotkey, now));
        assert!(matcher.press(H, &hotkey, now));
    }

    #[test]
    fn repeats_inside_debounce_are_ignored() {
        let hotkey = HotkeyConfig::default();
        let mut matcher = HotkeyMatcher::default();
        let start = Instant::now();
        matcher.press(CTRL, &hotkey, start);
        matcher.press(ALT, &hotkey, start);

        assert!(matcher.press(H, &hotkey, start));
        matcher.release(H);
        assert!(!matcher.press(H, &hotkey, start + Duration::from_millis(200)));
        matcher.release(H);
        assert!(matcher.press(H, &hotkey, start + Duration::from_millis(800)));
    }
}
