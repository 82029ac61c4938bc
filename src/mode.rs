use serde::{Deserialize, Serialize};

/// Where hands-free mode is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeState {
    #[default]
    Off,
    /// Waiting for the user to allow camera access.
    Requesting,
    Active,
}

impl ModeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Requesting => "requesting",
            Self::Active => "active",
        }
    }
}

/// Single-writer state machine for [`ModeState`].
///
/// Every transition returns `true` only when the state actually changed, so
/// callers can emit exactly one notification per change.
#[derive(Debug, Default)]
pub struct ModeMachine {
    state: ModeState,
}

impl ModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ModeState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ModeState::Active
    }

    /// Off -> Requesting.
    pub fn enter(&mut self) -> bool {
        self.set_if(ModeState::Off, ModeState::Requesting)
    }

    /// Off -> Requesting, Requesting/Active -> Off.
    pub fn toggle(&mut self) -> bool {
        match self.state {
            ModeState::Off => self.set(ModeState::Requesting),
            ModeState::Requesting | ModeState::Active => self.set(ModeState::Off),
        }
    }

    /// Requesting -> Active.
    pub fn grant(&mut self) -> bool {
        self.set_if(ModeState::Requesting, ModeState::Active)
    }

    /// Any -> Off after a permission refusal.
    pub fn deny(&mut self) -> bool {
        self.set(ModeState::Off)
    }

    /// Requesting -> Off.
    pub fn cancel(&mut self) -> bool {
        self.set_if(ModeState::Requesting, ModeState::Off)
    }

    /// Any -> Off.
    pub fn exit(&mut self) -> bool {
        self.set(ModeState::Off)
    }

    fn set_if(&mut self, from: ModeState, to: ModeState) -> bool {
        if self.state != from {
            return false;
        }
        self.set(to)
    }

    fn set(&mut self, to: ModeState) -> bool {
        if self.state == to {
            return false;
        }
        log::info!("Mode {} -> {}", self.state.as_str(), to.as_str());
        self.state = to;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut m = ModeMachine::new();
        assert!(m.enter());
        assert_eq!(m.state(), ModeState::Requesting);
        assert!(m.grant());
        assert!(m.is_active());
        assert!(m.exit());
        assert_eq!(m.state(), ModeState::Off);
    }

    #[test]
    fn toggle_cycles() {
        let mut m = ModeMachine::new();
        assert!(m.toggle());
        assert_eq!(m.state(), ModeState::Requesting);
        assert!(m.toggle());
        assert_eq!(m.state(), ModeState::Off);

        m.enter();
        m.grant();
        assert!(m.toggle());
        assert_eq!(m.state(), ModeState::Off);
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let mut m = ModeMachine::new();
        assert!(!m.grant());
        assert!(!m.cancel());
        assert!(!m.exit());
        m.enter();
        assert!(!m.enter());
        m.grant();
        assert!(!m.cancel());
        assert!(m.is_active());
    }

    #[test]
    fn deny_returns_to_off_once() {
        let mut m = ModeMachine::new();
        m.enter();
        assert!(m.deny());
        assert!(!m.deny());
        assert_eq!(m.state(), ModeState::Off);
    }
}
