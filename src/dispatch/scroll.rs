/// Default distance scrolled per displayed frame.
pub const DEFAULT_STEP_PX: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    /// Page-space sign: scrolling up moves content toward the top.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Up => -1.0,
            Self::Down => 1.0,
        }
    }
}

/// State of the self-rescheduling scroll-step loop.
///
/// Each newly started loop gets a fresh epoch. A scheduled step carries the
/// epoch it was started with and does nothing once that loop has been stopped
/// or replaced, so a late callback can never scroll.
#[derive(Debug, Clone)]
pub struct ScrollLoop {
    direction: Option<ScrollDirection>,
    running: bool,
    epoch: u64,
    step_px: f64,
}

impl Default for ScrollLoop {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_PX)
    }
}

impl ScrollLoop {
    pub fn new(step_px: f64) -> Self {
        Self {
            direction: None,
            running: false,
            epoch: 0,
            step_px,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn direction(&self) -> Option<ScrollDirection> {
        self.direction
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Scroll in `direction`. Returns the epoch of a newly started loop, or
    /// `None` when a loop is already running (its direction is updated).
    pub fn start(&mut self, direction: ScrollDirection) -> Option<u64> {
        self.direction = Some(direction);
        if self.running {
            return None;
        }
        self.running = true;
        self.epoch += 1;
        Some(self.epoch)
    }

    /// Returns whether a loop was running.
    pub fn stop(&mut self) -> bool {
        let was_running = self.running;
        self.running = false;
        self.direction = None;
        was_running
    }

    /// One frame of scrolling for the loop started with `epoch`. `None` means
    /// that loop is over and must not reschedule.
    pub fn step(&self, epoch: u64) -> Option<f64> {
        if !self.running || epoch != self.epoch {
            return None;
        }
        self.direction.map(|d| d.sign() * self.step_px)
    }
}
