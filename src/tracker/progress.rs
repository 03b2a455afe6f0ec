//! Spinner shown in the label of pending evaluations

/// Default spinner frames
pub const DEFAULT_FRAMES: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

/// Progress indicator state
#[derive(Debug, Clone)]
pub struct Progress {
    frames: Vec<String>,
    phase: usize,
    awake: bool,
}

impl Progress {
    /// Create an indicator cycling through `frames` (defaults when empty)
    pub fn new(frames: &[String]) -> Self {
        let frames = if frames.is_empty() {
            DEFAULT_FRAMES.iter().map(|f| f.to_string()).collect()
        } else {
            frames.to_vec()
        };
        Self {
            frames,
            phase: 0,
            awake: false,
        }
    }

    /// Current frame
    pub fn phase(&self) -> &str {
        &self.frames[self.phase % self.frames.len()]
    }

    /// Mark the indicator active
    pub fn wake(&mut self) {
        self.awake = true;
    }

    /// Mark the indicator idle
    pub fn sleep(&mut self) {
        self.awake = false;
    }

    /// Whether anything is being animated
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Move to the next frame
    pub fn advance(&mut self) {
        self.phase = (self.phase + 1) % self.frames.len();
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new(&[])
    }
}
