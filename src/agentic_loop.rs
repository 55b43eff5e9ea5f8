use tracing::info;

/// Manages the state and lifecycle of an unattended run of dialog turns
pub struct AgenticLoop {
    active: bool,
    turns: usize,
    max_turns: usize,
}

impl AgenticLoop {
    pub fn new(max_turns: usize) -> Self {
        Self {
            active: false,
            turns: 0,
            max_turns,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn start(&mut self) {
        info!(max_turns = self.max_turns, "autonomous run starting");
        self.turns = 0;
        self.active = self.max_turns > 0;
    }

    /// Start again with a fresh budget of `max_turns`
    pub fn restart(&mut self, max_turns: usize) {
        self.max_turns = max_turns;
        self.start();
    }

    pub fn stop(&mut self, reason: &str) {
        info!(reason, turns = self.turns, "autonomous run stopping");
        self.active = false;
    }

    pub fn increment_turn(&mut self) {
        self.turns += 1;
        info!(turn = self.turns, max_turns = self.max_turns, "autonomous turn finished");

        if self.turns >= self.max_turns {
            self.stop(&format!("reached max turns ({})", self.max_turns));
        }
    }
}
