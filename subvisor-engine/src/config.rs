//! Engine configuration.

/// Configuration for the Subvisor engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Trailing-edge debounce for remote saves (ms)
    pub save_debounce_ms: u64,
    /// Entries retained in the activity log
    pub activity_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 800,
            activity_capacity: 20,
        }
    }
}

impl EngineConfig {
    /// Set the save debounce.
    pub fn with_save_debounce_ms(mut self, ms: u64) -> Self {
        self.save_debounce_ms = ms;
        self
    }

    /// Set the activity log capacity.
    pub fn with_activity_capacity(mut self, capacity: usize) -> Self {
        self.activity_capacity = capacity;
        self
    }
}
