//! Unit of work configuration.

/// Configuration for an [`Orm`](crate::Orm).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Drop `DELETED` records from the identity map after a successful run.
    ///
    /// When false, deleted entities stay tracked so callers can inspect
    /// them until their scope ends.
    pub evict_deleted: bool,

    /// Maximum number of atomic commands in one run (0 = unlimited).
    pub max_commands: usize,

    /// Emit a debug event for every dispatched statement.
    pub trace_statements: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            evict_deleted: false,
            max_commands: 0,
            trace_statements: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether deleted records are evicted after a run.
    #[must_use]
    pub const fn evict_deleted(mut self, value: bool) -> Self {
        self.evict_deleted = value;
        self
    }

    /// Sets the maximum number of atomic commands per run.
    #[must_use]
    pub const fn max_commands(mut self, limit: usize) -> Self {
        self.max_commands = limit;
        self
    }

    /// Sets whether dispatched statements are traced.
    #[must_use]
    pub const fn trace_statements(mut self, value: bool) -> Self {
        self.trace_statements = value;
        self
    }

    /// Returns whether `commands` exceeds the configured limit.
    #[must_use]
    pub const fn exceeds_limit(&self, commands: usize) -> bool {
        self.max_commands != 0 && commands > self.max_commands
    }
}
