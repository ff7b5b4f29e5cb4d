//! Core type definitions for entimap.

use std::fmt;

/// Identifier of a command inside one [`CommandGraph`](crate::CommandGraph).
///
/// Ids are arena indices; they are only meaningful for the graph that
/// issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(pub(crate) usize);

impl CommandId {
    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd:{}", self.0)
    }
}

/// State of a unit of work run.
///
/// `Collecting -> Building -> Executing -> {Committed | RolledBack}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Entities are being scheduled.
    Collecting,
    /// The command graph is being built.
    Building,
    /// Commands are being dispatched to the driver.
    Executing,
    /// The last run committed.
    Committed,
    /// The last run failed and was rolled back.
    RolledBack,
}

impl Phase {
    /// Returns whether the run has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Phase::Committed | Phase::RolledBack)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Collecting => "collecting",
            Phase::Building => "building",
            Phase::Executing => "executing",
            Phase::Committed => "committed",
            Phase::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

/// Counts of the writes issued by one successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Insert statements executed.
    pub inserted: usize,
    /// Update statements executed.
    pub updated: usize,
    /// Delete statements executed.
    pub deleted: usize,
    /// Commands skipped by a false condition.
    pub skipped: usize,
}

impl RunSummary {
    /// Returns the number of statements sent to the driver.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}
