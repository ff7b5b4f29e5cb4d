//! Context carrier types.

use crate::types::CommandId;
use std::fmt;

/// Section of a command payload a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Column values written by the statement.
    Data,
    /// Row selection criteria of updates and deletes.
    Scope,
    /// Values offered to dependents but never written.
    Context,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stream::Data => "data",
            Stream::Scope => "scope",
            Stream::Context => "context",
        };
        f.write_str(name)
    }
}

/// An outstanding context requirement of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    /// Whether the command must fail if the value never arrives.
    pub required: bool,
    /// Where the value is written once resolved.
    pub stream: Stream,
}

/// A producer-to-consumer edge of the command graph.
///
/// Once `producer` has executed, the value of `key` in its context is
/// registered on `consumer` under `target`. If the producer finishes
/// without a value, an optional wait is dropped; a required one stays
/// outstanding and the run fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLink {
    /// Command supplying the value.
    pub producer: CommandId,
    /// Key in the producer's context.
    pub key: String,
    /// Command waiting for the value.
    pub consumer: CommandId,
    /// Key the consumer receives the value under.
    pub target: String,
    /// Whether the consumer requires the value.
    pub required: bool,
    /// Payload section of the consumer the value goes to.
    pub stream: Stream,
}

impl ContextLink {
    /// Creates a required link into the consumer's data.
    pub fn new(
        producer: CommandId,
        key: impl Into<String>,
        consumer: CommandId,
        target: impl Into<String>,
    ) -> Self {
        Self {
            producer,
            key: key.into(),
            consumer,
            target: target.into(),
            required: true,
            stream: Stream::Data,
        }
    }

    /// Sets whether the value is required.
    #[must_use]
    pub fn required(mut self, value: bool) -> Self {
        self.required = value;
        self
    }

    /// Sets the consumer stream.
    #[must_use]
    pub fn stream(mut self, stream: Stream) -> Self {
        self.stream = stream;
        self
    }
}

impl fmt::Display for ContextLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.producer, self.key, self.consumer, self.target
        )
    }
}
