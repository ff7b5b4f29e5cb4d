//! Command graph arena.

use super::{AtomicCommand, Command, ContextLink};
use crate::error::{CoreError, CoreResult};
use crate::heap::Heap;
use crate::types::CommandId;
use std::collections::HashSet;

/// An arena of commands plus the context links between them.
///
/// Commands are addressed by [`CommandId`]. Composites reference children
/// by id, so the structure is inspectable without executing anything.
///
/// # Example
///
/// ```rust
/// use entimap_core::{AtomicCommand, CommandGraph, ContextLink};
/// use entimap_driver::Row;
///
/// let mut graph = CommandGraph::new();
/// let user = graph.push(AtomicCommand::insert("user", "id", Row::new()));
/// let post = graph.push(AtomicCommand::insert("post", "id", Row::new()));
/// graph.link(ContextLink::new(user, "id", post, "user_id")).unwrap();
/// let root = graph.sequence(vec![user, post]);
///
/// assert!(graph.is_ready(user));
/// assert!(!graph.is_ready(post));
/// assert!(!graph.is_ready(root));
/// ```
#[derive(Debug, Default)]
pub struct CommandGraph {
    commands: Vec<Command>,
    links: Vec<ContextLink>,
    root: Option<CommandId>,
}

impl CommandGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command.
    pub fn push(&mut self, command: impl Into<Command>) -> CommandId {
        self.commands.push(command.into());
        CommandId(self.commands.len() - 1)
    }

    /// Adds a `Nil` placeholder to be replaced later.
    pub fn reserve(&mut self) -> CommandId {
        self.push(Command::Nil)
    }

    /// Replaces a command.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `id` or a child id is not in the graph.
    pub fn replace(&mut self, id: CommandId, command: Command) -> CoreResult<()> {
        if let Some(child) = command.children().into_iter().find(|c| !self.contains(*c)) {
            return Err(CoreError::invalid_operation(format!(
                "{child} is not part of the graph"
            )));
        }
        let slot = self
            .commands
            .get_mut(id.0)
            .ok_or_else(|| CoreError::invalid_operation(format!("{id} is not part of the graph")))?;
        *slot = command;
        Ok(())
    }

    /// Adds a sequence. Empty sequences collapse to `Nil`, single-child
    /// sequences to the child.
    pub fn sequence(&mut self, mut children: Vec<CommandId>) -> CommandId {
        match children.len() {
            0 => self.push(Command::Nil),
            1 => children.remove(0),
            _ => self.push(Command::Sequence(children)),
        }
    }

    /// Adds a conditional around `inner`.
    pub fn conditional(&mut self, condition: super::Condition, inner: CommandId) -> CommandId {
        self.push(Command::Conditional {
            condition,
            inner,
            decision: None,
        })
    }

    /// Adds a context link and makes the consumer wait for it.
    ///
    /// Returns `false` without recording anything if the consumer is not
    /// an atomic command (a mapper chose to write nothing).
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if either end is not in the graph.
    pub fn link(&mut self, link: ContextLink) -> CoreResult<bool> {
        if !self.contains(link.producer) || !self.contains(link.consumer) {
            return Err(CoreError::invalid_operation(format!(
                "link {link} references a command outside the graph"
            )));
        }
        let Some(consumer) = self.atomic_mut(link.consumer) else {
            return Ok(false);
        };
        consumer.wait_context(link.target.clone(), link.required, link.stream);
        self.links.push(link);
        Ok(true)
    }

    /// Returns whether `id` belongs to this graph.
    #[must_use]
    pub fn contains(&self, id: CommandId) -> bool {
        id.0 < self.commands.len()
    }

    /// Returns a command.
    #[must_use]
    pub fn get(&self, id: CommandId) -> Option<&Command> {
        self.commands.get(id.0)
    }

    /// Returns a command mutably.
    pub fn get_mut(&mut self, id: CommandId) -> Option<&mut Command> {
        self.commands.get_mut(id.0)
    }

    /// Returns an atomic command.
    #[must_use]
    pub fn atomic(&self, id: CommandId) -> Option<&AtomicCommand> {
        self.get(id).and_then(Command::as_atomic)
    }

    /// Returns an atomic command mutably.
    pub fn atomic_mut(&mut self, id: CommandId) -> Option<&mut AtomicCommand> {
        self.get_mut(id).and_then(Command::as_atomic_mut)
    }

    /// Iterates over atomic commands in insertion order.
    pub fn atomics(&self) -> impl Iterator<Item = (CommandId, &AtomicCommand)> {
        self.commands
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_atomic().map(|a| (CommandId(i), a)))
    }

    /// Sets the command execution starts from.
    pub fn set_root(&mut self, id: CommandId) {
        self.root = Some(id);
    }

    /// Returns the root command.
    #[must_use]
    pub fn root(&self) -> Option<CommandId> {
        self.root
    }

    /// Returns the context links.
    #[must_use]
    pub fn links(&self) -> &[ContextLink] {
        &self.links
    }

    /// Returns the number of commands, composites included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns whether the graph has no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Returns the number of atomic commands.
    #[must_use]
    pub fn atomic_count(&self) -> usize {
        self.atomics().count()
    }

    /// Returns whether a command and all its descendants are ready.
    #[must_use]
    pub fn is_ready(&self, id: CommandId) -> bool {
        match self.get(id) {
            Some(Command::Atomic(command)) => command.is_ready(),
            Some(Command::Sequence(children)) => children.iter().all(|c| self.is_ready(*c)),
            Some(Command::Conditional { inner, .. }) => self.is_ready(*inner),
            Some(Command::Nil) | None => true,
        }
    }

    /// Returns whether a command has finished.
    ///
    /// Skipped atomics and conditionals decided false count as executed.
    #[must_use]
    pub fn is_executed(&self, id: CommandId) -> bool {
        match self.get(id) {
            Some(Command::Atomic(command)) => command.is_finalized(),
            Some(Command::Sequence(children)) => children.iter().all(|c| self.is_executed(*c)),
            Some(Command::Conditional {
                inner, decision, ..
            }) => match decision {
                Some(true) => self.is_executed(*inner),
                Some(false) => true,
                None => false,
            },
            Some(Command::Nil) | None => true,
        }
    }

    /// Returns the atomic commands beneath `id`, in declaration order.
    #[must_use]
    pub fn subtree_atomics(&self, id: CommandId) -> Vec<CommandId> {
        let mut found = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.get(current) {
                Some(Command::Atomic(_)) => found.push(current),
                Some(command) => stack.extend(command.children().into_iter().rev()),
                None => {}
            }
        }
        found
    }

    /// Checks that every wait has a producer.
    ///
    /// Optional waits without a live producer are dropped.
    ///
    /// # Errors
    ///
    /// Returns `RequiredContextUnresolved` for a required wait that no
    /// link can ever satisfy.
    pub fn validate(&mut self) -> CoreResult<()> {
        let nil_producers: HashSet<CommandId> = self
            .links
            .iter()
            .map(|l| l.producer)
            .filter(|p| self.get(*p).is_some_and(Command::is_nil))
            .collect();

        let links = &self.links;
        for (index, command) in self.commands.iter_mut().enumerate() {
            let Command::Atomic(atomic) = command else {
                continue;
            };
            let id = CommandId(index);
            let waits: Vec<(String, bool)> = atomic
                .waits()
                .iter()
                .map(|(key, wait)| (key.clone(), wait.required))
                .collect();

            for (key, required) in waits {
                let fed = links.iter().any(|l| {
                    l.consumer == id && l.target == key && !nil_producers.contains(&l.producer)
                });
                if fed {
                    continue;
                }
                if required {
                    return Err(CoreError::unresolved(atomic.table(), key));
                }
                atomic.cancel_wait(&key);
            }
        }
        Ok(())
    }

    /// Prepares every atomic command for execution.
    pub fn seal(&mut self, heap: &mut Heap) {
        for command in &mut self.commands {
            if let Command::Atomic(atomic) = command {
                atomic.seal(heap);
            }
        }
    }

    /// Completes every executed atomic command, in insertion order.
    pub fn complete(&mut self, heap: &mut Heap) {
        for command in &mut self.commands {
            if let Command::Atomic(atomic) = command {
                atomic.complete(heap);
            }
        }
    }

    /// Rolls back every atomic command, executed or not.
    pub fn roll_back(&mut self, heap: &mut Heap) {
        for command in self.commands.iter_mut().rev() {
            match command {
                Command::Atomic(atomic) => atomic.roll_back(heap),
                Command::Conditional { decision, .. } => *decision = None,
                Command::Sequence(_) | Command::Nil => {}
            }
        }
    }

    /// Returns a short description of a command for diagnostics.
    #[must_use]
    pub fn describe(&self, id: CommandId) -> String {
        match self.get(id) {
            Some(Command::Atomic(command)) => format!("{command} ({id})"),
            Some(Command::Sequence(children)) => format!("sequence of {} ({id})", children.len()),
            Some(Command::Conditional { .. }) => format!("conditional ({id})"),
            Some(Command::Nil) => format!("nil ({id})"),
            None => format!("unknown ({id})"),
        }
    }
}
