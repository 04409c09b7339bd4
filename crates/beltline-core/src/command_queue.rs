//! Deferred mutations.
//!
//! Removals and activity toggles submitted while a frame is in progress are
//! queued here and applied at the start of the next tick, so no phase ever
//! touches an entity that vanished under it.

use crate::id::EntityRef;

/// A mutation applied at the next tick boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Remove the entity, discarding whatever items it holds.
    Remove(EntityRef),
    /// Switch an entity on or off.
    SetActive { entity: EntityRef, active: bool },
}

impl Command {
    pub fn target(&self) -> EntityRef {
        match *self {
            Command::Remove(entity) | Command::SetActive { entity, .. } => entity,
        }
    }
}

/// Commands waiting for the next tick.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    pending: Vec<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push(command);
    }

    /// Take every pending command in submission order.
    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
