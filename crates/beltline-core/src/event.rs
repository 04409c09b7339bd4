//! Simulation events, collected per tick into a bounded log that the caller
//! drains. The core never waits on anyone reading it.

use crate::fixed::Ticks;
use crate::id::{EntityRef, ItemTypeId, StorageId, TransitItemId, UnitId};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Something observable that happened during a tick. Every event carries the
/// tick it happened on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Production --
    ItemProduced {
        unit: UnitId,
        item: TransitItemId,
        item_type: ItemTypeId,
        tick: Ticks,
    },
    ItemsConsumed {
        unit: UnitId,
        item_type: ItemTypeId,
        quantity: u32,
        tick: Ticks,
    },
    UnitStarved {
        unit: UnitId,
        tick: Ticks,
    },

    // -- Storage --
    ItemStored {
        storage: StorageId,
        item_type: ItemTypeId,
        amount: u32,
        tick: Ticks,
    },
    ItemDispensed {
        storage: StorageId,
        item: TransitItemId,
        item_type: ItemTypeId,
        tick: Ticks,
    },

    // -- Topology --
    EntityPlaced {
        entity: EntityRef,
        tick: Ticks,
    },
    EntityRemoved {
        entity: EntityRef,
        tick: Ticks,
    },
    ItemDiscarded {
        entity: EntityRef,
        item_type: ItemTypeId,
        amount: u32,
        tick: Ticks,
    },
}

/// Discriminant of [`Event`], for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ItemProduced,
    ItemsConsumed,
    UnitStarved,
    ItemStored,
    ItemDispensed,
    EntityPlaced,
    EntityRemoved,
    ItemDiscarded,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ItemProduced { .. } => EventKind::ItemProduced,
            Event::ItemsConsumed { .. } => EventKind::ItemsConsumed,
            Event::UnitStarved { .. } => EventKind::UnitStarved,
            Event::ItemStored { .. } => EventKind::ItemStored,
            Event::ItemDispensed { .. } => EventKind::ItemDispensed,
            Event::EntityPlaced { .. } => EventKind::EntityPlaced,
            Event::EntityRemoved { .. } => EventKind::EntityRemoved,
            Event::ItemDiscarded { .. } => EventKind::ItemDiscarded,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            Event::ItemProduced { tick, .. }
            | Event::ItemsConsumed { tick, .. }
            | Event::UnitStarved { tick, .. }
            | Event::ItemStored { tick, .. }
            | Event::ItemDispensed { tick, .. }
            | Event::EntityPlaced { tick, .. }
            | Event::EntityRemoved { tick, .. }
            | Event::ItemDiscarded { tick, .. } => *tick,
        }
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Bounded FIFO of events. When full, the oldest event is dropped.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<Event>,
    capacity: usize,
    total_written: u64,
}

impl EventLog {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events ever pushed, including dropped and drained ones.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Take every buffered event, oldest first.
    pub fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }
}
