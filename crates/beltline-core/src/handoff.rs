//! Moving items across entity boundaries.
//!
//! A hand-off either moves the whole item into its target or leaves the
//! source exactly as it was. A belt item that cannot move stays at progress 1
//! and is retried next tick; a unit or dispenser keeps its output slot full.

use crate::conveyor::Entry;
use crate::error::{Rejected, SimError};
use crate::event::Event;
use crate::factory::Factory;
use crate::fixed::Fixed64;
use crate::grid::{Direction, GridPosition};
use crate::id::{EntityRef, SegmentId, StorageId, UnitId};
use crate::item::{LaneId, TransitItem};
use crate::production::UnitKind;
use tracing::{trace, warn};

/// Where an item leaving some entity would go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffTarget {
    /// Entry of a belt lane.
    Segment { id: SegmentId, lane: LaneId },
    /// A machine's input buffer.
    Machine(UnitId),
    /// A storage ledger.
    Storage(StorageId),
}

impl Factory {
    /// Try to move the leading item of `lane` on segment `from` into the next
    /// entity. Returns whether an item moved. An item that is not at the end
    /// of the belt, or has nowhere to go, stays put.
    pub fn try_handoff(&mut self, from: SegmentId, lane: LaneId) -> Result<bool, SimError> {
        let segment = self
            .network
            .get(from)
            .ok_or(SimError::NotFound(EntityRef::Segment(from)))?;
        if !segment.active {
            return Ok(false);
        }
        let Some(front) = segment.lane(lane).front() else {
            return Ok(false);
        };
        if !front.at_output() {
            return Ok(false);
        }

        let target = match self.network.downstream(from) {
            Some((next, entry)) => Some(HandoffTarget::Segment {
                id: next,
                lane: entry.lane(Some(lane)),
            }),
            None => self.entity_target(segment.output_cell(), segment.direction, Some(lane)),
        };
        let Some(target) = target else {
            trace!(segment = ?from, ?lane, "belt end has no target");
            return Ok(false);
        };
        if !self.target_has_room(target, front) {
            trace!(segment = ?from, ?lane, ?target, "belt item blocked");
            return Ok(false);
        }

        let Some(item) = self
            .network
            .get_mut(from)
            .and_then(|segment| segment.pop_front(lane))
        else {
            return Ok(false);
        };
        match self.deliver(target, item) {
            Ok(()) => Ok(true),
            Err(rejected) => {
                // Room was checked above; put the item back where it was.
                self.return_to_lane(from, lane, rejected.item);
                Ok(false)
            }
        }
    }

    /// Where an item leaving through `cell` while travelling in `travel`
    /// would land, if anything there can take items.
    pub fn entity_target(
        &self,
        cell: GridPosition,
        travel: Direction,
        incoming: Option<LaneId>,
    ) -> Option<HandoffTarget> {
        match self.grid.entity_at(cell)? {
            EntityRef::Segment(id) => {
                let segment = self.network.get(id)?;
                segment.entry_from(travel).map(|entry: Entry| HandoffTarget::Segment {
                    id,
                    lane: entry.lane(incoming),
                })
            }
            EntityRef::Unit(id) => {
                let unit = self.units.get(id)?;
                (unit.kind() == UnitKind::Machine).then_some(HandoffTarget::Machine(id))
            }
            EntityRef::Storage(id) => Some(HandoffTarget::Storage(id)),
        }
    }

    fn target_has_room(&self, target: HandoffTarget, item: &TransitItem) -> bool {
        match target {
            HandoffTarget::Segment { id, lane } => self
                .network
                .get(id)
                .is_some_and(|seg| seg.has_room(lane, self.config.min_item_spacing)),
            HandoffTarget::Machine(id) => self
                .units
                .get(id)
                .is_some_and(|unit| unit.active && unit.can_accept(item.item_type)),
            HandoffTarget::Storage(id) => self
                .storages
                .get(id)
                .is_some_and(|store| store.active && store.can_accept(item.amount)),
        }
    }

    fn deliver(&mut self, target: HandoffTarget, item: TransitItem) -> Result<(), Rejected> {
        let missing = |entity: EntityRef, item: TransitItem| Rejected {
            reason: SimError::NotFound(entity),
            item,
        };
        match target {
            HandoffTarget::Segment { id, lane } => {
                let spacing = self.config.min_item_spacing;
                let Some(segment) = self.network.get_mut(id) else {
                    return Err(missing(EntityRef::Segment(id), item));
                };
                let queued = segment.lane(lane).len() as u32;
                segment.insert(lane, item, spacing).map_err(|item| Rejected {
                    reason: SimError::CapacityExceeded {
                        stored: queued,
                        incoming: 1,
                        capacity: queued,
                    },
                    item,
                })
            }
            HandoffTarget::Machine(id) => {
                let Some(unit) = self.units.get_mut(id) else {
                    return Err(missing(EntityRef::Unit(id), item));
                };
                unit.accept_input(item)
            }
            HandoffTarget::Storage(id) => {
                let Some(store) = self.storages.get_mut(id) else {
                    return Err(missing(EntityRef::Storage(id), item));
                };
                let item_type = item.item_type;
                let amount = store.give_item(item)?;
                self.stats.stored += u64::from(amount);
                self.events.push(Event::ItemStored {
                    storage: id,
                    item_type,
                    amount,
                    tick: self.sim_state.tick,
                });
                Ok(())
            }
        }
    }

    fn return_to_lane(&mut self, segment: SegmentId, lane: LaneId, mut item: TransitItem) {
        if let Some(seg) = self.network.get_mut(segment) {
            item.progress = Fixed64::ONE;
            seg.restore_front(lane, item);
        }
    }

    /// Run every hand-off for this tick: belt fronts, then unit outputs, then
    /// storage dispensers.
    pub(crate) fn phase_handoffs(&mut self) {
        for id in self.network.ids() {
            for lane in LaneId::ALL {
                if let Err(err) = self.try_handoff(id, lane) {
                    warn!(segment = ?id, ?lane, %err, "hand-off skipped");
                }
            }
        }

        let unit_ids: Vec<UnitId> = self.units.keys().collect();
        for id in unit_ids {
            self.push_unit_output(id);
        }

        let storage_ids: Vec<StorageId> = self.storages.keys().collect();
        for id in storage_ids {
            self.push_dispenser_output(id);
        }
    }

    fn push_unit_output(&mut self, id: UnitId) {
        let Some(unit) = self.units.get(id) else {
            return;
        };
        let Some(item) = unit.output() else {
            return;
        };
        let Some(target) = self.entity_target(unit.output_cell(), unit.facing, None) else {
            return;
        };
        if !self.target_has_room(target, item) {
            trace!(unit = ?id, ?target, "unit output blocked");
            return;
        }
        let Some(item) = self.units.get_mut(id).and_then(|u| u.take_item()) else {
            return;
        };
        if let Err(rejected) = self.deliver(target, item)
            && let Some(unit) = self.units.get_mut(id)
        {
            unit.restore_output(rejected.item);
        }
    }

    fn push_dispenser_output(&mut self, id: StorageId) {
        let tick = self.sim_state.tick;
        let Some(store) = self.storages.get_mut(id) else {
            return;
        };
        if let Some(item) = store.refill_output(&mut self.item_ids) {
            self.stats.dispensed += u64::from(item.amount);
            self.events.push(Event::ItemDispensed {
                storage: id,
                item: item.id,
                item_type: item.item_type,
                tick,
            });
        }

        let Some(store) = self.storages.get(id) else {
            return;
        };
        let Some(item) = store.output() else {
            return;
        };
        let Some(target) = self.entity_target(store.output_cell(), store.facing, None) else {
            return;
        };
        // A box never feeds itself or another box directly.
        if matches!(target, HandoffTarget::Storage(_)) || !self.target_has_room(target, item) {
            return;
        }
        let Some(item) = self.storages.get_mut(id).and_then(|s| s.take_output()) else {
            return;
        };
        if let Err(rejected) = self.deliver(target, item)
            && let Some(store) = self.storages.get_mut(id)
        {
            store.restore_output(rejected.item);
        }
    }
}
