//! Storage boxes: a bounded, fungible ledger of resources.
//!
//! Items lose their identity when they are stored. A box can optionally
//! dispense one resource type back out as fresh items through the cell it
//! faces.

use crate::error::{Rejected, SimError};
use crate::grid::{Direction, GridPosition};
use crate::id::{ItemTypeId, TransitItemIdGen};
use crate::item::TransitItem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageBox {
    pub position: GridPosition,
    /// Dispensed items leave through the cell in this direction.
    pub facing: Direction,
    pub active: bool,
    capacity: u32,
    ledger: BTreeMap<ItemTypeId, u32>,
    dispense: Option<ItemTypeId>,
    output: Option<TransitItem>,
}

impl StorageBox {
    pub fn new(position: GridPosition, facing: Direction, capacity: u32) -> Self {
        Self {
            position,
            facing,
            active: true,
            capacity,
            ledger: BTreeMap::new(),
            dispense: None,
            output: None,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Stored units of one resource.
    pub fn amount(&self, item_type: ItemTypeId) -> u32 {
        self.ledger.get(&item_type).copied().unwrap_or(0)
    }

    /// Stored units across every resource.
    pub fn total(&self) -> u32 {
        self.ledger.values().sum()
    }

    pub fn free_space(&self) -> u32 {
        self.capacity.saturating_sub(self.total())
    }

    /// Non-empty ledger entries in item-type order.
    pub fn ledger(&self) -> impl Iterator<Item = (ItemTypeId, u32)> + '_ {
        self.ledger.iter().map(|(&ty, &n)| (ty, n))
    }

    pub fn can_accept(&self, amount: u32) -> bool {
        self.total().checked_add(amount).is_some_and(|t| t <= self.capacity)
    }

    /// Merge an item into the ledger. Returns the units absorbed.
    pub fn give_item(&mut self, item: TransitItem) -> Result<u32, Rejected> {
        let stored = self.total();
        if !self.can_accept(item.amount) {
            return Err(Rejected {
                reason: SimError::CapacityExceeded {
                    stored,
                    incoming: item.amount,
                    capacity: self.capacity,
                },
                item,
            });
        }
        *self.ledger.entry(item.item_type).or_insert(0) += item.amount;
        Ok(item.amount)
    }

    /// Withdraw exactly `amount` units, or nothing.
    pub fn take_resource(&mut self, item_type: ItemTypeId, amount: u32) -> Result<u32, SimError> {
        let available = self.amount(item_type);
        if available < amount {
            return Err(SimError::InsufficientStock {
                item_type,
                requested: amount,
                available,
            });
        }
        let left = available - amount;
        if left == 0 {
            self.ledger.remove(&item_type);
        } else {
            self.ledger.insert(item_type, left);
        }
        Ok(amount)
    }

    pub fn dispense(&self) -> Option<ItemTypeId> {
        self.dispense
    }

    /// Choose the resource re-emitted through the output slot, or stop.
    pub fn set_dispense(&mut self, item_type: Option<ItemTypeId>) {
        self.dispense = item_type;
    }

    pub fn output(&self) -> Option<&TransitItem> {
        self.output.as_ref()
    }

    /// The cell dispensed items are delivered into.
    pub fn output_cell(&self) -> GridPosition {
        self.position.step(self.facing)
    }

    /// Move one unit of the dispensed resource into an empty output slot.
    /// Returns the new item when a unit was moved.
    pub(crate) fn refill_output(&mut self, ids: &mut TransitItemIdGen) -> Option<&TransitItem> {
        if !self.active || self.output.is_some() {
            return None;
        }
        let item_type = self.dispense?;
        self.take_resource(item_type, 1).ok()?;
        self.output = Some(TransitItem::new(ids.allocate(), item_type, 1));
        self.output.as_ref()
    }

    pub(crate) fn take_output(&mut self) -> Option<TransitItem> {
        self.output.take()
    }

    pub(crate) fn restore_output(&mut self, item: TransitItem) {
        self.output = Some(item);
    }

    /// Empty the box. Returns the waiting output item and the ledger units
    /// that were dropped with it.
    pub(crate) fn drain(&mut self) -> (Option<TransitItem>, u32) {
        let units = self.total();
        self.ledger.clear();
        (self.output.take(), units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TransitItemId;

    const ORE: ItemTypeId = ItemTypeId(0);
    const COAL: ItemTypeId = ItemTypeId(1);

    fn boxed(capacity: u32) -> StorageBox {
        StorageBox::new(GridPosition::new(0, 0), Direction::East, capacity)
    }

    fn item(id: u64, item_type: ItemTypeId, amount: u32) -> TransitItem {
        TransitItem::new(TransitItemId(id), item_type, amount)
    }

    #[test]
    fn give_merges_into_ledger() {
        let mut store = boxed(10);
        assert_eq!(store.give_item(item(0, ORE, 3)), Ok(3));
        store.give_item(item(1, ORE, 2)).unwrap();
        store.give_item(item(2, COAL, 1)).unwrap();
        assert_eq!(store.amount(ORE), 5);
        assert_eq!(store.amount(COAL), 1);
        assert_eq!(store.total(), 6);
        assert_eq!(store.free_space(), 4);
    }

    #[test]
    fn give_over_capacity_returns_item() {
        let mut store = boxed(4);
        store.give_item(item(0, ORE, 3)).unwrap();
        let rejected = store.give_item(item(1, COAL, 2)).unwrap_err();
        assert_eq!(
            rejected.reason,
            SimError::CapacityExceeded {
                stored: 3,
                incoming: 2,
                capacity: 4,
            }
        );
        assert_eq!(rejected.item.id, TransitItemId(1));
        assert_eq!(store.total(), 3);
    }

    #[test]
    fn take_is_all_or_nothing() {
        let mut store = boxed(10);
        store.give_item(item(0, ORE, 3)).unwrap();
        let err = store.take_resource(ORE, 4).unwrap_err();
        assert_eq!(
            err,
            SimError::InsufficientStock {
                item_type: ORE,
                requested: 4,
                available: 3,
            }
        );
        assert_eq!(store.amount(ORE), 3);
        assert_eq!(store.take_resource(ORE, 3), Ok(3));
        assert_eq!(store.ledger().count(), 0);
    }

    #[test]
    fn dispenser_emits_one_unit_at_a_time() {
        let mut ids = TransitItemIdGen::new();
        let mut store = boxed(10);
        store.give_item(item(0, ORE, 2)).unwrap();
        assert!(store.refill_output(&mut ids).is_none());

        store.set_dispense(Some(ORE));
        let emitted = store.refill_output(&mut ids).map(|i| i.item_type);
        assert_eq!(emitted, Some(ORE));
        assert_eq!(store.amount(ORE), 1);
        // Slot occupied: nothing more moves.
        assert!(store.refill_output(&mut ids).is_none());
        assert_eq!(store.amount(ORE), 1);

        store.take_output().unwrap();
        store.refill_output(&mut ids).unwrap();
        store.take_output().unwrap();
        assert!(store.refill_output(&mut ids).is_none());
    }

    #[test]
    fn drain_reports_dropped_units() {
        let mut ids = TransitItemIdGen::new();
        let mut store = boxed(10);
        store.give_item(item(0, ORE, 4)).unwrap();
        store.set_dispense(Some(ORE));
        store.refill_output(&mut ids);
        let (out, units) = store.drain();
        assert!(out.is_some());
        assert_eq!(units, 3);
        assert_eq!(store.total(), 0);
    }
}
