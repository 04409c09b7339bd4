//! Conveyor segments and the network that owns them.
//!
//! Each segment occupies one grid cell and carries two ordered lanes of
//! [`TransitItem`]s. The front of a lane is the leading item, nearest the
//! output point. Items never overtake: advancing walks each lane
//! front-to-back and caps every item at the one ahead of it minus the
//! minimum spacing, so a stalled leader backs up its own lane only. The other
//! lane, and the entry of the blocked lane while room remains, keep moving.
//!
//! Hand-offs across segment boundaries live in [`crate::handoff`]; this module
//! only moves items within a segment and maintains connectivity.

use crate::error::SimError;
use crate::fixed::Fixed64;
use crate::grid::{Direction, GridConfig, GridIndex, GridPosition, WorldPos};
use crate::id::{EntityRef, SegmentId};
use crate::item::{LaneId, TransitItem};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Lane
// ---------------------------------------------------------------------------

/// A single-file track. Items are stored front (leading) to back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    items: VecDeque<TransitItem>,
}

impl Lane {
    /// Items from the leading one back to the most recent arrival.
    pub fn items(&self) -> impl Iterator<Item = &TransitItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn front(&self) -> Option<&TransitItem> {
        self.items.front()
    }

    pub fn rear(&self) -> Option<&TransitItem> {
        self.items.back()
    }

    /// Whether a new item can enter at progress 0 without crowding the
    /// rearmost one.
    pub fn has_room(&self, spacing: Fixed64) -> bool {
        self.rear().is_none_or(|rear| rear.progress >= spacing)
    }

    fn push_entry(&mut self, mut item: TransitItem) {
        item.progress = Fixed64::ZERO;
        self.items.push_back(item);
    }

    fn pop_front(&mut self) -> Option<TransitItem> {
        self.items.pop_front()
    }

    fn advance(&mut self, step: Fixed64, spacing: Fixed64) {
        let mut limit = Fixed64::ONE;
        for item in self.items.iter_mut() {
            let target = item.progress.saturating_add(step).min(limit);
            if target > item.progress {
                item.progress = target;
            }
            limit = item.progress - spacing;
        }
    }
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// How an item travelling in some direction enters a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// Same heading as the segment: the item may keep its lane.
    Straight,
    /// Perpendicular: the item joins the lane on the side it arrives from.
    SideLoad(LaneId),
}

impl Entry {
    /// Lane the item lands on, given the lane it travelled on (if any).
    pub fn lane(self, incoming: Option<LaneId>) -> LaneId {
        match self {
            Entry::Straight => incoming.unwrap_or(LaneId::Far),
            Entry::SideLoad(lane) => lane,
        }
    }
}

/// One belt tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConveyorSegment {
    pub position: GridPosition,
    pub direction: Direction,
    /// Cells per second.
    pub speed: Fixed64,
    /// Travel length in cells.
    pub length: Fixed64,
    /// Inactive segments hold their items in place.
    pub active: bool,
    lanes: [Lane; 2],
    connected: Vec<SegmentId>,
}

impl ConveyorSegment {
    pub fn new(position: GridPosition, direction: Direction, speed: Fixed64, length: Fixed64) -> Self {
        Self {
            position,
            direction,
            speed,
            length,
            active: true,
            lanes: [Lane::default(), Lane::default()],
            connected: Vec::new(),
        }
    }

    pub fn lane(&self, lane: LaneId) -> &Lane {
        &self.lanes[lane.index()]
    }

    /// Upstream and downstream neighbours, in N/E/S/W order of their cells.
    pub fn connected(&self) -> &[SegmentId] {
        &self.connected
    }

    pub fn item_count(&self) -> usize {
        self.lanes.iter().map(Lane::len).sum()
    }

    /// The cell this segment delivers into.
    pub fn output_cell(&self) -> GridPosition {
        self.position.step(self.direction)
    }

    /// The cell directly behind this segment.
    pub fn input_cell(&self) -> GridPosition {
        self.position.step(self.direction.opposite())
    }

    pub fn input_point(&self, grid: &GridConfig) -> WorldPos {
        grid.grid_to_world(self.position)
            .offset(self.direction.opposite(), grid.cell_size * 0.5)
    }

    pub fn output_point(&self, grid: &GridConfig) -> WorldPos {
        grid.grid_to_world(self.position)
            .offset(self.direction, grid.cell_size * 0.5)
    }

    /// World position of an item at `progress` on `lane`, for presentation.
    pub fn item_world_pos(&self, lane: LaneId, progress: Fixed64, grid: &GridConfig) -> WorldPos {
        let along = progress.to_num::<f32>() * grid.cell_size;
        let side = match lane {
            LaneId::Far => self.direction.rotate_ccw(),
            LaneId::Close => self.direction.rotate_cw(),
        };
        self.input_point(grid)
            .offset(self.direction, along)
            .offset(side, grid.cell_size * 0.25)
    }

    /// How an item moving in `travel` would enter this segment, or `None`
    /// when it would hit the segment head-on.
    pub fn entry_from(&self, travel: Direction) -> Option<Entry> {
        if travel == self.direction {
            Some(Entry::Straight)
        } else if travel == self.direction.rotate_cw() {
            Some(Entry::SideLoad(LaneId::Far))
        } else if travel == self.direction.rotate_ccw() {
            Some(Entry::SideLoad(LaneId::Close))
        } else {
            None
        }
    }

    /// Whether `lane` can take a new item at its entry.
    pub fn has_room(&self, lane: LaneId, spacing: Fixed64) -> bool {
        self.lanes[lane.index()].has_room(spacing)
    }

    /// Put `item` at progress 0 on `lane`. Hands the item back when the lane
    /// entry is crowded.
    pub(crate) fn insert(
        &mut self,
        lane: LaneId,
        item: TransitItem,
        spacing: Fixed64,
    ) -> Result<(), TransitItem> {
        if !self.has_room(lane, spacing) {
            return Err(item);
        }
        self.lanes[lane.index()].push_entry(item);
        Ok(())
    }

    pub(crate) fn pop_front(&mut self, lane: LaneId) -> Option<TransitItem> {
        self.lanes[lane.index()].pop_front()
    }

    /// Undo a `pop_front` whose delivery failed.
    pub(crate) fn restore_front(&mut self, lane: LaneId, item: TransitItem) {
        self.lanes[lane.index()].items.push_front(item);
    }

    /// Move every item forward by `speed * dt / length`, at most one whole
    /// segment per tick.
    pub(crate) fn advance(&mut self, dt: Fixed64, spacing: Fixed64) {
        if !self.active {
            return;
        }
        let step = self
            .speed
            .saturating_mul(dt)
            .saturating_div(self.length)
            .min(Fixed64::ONE);
        for lane in &mut self.lanes {
            lane.advance(step, spacing);
        }
    }

    /// Take every item off the belt, far lane first.
    pub(crate) fn drain_items(&mut self) -> Vec<TransitItem> {
        self.lanes
            .iter_mut()
            .flat_map(|lane| lane.items.drain(..))
            .collect()
    }
}

/// How items leaving `from` enter `to`, if `to` sits on `from`'s output cell
/// and does not face back into it.
pub fn feeds(from: &ConveyorSegment, to: &ConveyorSegment) -> Option<Entry> {
    if to.position != from.output_cell() {
        return None;
    }
    to.entry_from(from.direction)
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Owns every segment and the items riding on them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConveyorNetwork {
    segments: SlotMap<SegmentId, ConveyorSegment>,
}

impl ConveyorNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: SegmentId) -> Option<&ConveyorSegment> {
        self.segments.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: SegmentId) -> Option<&mut ConveyorSegment> {
        self.segments.get_mut(id)
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.segments.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SegmentId, &ConveyorSegment)> {
        self.segments.iter()
    }

    /// Segment ids in storage order. Hand-offs run in this order every tick.
    pub fn ids(&self) -> Vec<SegmentId> {
        self.segments.keys().collect()
    }

    /// Items currently riding any segment.
    pub fn item_count(&self) -> usize {
        self.segments.values().map(ConveyorSegment::item_count).sum()
    }

    /// Register a segment on a free cell and relink it and its neighbours.
    pub fn place(
        &mut self,
        segment: ConveyorSegment,
        grid: &mut GridIndex,
    ) -> Result<SegmentId, SimError> {
        if segment.speed <= Fixed64::ZERO {
            return Err(SimError::InvalidParameter(format!(
                "conveyor speed must be positive, got {}",
                segment.speed
            )));
        }
        if segment.length <= Fixed64::ZERO {
            return Err(SimError::InvalidParameter(format!(
                "conveyor length must be positive, got {}",
                segment.length
            )));
        }
        grid.ensure_free(segment.position)?;

        let position = segment.position;
        let id = self.segments.insert(segment);
        grid.place(position, EntityRef::Segment(id))?;
        self.relink_around(position, grid);
        Ok(id)
    }

    /// Remove a segment, returning the items it was carrying.
    pub fn remove(
        &mut self,
        id: SegmentId,
        grid: &mut GridIndex,
    ) -> Result<Vec<TransitItem>, SimError> {
        let mut segment = self
            .segments
            .remove(id)
            .ok_or(SimError::NotFound(EntityRef::Segment(id)))?;
        grid.remove(segment.position);
        self.relink_around(segment.position, grid);
        Ok(segment.drain_items())
    }

    pub fn set_active(&mut self, id: SegmentId, active: bool) -> Result<(), SimError> {
        let segment = self
            .segments
            .get_mut(id)
            .ok_or(SimError::NotFound(EntityRef::Segment(id)))?;
        segment.active = active;
        Ok(())
    }

    /// The segment `id` delivers into, with the way items enter it.
    pub fn downstream(&self, id: SegmentId) -> Option<(SegmentId, Entry)> {
        let segment = self.segments.get(id)?;
        segment.connected.iter().find_map(|&other| {
            let next = self.segments.get(other)?;
            feeds(segment, next).map(|entry| (other, entry))
        })
    }

    /// Advance every active segment by `dt` seconds.
    pub fn advance(&mut self, dt: Fixed64, spacing: Fixed64) {
        for segment in self.segments.values_mut() {
            segment.advance(dt, spacing);
        }
    }

    /// Recompute connectivity for the segment at `center` (if any) and every
    /// segment next to it.
    pub(crate) fn relink_around(&mut self, center: GridPosition, grid: &GridIndex) {
        let cells = std::iter::once(center).chain(Direction::all().map(|d| center.step(d)));
        for cell in cells {
            if let Some(EntityRef::Segment(id)) = grid.entity_at(cell) {
                self.relink(id, grid);
            }
        }
    }

    fn relink(&mut self, id: SegmentId, grid: &GridIndex) {
        let Some(segment) = self.segments.get(id) else {
            return;
        };
        let mut connected = Vec::new();
        for (_, neighbour) in grid.neighbors_4(segment.position) {
            let EntityRef::Segment(other_id) = neighbour else {
                continue;
            };
            let Some(other) = self.segments.get(other_id) else {
                continue;
            };
            if feeds(segment, other).is_some() || feeds(other, segment).is_some() {
                connected.push(other_id);
            }
        }
        if let Some(segment) = self.segments.get_mut(id) {
            segment.connected = connected;
        }
    }
}
