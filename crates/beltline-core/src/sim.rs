//! Simulation clock, configuration and state hashing.
//!
//! The factory is parameterized by a [`SimulationStrategy`] that determines how
//! wall-clock time maps onto ticks. Both strategies execute the same pipeline;
//! they differ only in how many ticks run per `advance()` call and with what
//! `dt`.

use crate::fixed::{Fixed64, Ticks};
use crate::grid::GridConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Simulation strategy
// ---------------------------------------------------------------------------

/// How the factory advances time. Chosen at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimulationStrategy {
    /// One tick per `advance(dt)` call, using the caller's `dt` directly.
    Variable,

    /// `advance(dt)` accumulates elapsed time and runs as many ticks of
    /// `timestep` as fit, carrying the remainder forward.
    Fixed { timestep: Fixed64 },
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables shared by every system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// `dt` used by `Factory::step()`, in seconds.
    pub tick_seconds: Fixed64,
    pub grid: GridConfig,
    /// Length of one conveyor segment in cells.
    pub segment_length: Fixed64,
    /// Minimum gap between consecutive items on a lane, as a fraction of a
    /// segment. Also the room a lane needs at its entry before accepting.
    pub min_item_spacing: Fixed64,
    /// Machine input buffers hold this many cycles' worth of each input.
    pub input_buffer_cycles: u32,
    /// Events kept before the oldest are dropped.
    pub event_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_seconds: Fixed64::ONE / Fixed64::from_num(64),
            grid: GridConfig::default(),
            segment_length: Fixed64::ONE,
            min_item_spacing: Fixed64::from_num(0.25),
            input_buffer_cycles: 2,
            event_capacity: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable clock state tracked by the factory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimState {
    /// Ticks completed so far.
    pub tick: Ticks,
    /// Simulated seconds elapsed.
    pub elapsed: Fixed64,
    /// Time carried between `advance()` calls in fixed mode.
    pub accumulator: Fixed64,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of a `Factory::advance()` call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AdvanceResult {
    /// Ticks actually executed.
    pub ticks_run: u64,
    /// Queued commands applied at tick boundaries during this call.
    pub commands_applied: usize,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A deterministic FNV-1a (64-bit) hash of simulation state, for spotting
/// divergence between runs or a lossy save/load. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
