use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits. Every time,
/// speed, timer and progress value inside the simulation uses it.
pub type Fixed64 = I32F32;

/// Completed simulation ticks.
pub type Ticks = u64;

/// Seconds from a float at the boundary (data files, callers). `None` for
/// non-finite or out-of-range input. Not for use inside the tick loop.
pub fn checked_seconds(v: f64) -> Option<Fixed64> {
    if !v.is_finite() {
        return None;
    }
    Fixed64::checked_from_num(v)
}

/// Float seconds for display.
#[inline]
pub fn to_seconds(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Cycle length for something that happens `rate` times per second.
/// `None` unless `rate` is positive.
pub fn period(rate: Fixed64) -> Option<Fixed64> {
    if rate <= Fixed64::ZERO {
        return None;
    }
    Fixed64::ONE.checked_div(rate)
}
