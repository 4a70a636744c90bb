use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// All carries, production rates, and efficiency values use this type so the
/// simulation is deterministic; `f64` appears only at API boundaries.
pub type Fixed64 = I32F32;

/// Milliseconds since an arbitrary epoch. Supplied by the caller -- the core
/// never reads a clock.
pub type Millis = u64;

/// Convert an f64 to Fixed64. Use only at API boundaries, never in the sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display/FFI, never in the sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Convert a whole-unit count to Fixed64, saturating at the representable
/// maximum instead of panicking on very large ledgers.
#[inline]
pub fn whole_to_fixed64(v: u64) -> Fixed64 {
    Fixed64::saturating_from_num(v)
}
