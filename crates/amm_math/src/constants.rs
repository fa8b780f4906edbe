/// Number of fractional bits in the Q64.64 fixed-point representation.
pub const FRAC_BITS: u32 = 64;

/// The value 1.0 in Q64.64 format.
pub const ONE_X64: u128 = 1u128 << FRAC_BITS;

/// The minimum tick index supported by the valuation math.
///
/// With 64 fractional bits the smallest representable sqrt price bounds the
/// usable tick range at half the classic 887272 span; ticks below this lose
/// all fractional resolution.
pub const MIN_TICK: i32 = -443636;

/// The maximum tick index supported by the valuation math.
pub const MAX_TICK: i32 = 443636;

/// sqrt price at [`MIN_TICK`] in Q64.64 format.
pub const MIN_SQRT_X64: u128 = 4295128739;

/// sqrt price at [`MAX_TICK`] in Q64.64 format, `2^128 / MIN_SQRT_X64`.
pub const MAX_SQRT_X64: u128 = 79225184528499988103237761281;
