//! Tick index to sqrt-price conversion.
//!
//! A tick `t` names the price `1.0001^t`; its sqrt price is `1.0001^(t/2)`.
//! The conversion multiplies precomputed Q64.64 coefficients for each set bit
//! of `|t|`, then inverts for positive ticks, the standard bit-decomposition
//! used by concentrated-liquidity pools.

use crate::constants::{MAX_SQRT_X64, MAX_TICK, MIN_SQRT_X64, MIN_TICK, ONE_X64};
use crate::core_arithmetic::mul_div;
use crate::error::MathError;

/// `sqrt(1.0001)^(-2^i)` in Q64.64 for bit `i` of the tick magnitude.
const POW2_COEFF: [u128; 19] = [
    0xfffcb933bd6fad38, // bit 0
    0xfff97272373d4132, // bit 1
    0xfff2e50f5f656933, // bit 2
    0xffe5caca7e10e4e6, // bit 3
    0xffcb9843d60f615a, // bit 4
    0xff973b41fa98c081, // bit 5
    0xff2ea16466c96a38, // bit 6
    0xfe5dee046a99a2a8, // bit 7
    0xfcbe86c7900a88af, // bit 8
    0xf987a7253ac41317, // bit 9
    0xf3392b0822b70006, // bit 10
    0xe7159475a2c29b74, // bit 11
    0xd097f3bdfd2022b9, // bit 12
    0xa9f746462d870fe0, // bit 13
    0x70d869a156d2a1b9, // bit 14
    0x31be135f97d08fda, // bit 15
    0x09aa508b5b7a84e2, // bit 16
    0x005d6af8dedb8119, // bit 17
    0x00002216e584f5fa, // bit 18
];

/// Converts a tick index to its sqrt price in Q64.64 format.
///
/// The result is clamped to `[MIN_SQRT_X64, MAX_SQRT_X64]` so boundary ticks
/// never produce a degenerate price.
///
/// # Errors
/// Returns [`MathError::TickOutOfBounds`] when `tick` lies outside
/// `[MIN_TICK, MAX_TICK]`.
pub fn tick_to_sqrt_x64(tick: i32) -> Result<u128, MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::TickOutOfBounds);
    }

    let abs_tick = tick.unsigned_abs();
    let mut ratio = ONE_X64;
    for (bit, coeff) in POW2_COEFF.iter().enumerate() {
        if abs_tick & (1u32 << bit) != 0 {
            ratio = mul_div(ratio, *coeff, ONE_X64)?;
        }
    }

    // The coefficients encode negative exponents; flip for positive ticks.
    if tick > 0 {
        ratio = mul_div(ONE_X64, ONE_X64, ratio)?;
    }

    Ok(ratio.clamp(MIN_SQRT_X64, MAX_SQRT_X64))
}
