//! Overflow-safe multiply-divide primitives.
//!
//! Every product of two `u128` values runs through a `U256` intermediate so
//! that `(a * b) / c` is exact whenever the final quotient fits in 128 bits.
//! Floor rounding is the default; [`mul_div_round_up`] exists for the few
//! call sites that must never under-credit.

use crate::constants::FRAC_BITS;
use crate::error::MathError;
use primitive_types::U256;

/// Computes `a * b / c` with full 256-bit intermediate precision, rounding
/// toward zero.
///
/// # Errors
/// Returns [`MathError::DivisionByZero`] when `c == 0` and
/// [`MathError::Overflow`] when the quotient exceeds `u128::MAX`.
#[inline(always)]
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, MathError> {
    if c == 0 {
        return Err(MathError::DivisionByZero);
    }
    let result = U256::from(a) * U256::from(b) / U256::from(c);
    to_u128(result)
}

/// Computes `a * b / c` rounding away from zero.
///
/// # Errors
/// Same conditions as [`mul_div`].
#[inline(always)]
pub fn mul_div_round_up(a: u128, b: u128, c: u128) -> Result<u128, MathError> {
    if c == 0 {
        return Err(MathError::DivisionByZero);
    }
    let prod = U256::from(a) * U256::from(b);
    let div = U256::from(c);
    let (q, r) = (prod / div, prod % div);
    let result = if r.is_zero() { q } else { q + U256::one() };
    to_u128(result)
}

/// Floor square root of a Q64.64 value, returned in Q64.64 format.
///
/// Computed as `isqrt(raw << 64)` with an integer Newton iteration whose
/// initial guess is an upper bound, so the sequence decreases monotonically
/// to the floor root.
#[inline(always)]
pub fn sqrt_x64(value: u128) -> u128 {
    if value == 0 {
        return 0;
    }
    let target = U256::from(value) << FRAC_BITS as usize;
    // 2^ceil(bits/2) >= sqrt(target)
    let mut x = U256::one() << ((target.bits() + 1) / 2);
    loop {
        let next = (x + target / x) >> 1;
        if next >= x {
            break;
        }
        x = next;
    }
    // The root of a value shifted by 64 bits always fits in 128 bits.
    x.as_u128()
}

#[inline(always)]
fn to_u128(value: U256) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(value.as_u128())
}

/// Checked `u128` addition mapped onto [`MathError`].
#[inline(always)]
pub fn checked_add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

/// Checked `u128` subtraction mapped onto [`MathError`].
#[inline(always)]
pub fn checked_sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}
