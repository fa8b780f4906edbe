//! Liquidity and token-amount formulas for tick-ranged positions.
//!
//! For a position with liquidity `L` between sqrt prices `a < b` and a
//! current sqrt price `c` (all Q64.64):
//!
//! - token0 held over `[max(a, c), b]`: `L * 2^64 * (b - a') / (a' * b)`
//! - token1 held over `[a, min(b, c)]`: `L * (b' - a) / 2^64`
//!
//! Amounts are floored; the same direction is used by every caller so that
//! repeated valuations of unchanged state are identical.

use crate::constants::{FRAC_BITS, ONE_X64};
use crate::core_arithmetic::mul_div;
use crate::error::MathError;
use primitive_types::U256;

/// token0 owed for liquidity between two sqrt prices, floored.
///
/// # Errors
/// [`MathError::InvalidPriceRange`] when `sqrt_a >= sqrt_b` or `sqrt_a == 0`;
/// [`MathError::Overflow`] when the result exceeds `u128::MAX`.
pub fn amount_0_delta(sqrt_a: u128, sqrt_b: u128, liquidity: u128) -> Result<u128, MathError> {
    if sqrt_a >= sqrt_b || sqrt_a == 0 {
        return Err(MathError::InvalidPriceRange);
    }
    let prod = U256::from(liquidity) * U256::from(sqrt_b - sqrt_a);
    if prod.bits() + FRAC_BITS as usize > 256 {
        return Err(MathError::Overflow);
    }
    let numerator = prod << FRAC_BITS as usize;
    let denominator = U256::from(sqrt_a) * U256::from(sqrt_b);
    let result = numerator / denominator;
    if result > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(result.as_u128())
}

/// token1 owed for liquidity between two sqrt prices, floored.
///
/// # Errors
/// [`MathError::InvalidPriceRange`] when `sqrt_a >= sqrt_b`.
pub fn amount_1_delta(sqrt_a: u128, sqrt_b: u128, liquidity: u128) -> Result<u128, MathError> {
    if sqrt_a >= sqrt_b {
        return Err(MathError::InvalidPriceRange);
    }
    mul_div(liquidity, sqrt_b - sqrt_a, ONE_X64)
}

/// Token amounts held by a position at the current price, piecewise over the
/// three placements of `sqrt_current` relative to `[sqrt_lower, sqrt_upper]`.
pub fn amounts_for_liquidity(
    sqrt_current: u128,
    sqrt_lower: u128,
    sqrt_upper: u128,
    liquidity: u128,
) -> Result<(u128, u128), MathError> {
    if sqrt_lower == 0 || sqrt_lower >= sqrt_upper {
        return Err(MathError::InvalidPriceRange);
    }
    if liquidity == 0 {
        return Ok((0, 0));
    }

    if sqrt_current <= sqrt_lower {
        // Entirely token0.
        Ok((amount_0_delta(sqrt_lower, sqrt_upper, liquidity)?, 0))
    } else if sqrt_current >= sqrt_upper {
        // Entirely token1.
        Ok((0, amount_1_delta(sqrt_lower, sqrt_upper, liquidity)?))
    } else {
        let amount0 = amount_0_delta(sqrt_current, sqrt_upper, liquidity)?;
        let amount1 = amount_1_delta(sqrt_lower, sqrt_current, liquidity)?;
        Ok((amount0, amount1))
    }
}

/// Liquidity purchasable with `amount0` of token0 over `[sqrt_a, sqrt_b]`:
/// `amount0 * a * b / ((b - a) * 2^64)`, floored.
pub fn liquidity_from_amount_0(
    sqrt_a: u128,
    sqrt_b: u128,
    amount0: u128,
) -> Result<u128, MathError> {
    if sqrt_a >= sqrt_b || sqrt_a == 0 {
        return Err(MathError::InvalidPriceRange);
    }
    // Divide by 2^64 between the two multiplies to keep the intermediate
    // inside 256 bits for realistic inputs.
    let scaled = U256::from(amount0) * U256::from(sqrt_a) >> FRAC_BITS as usize;
    let numerator = scaled
        .checked_mul(U256::from(sqrt_b))
        .ok_or(MathError::Overflow)?;
    let result = numerator / U256::from(sqrt_b - sqrt_a);
    if result > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(result.as_u128())
}

/// Liquidity purchasable with `amount1` of token1 over `[sqrt_a, sqrt_b]`:
/// `amount1 * 2^64 / (b - a)`, floored.
pub fn liquidity_from_amount_1(
    sqrt_a: u128,
    sqrt_b: u128,
    amount1: u128,
) -> Result<u128, MathError> {
    if sqrt_a >= sqrt_b {
        return Err(MathError::InvalidPriceRange);
    }
    mul_div(amount1, ONE_X64, sqrt_b - sqrt_a)
}

/// Maximum liquidity fundable with both token amounts at the current price.
///
/// Inside the range the binding constraint is the smaller of the two
/// single-token liquidities; outside the range only one token participates.
///
/// # Errors
/// [`MathError::InvalidLiquidity`] when the result would be zero.
pub fn liquidity_for_amounts(
    sqrt_current: u128,
    sqrt_lower: u128,
    sqrt_upper: u128,
    amount0: u128,
    amount1: u128,
) -> Result<u128, MathError> {
    if sqrt_lower == 0 || sqrt_lower >= sqrt_upper {
        return Err(MathError::InvalidPriceRange);
    }

    let liquidity = if sqrt_current <= sqrt_lower {
        liquidity_from_amount_0(sqrt_lower, sqrt_upper, amount0)?
    } else if sqrt_current >= sqrt_upper {
        liquidity_from_amount_1(sqrt_lower, sqrt_upper, amount1)?
    } else {
        let liquidity0 = liquidity_from_amount_0(sqrt_current, sqrt_upper, amount0)?;
        let liquidity1 = liquidity_from_amount_1(sqrt_lower, sqrt_current, amount1)?;
        liquidity0.min(liquidity1)
    };

    if liquidity == 0 {
        return Err(MathError::InvalidLiquidity);
    }
    Ok(liquidity)
}
