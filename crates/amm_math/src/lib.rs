//! Stateless fixed-point math for tick-ranged liquidity valuation.
//!
//! All prices are square-root prices in Q64.64 format: a `u128` whose value is
//! interpreted as `raw / 2^64`. Liquidity and token amounts are plain `u128`
//! integers. Every operation that can overflow runs through a `U256`
//! intermediate and returns a [`MathError`] instead of saturating.
//!
//! This crate has no state of its own; it is injected as a dependency into
//! position valuation and never reaches back into the aggregates that use it.

pub mod constants;
pub mod core_arithmetic;
pub mod error;
pub mod liquidity_math;
pub mod tick_math;

pub use error::MathError;

#[cfg(test)]
mod unit_test;
