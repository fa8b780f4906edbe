//! Liquidity-position lifecycle, swap routing and valuation.
//!
//! The [`manager::LiquidityManager`] aggregate owns the works-position set,
//! the directional swap-route table, the underlying whitelist and the idle
//! token balances deployed by a pooled-capital fund. The external AMM and
//! incentive program are consumed through the trait seams in [`amm`]; the
//! stateless valuation math lives in the `amm_math` crate.

pub mod amm;
pub mod error;
pub mod events;
pub mod identity;
pub mod manager;
pub mod path;
pub mod position;
pub mod router;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::ManagerError;
pub use manager::{BatchOp, LiquidityManager};
pub use types::{Address, FeeTier, TokenId, PROPORTION_SCALE};

#[cfg(test)]
mod property_based_test;
#[cfg(test)]
mod unit_test;
