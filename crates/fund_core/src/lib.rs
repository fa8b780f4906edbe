//! Pooled-capital share ledger and fee engine.
//!
//! Investors deposit the reserve asset into the [`fund::Fund`] and receive
//! fungible shares priced against the continuously recomputed net asset value
//! reported by the liquidity manager. Four fee kinds — entry, exit,
//! time-prorated management and profit-prorated performance — are realized as
//! shares minted to the rewards account, atomic with the operation that
//! triggered them.

pub mod constants;
pub mod error;
pub mod events;
pub mod fees;
pub mod fund;

pub use error::FundError;
pub use fees::{FeeKind, FeeSetting};
pub use fund::Fund;

#[cfg(test)]
mod unit_test;
