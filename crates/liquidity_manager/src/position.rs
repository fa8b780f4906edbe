//! Tick-ranged position records.

use crate::types::{Address, FeeTier, TokenId};
use serde::{Deserialize, Serialize};

/// Lookup key of a position in the works set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub pool: Address,
    pub tick_lower: i32,
    pub tick_upper: i32,
}

/// Custody state of the position handle.
///
/// The handle moves by value between the manager and the external incentive
/// program; it is never aliased. A staked position stays in the works set and
/// keeps contributing to valuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Custody {
    SelfHeld,
    Staked { program: Address },
}

/// An open position at the external AMM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub pool: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: FeeTier,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub token_id: TokenId,
    /// Mirror of the backend's liquidity figure, kept in lockstep by every
    /// mint/increase/decrease routed through the manager.
    pub liquidity: u128,
    pub custody: Custody,
}

impl Position {
    pub fn key(&self) -> PositionKey {
        PositionKey {
            pool: self.pool,
            tick_lower: self.tick_lower,
            tick_upper: self.tick_upper,
        }
    }

    pub fn is_staked(&self) -> bool {
        matches!(self.custody, Custody::Staked { .. })
    }
}
