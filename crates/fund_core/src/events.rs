//! Typed audit records of the fund surface.

use crate::fees::FeeKind;
use liquidity_manager::types::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundRecord {
    Bound {
        reserve: Address,
        manager_ref: Address,
    },
    CapChanged {
        setter: Address,
        old_cap: u128,
        new_cap: u128,
    },
    FeeChanged {
        setter: Address,
        kind: FeeKind,
        old_ratio: u128,
        old_denominator: u128,
        new_ratio: u128,
        new_denominator: u128,
    },
    /// `amount` is the share quantity minted to the investor.
    PoolJoined { investor: Address, amount: u128 },
    /// `amount` is the share quantity burned from the investor.
    PoolExited { investor: Address, amount: u128 },
}
