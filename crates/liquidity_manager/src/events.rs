//! Append-only audit records.
//!
//! Each successful state-changing operation appends one typed record. The log
//! is written by the engine and consumed by external observers; the core
//! never reads it back to make decisions.

use crate::types::{Address, TokenId};
use serde::{Deserialize, Serialize};

/// An append-only log of typed records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog<T> {
    records: Vec<T>,
}

impl<T> Default for AuditLog<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T> AuditLog<T> {
    pub fn append(&mut self, record: T) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Discards records appended after `len`; used by the rollback guards so
    /// a failed operation leaves no trace.
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }
}

/// Records emitted by the liquidity manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerRecord {
    Bound {
        fund: Address,
        reserve: Address,
    },
    RouteSet {
        token_in: Address,
        token_out: Address,
    },
    Swap {
        amount_in: u128,
        amount_out: u128,
    },
    Mint {
        token_id: TokenId,
        pool: Address,
        liquidity: u128,
    },
    IncreaseLiquidity {
        token_id: TokenId,
        liquidity: u128,
        amount0: u128,
        amount1: u128,
    },
    DecreaseLiquidity {
        token_id: TokenId,
        liquidity: u128,
        amount0: u128,
        amount1: u128,
    },
    Collect {
        token_id: TokenId,
        amount0: u128,
        amount1: u128,
    },
    Withdraw {
        to: Address,
        amount: u128,
    },
    WithdrawUnderlyings {
        to: Address,
        payouts: Vec<(Address, u128)>,
    },
    Staker {
        token_id: TokenId,
    },
    UnStaker {
        token_id: TokenId,
    },
}
