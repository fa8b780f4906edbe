//! Trait seams for the external AMM and staking program.
//!
//! The engine consumes the external venue's swap and liquidity math through
//! these traits and never reimplements it. Calls are synchronous: the
//! transaction substrate either completes a call in its entirety or fails it,
//! and the enclosing engine operation rolls back on failure.

use crate::types::{Address, FeeTier, TokenId};
use amm_math::MathError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures surfaced by a backend implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmmError {
    #[error("no pool exists for the requested pair")]
    UnknownPool,

    #[error("no position exists for the requested handle")]
    UnknownPosition,

    #[error("requested liquidity exceeds the position's liquidity")]
    InsufficientLiquidity,

    #[error("position custody is not with the requester")]
    Custody,

    #[error("no incentive exists for the requested key")]
    UnknownIncentive,

    #[error(transparent)]
    Math(#[from] MathError),
}

/// Parameters for opening a position at the external AMM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub token0: Address,
    pub token1: Address,
    pub fee: FeeTier,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount0_desired: u128,
    pub amount1_desired: u128,
}

/// Outcome of opening a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub token_id: TokenId,
    pub pool: Address,
    pub liquidity: u128,
    pub amount0: u128,
    pub amount1: u128,
}

/// Outcome of growing a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityChange {
    pub liquidity: u128,
    pub amount0: u128,
    pub amount1: u128,
}

/// Identifies an incentive program at the external staker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncentiveKey {
    pub reward_token: Address,
    pub pool: Address,
    pub start_time: i64,
    pub end_time: i64,
    pub refundee: Address,
}

/// Multi-hop conversion against the external AMM along an encoded route.
pub trait SwapBackend {
    /// Quote for an exact-input conversion; read-only.
    fn quote_exact_input(&self, path: &[u8], amount_in: u128) -> Result<u128, AmmError>;

    /// Quote for an exact-output conversion; read-only.
    fn quote_exact_output(&self, path: &[u8], amount_out: u128) -> Result<u128, AmmError>;

    /// Executes an exact-input conversion, returning the realized output.
    fn swap_exact_input(&mut self, path: &[u8], amount_in: u128) -> Result<u128, AmmError>;

    /// Executes an exact-output conversion, returning the input spent.
    fn swap_exact_output(&mut self, path: &[u8], amount_out: u128) -> Result<u128, AmmError>;
}

/// Tick-ranged position custody at the external AMM.
pub trait PositionBackend {
    /// Resolves the pool identity for a pair and fee tier.
    fn pool_for(&self, token0: Address, token1: Address, fee: FeeTier)
        -> Result<Address, AmmError>;

    /// Current sqrt price of a pool in Q64.64 format.
    fn pool_sqrt_price(&self, pool: Address) -> Result<u128, AmmError>;

    fn mint(&mut self, request: MintRequest) -> Result<MintReceipt, AmmError>;

    fn increase_liquidity(
        &mut self,
        token_id: TokenId,
        amount0_desired: u128,
        amount1_desired: u128,
    ) -> Result<LiquidityChange, AmmError>;

    /// Removes liquidity; the withdrawn amounts accrue as uncollected tokens
    /// owed on the position until [`PositionBackend::collect`] is called.
    fn decrease_liquidity(
        &mut self,
        token_id: TokenId,
        liquidity: u128,
    ) -> Result<(u128, u128), AmmError>;

    /// Pays out uncollected tokens owed, up to the requested caps.
    fn collect(
        &mut self,
        token_id: TokenId,
        amount0_max: u128,
        amount1_max: u128,
    ) -> Result<(u128, u128), AmmError>;

    /// Uncollected tokens owed on a position; read-only.
    fn tokens_owed(&self, token_id: TokenId) -> Result<(u128, u128), AmmError>;
}

/// Convenience bound for operations that need both halves of the AMM.
pub trait AmmBackend: SwapBackend + PositionBackend {}

impl<T: SwapBackend + PositionBackend> AmmBackend for T {}

/// External incentive program holding staked position custody.
pub trait StakingBackend {
    /// Identity of the program, recorded in a position's custody state.
    fn program_id(&self) -> Address;

    fn create_incentive(&mut self, key: IncentiveKey, reward: u128) -> Result<(), AmmError>;

    /// Ends an incentive, returning the unspent reward refund.
    fn end_incentive(&mut self, key: IncentiveKey) -> Result<u128, AmmError>;

    /// Takes custody of a position.
    fn deposit_token(&mut self, token_id: TokenId) -> Result<(), AmmError>;

    /// Returns custody of a position.
    fn withdraw_token(&mut self, token_id: TokenId) -> Result<(), AmmError>;

    fn stake(&mut self, key: IncentiveKey, token_id: TokenId) -> Result<(), AmmError>;

    fn unstake(&mut self, key: IncentiveKey, token_id: TokenId) -> Result<(), AmmError>;

    /// Pays out accrued rewards in `reward_token`, returning the amount.
    fn claim_reward(&mut self, reward_token: Address) -> Result<u128, AmmError>;
}
