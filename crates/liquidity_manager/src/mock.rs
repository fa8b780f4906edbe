//! Deterministic in-memory AMM and staking program.
//!
//! Pools convert along configured spot rates; positions are priced with the
//! same `amm_math` formulas the manager's valuation uses, so mint, decrease
//! and valuation round-trip exactly in tests.

use crate::amm::{
    AmmError, IncentiveKey, LiquidityChange, MintReceipt, MintRequest, PositionBackend,
    StakingBackend, SwapBackend,
};
use crate::path;
use crate::types::{Address, FeeTier, TokenId};
use amm_math::core_arithmetic::{mul_div, mul_div_round_up};
use amm_math::liquidity_math::{amounts_for_liquidity, liquidity_for_amounts};
use amm_math::tick_math::tick_to_sqrt_x64;
use std::collections::{HashMap, HashSet};

/// Directional spot conversion rate: `out = in * numerator / denominator`.
#[derive(Debug, Clone, Copy)]
struct Rate {
    numerator: u128,
    denominator: u128,
}

#[derive(Debug, Clone, Copy)]
pub struct MockPool {
    pub token0: Address,
    pub token1: Address,
    pub fee: FeeTier,
    pub sqrt_price_x64: u128,
}

#[derive(Debug, Clone, Copy)]
pub struct MockPosition {
    pub pool: Address,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub owed0: u128,
    pub owed1: u128,
}

#[derive(Debug, Default)]
pub struct MockAmm {
    pools: HashMap<Address, MockPool>,
    pool_keys: HashMap<(Address, Address, FeeTier), Address>,
    rates: HashMap<(Address, Address), Rate>,
    positions: HashMap<TokenId, MockPosition>,
    next_token_id: TokenId,
}

impl MockAmm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pool(
        &mut self,
        address: Address,
        token0: Address,
        token1: Address,
        fee: FeeTier,
        sqrt_price_x64: u128,
    ) {
        self.pools.insert(
            address,
            MockPool {
                token0,
                token1,
                fee,
                sqrt_price_x64,
            },
        );
        self.pool_keys.insert((token0, token1, fee), address);
        self.pool_keys.insert((token1, token0, fee), address);
    }

    /// Configures one direction of a hop; set both directions explicitly.
    pub fn set_rate(
        &mut self,
        token_in: Address,
        token_out: Address,
        numerator: u128,
        denominator: u128,
    ) {
        self.rates.insert(
            (token_in, token_out),
            Rate {
                numerator,
                denominator,
            },
        );
    }

    pub fn set_pool_price(&mut self, pool: Address, sqrt_price_x64: u128) {
        if let Some(p) = self.pools.get_mut(&pool) {
            p.sqrt_price_x64 = sqrt_price_x64;
        }
    }

    pub fn position(&self, token_id: TokenId) -> Option<MockPosition> {
        self.positions.get(&token_id).copied()
    }

    fn hop_out(&self, from: Address, to: Address, amount: u128) -> Result<u128, AmmError> {
        let rate = self.rates.get(&(from, to)).ok_or(AmmError::UnknownPool)?;
        Ok(mul_div(amount, rate.numerator, rate.denominator)?)
    }

    fn hop_in(&self, from: Address, to: Address, amount_out: u128) -> Result<u128, AmmError> {
        let rate = self.rates.get(&(from, to)).ok_or(AmmError::UnknownPool)?;
        Ok(mul_div_round_up(
            amount_out,
            rate.denominator,
            rate.numerator,
        )?)
    }

    fn range_of(&self, position: &MockPosition) -> Result<(u128, u128, u128), AmmError> {
        let pool = self
            .pools
            .get(&position.pool)
            .ok_or(AmmError::UnknownPool)?;
        let lower = tick_to_sqrt_x64(position.tick_lower)?;
        let upper = tick_to_sqrt_x64(position.tick_upper)?;
        Ok((pool.sqrt_price_x64, lower, upper))
    }
}

impl SwapBackend for MockAmm {
    fn quote_exact_input(&self, path_bytes: &[u8], amount_in: u128) -> Result<u128, AmmError> {
        let (tokens, _) = path::decode_path(path_bytes).map_err(|_| AmmError::UnknownPool)?;
        let mut amount = amount_in;
        for pair in tokens.windows(2) {
            amount = self.hop_out(pair[0], pair[1], amount)?;
        }
        Ok(amount)
    }

    fn quote_exact_output(&self, path_bytes: &[u8], amount_out: u128) -> Result<u128, AmmError> {
        let (tokens, _) = path::decode_path(path_bytes).map_err(|_| AmmError::UnknownPool)?;
        let mut amount = amount_out;
        for pair in tokens.windows(2).rev() {
            amount = self.hop_in(pair[0], pair[1], amount)?;
        }
        Ok(amount)
    }

    fn swap_exact_input(&mut self, path_bytes: &[u8], amount_in: u128) -> Result<u128, AmmError> {
        self.quote_exact_input(path_bytes, amount_in)
    }

    fn swap_exact_output(&mut self, path_bytes: &[u8], amount_out: u128) -> Result<u128, AmmError> {
        self.quote_exact_output(path_bytes, amount_out)
    }
}

impl PositionBackend for MockAmm {
    fn pool_for(
        &self,
        token0: Address,
        token1: Address,
        fee: FeeTier,
    ) -> Result<Address, AmmError> {
        self.pool_keys
            .get(&(token0, token1, fee))
            .copied()
            .ok_or(AmmError::UnknownPool)
    }

    fn pool_sqrt_price(&self, pool: Address) -> Result<u128, AmmError> {
        self.pools
            .get(&pool)
            .map(|p| p.sqrt_price_x64)
            .ok_or(AmmError::UnknownPool)
    }

    fn mint(&mut self, request: MintRequest) -> Result<MintReceipt, AmmError> {
        let pool = self.pool_for(request.token0, request.token1, request.fee)?;
        let sqrt_price = self.pool_sqrt_price(pool)?;
        let lower = tick_to_sqrt_x64(request.tick_lower)?;
        let upper = tick_to_sqrt_x64(request.tick_upper)?;
        let liquidity = liquidity_for_amounts(
            sqrt_price,
            lower,
            upper,
            request.amount0_desired,
            request.amount1_desired,
        )?;
        let (amount0, amount1) = amounts_for_liquidity(sqrt_price, lower, upper, liquidity)?;

        self.next_token_id += 1;
        let token_id = self.next_token_id;
        self.positions.insert(
            token_id,
            MockPosition {
                pool,
                tick_lower: request.tick_lower,
                tick_upper: request.tick_upper,
                liquidity,
                owed0: 0,
                owed1: 0,
            },
        );
        Ok(MintReceipt {
            token_id,
            pool,
            liquidity,
            amount0,
            amount1,
        })
    }

    fn increase_liquidity(
        &mut self,
        token_id: TokenId,
        amount0_desired: u128,
        amount1_desired: u128,
    ) -> Result<LiquidityChange, AmmError> {
        let position = self
            .positions
            .get(&token_id)
            .copied()
            .ok_or(AmmError::UnknownPosition)?;
        let (sqrt_price, lower, upper) = self.range_of(&position)?;
        let delta =
            liquidity_for_amounts(sqrt_price, lower, upper, amount0_desired, amount1_desired)?;
        let (amount0, amount1) = amounts_for_liquidity(sqrt_price, lower, upper, delta)?;
        if let Some(p) = self.positions.get_mut(&token_id) {
            p.liquidity += delta;
        }
        Ok(LiquidityChange {
            liquidity: delta,
            amount0,
            amount1,
        })
    }

    fn decrease_liquidity(
        &mut self,
        token_id: TokenId,
        liquidity: u128,
    ) -> Result<(u128, u128), AmmError> {
        let position = self
            .positions
            .get(&token_id)
            .copied()
            .ok_or(AmmError::UnknownPosition)?;
        if liquidity > position.liquidity {
            return Err(AmmError::InsufficientLiquidity);
        }
        let (sqrt_price, lower, upper) = self.range_of(&position)?;
        let (amount0, amount1) = amounts_for_liquidity(sqrt_price, lower, upper, liquidity)?;
        if let Some(p) = self.positions.get_mut(&token_id) {
            p.liquidity -= liquidity;
            p.owed0 += amount0;
            p.owed1 += amount1;
        }
        Ok((amount0, amount1))
    }

    fn collect(
        &mut self,
        token_id: TokenId,
        amount0_max: u128,
        amount1_max: u128,
    ) -> Result<(u128, u128), AmmError> {
        let position = self
            .positions
            .get_mut(&token_id)
            .ok_or(AmmError::UnknownPosition)?;
        let take0 = position.owed0.min(amount0_max);
        let take1 = position.owed1.min(amount1_max);
        position.owed0 -= take0;
        position.owed1 -= take1;
        Ok((take0, take1))
    }

    fn tokens_owed(&self, token_id: TokenId) -> Result<(u128, u128), AmmError> {
        let position = self
            .positions
            .get(&token_id)
            .ok_or(AmmError::UnknownPosition)?;
        Ok((position.owed0, position.owed1))
    }
}

/// In-memory incentive program with explicit custody bookkeeping.
#[derive(Debug)]
pub struct MockStaker {
    program: Address,
    deposited: HashSet<TokenId>,
    staked: HashSet<(IncentiveKey, TokenId)>,
    incentives: HashMap<IncentiveKey, u128>,
    pending: HashMap<Address, u128>,
}

impl MockStaker {
    pub fn new(program: Address) -> Self {
        Self {
            program,
            deposited: HashSet::new(),
            staked: HashSet::new(),
            incentives: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Seeds a claimable reward for [`StakingBackend::claim_reward`].
    pub fn set_pending_reward(&mut self, token: Address, amount: u128) {
        self.pending.insert(token, amount);
    }

    pub fn is_deposited(&self, token_id: TokenId) -> bool {
        self.deposited.contains(&token_id)
    }
}

impl StakingBackend for MockStaker {
    fn program_id(&self) -> Address {
        self.program
    }

    fn create_incentive(&mut self, key: IncentiveKey, reward: u128) -> Result<(), AmmError> {
        *self.incentives.entry(key).or_insert(0) += reward;
        Ok(())
    }

    fn end_incentive(&mut self, key: IncentiveKey) -> Result<u128, AmmError> {
        self.incentives
            .remove(&key)
            .ok_or(AmmError::UnknownIncentive)
    }

    fn deposit_token(&mut self, token_id: TokenId) -> Result<(), AmmError> {
        if !self.deposited.insert(token_id) {
            return Err(AmmError::Custody);
        }
        Ok(())
    }

    fn withdraw_token(&mut self, token_id: TokenId) -> Result<(), AmmError> {
        if !self.deposited.remove(&token_id) {
            return Err(AmmError::Custody);
        }
        self.staked.retain(|(_, id)| *id != token_id);
        Ok(())
    }

    fn stake(&mut self, key: IncentiveKey, token_id: TokenId) -> Result<(), AmmError> {
        if !self.deposited.contains(&token_id) {
            return Err(AmmError::Custody);
        }
        if !self.incentives.contains_key(&key) {
            return Err(AmmError::UnknownIncentive);
        }
        self.staked.insert((key, token_id));
        Ok(())
    }

    fn unstake(&mut self, key: IncentiveKey, token_id: TokenId) -> Result<(), AmmError> {
        if !self.staked.remove(&(key, token_id)) {
            return Err(AmmError::Custody);
        }
        Ok(())
    }

    fn claim_reward(&mut self, reward_token: Address) -> Result<u128, AmmError> {
        Ok(self.pending.remove(&reward_token).unwrap_or(0))
    }
}
