//! The liquidity manager aggregate.
//!
//! Owns the works-position set, the swap-route table, the underlying
//! whitelist and the idle token balances. The fund never touches this state
//! directly; it calls in through the operation surface below, authenticated
//! as the bound fund address.
//!
//! Compound operations run under a checkpoint guard: any error restores the
//! book and the audit log exactly, so a caller observes either the whole
//! effect or none of it.

use crate::amm::{AmmBackend, IncentiveKey, MintRequest, PositionBackend, StakingBackend};
use crate::error::ManagerError;
use crate::events::{AuditLog, ManagerRecord};
use crate::identity::{CallerClass, GovIdentity};
use crate::position::{Custody, Position, PositionKey};
use crate::router::SwapRouter;
use crate::types::{Address, FeeTier, TokenId, PROPORTION_SCALE};
use amm_math::core_arithmetic::{checked_add, mul_div};
use amm_math::liquidity_math::amounts_for_liquidity;
use amm_math::tick_math::tick_to_sqrt_x64;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Operations of the manager surface, for the authorization policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerOp {
    Bind,
    SetSwapRoute,
    SetUnderlyings,
    RemoveUnderlyings,
    ReceiveToken,
    DepositReserve,
    Swap,
    Mint,
    IncreaseLiquidity,
    DecreaseLiquidity,
    Collect,
    Withdraw,
    WithdrawUnderlyings,
    CreateIncentive,
    EndIncentive,
    DepositToStaker,
    WithdrawFromStaker,
    StakeToken,
    UnstakeToken,
    ClaimReward,
    Batch,
}

/// Operation → allowed-caller mapping, checked before any state mutation.
const fn caller_class(op: ManagerOp) -> CallerClass {
    match op {
        ManagerOp::Bind
        | ManagerOp::SetSwapRoute
        | ManagerOp::SetUnderlyings
        | ManagerOp::RemoveUnderlyings => CallerClass::Governance,
        ManagerOp::ReceiveToken => CallerClass::Anyone,
        ManagerOp::DepositReserve | ManagerOp::Withdraw | ManagerOp::WithdrawUnderlyings => {
            CallerClass::FundOnly
        }
        ManagerOp::Swap
        | ManagerOp::Mint
        | ManagerOp::IncreaseLiquidity
        | ManagerOp::DecreaseLiquidity
        | ManagerOp::Collect
        | ManagerOp::DepositToStaker
        | ManagerOp::WithdrawFromStaker
        | ManagerOp::StakeToken
        | ManagerOp::UnstakeToken
        | ManagerOp::ClaimReward => CallerClass::Authorized,
        ManagerOp::CreateIncentive | ManagerOp::EndIncentive | ManagerOp::Batch => {
            CallerClass::GovernanceOrStrategist
        }
    }
}

/// One step of a [`LiquidityManager::batch`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
    ExactInput {
        token_in: Address,
        token_out: Address,
        amount_in: u128,
        min_out: u128,
    },
    ExactOutput {
        token_in: Address,
        token_out: Address,
        amount_out: u128,
        max_in: u128,
    },
    IncreaseLiquidity {
        token_id: TokenId,
        amount0_desired: u128,
        amount1_desired: u128,
        amount0_min: u128,
        amount1_min: u128,
    },
    DecreaseLiquidity {
        token_id: TokenId,
        liquidity: u128,
        amount0_min: u128,
        amount1_min: u128,
    },
    Collect {
        token_id: TokenId,
        amount0_max: u128,
        amount1_max: u128,
    },
}

/// One-time binding to the fund that owns this manager's capital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Binding {
    fund: Address,
    reserve: Address,
}

/// The mutable book covered by the checkpoint guard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Book {
    positions: Vec<Position>,
    index: HashMap<PositionKey, usize>,
    balances: BTreeMap<Address, u128>,
}

impl Book {
    fn balance(&self, token: Address) -> u128 {
        self.balances.get(&token).copied().unwrap_or(0)
    }

    fn credit(&mut self, token: Address, amount: u128) -> Result<(), ManagerError> {
        if amount == 0 {
            return Ok(());
        }
        let entry = self.balances.entry(token).or_insert(0);
        *entry = checked_add(*entry, amount)?;
        Ok(())
    }

    fn debit(&mut self, token: Address, amount: u128) -> Result<(), ManagerError> {
        if amount == 0 {
            return Ok(());
        }
        match self.balances.get_mut(&token) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
                Ok(())
            }
            _ => Err(ManagerError::InsufficientBalance),
        }
    }

    fn insert_position(&mut self, position: Position) {
        self.index.insert(position.key(), self.positions.len());
        self.positions.push(position);
    }

    fn position_by_token(&self, token_id: TokenId) -> Option<usize> {
        self.positions.iter().position(|p| p.token_id == token_id)
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, position) in self.positions.iter().enumerate() {
            self.index.insert(position.key(), i);
        }
    }
}

/// Works-position lifecycle, swap routing and valuation for the fund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityManager {
    identity: GovIdentity,
    binding: Option<Binding>,
    underlyings: Vec<Address>,
    router: SwapRouter,
    book: Book,
    audit: AuditLog<ManagerRecord>,
}

impl LiquidityManager {
    pub fn new(identity: GovIdentity) -> Self {
        Self {
            identity,
            binding: None,
            underlyings: Vec::new(),
            router: SwapRouter::default(),
            book: Book::default(),
            audit: AuditLog::default(),
        }
    }

    pub fn identity(&self) -> &GovIdentity {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut GovIdentity {
        &mut self.identity
    }

    /// The bound fund address, once bound.
    pub fn fund(&self) -> Option<Address> {
        self.binding.map(|b| b.fund)
    }

    /// The reserve (in/out) asset, once bound.
    pub fn reserve(&self) -> Option<Address> {
        self.binding.map(|b| b.reserve)
    }

    pub fn underlyings(&self) -> &[Address] {
        &self.underlyings
    }

    pub fn records(&self) -> &[ManagerRecord] {
        self.audit.records()
    }

    pub fn balance_of(&self, token: Address) -> u128 {
        self.book.balance(token)
    }

    /// The works positions in insertion order.
    pub fn active_positions(&self) -> &[Position] {
        &self.book.positions
    }

    // ---- authorization --------------------------------------------------

    fn authorize(&self, op: ManagerOp, caller: Address) -> Result<(), ManagerError> {
        match caller_class(op) {
            CallerClass::Anyone => Ok(()),
            CallerClass::Governance => Ok(self.identity.require_governance(caller)?),
            CallerClass::GovernanceOrStrategist => {
                Ok(self.identity.require_governance_or_strategist(caller)?)
            }
            CallerClass::Authorized => {
                if self.identity.is_governance(caller)
                    || self.identity.is_strategist(caller)
                    || self.fund() == Some(caller)
                {
                    Ok(())
                } else {
                    Err(ManagerError::NotAuthorized)
                }
            }
            CallerClass::FundOnly => {
                if self.fund() == Some(caller) {
                    Ok(())
                } else {
                    Err(ManagerError::NotFund)
                }
            }
        }
    }

    fn require_bound(&self) -> Result<Binding, ManagerError> {
        self.binding.ok_or(ManagerError::NotBound)
    }

    fn require_underlying(&self, token: Address) -> Result<(), ManagerError> {
        if self.underlyings.contains(&token) {
            Ok(())
        } else {
            Err(ManagerError::UnknownToken)
        }
    }

    /// Runs `op` under the checkpoint guard: on error the book and the audit
    /// log are restored exactly.
    fn transactional<T, F>(&mut self, op: F) -> Result<T, ManagerError>
    where
        F: FnOnce(&mut Self) -> Result<T, ManagerError>,
    {
        let book = self.book.clone();
        let audit_len = self.audit.len();
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.book = book;
                self.audit.truncate(audit_len);
                Err(err)
            }
        }
    }

    // ---- configuration --------------------------------------------------

    /// One-time binding to the owning fund and the reserve asset.
    pub fn bind(
        &mut self,
        caller: Address,
        fund: Address,
        reserve: Address,
    ) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::Bind, caller)?;
        if self.binding.is_some() {
            return Err(ManagerError::AlreadyBound);
        }
        self.binding = Some(Binding { fund, reserve });
        if !self.underlyings.contains(&reserve) {
            self.underlyings.push(reserve);
        }
        self.audit.append(ManagerRecord::Bound { fund, reserve });
        debug!(%fund, %reserve, "manager bound");
        Ok(())
    }

    /// Stores an encoded route under its endpoint pair.
    pub fn set_swap_route(&mut self, caller: Address, bytes: Vec<u8>) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::SetSwapRoute, caller)?;
        let (token_in, token_out) = self.router.set_route(bytes)?;
        self.audit.append(ManagerRecord::RouteSet {
            token_in,
            token_out,
        });
        Ok(())
    }

    /// The stored route for a pair, if configured.
    pub fn swap_route(&self, token_in: Address, token_out: Address) -> Option<&[u8]> {
        self.router.route(token_in, token_out)
    }

    pub fn set_underlyings(
        &mut self,
        caller: Address,
        tokens: Vec<Address>,
    ) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::SetUnderlyings, caller)?;
        for token in tokens {
            if !self.underlyings.contains(&token) {
                self.underlyings.push(token);
            }
        }
        Ok(())
    }

    /// Removes tokens from the whitelist. Refused while the manager still
    /// holds a balance of the token or an open position references it, so
    /// valuation can never silently drop assets.
    pub fn remove_underlyings(
        &mut self,
        caller: Address,
        tokens: Vec<Address>,
    ) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::RemoveUnderlyings, caller)?;
        for token in &tokens {
            if self.book.balance(*token) > 0 {
                return Err(ManagerError::NonZeroBalance);
            }
            let referenced = self
                .book
                .positions
                .iter()
                .any(|p| p.token0 == *token || p.token1 == *token);
            if referenced {
                return Err(ManagerError::NonZeroBalance);
            }
        }
        self.underlyings.retain(|t| !tokens.contains(t));
        Ok(())
    }

    /// Models an inbound transfer of a whitelisted token.
    pub fn receive_token(&mut self, token: Address, amount: u128) -> Result<(), ManagerError> {
        self.require_underlying(token)?;
        self.book.credit(token, amount)
    }

    /// Credits the reserve asset delivered by the fund on a join.
    pub fn deposit_reserve(&mut self, caller: Address, amount: u128) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::DepositReserve, caller)?;
        let reserve = self.require_bound()?.reserve;
        self.book.credit(reserve, amount)
    }

    // ---- swaps ----------------------------------------------------------

    /// Converts an exact input amount along the stored route.
    pub fn exact_input(
        &mut self,
        amm: &mut impl AmmBackend,
        caller: Address,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
        min_out: u128,
    ) -> Result<u128, ManagerError> {
        self.authorize(ManagerOp::Swap, caller)?;
        self.transactional(|m| m.exact_input_inner(amm, token_in, token_out, amount_in, min_out))
    }

    fn exact_input_inner(
        &mut self,
        amm: &mut impl AmmBackend,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
        min_out: u128,
    ) -> Result<u128, ManagerError> {
        self.book.debit(token_in, amount_in)?;
        let amount_out = self
            .router
            .exact_input(amm, token_in, token_out, amount_in, min_out)?;
        self.book.credit(token_out, amount_out)?;
        self.audit.append(ManagerRecord::Swap {
            amount_in,
            amount_out,
        });
        debug!(amount_in, amount_out, "exact input swap settled");
        Ok(amount_out)
    }

    /// Converts to an exact output amount along the stored route.
    pub fn exact_output(
        &mut self,
        amm: &mut impl AmmBackend,
        caller: Address,
        token_in: Address,
        token_out: Address,
        amount_out: u128,
        max_in: u128,
    ) -> Result<u128, ManagerError> {
        self.authorize(ManagerOp::Swap, caller)?;
        self.transactional(|m| m.exact_output_inner(amm, token_in, token_out, amount_out, max_in))
    }

    fn exact_output_inner(
        &mut self,
        amm: &mut impl AmmBackend,
        token_in: Address,
        token_out: Address,
        amount_out: u128,
        max_in: u128,
    ) -> Result<u128, ManagerError> {
        let amount_in = self
            .router
            .exact_output(amm, token_in, token_out, amount_out, max_in)?;
        self.book.debit(token_in, amount_in)?;
        self.book.credit(token_out, amount_out)?;
        self.audit.append(ManagerRecord::Swap {
            amount_in,
            amount_out,
        });
        debug!(amount_in, amount_out, "exact output swap settled");
        Ok(amount_in)
    }

    /// Read-only exact-input quote along the stored route; zero in, zero out.
    pub fn estimate_amount_out(
        &self,
        amm: &impl AmmBackend,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
    ) -> Result<u128, ManagerError> {
        self.router
            .estimate_amount_out(amm, token_in, token_out, amount_in)
    }

    /// Read-only exact-output quote along the stored route; zero out, zero in.
    pub fn estimate_amount_in(
        &self,
        amm: &impl AmmBackend,
        token_in: Address,
        token_out: Address,
        amount_out: u128,
    ) -> Result<u128, ManagerError> {
        self.router
            .estimate_amount_in(amm, token_in, token_out, amount_out)
    }

    // ---- positions ------------------------------------------------------

    /// Exact-key lookup into the works set.
    pub fn check_pos(
        &self,
        pool: Address,
        tick_lower: i32,
        tick_upper: i32,
    ) -> Option<&Position> {
        let key = PositionKey {
            pool,
            tick_lower,
            tick_upper,
        };
        self.book.index.get(&key).map(|i| &self.book.positions[*i])
    }

    /// Opens a position, or grows the existing one with the identical
    /// `(pool, tick_lower, tick_upper)` key — the works set never holds two
    /// entries for one range.
    #[allow(clippy::too_many_arguments)]
    pub fn mint(
        &mut self,
        amm: &mut impl AmmBackend,
        caller: Address,
        token0: Address,
        token1: Address,
        fee: FeeTier,
        tick_lower: i32,
        tick_upper: i32,
        amount0_desired: u128,
        amount1_desired: u128,
    ) -> Result<TokenId, ManagerError> {
        self.authorize(ManagerOp::Mint, caller)?;
        self.require_underlying(token0)?;
        self.require_underlying(token1)?;
        let pool = amm.pool_for(token0, token1, fee)?;
        let key = PositionKey {
            pool,
            tick_lower,
            tick_upper,
        };
        if let Some(idx) = self.book.index.get(&key).copied() {
            let token_id = self.book.positions[idx].token_id;
            self.transactional(|m| {
                m.increase_inner(amm, token_id, amount0_desired, amount1_desired, 0, 0)
            })?;
            return Ok(token_id);
        }

        self.transactional(|m| {
            let receipt = amm.mint(MintRequest {
                token0,
                token1,
                fee,
                tick_lower,
                tick_upper,
                amount0_desired,
                amount1_desired,
            })?;
            m.book.debit(token0, receipt.amount0)?;
            m.book.debit(token1, receipt.amount1)?;
            m.book.insert_position(Position {
                pool: receipt.pool,
                token0,
                token1,
                fee,
                tick_lower,
                tick_upper,
                token_id: receipt.token_id,
                liquidity: receipt.liquidity,
                custody: Custody::SelfHeld,
            });
            m.audit.append(ManagerRecord::Mint {
                token_id: receipt.token_id,
                pool: receipt.pool,
                liquidity: receipt.liquidity,
            });
            debug!(token_id = receipt.token_id, liquidity = receipt.liquidity, "position minted");
            Ok(receipt.token_id)
        })
    }

    pub fn increase_liquidity(
        &mut self,
        amm: &mut impl AmmBackend,
        caller: Address,
        token_id: TokenId,
        amount0_desired: u128,
        amount1_desired: u128,
        amount0_min: u128,
        amount1_min: u128,
    ) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::IncreaseLiquidity, caller)?;
        self.transactional(|m| {
            m.increase_inner(
                amm,
                token_id,
                amount0_desired,
                amount1_desired,
                amount0_min,
                amount1_min,
            )
        })
    }

    fn increase_inner(
        &mut self,
        amm: &mut impl AmmBackend,
        token_id: TokenId,
        amount0_desired: u128,
        amount1_desired: u128,
        amount0_min: u128,
        amount1_min: u128,
    ) -> Result<(), ManagerError> {
        let idx = self
            .book
            .position_by_token(token_id)
            .ok_or(ManagerError::UnknownPosition)?;
        let position = self.book.positions[idx];
        if position.is_staked() {
            return Err(ManagerError::PositionStaked);
        }
        let change = amm.increase_liquidity(token_id, amount0_desired, amount1_desired)?;
        if change.amount0 < amount0_min || change.amount1 < amount1_min {
            return Err(ManagerError::Slippage);
        }
        self.book.debit(position.token0, change.amount0)?;
        self.book.debit(position.token1, change.amount1)?;
        self.book.positions[idx].liquidity =
            checked_add(position.liquidity, change.liquidity)?;
        self.audit.append(ManagerRecord::IncreaseLiquidity {
            token_id,
            liquidity: change.liquidity,
            amount0: change.amount0,
            amount1: change.amount1,
        });
        Ok(())
    }

    /// Removes liquidity from a position; the freed amounts stay owed at the
    /// AMM until collected.
    pub fn decrease_liquidity(
        &mut self,
        amm: &mut impl AmmBackend,
        caller: Address,
        token_id: TokenId,
        liquidity: u128,
        amount0_min: u128,
        amount1_min: u128,
    ) -> Result<(u128, u128), ManagerError> {
        self.authorize(ManagerOp::DecreaseLiquidity, caller)?;
        self.transactional(|m| {
            m.decrease_inner(amm, token_id, liquidity, amount0_min, amount1_min)
        })
    }

    fn decrease_inner(
        &mut self,
        amm: &mut impl AmmBackend,
        token_id: TokenId,
        liquidity: u128,
        amount0_min: u128,
        amount1_min: u128,
    ) -> Result<(u128, u128), ManagerError> {
        let idx = self
            .book
            .position_by_token(token_id)
            .ok_or(ManagerError::UnknownPosition)?;
        let position = self.book.positions[idx];
        if position.is_staked() {
            return Err(ManagerError::PositionStaked);
        }
        if liquidity > position.liquidity {
            return Err(ManagerError::InsufficientLiquidity);
        }
        let (amount0, amount1) = amm.decrease_liquidity(token_id, liquidity)?;
        if amount0 < amount0_min || amount1 < amount1_min {
            return Err(ManagerError::Slippage);
        }
        self.book.positions[idx].liquidity = position.liquidity - liquidity;
        self.audit.append(ManagerRecord::DecreaseLiquidity {
            token_id,
            liquidity,
            amount0,
            amount1,
        });
        Ok((amount0, amount1))
    }

    /// Harvests owed amounts into the idle balances. A position whose
    /// liquidity and owed amounts both reach zero leaves the works set.
    pub fn collect(
        &mut self,
        amm: &mut impl AmmBackend,
        caller: Address,
        token_id: TokenId,
        amount0_max: u128,
        amount1_max: u128,
    ) -> Result<(u128, u128), ManagerError> {
        self.authorize(ManagerOp::Collect, caller)?;
        self.transactional(|m| m.collect_inner(amm, token_id, amount0_max, amount1_max))
    }

    fn collect_inner(
        &mut self,
        amm: &mut impl AmmBackend,
        token_id: TokenId,
        amount0_max: u128,
        amount1_max: u128,
    ) -> Result<(u128, u128), ManagerError> {
        let idx = self
            .book
            .position_by_token(token_id)
            .ok_or(ManagerError::UnknownPosition)?;
        let position = self.book.positions[idx];
        if position.is_staked() {
            return Err(ManagerError::PositionStaked);
        }
        let (amount0, amount1) = amm.collect(token_id, amount0_max, amount1_max)?;
        self.book.credit(position.token0, amount0)?;
        self.book.credit(position.token1, amount1)?;
        self.audit.append(ManagerRecord::Collect {
            token_id,
            amount0,
            amount1,
        });
        if self.book.positions[idx].liquidity == 0 {
            let (owed0, owed1) = amm.tokens_owed(token_id)?;
            if owed0 == 0 && owed1 == 0 {
                self.book.positions.remove(idx);
                self.book.rebuild_index();
            }
        }
        Ok((amount0, amount1))
    }

    // ---- valuation ------------------------------------------------------

    /// Idle balances of whitelisted tokens, quoted to reserve terms.
    pub fn idle_assets(&self, amm: &impl AmmBackend) -> Result<u128, ManagerError> {
        let reserve = self.require_bound()?.reserve;
        let mut total = 0u128;
        for token in &self.underlyings {
            let balance = self.book.balance(*token);
            if balance == 0 {
                continue;
            }
            let value = if *token == reserve {
                balance
            } else {
                self.router
                    .estimate_amount_out(amm, *token, reserve, balance)?
            };
            total = checked_add(total, value)?;
        }
        Ok(total)
    }

    /// Works positions valued at the current pool price, floor-rounded, and
    /// quoted to reserve terms. Custody does not change the figure.
    pub fn liquidity_assets(&self, amm: &impl AmmBackend) -> Result<u128, ManagerError> {
        let reserve = self.require_bound()?.reserve;
        let mut total = 0u128;
        for position in &self.book.positions {
            if position.liquidity == 0 {
                continue;
            }
            let sqrt_price = amm.pool_sqrt_price(position.pool)?;
            let sqrt_lower = tick_to_sqrt_x64(position.tick_lower)?;
            let sqrt_upper = tick_to_sqrt_x64(position.tick_upper)?;
            let (amount0, amount1) =
                amounts_for_liquidity(sqrt_price, sqrt_lower, sqrt_upper, position.liquidity)?;
            for (token, amount) in [(position.token0, amount0), (position.token1, amount1)] {
                if amount == 0 {
                    continue;
                }
                let value = if token == reserve {
                    amount
                } else {
                    self.router.estimate_amount_out(amm, token, reserve, amount)?
                };
                total = checked_add(total, value)?;
            }
        }
        Ok(total)
    }

    /// Total deployed value in reserve terms: idle plus positions.
    pub fn assets(&self, amm: &impl AmmBackend) -> Result<u128, ManagerError> {
        let idle = self.idle_assets(amm)?;
        let deployed = self.liquidity_assets(amm)?;
        Ok(checked_add(idle, deployed)?)
    }

    // ---- withdrawal -----------------------------------------------------

    /// Pays `amount` of the reserve asset to `to`. When idle reserve falls
    /// short, every works position is shrunk by `scale_x18 / 1e18` and the
    /// proceeds are converted as needed; excess proceeds stay idle.
    pub fn withdraw(
        &mut self,
        amm: &mut impl AmmBackend,
        caller: Address,
        to: Address,
        amount: u128,
        scale_x18: u128,
    ) -> Result<u128, ManagerError> {
        self.authorize(ManagerOp::Withdraw, caller)?;
        if amount == 0 {
            return Err(ManagerError::InvalidAmount);
        }
        let reserve = self.require_bound()?.reserve;
        self.transactional(|m| {
            if m.book.balance(reserve) < amount {
                m.shrink_positions(amm, scale_x18)?;
                m.cover_shortfall(amm, reserve, amount)?;
                if m.book.balance(reserve) < amount {
                    return Err(ManagerError::InsufficientLiquidity);
                }
            }
            m.book.debit(reserve, amount)?;
            m.audit.append(ManagerRecord::Withdraw { to, amount });
            debug!(%to, amount, "withdraw settled");
            Ok(amount)
        })
    }

    /// Pays the proportional slice of every underlying to `to` without
    /// converting back to the reserve asset.
    pub fn withdraw_underlyings(
        &mut self,
        amm: &mut impl AmmBackend,
        caller: Address,
        to: Address,
        scale_x18: u128,
    ) -> Result<Vec<(Address, u128)>, ManagerError> {
        self.authorize(ManagerOp::WithdrawUnderlyings, caller)?;
        self.require_bound()?;
        self.transactional(|m| {
            let idle_before: Vec<(Address, u128)> = m
                .underlyings
                .iter()
                .map(|t| (*t, m.book.balance(*t)))
                .collect();
            m.shrink_positions(amm, scale_x18)?;
            let mut payouts = Vec::new();
            for (token, before) in idle_before {
                // Position proceeds are already the caller's whole slice;
                // only the pre-existing idle part is scaled.
                let harvested = m.book.balance(token).saturating_sub(before);
                let share = mul_div(before, scale_x18, PROPORTION_SCALE)?;
                let pay = checked_add(share, harvested)?;
                if pay == 0 {
                    continue;
                }
                m.book.debit(token, pay)?;
                payouts.push((token, pay));
            }
            m.audit.append(ManagerRecord::WithdrawUnderlyings {
                to,
                payouts: payouts.clone(),
            });
            Ok(payouts)
        })
    }

    /// Shrinks every works position by the same proportional factor and
    /// collects the proceeds into the idle balances.
    fn shrink_positions(
        &mut self,
        amm: &mut impl AmmBackend,
        scale_x18: u128,
    ) -> Result<(), ManagerError> {
        let snapshot = self.book.positions.clone();
        for position in snapshot {
            if position.liquidity == 0 {
                continue;
            }
            let delta = mul_div(position.liquidity, scale_x18, PROPORTION_SCALE)?;
            if delta == 0 {
                continue;
            }
            if position.is_staked() {
                return Err(ManagerError::PositionStaked);
            }
            let delta = delta.min(position.liquidity);
            let (owed0, owed1) = amm.decrease_liquidity(position.token_id, delta)?;
            let (got0, got1) = amm.collect(position.token_id, u128::MAX, u128::MAX)?;
            self.book.credit(position.token0, got0)?;
            self.book.credit(position.token1, got1)?;
            if let Some(idx) = self.book.position_by_token(position.token_id) {
                self.book.positions[idx].liquidity = position.liquidity - delta;
            }
            self.audit.append(ManagerRecord::DecreaseLiquidity {
                token_id: position.token_id,
                liquidity: delta,
                amount0: owed0,
                amount1: owed1,
            });
            self.audit.append(ManagerRecord::Collect {
                token_id: position.token_id,
                amount0: got0,
                amount1: got1,
            });
        }
        self.prune_drained(amm)
    }

    /// Drops positions whose liquidity and owed amounts are both zero.
    fn prune_drained(&mut self, amm: &impl PositionBackend) -> Result<(), ManagerError> {
        let mut removed = false;
        let mut i = 0;
        while i < self.book.positions.len() {
            let position = self.book.positions[i];
            if position.liquidity == 0 && !position.is_staked() {
                let (owed0, owed1) = amm.tokens_owed(position.token_id)?;
                if owed0 == 0 && owed1 == 0 {
                    self.book.positions.remove(i);
                    removed = true;
                    continue;
                }
            }
            i += 1;
        }
        if removed {
            self.book.rebuild_index();
        }
        Ok(())
    }

    /// Converts idle underlyings into the reserve asset until `amount` is
    /// covered, spending no more than each token's balance.
    fn cover_shortfall(
        &mut self,
        amm: &mut impl AmmBackend,
        reserve: Address,
        amount: u128,
    ) -> Result<(), ManagerError> {
        let underlyings = self.underlyings.clone();
        for token in underlyings {
            let have = self.book.balance(reserve);
            if have >= amount {
                break;
            }
            if token == reserve {
                continue;
            }
            let balance = self.book.balance(token);
            if balance == 0 {
                continue;
            }
            let short = amount - have;
            let needed = self.router.estimate_amount_in(amm, token, reserve, short)?;
            let (spent, out) = if needed <= balance {
                let spent = self
                    .router
                    .exact_output(amm, token, reserve, short, balance)?;
                (spent, short)
            } else {
                let out = self.router.exact_input(amm, token, reserve, balance, 0)?;
                (balance, out)
            };
            self.book.debit(token, spent)?;
            self.book.credit(reserve, out)?;
            self.audit.append(ManagerRecord::Swap {
                amount_in: spent,
                amount_out: out,
            });
        }
        Ok(())
    }

    // ---- staking custody ------------------------------------------------

    /// Funds a new incentive at the external staker out of idle balance.
    pub fn create_incentive(
        &mut self,
        staker: &mut impl StakingBackend,
        caller: Address,
        key: IncentiveKey,
        reward: u128,
    ) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::CreateIncentive, caller)?;
        self.transactional(|m| {
            m.book.debit(key.reward_token, reward)?;
            staker.create_incentive(key, reward)?;
            Ok(())
        })
    }

    /// Ends an incentive; the unspent reward refund returns to idle balance.
    pub fn end_incentive(
        &mut self,
        staker: &mut impl StakingBackend,
        caller: Address,
        key: IncentiveKey,
    ) -> Result<u128, ManagerError> {
        self.authorize(ManagerOp::EndIncentive, caller)?;
        self.transactional(|m| {
            let refund = staker.end_incentive(key)?;
            m.book.credit(key.reward_token, refund)?;
            Ok(refund)
        })
    }

    /// Moves a position's custody to the staking program. The position stays
    /// in the works set and keeps its valuation.
    pub fn deposit_to_staker(
        &mut self,
        staker: &mut impl StakingBackend,
        caller: Address,
        token_id: TokenId,
    ) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::DepositToStaker, caller)?;
        let idx = self
            .book
            .position_by_token(token_id)
            .ok_or(ManagerError::UnknownPosition)?;
        if self.book.positions[idx].is_staked() {
            return Err(ManagerError::PositionStaked);
        }
        self.transactional(|m| {
            staker.deposit_token(token_id)?;
            m.book.positions[idx].custody = Custody::Staked {
                program: staker.program_id(),
            };
            m.audit.append(ManagerRecord::Staker { token_id });
            debug!(token_id, "position custody staked");
            Ok(())
        })
    }

    /// Returns a position's custody from the staking program.
    pub fn withdraw_from_staker(
        &mut self,
        staker: &mut impl StakingBackend,
        caller: Address,
        token_id: TokenId,
    ) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::WithdrawFromStaker, caller)?;
        let idx = self
            .book
            .position_by_token(token_id)
            .ok_or(ManagerError::UnknownPosition)?;
        if !self.book.positions[idx].is_staked() {
            return Err(ManagerError::NotStaked);
        }
        self.transactional(|m| {
            staker.withdraw_token(token_id)?;
            m.book.positions[idx].custody = Custody::SelfHeld;
            m.audit.append(ManagerRecord::UnStaker { token_id });
            debug!(token_id, "position custody returned");
            Ok(())
        })
    }

    /// Stakes a deposited position into an incentive.
    pub fn stake_token(
        &mut self,
        staker: &mut impl StakingBackend,
        caller: Address,
        key: IncentiveKey,
        token_id: TokenId,
    ) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::StakeToken, caller)?;
        let idx = self
            .book
            .position_by_token(token_id)
            .ok_or(ManagerError::UnknownPosition)?;
        if !self.book.positions[idx].is_staked() {
            return Err(ManagerError::NotStaked);
        }
        Ok(staker.stake(key, token_id)?)
    }

    /// Stops reward accrual without returning custody.
    pub fn unstake_token(
        &mut self,
        staker: &mut impl StakingBackend,
        caller: Address,
        key: IncentiveKey,
        token_id: TokenId,
    ) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::UnstakeToken, caller)?;
        self.book
            .position_by_token(token_id)
            .ok_or(ManagerError::UnknownPosition)?;
        Ok(staker.unstake(key, token_id)?)
    }

    /// Claims accrued incentive rewards into idle balance.
    pub fn claim_reward(
        &mut self,
        staker: &mut impl StakingBackend,
        caller: Address,
        reward_token: Address,
    ) -> Result<u128, ManagerError> {
        self.authorize(ManagerOp::ClaimReward, caller)?;
        self.transactional(|m| {
            let claimed = staker.claim_reward(reward_token)?;
            m.book.credit(reward_token, claimed)?;
            Ok(claimed)
        })
    }

    /// Whether the position handle is in the staking program's custody.
    pub fn is_staked(&self, token_id: TokenId) -> bool {
        self.book
            .position_by_token(token_id)
            .map(|i| self.book.positions[i].is_staked())
            .unwrap_or(false)
    }

    // ---- batching -------------------------------------------------------

    /// Applies a strategist-authored sequence of position and swap steps as
    /// one all-or-nothing unit.
    pub fn batch(
        &mut self,
        amm: &mut impl AmmBackend,
        caller: Address,
        ops: Vec<BatchOp>,
    ) -> Result<(), ManagerError> {
        self.authorize(ManagerOp::Batch, caller)?;
        self.transactional(|m| {
            for op in ops {
                match op {
                    BatchOp::ExactInput {
                        token_in,
                        token_out,
                        amount_in,
                        min_out,
                    } => {
                        m.exact_input_inner(amm, token_in, token_out, amount_in, min_out)?;
                    }
                    BatchOp::ExactOutput {
                        token_in,
                        token_out,
                        amount_out,
                        max_in,
                    } => {
                        m.exact_output_inner(amm, token_in, token_out, amount_out, max_in)?;
                    }
                    BatchOp::IncreaseLiquidity {
                        token_id,
                        amount0_desired,
                        amount1_desired,
                        amount0_min,
                        amount1_min,
                    } => {
                        m.increase_inner(
                            amm,
                            token_id,
                            amount0_desired,
                            amount1_desired,
                            amount0_min,
                            amount1_min,
                        )?;
                    }
                    BatchOp::DecreaseLiquidity {
                        token_id,
                        liquidity,
                        amount0_min,
                        amount1_min,
                    } => {
                        m.decrease_inner(amm, token_id, liquidity, amount0_min, amount1_min)?;
                    }
                    BatchOp::Collect {
                        token_id,
                        amount0_max,
                        amount1_max,
                    } => {
                        m.collect_inner(amm, token_id, amount0_max, amount1_max)?;
                    }
                }
            }
            Ok(())
        })
    }
}
