//! The fund aggregate: share ledger and fee orchestration.
//!
//! Every NAV-changing operation accrues the management and performance fees
//! before shares move, against a single valuation reading. Shares for all
//! fee kinds are minted to the rewards account, diluting holders instead of
//! moving cash, so fee accrual is atomic with the triggering join or exit.
//!
//! Compound operations run under a checkpoint guard; calls into the
//! liquidity manager are sequenced last so a rolled-back fund operation never
//! leaves a manager-side effect behind.

use crate::constants::SHARE_DECIMALS;
use crate::error::FundError;
use crate::events::FundRecord;
use crate::fees::{self, FeeKind, FeeSetting};
use amm_math::core_arithmetic::{checked_add, checked_sub, mul_div, mul_div_round_up};
use liquidity_manager::amm::AmmBackend;
use liquidity_manager::events::AuditLog;
use liquidity_manager::identity::GovIdentity;
use liquidity_manager::manager::LiquidityManager;
use liquidity_manager::types::{Address, PROPORTION_SCALE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Operations of the fund surface, for the authorization policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FundOp {
    Bind,
    SetCap,
    SetFee,
    Join,
    Exit,
}

/// One-time binding to the reserve asset and the asset-manager reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct FundBinding {
    reserve: Address,
    manager_ref: Address,
}

/// Share balances, per-account observed net values, and the total supply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ledger {
    balances: BTreeMap<Address, u128>,
    /// Per-share net value each account last transacted at, 1e18-scaled.
    nets: BTreeMap<Address, u128>,
    total_supply: u128,
}

impl Ledger {
    fn balance(&self, who: Address) -> u128 {
        self.balances.get(&who).copied().unwrap_or(0)
    }

    fn net(&self, who: Address) -> u128 {
        self.nets.get(&who).copied().unwrap_or(0)
    }

    fn mint(&mut self, to: Address, amount: u128) -> Result<(), FundError> {
        if amount == 0 {
            return Ok(());
        }
        let entry = self.balances.entry(to).or_insert(0);
        *entry = checked_add(*entry, amount)?;
        self.total_supply = checked_add(self.total_supply, amount)?;
        Ok(())
    }

    fn burn(&mut self, from: Address, amount: u128) -> Result<(), FundError> {
        if amount == 0 {
            return Ok(());
        }
        match self.balances.get_mut(&from) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
                self.total_supply -= amount;
                Ok(())
            }
            _ => Err(FundError::InsufficientShares),
        }
    }
}

/// Pooled-capital fund: mints and burns shares against NAV, enforces the
/// deposit cap, and sources withdrawals through the liquidity manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fund {
    address: Address,
    name: String,
    symbol: String,
    identity: GovIdentity,
    binding: Option<FundBinding>,
    cap: u128,
    fees: [FeeSetting; FeeKind::COUNT],
    ledger: Ledger,
    audit: AuditLog<FundRecord>,
}

impl Fund {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        address: Address,
        identity: GovIdentity,
    ) -> Self {
        Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            identity,
            binding: None,
            cap: 0,
            fees: [FeeSetting::default(); FeeKind::COUNT],
            ledger: Ledger::default(),
            audit: AuditLog::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        SHARE_DECIMALS
    }

    pub fn identity(&self) -> &GovIdentity {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut GovIdentity {
        &mut self.identity
    }

    pub fn total_supply(&self) -> u128 {
        self.ledger.total_supply
    }

    pub fn balance_of(&self, who: Address) -> u128 {
        self.ledger.balance(who)
    }

    /// The per-share net value `who` last transacted at, 1e18-scaled.
    pub fn last_net_value(&self, who: Address) -> u128 {
        self.ledger.net(who)
    }

    /// The reserve (in/out) asset, once bound.
    pub fn reserve(&self) -> Option<Address> {
        self.binding.map(|b| b.reserve)
    }

    /// The asset-manager reference, once bound.
    pub fn manager_ref(&self) -> Option<Address> {
        self.binding.map(|b| b.manager_ref)
    }

    pub fn records(&self) -> &[FundRecord] {
        self.audit.records()
    }

    // ---- authorization --------------------------------------------------

    /// Operation → allowed-caller predicate, checked before any mutation.
    fn authorize(&self, op: FundOp, caller: Address) -> Result<(), FundError> {
        match op {
            FundOp::Bind | FundOp::SetFee => Ok(self.identity.require_governance(caller)?),
            FundOp::SetCap => Ok(self
                .identity
                .require_governance_or_strategist(caller)?),
            FundOp::Join | FundOp::Exit => Ok(()),
        }
    }

    fn require_bound(&self) -> Result<FundBinding, FundError> {
        self.binding.ok_or(FundError::NotBound)
    }

    /// Checkpoint guard: on error the fee schedule, the ledger and the audit
    /// log are restored exactly. Manager calls are sequenced last inside
    /// `op`, so there is never a manager-side effect to undo.
    fn transactional<T, F>(&mut self, op: F) -> Result<T, FundError>
    where
        F: FnOnce(&mut Self) -> Result<T, FundError>,
    {
        let fees = self.fees;
        let ledger = self.ledger.clone();
        let audit_len = self.audit.len();
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.fees = fees;
                self.ledger = ledger;
                self.audit.truncate(audit_len);
                Err(err)
            }
        }
    }

    // ---- configuration --------------------------------------------------

    /// One-time binding of the reserve asset and asset-manager reference.
    pub fn bind(
        &mut self,
        caller: Address,
        reserve: Address,
        manager_ref: Address,
    ) -> Result<(), FundError> {
        self.authorize(FundOp::Bind, caller)?;
        if self.binding.is_some() {
            return Err(FundError::AlreadyBound);
        }
        self.binding = Some(FundBinding {
            reserve,
            manager_ref,
        });
        self.audit.append(FundRecord::Bound {
            reserve,
            manager_ref,
        });
        debug!(%reserve, %manager_ref, "fund bound");
        Ok(())
    }

    pub fn set_cap(&mut self, caller: Address, new_cap: u128) -> Result<(), FundError> {
        self.authorize(FundOp::SetCap, caller)?;
        let old_cap = self.cap;
        self.cap = new_cap;
        self.audit.append(FundRecord::CapChanged {
            setter: caller,
            old_cap,
            new_cap,
        });
        Ok(())
    }

    pub fn get_cap(&self) -> u128 {
        self.cap
    }

    /// Configures one fee kind. `start_timestamp` seeds the accrual clock;
    /// zero means "from now".
    pub fn set_fee(
        &mut self,
        caller: Address,
        kind: FeeKind,
        ratio: u128,
        denominator: u128,
        start_timestamp: i64,
        now: i64,
    ) -> Result<(), FundError> {
        self.authorize(FundOp::SetFee, caller)?;
        if ratio > denominator {
            return Err(FundError::InvalidRatio);
        }
        let old = self.fees[kind.index()];
        self.fees[kind.index()] = FeeSetting {
            ratio,
            denominator,
            last_timestamp: if start_timestamp == 0 {
                now
            } else {
                start_timestamp
            },
        };
        self.audit.append(FundRecord::FeeChanged {
            setter: caller,
            kind,
            old_ratio: old.ratio,
            old_denominator: old.denominator,
            new_ratio: ratio,
            new_denominator: denominator,
        });
        Ok(())
    }

    pub fn get_fee(&self, kind: FeeKind) -> FeeSetting {
        self.fees[kind.index()]
    }

    // ---- valuation reads ------------------------------------------------

    /// Total fund value in reserve terms, as reported by the manager.
    pub fn total_assets(
        &self,
        manager: &LiquidityManager,
        amm: &impl AmmBackend,
    ) -> Result<u128, FundError> {
        Ok(manager.assets(amm)?)
    }

    /// Global net value: the whole fund's reserve-term value.
    pub fn global_net_value(
        &self,
        manager: &LiquidityManager,
        amm: &impl AmmBackend,
    ) -> Result<u128, FundError> {
        self.total_assets(manager, amm)
    }

    /// An account's proportional claim: `balance · assets / supply`, zero
    /// while no shares exist.
    pub fn account_net_value(
        &self,
        manager: &LiquidityManager,
        amm: &impl AmmBackend,
        who: Address,
    ) -> Result<u128, FundError> {
        if self.ledger.total_supply == 0 {
            return Ok(0);
        }
        let assets = self.total_assets(manager, amm)?;
        Ok(mul_div(
            self.ledger.balance(who),
            assets,
            self.ledger.total_supply,
        )?)
    }

    /// Per-share net value, 1e18-scaled; parity for an empty fund.
    fn net_value_per_share(&self, assets: u128) -> Result<u128, FundError> {
        if self.ledger.total_supply == 0 {
            return Ok(PROPORTION_SCALE);
        }
        Ok(mul_div(assets, PROPORTION_SCALE, self.ledger.total_supply)?)
    }

    // ---- fee accrual ----------------------------------------------------

    /// Mints the time-prorated management fee and advances the accrual clock.
    fn accrue_management(&mut self, now: i64) -> Result<(), FundError> {
        let setting = self.fees[FeeKind::Management.index()];
        let fee = fees::management_fee(self.ledger.total_supply, &setting, now)?;
        if fee > 0 {
            self.ledger.mint(self.identity.rewards(), fee)?;
        }
        if setting.last_timestamp != 0 && now > setting.last_timestamp {
            self.fees[FeeKind::Management.index()].last_timestamp = now;
        }
        Ok(())
    }

    /// Mints the profit-prorated performance fee for one account and records
    /// the net value it transacted at.
    fn accrue_performance(
        &mut self,
        who: Address,
        balance_basis: u128,
        new_net: u128,
    ) -> Result<(), FundError> {
        let setting = self.fees[FeeKind::Performance.index()];
        let fee = fees::performance_fee(balance_basis, self.ledger.net(who), new_net, &setting)?;
        if fee > 0 {
            self.ledger.mint(self.identity.rewards(), fee)?;
        }
        self.ledger.nets.insert(who, new_net);
        Ok(())
    }

    // ---- join / exit ----------------------------------------------------

    /// Deposits `amount` of the reserve asset and mints shares at the
    /// pre-deposit valuation, so a deposit can never dilute itself. The
    /// entry fee is charged from the gross shares to the rewards account.
    pub fn join_pool(
        &mut self,
        manager: &mut LiquidityManager,
        amm: &mut impl AmmBackend,
        caller: Address,
        amount: u128,
        now: i64,
    ) -> Result<u128, FundError> {
        self.authorize(FundOp::Join, caller)?;
        self.require_bound()?;
        if amount == 0 {
            return Err(FundError::InvalidAmount);
        }
        let assets = manager.assets(amm)?;
        if checked_add(assets, amount)? > self.cap {
            return Err(FundError::CapExceeded);
        }

        self.transactional(|f| {
            f.accrue_management(now)?;
            let net = f.net_value_per_share(assets)?;
            let basis = f.ledger.balance(caller);
            f.accrue_performance(caller, basis, net)?;

            let gross_shares = mul_div(amount, PROPORTION_SCALE, net)?;
            let entry_fee = fees::ratio_fee(gross_shares, &f.fees[FeeKind::Entry.index()])?;
            let net_shares = checked_sub(gross_shares, entry_fee)?;
            f.ledger.mint(f.identity.rewards(), entry_fee)?;
            f.ledger.mint(caller, net_shares)?;

            manager.deposit_reserve(f.address, amount)?;
            f.audit.append(FundRecord::PoolJoined {
                investor: caller,
                amount: net_shares,
            });
            debug!(investor = %caller, amount, shares = net_shares, "pool joined");
            Ok(net_shares)
        })
    }

    /// Burns `shares` and pays the proportional reserve-asset entitlement,
    /// sourcing it from idle reserve first and proportional position
    /// liquidation after.
    pub fn exit_pool(
        &mut self,
        manager: &mut LiquidityManager,
        amm: &mut impl AmmBackend,
        caller: Address,
        shares: u128,
        now: i64,
    ) -> Result<u128, FundError> {
        self.authorize(FundOp::Exit, caller)?;
        self.require_bound()?;
        if shares == 0 {
            return Err(FundError::InvalidAmount);
        }
        if self.ledger.balance(caller) < shares {
            return Err(FundError::InsufficientShares);
        }

        self.transactional(|f| {
            f.accrue_management(now)?;
            let assets = manager.assets(amm)?;
            let net = f.net_value_per_share(assets)?;

            let exit_fee = fees::ratio_fee(shares, &f.fees[FeeKind::Exit.index()])?;
            let basis = checked_sub(f.ledger.balance(caller), exit_fee)?;
            f.accrue_performance(caller, basis, net)?;

            let payout_shares = checked_sub(shares, exit_fee)?;
            let amount = mul_div(payout_shares, assets, f.ledger.total_supply)?;
            f.ledger.burn(caller, shares)?;
            f.ledger.mint(f.identity.rewards(), exit_fee)?;

            if amount > 0 {
                // Ceiling keeps floor-rounded proceeds from starving the payout.
                let scale = mul_div_round_up(amount, PROPORTION_SCALE, assets)?;
                manager.withdraw(amm, f.address, caller, amount, scale)?;
            }
            f.audit.append(FundRecord::PoolExited {
                investor: caller,
                amount: shares,
            });
            debug!(investor = %caller, shares, amount, "pool exited");
            Ok(amount)
        })
    }

    /// Burns `shares` and pays the entitlement in-kind: the proportional
    /// slice of every underlying the manager currently holds, with no forced
    /// conversion back to the reserve asset.
    pub fn exit_pool_of_underlying(
        &mut self,
        manager: &mut LiquidityManager,
        amm: &mut impl AmmBackend,
        caller: Address,
        shares: u128,
        now: i64,
    ) -> Result<Vec<(Address, u128)>, FundError> {
        self.authorize(FundOp::Exit, caller)?;
        self.require_bound()?;
        if shares == 0 {
            return Err(FundError::InvalidAmount);
        }
        if self.ledger.balance(caller) < shares {
            return Err(FundError::InsufficientShares);
        }

        self.transactional(|f| {
            f.accrue_management(now)?;
            let assets = manager.assets(amm)?;
            let net = f.net_value_per_share(assets)?;

            let exit_fee = fees::ratio_fee(shares, &f.fees[FeeKind::Exit.index()])?;
            let basis = checked_sub(f.ledger.balance(caller), exit_fee)?;
            f.accrue_performance(caller, basis, net)?;

            let payout_shares = checked_sub(shares, exit_fee)?;
            let scale = mul_div(payout_shares, PROPORTION_SCALE, f.ledger.total_supply)?;
            f.ledger.burn(caller, shares)?;
            f.ledger.mint(f.identity.rewards(), exit_fee)?;

            let payouts = manager.withdraw_underlyings(amm, f.address, caller, scale)?;
            f.audit.append(FundRecord::PoolExited {
                investor: caller,
                amount: shares,
            });
            debug!(investor = %caller, shares, "pool exited in kind");
            Ok(payouts)
        })
    }
}
