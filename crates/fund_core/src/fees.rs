//! Pure fee computation over fund state and timestamps.
//!
//! Nothing in this module touches balances: callers take the returned figure
//! and mint it to the rewards account inside the same atomic operation, so a
//! fee can never be applied twice against two different NAV readings.

use crate::constants::{DEFAULT_FEE_DENOMINATOR, SECONDS_PER_YEAR};
use amm_math::core_arithmetic::mul_div;
use amm_math::MathError;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// The four fee kinds, in the order the schedule stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeKind {
    Entry,
    Exit,
    Management,
    Performance,
}

impl FeeKind {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// One fee schedule entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSetting {
    pub ratio: u128,
    pub denominator: u128,
    /// Timestamp of the last accrual; advances monotonically. Zero means the
    /// fee has never been configured and accrues nothing.
    pub last_timestamp: i64,
}

impl FeeSetting {
    /// The denominator never participates in a computation as zero.
    pub fn effective_denominator(&self) -> u128 {
        if self.denominator == 0 {
            DEFAULT_FEE_DENOMINATOR
        } else {
            self.denominator
        }
    }
}

/// Entry/exit fee: `⌊amount · ratio / denominator⌋`.
pub fn ratio_fee(amount: u128, setting: &FeeSetting) -> Result<u128, MathError> {
    mul_div(amount, setting.ratio, setting.effective_denominator())
}

/// Management fee, prorated by wall-clock time since the last accrual and
/// annualized against the Julian year:
/// `⌊supply · (now − last) · ratio / (denominator · 31_557_600)⌋`.
///
/// Returns 0 when the fee has never accrued (`last == 0`). The caller resets
/// `last = now` after minting.
pub fn management_fee(
    total_supply: u128,
    setting: &FeeSetting,
    now: i64,
) -> Result<u128, MathError> {
    if setting.last_timestamp == 0 || now <= setting.last_timestamp {
        return Ok(0);
    }
    let elapsed = (now - setting.last_timestamp) as u128;
    let weighted = total_supply
        .checked_mul(elapsed)
        .ok_or(MathError::Overflow)?;
    let denominator = setting
        .effective_denominator()
        .checked_mul(SECONDS_PER_YEAR)
        .ok_or(MathError::Overflow)?;
    mul_div(weighted, setting.ratio, denominator)
}

/// Performance fee in share units, charged only on positive movement of the
/// per-share net value since the account's last observation:
/// `⌊⌊(new − old) · balance · ratio / denominator⌋ / new⌋`.
///
/// `balance` is the investor's post-entry/exit-fee balance. Never charged
/// when `new_net == 0` or the net value did not rise.
pub fn performance_fee(
    balance: u128,
    old_net: u128,
    new_net: u128,
    setting: &FeeSetting,
) -> Result<u128, MathError> {
    if new_net == 0 || new_net <= old_net {
        return Ok(0);
    }
    let diff = new_net - old_net;
    let gross = U256::from(diff) * U256::from(balance) * U256::from(setting.ratio)
        / U256::from(setting.effective_denominator());
    let shares = gross / U256::from(new_net);
    if shares > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(shares.as_u128())
}
