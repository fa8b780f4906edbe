//! Governance identity and caller classification.
//!
//! Every state-changing operation names the class of caller allowed to invoke
//! it; the check runs before any mutation, independent of how the caller's
//! identity was established by the host.

use crate::types::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("caller is not governance")]
    NotGovernance,

    #[error("caller is neither governance nor strategist")]
    NotGovernanceOrStrategist,
}

/// The caller class an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerClass {
    /// No restriction.
    Anyone,
    /// Governance only.
    Governance,
    /// Governance or the appointed strategist.
    GovernanceOrStrategist,
    /// Governance, strategist, or the bound fund.
    Authorized,
    /// The bound fund only.
    FundOnly,
}

/// Governance, strategist and fee-recipient identities of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovIdentity {
    governance: Address,
    strategist: Address,
    rewards: Address,
}

impl GovIdentity {
    /// A fresh identity where the deployer holds all three roles.
    pub fn new(governance: Address) -> Self {
        Self {
            governance,
            strategist: governance,
            rewards: governance,
        }
    }

    pub fn governance(&self) -> Address {
        self.governance
    }

    pub fn strategist(&self) -> Address {
        self.strategist
    }

    /// The account fee shares are minted to.
    pub fn rewards(&self) -> Address {
        self.rewards
    }

    pub fn is_governance(&self, caller: Address) -> bool {
        caller == self.governance
    }

    pub fn is_strategist(&self, caller: Address) -> bool {
        caller == self.strategist
    }

    pub fn require_governance(&self, caller: Address) -> Result<(), IdentityError> {
        if self.is_governance(caller) {
            Ok(())
        } else {
            Err(IdentityError::NotGovernance)
        }
    }

    pub fn require_governance_or_strategist(&self, caller: Address) -> Result<(), IdentityError> {
        if self.is_governance(caller) || self.is_strategist(caller) {
            Ok(())
        } else {
            Err(IdentityError::NotGovernanceOrStrategist)
        }
    }

    pub fn set_governance(&mut self, caller: Address, new: Address) -> Result<(), IdentityError> {
        self.require_governance(caller)?;
        self.governance = new;
        Ok(())
    }

    pub fn set_strategist(&mut self, caller: Address, new: Address) -> Result<(), IdentityError> {
        self.require_governance(caller)?;
        self.strategist = new;
        Ok(())
    }

    pub fn set_rewards(&mut self, caller: Address, new: Address) -> Result<(), IdentityError> {
        self.require_governance(caller)?;
        self.rewards = new;
        Ok(())
    }
}
