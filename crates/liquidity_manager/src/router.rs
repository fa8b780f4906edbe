//! Swap routing over the stored route table.
//!
//! Routes are directional: the `A → B` route is stored independently of
//! `B → A`. The router owns the table and delegates execution to the external
//! AMM; slippage bounds are enforced here against realized amounts.

use crate::amm::SwapBackend;
use crate::error::ManagerError;
use crate::path;
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwapRouter {
    routes: HashMap<(Address, Address), Vec<u8>>,
}

impl SwapRouter {
    /// Validates and stores an encoded route under its endpoint pair,
    /// replacing any previous route for that pair.
    pub fn set_route(&mut self, bytes: Vec<u8>) -> Result<(Address, Address), ManagerError> {
        let (token_in, token_out) = path::path_endpoints(&bytes)?;
        self.routes.insert((token_in, token_out), bytes);
        Ok((token_in, token_out))
    }

    /// The stored route for a pair, if configured.
    pub fn route(&self, token_in: Address, token_out: Address) -> Option<&[u8]> {
        self.routes
            .get(&(token_in, token_out))
            .map(Vec::as_slice)
    }

    fn require_route(&self, token_in: Address, token_out: Address) -> Result<&[u8], ManagerError> {
        self.route(token_in, token_out)
            .ok_or(ManagerError::RouteNotSet)
    }

    /// Executes an exact-input conversion; fails with
    /// [`ManagerError::Slippage`] when the realized output is below `min_out`.
    pub fn exact_input(
        &self,
        amm: &mut impl SwapBackend,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
        min_out: u128,
    ) -> Result<u128, ManagerError> {
        let route = self.require_route(token_in, token_out)?;
        let amount_out = amm.swap_exact_input(route, amount_in)?;
        if amount_out < min_out {
            return Err(ManagerError::Slippage);
        }
        Ok(amount_out)
    }

    /// Executes an exact-output conversion; fails with
    /// [`ManagerError::Slippage`] when the input spend exceeds `max_in`.
    pub fn exact_output(
        &self,
        amm: &mut impl SwapBackend,
        token_in: Address,
        token_out: Address,
        amount_out: u128,
        max_in: u128,
    ) -> Result<u128, ManagerError> {
        let route = self.require_route(token_in, token_out)?;
        let amount_in = amm.swap_exact_output(route, amount_out)?;
        if amount_in > max_in {
            return Err(ManagerError::Slippage);
        }
        Ok(amount_in)
    }

    /// Read-only exact-input quote; zero in, zero out.
    pub fn estimate_amount_out(
        &self,
        amm: &impl SwapBackend,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
    ) -> Result<u128, ManagerError> {
        if amount_in == 0 {
            return Ok(0);
        }
        let route = self.require_route(token_in, token_out)?;
        Ok(amm.quote_exact_input(route, amount_in)?)
    }

    /// Read-only exact-output quote; zero out, zero in.
    pub fn estimate_amount_in(
        &self,
        amm: &impl SwapBackend,
        token_in: Address,
        token_out: Address,
        amount_out: u128,
    ) -> Result<u128, ManagerError> {
        if amount_out == 0 {
            return Ok(0);
        }
        let route = self.require_route(token_in, token_out)?;
        Ok(amm.quote_exact_output(route, amount_out)?)
    }
}
