mod manager_test;

use crate::identity::GovIdentity;
use crate::manager::LiquidityManager;
use crate::mock::MockAmm;
use crate::path::encode_path;
use crate::types::Address;
use amm_math::constants::ONE_X64;

pub(crate) const FEE_TIER: u32 = 3000;
pub(crate) const TICK_LOWER: i32 = -600;
pub(crate) const TICK_UPPER: i32 = 600;

pub(crate) fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub(crate) fn gov() -> Address {
    addr(1)
}

pub(crate) fn fund() -> Address {
    addr(2)
}

pub(crate) fn outsider() -> Address {
    addr(9)
}

pub(crate) fn reserve() -> Address {
    addr(0x100)
}

pub(crate) fn weth() -> Address {
    addr(0x200)
}

pub(crate) fn pool() -> Address {
    addr(0x300)
}

/// Reserve units paid per unit of the volatile token.
pub(crate) const WETH_RATE: u128 = 2000;

pub(crate) struct Fixture {
    pub manager: LiquidityManager,
    pub amm: MockAmm,
}

/// A bound manager with a two-token whitelist, both swap directions routed,
/// and one pool at the unit price.
pub(crate) fn fixture() -> Fixture {
    let mut manager = LiquidityManager::new(GovIdentity::new(gov()));
    manager.bind(gov(), fund(), reserve()).unwrap();
    manager
        .set_underlyings(gov(), vec![reserve(), weth()])
        .unwrap();

    let mut amm = MockAmm::new();
    amm.add_pool(pool(), weth(), reserve(), FEE_TIER, ONE_X64);
    amm.set_rate(weth(), reserve(), WETH_RATE, 1);
    amm.set_rate(reserve(), weth(), 1, WETH_RATE);

    let out_route = encode_path(&[weth(), reserve()], &[FEE_TIER]).unwrap();
    let back_route = encode_path(&[reserve(), weth()], &[FEE_TIER]).unwrap();
    manager.set_swap_route(gov(), out_route).unwrap();
    manager.set_swap_route(gov(), back_route).unwrap();

    Fixture { manager, amm }
}

impl Fixture {
    /// Seeds idle balances and opens one symmetric position around the unit
    /// price funded with `stake` of each pool token; returns the handle.
    pub(crate) fn with_position(&mut self, idle_reserve: u128, stake: u128) -> u64 {
        self.manager
            .receive_token(reserve(), idle_reserve + stake)
            .unwrap();
        self.manager.receive_token(weth(), stake).unwrap();
        self.manager
            .mint(
                &mut self.amm,
                gov(),
                weth(),
                reserve(),
                FEE_TIER,
                TICK_LOWER,
                TICK_UPPER,
                stake,
                stake,
            )
            .unwrap()
    }
}
