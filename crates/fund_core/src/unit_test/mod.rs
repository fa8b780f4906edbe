
use crate::fund::Fund;
use amm_math::constants::ONE_X64;
use liquidity_manager::identity::GovIdentity;
use liquidity_manager::manager::LiquidityManager;
use liquidity_manager::mock::MockAmm;
use liquidity_manager::path::encode_path;
use liquidity_manager::types::Address;

pub(crate) const FEE_TIER: u32 = 3000;
pub(crate) const TICK_LOWER: i32 = -600;
pub(crate) const TICK_UPPER: i32 = 600;

/// Reserve units paid per unit of the volatile token.
pub(crate) const WETH_RATE: u128 = 2000;

pub(crate) fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub(crate) fn gov() -> Address {
    addr(1)
}

pub(crate) fn fund_addr() -> Address {
    addr(2)
}

pub(crate) fn investor() -> Address {
    addr(3)
}

pub(crate) fn manager_ref() -> Address {
    addr(5)
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

pub(crate) struct World {
    pub fund: Fund,
    pub manager: LiquidityManager,
    pub amm: MockAmm,
}

/// A bound fund and manager pair over a routed two-token mock AMM, with a
/// generous cap and every fee ratio at zero.
pub(crate) fn world() -> World {
    let mut fund = Fund::new(
        "Pooled Liquidity Fund",
        "PLF",
        fund_addr(),
        GovIdentity::new(gov()),
    );
    fund.bind(gov(), reserve(), manager_ref()).unwrap();
    fund.set_cap(gov(), 1 << 100).unwrap();

    let mut manager = LiquidityManager::new(GovIdentity::new(gov()));
    manager.bind(gov(), fund_addr(), reserve()).unwrap();
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

    World { fund, manager, amm }
}

impl World {
    /// Converts half the idle reserve into the volatile token and deploys a
    /// symmetric position with the proceeds.
    pub(crate) fn deploy_position(&mut self, reserve_to_convert: u128) {
        let got = self
            .manager
            .exact_input(
                &mut self.amm,
                gov(),
                reserve(),
                weth(),
                reserve_to_convert,
                0,
            )
            .unwrap();
        self.manager
            .mint(
                &mut self.amm,
                gov(),
                weth(),
                reserve(),
                FEE_TIER,
                TICK_LOWER,
                TICK_UPPER,
                got,
                got,
            )
            .unwrap();
    }
}
