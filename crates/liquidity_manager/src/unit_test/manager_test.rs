use super::{
    addr, fixture, fund, gov, outsider, reserve, weth, FEE_TIER, TICK_LOWER, TICK_UPPER, WETH_RATE,
};
use crate::error::ManagerError;
use crate::events::ManagerRecord;
use crate::manager::BatchOp;
use crate::types::PROPORTION_SCALE;
use amm_math::constants::ONE_X64;
use amm_math::core_arithmetic::mul_div;
use amm_math::liquidity_math::{amounts_for_liquidity, liquidity_for_amounts};
use amm_math::tick_math::tick_to_sqrt_x64;

const STAKE: u128 = 1_000_000_000;

fn expected_liquidity(stake: u128) -> u128 {
    let lower = tick_to_sqrt_x64(TICK_LOWER).unwrap();
    let upper = tick_to_sqrt_x64(TICK_UPPER).unwrap();
    liquidity_for_amounts(ONE_X64, lower, upper, stake, stake).unwrap()
}

fn expected_amounts(liquidity: u128) -> (u128, u128) {
    let lower = tick_to_sqrt_x64(TICK_LOWER).unwrap();
    let upper = tick_to_sqrt_x64(TICK_UPPER).unwrap();
    amounts_for_liquidity(ONE_X64, lower, upper, liquidity).unwrap()
}

#[test]
fn bind_is_one_time_and_governance_only() {
    let mut f = fixture();
    assert_eq!(
        f.manager.bind(gov(), fund(), reserve()),
        Err(ManagerError::AlreadyBound)
    );

    let mut fresh = crate::manager::LiquidityManager::new(
        crate::identity::GovIdentity::new(gov()),
    );
    assert!(matches!(
        fresh.bind(outsider(), fund(), reserve()),
        Err(ManagerError::Identity(_))
    ));
    assert!(fresh.bind(gov(), fund(), reserve()).is_ok());
    // Binding whitelists the reserve asset.
    assert!(fresh.underlyings().contains(&reserve()));
}

#[test]
fn whitelist_maintenance_requires_governance() {
    let mut f = fixture();
    assert!(matches!(
        f.manager.set_underlyings(outsider(), vec![addr(7)]),
        Err(ManagerError::Identity(_))
    ));
    assert!(matches!(
        f.manager.remove_underlyings(outsider(), vec![weth()]),
        Err(ManagerError::Identity(_))
    ));
}

#[test]
fn receive_token_rejects_unlisted_tokens() {
    let mut f = fixture();
    assert_eq!(
        f.manager.receive_token(addr(0x999), 1),
        Err(ManagerError::UnknownToken)
    );
}

#[test]
fn deposit_reserve_is_fund_only() {
    let mut f = fixture();
    assert_eq!(
        f.manager.deposit_reserve(gov(), 100),
        Err(ManagerError::NotFund)
    );
    f.manager.deposit_reserve(fund(), 100).unwrap();
    assert_eq!(f.manager.balance_of(reserve()), 100);
}

#[test]
fn removal_is_refused_while_value_remains() {
    let mut f = fixture();
    f.manager.receive_token(weth(), 5).unwrap();
    assert_eq!(
        f.manager.remove_underlyings(gov(), vec![weth()]),
        Err(ManagerError::NonZeroBalance)
    );

    // Drain the balance; removal is still refused while a position holds it.
    f.manager
        .exact_input(&mut f.amm, gov(), weth(), reserve(), 5, 0)
        .unwrap();
    f.with_position(0, STAKE);
    assert_eq!(
        f.manager.remove_underlyings(gov(), vec![weth()]),
        Err(ManagerError::NonZeroBalance)
    );
}

#[test]
fn removal_succeeds_once_the_token_is_idle_free() {
    let mut f = fixture();
    let third = addr(0x700);
    f.manager.set_underlyings(gov(), vec![third]).unwrap();
    assert!(f.manager.underlyings().contains(&third));
    f.manager.remove_underlyings(gov(), vec![third]).unwrap();
    assert!(!f.manager.underlyings().contains(&third));
}

#[test]
fn mint_opens_a_position_and_debits_the_book() {
    let mut f = fixture();
    f.manager.receive_token(reserve(), STAKE).unwrap();
    f.manager.receive_token(weth(), STAKE).unwrap();

    let token_id = f
        .manager
        .mint(
            &mut f.amm,
            gov(),
            weth(),
            reserve(),
            FEE_TIER,
            TICK_LOWER,
            TICK_UPPER,
            STAKE,
            STAKE,
        )
        .unwrap();

    let liquidity = expected_liquidity(STAKE);
    let (used0, used1) = expected_amounts(liquidity);
    let position = f
        .manager
        .check_pos(super::pool(), TICK_LOWER, TICK_UPPER)
        .expect("position resolvable by key");
    assert_eq!(position.token_id, token_id);
    assert_eq!(position.liquidity, liquidity);
    assert_eq!(f.manager.active_positions().len(), 1);
    assert_eq!(f.manager.balance_of(weth()), STAKE - used0);
    assert_eq!(f.manager.balance_of(reserve()), STAKE - used1);
    assert!(f.manager.records().iter().any(|r| matches!(
        r,
        ManagerRecord::Mint { token_id: id, .. } if *id == token_id
    )));
}

#[test]
fn mint_requires_whitelisted_tokens() {
    let mut f = fixture();
    assert_eq!(
        f.manager.mint(
            &mut f.amm,
            gov(),
            addr(0x999),
            reserve(),
            FEE_TIER,
            TICK_LOWER,
            TICK_UPPER,
            1,
            1,
        ),
        Err(ManagerError::UnknownToken)
    );
}

#[test]
fn mint_requires_authorization() {
    let mut f = fixture();
    assert_eq!(
        f.manager.mint(
            &mut f.amm,
            outsider(),
            weth(),
            reserve(),
            FEE_TIER,
            TICK_LOWER,
            TICK_UPPER,
            1,
            1,
        ),
        Err(ManagerError::NotAuthorized)
    );
}

#[test]
fn duplicate_key_grows_the_existing_position() {
    let mut f = fixture();
    let first = f.with_position(0, STAKE);
    let liquidity_after_first = f.manager.active_positions()[0].liquidity;

    f.manager.receive_token(reserve(), STAKE).unwrap();
    f.manager.receive_token(weth(), STAKE).unwrap();
    let second = f
        .manager
        .mint(
            &mut f.amm,
            gov(),
            weth(),
            reserve(),
            FEE_TIER,
            TICK_LOWER,
            TICK_UPPER,
            STAKE,
            STAKE,
        )
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(f.manager.active_positions().len(), 1);
    let position = f.manager.active_positions()[0];
    assert_eq!(position.liquidity, liquidity_after_first + expected_liquidity(STAKE));
}

#[test]
fn decrease_enforces_the_slippage_floors() {
    let mut f = fixture();
    let id = f.with_position(0, STAKE);
    let liquidity = f.manager.active_positions()[0].liquidity;
    let (amount0, _) = expected_amounts(liquidity / 2);

    assert_eq!(
        f.manager.decrease_liquidity(
            &mut f.amm,
            gov(),
            id,
            liquidity / 2,
            amount0 + 10,
            0,
        ),
        Err(ManagerError::Slippage)
    );
    // Nothing moved.
    assert_eq!(f.manager.active_positions()[0].liquidity, liquidity);
}

#[test]
fn decrease_cannot_exceed_position_liquidity() {
    let mut f = fixture();
    let id = f.with_position(0, STAKE);
    let liquidity = f.manager.active_positions()[0].liquidity;
    assert_eq!(
        f.manager
            .decrease_liquidity(&mut f.amm, gov(), id, liquidity + 1, 0, 0),
        Err(ManagerError::InsufficientLiquidity)
    );
}

#[test]
fn decrease_then_collect_credits_the_book_and_prunes() {
    let mut f = fixture();
    let id = f.with_position(0, STAKE);
    let liquidity = f.manager.active_positions()[0].liquidity;
    let weth_before = f.manager.balance_of(weth());
    let reserve_before = f.manager.balance_of(reserve());

    let (owed0, owed1) = f
        .manager
        .decrease_liquidity(&mut f.amm, gov(), id, liquidity, 0, 0)
        .unwrap();
    // Owed amounts sit at the AMM until collected.
    assert_eq!(f.manager.balance_of(weth()), weth_before);
    assert_eq!(f.manager.balance_of(reserve()), reserve_before);

    let (got0, got1) = f
        .manager
        .collect(&mut f.amm, gov(), id, u128::MAX, u128::MAX)
        .unwrap();
    assert_eq!((got0, got1), (owed0, owed1));
    assert_eq!(f.manager.balance_of(weth()), weth_before + got0);
    assert_eq!(f.manager.balance_of(reserve()), reserve_before + got1);

    // Fully drained: the position has left the works set.
    assert!(f.manager.active_positions().is_empty());
    assert!(f.manager.check_pos(super::pool(), TICK_LOWER, TICK_UPPER).is_none());
}

#[test]
fn valuation_sums_idle_and_deployed_value() {
    let mut f = fixture();
    f.with_position(1_000_000, STAKE);

    let idle_reserve = f.manager.balance_of(reserve());
    let idle_weth = f.manager.balance_of(weth());
    let idle = f.manager.idle_assets(&f.amm).unwrap();
    assert_eq!(idle, idle_reserve + idle_weth * WETH_RATE);

    let liquidity = f.manager.active_positions()[0].liquidity;
    let (amount0, amount1) = expected_amounts(liquidity);
    let deployed = f.manager.liquidity_assets(&f.amm).unwrap();
    assert_eq!(deployed, amount0 * WETH_RATE + amount1);

    assert_eq!(f.manager.assets(&f.amm).unwrap(), idle + deployed);
}

#[test]
fn withdraw_from_idle_reserve_leaves_positions_alone() {
    let mut f = fixture();
    f.with_position(1_000_000, STAKE);
    let liquidity = f.manager.active_positions()[0].liquidity;
    let reserve_before = f.manager.balance_of(reserve());

    let paid = f
        .manager
        .withdraw(&mut f.amm, fund(), outsider(), 500_000, 0)
        .unwrap();
    assert_eq!(paid, 500_000);
    assert_eq!(f.manager.balance_of(reserve()), reserve_before - 500_000);
    assert_eq!(f.manager.active_positions()[0].liquidity, liquidity);
}

#[test]
fn withdraw_is_fund_only() {
    let mut f = fixture();
    f.with_position(1_000_000, STAKE);
    assert_eq!(
        f.manager.withdraw(&mut f.amm, gov(), outsider(), 1, 0),
        Err(ManagerError::NotFund)
    );
}

#[test]
fn withdraw_beyond_idle_shrinks_every_position_proportionally() {
    let mut f = fixture();
    f.with_position(1_000_000, STAKE);
    // A second, wider position so the proportional shrink spans the set.
    f.manager.receive_token(reserve(), STAKE).unwrap();
    f.manager.receive_token(weth(), STAKE).unwrap();
    f.manager
        .mint(
            &mut f.amm,
            gov(),
            weth(),
            reserve(),
            FEE_TIER,
            -1200,
            1200,
            STAKE,
            STAKE,
        )
        .unwrap();

    let assets = f.manager.assets(&f.amm).unwrap();
    let liquidity_before: Vec<u128> = f
        .manager
        .active_positions()
        .iter()
        .map(|p| p.liquidity)
        .collect();

    let amount = f.manager.balance_of(reserve()) + 500_000;
    let scale = mul_div(amount, PROPORTION_SCALE, assets).unwrap();
    // Pad the scale a whisker so floor rounding cannot starve the payout.
    let scale = scale + scale / 1_000;

    let paid = f
        .manager
        .withdraw(&mut f.amm, fund(), outsider(), amount, scale)
        .unwrap();
    assert_eq!(paid, amount);

    for (position, before) in f.manager.active_positions().iter().zip(&liquidity_before) {
        let expected_delta = mul_div(*before, scale, PROPORTION_SCALE).unwrap();
        assert_eq!(position.liquidity, before - expected_delta);
    }
}

#[test]
fn withdraw_beyond_total_value_fails_whole() {
    let mut f = fixture();
    f.with_position(1_000, STAKE);
    let assets = f.manager.assets(&f.amm).unwrap();
    let positions_before = f.manager.active_positions().to_vec();
    let reserve_before = f.manager.balance_of(reserve());

    assert_eq!(
        f.manager
            .withdraw(&mut f.amm, fund(), outsider(), assets * 2, PROPORTION_SCALE),
        Err(ManagerError::InsufficientLiquidity)
    );
    // All-or-nothing: the book is exactly as before.
    assert_eq!(f.manager.balance_of(reserve()), reserve_before);
    assert_eq!(f.manager.active_positions(), &positions_before[..]);
}

#[test]
fn withdraw_underlyings_pays_in_kind() {
    let mut f = fixture();
    f.with_position(1_000_000, STAKE);
    let liquidity = f.manager.active_positions()[0].liquidity;
    let reserve_before = f.manager.balance_of(reserve());
    let weth_before = f.manager.balance_of(weth());
    let half = PROPORTION_SCALE / 2;

    let payouts = f
        .manager
        .withdraw_underlyings(&mut f.amm, fund(), outsider(), half)
        .unwrap();

    let expected_delta = mul_div(liquidity, half, PROPORTION_SCALE).unwrap();
    assert_eq!(
        f.manager.active_positions()[0].liquidity,
        liquidity - expected_delta
    );
    let (harvest0, harvest1) = expected_amounts(expected_delta);
    let paid = |token| {
        payouts
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, a)| *a)
            .unwrap_or(0)
    };
    assert_eq!(paid(reserve()), reserve_before / 2 + harvest1);
    assert_eq!(paid(weth()), weth_before / 2 + harvest0);
    // No conversion back to the reserve asset took place.
    assert!(!f
        .manager
        .records()
        .iter()
        .any(|r| matches!(r, ManagerRecord::Swap { .. })));
}

#[test]
fn batch_applies_steps_atomically() {
    let mut f = fixture();
    let id = f.with_position(0, STAKE);
    let liquidity = f.manager.active_positions()[0].liquidity;
    f.manager.receive_token(weth(), 10).unwrap();

    f.manager
        .batch(
            &mut f.amm,
            gov(),
            vec![
                BatchOp::ExactInput {
                    token_in: weth(),
                    token_out: reserve(),
                    amount_in: 10,
                    min_out: 0,
                },
                BatchOp::DecreaseLiquidity {
                    token_id: id,
                    liquidity: liquidity / 2,
                    amount0_min: 0,
                    amount1_min: 0,
                },
                BatchOp::Collect {
                    token_id: id,
                    amount0_max: u128::MAX,
                    amount1_max: u128::MAX,
                },
            ],
        )
        .unwrap();
    assert_eq!(
        f.manager.active_positions()[0].liquidity,
        liquidity - liquidity / 2
    );
}

#[test]
fn batch_failure_rolls_everything_back() {
    let mut f = fixture();
    let id = f.with_position(0, STAKE);
    let liquidity = f.manager.active_positions()[0].liquidity;
    f.manager.receive_token(weth(), 10).unwrap();
    let weth_before = f.manager.balance_of(weth());
    let reserve_before = f.manager.balance_of(reserve());

    let result = f.manager.batch(
        &mut f.amm,
        gov(),
        vec![
            BatchOp::ExactInput {
                token_in: weth(),
                token_out: reserve(),
                amount_in: 10,
                min_out: 0,
            },
            BatchOp::DecreaseLiquidity {
                token_id: id,
                liquidity: liquidity + 1,
                amount0_min: 0,
                amount1_min: 0,
            },
        ],
    );
    assert_eq!(result, Err(ManagerError::InsufficientLiquidity));
    assert_eq!(f.manager.balance_of(weth()), weth_before);
    assert_eq!(f.manager.balance_of(reserve()), reserve_before);
    assert_eq!(f.manager.active_positions()[0].liquidity, liquidity);
}

#[test]
fn batch_requires_governance_or_strategist() {
    let mut f = fixture();
    assert!(matches!(
        f.manager.batch(&mut f.amm, fund(), vec![]),
        Err(ManagerError::Identity(_))
    ));
}
