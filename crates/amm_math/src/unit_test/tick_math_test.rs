use crate::constants::{MAX_SQRT_X64, MAX_TICK, MIN_SQRT_X64, MIN_TICK, ONE_X64};
use crate::error::MathError;
use crate::tick_math::tick_to_sqrt_x64;

#[test]
fn tick_zero_is_unit_price() {
    assert_eq!(tick_to_sqrt_x64(0).unwrap(), ONE_X64);
}

#[test]
fn known_tick_values() {
    // sqrt(1.0001^60) = 1.0001^30 ≈ 1.00300435
    assert_eq!(tick_to_sqrt_x64(60).unwrap(), 18502164624211761448);
    assert_eq!(tick_to_sqrt_x64(-60).unwrap(), 18391489527427947881);
    assert_eq!(tick_to_sqrt_x64(600).unwrap(), 19008502556559666134);
    assert_eq!(tick_to_sqrt_x64(-600).unwrap(), 17901587245414554123);
}

#[test]
fn boundary_ticks_hit_the_clamps() {
    assert_eq!(tick_to_sqrt_x64(MIN_TICK).unwrap(), MIN_SQRT_X64);
    assert_eq!(tick_to_sqrt_x64(MAX_TICK).unwrap(), MAX_SQRT_X64);
}

#[test]
fn out_of_range_ticks_are_rejected() {
    assert_eq!(
        tick_to_sqrt_x64(MIN_TICK - 1),
        Err(MathError::TickOutOfBounds)
    );
    assert_eq!(
        tick_to_sqrt_x64(MAX_TICK + 1),
        Err(MathError::TickOutOfBounds)
    );
}

#[test]
fn negative_ticks_discount_positive_ticks_premium() {
    for tick in [1, 10, 100, 1000, 10000] {
        let up = tick_to_sqrt_x64(tick).unwrap();
        let down = tick_to_sqrt_x64(-tick).unwrap();
        assert!(up > ONE_X64, "tick {tick}");
        assert!(down < ONE_X64, "tick -{tick}");
    }
}
