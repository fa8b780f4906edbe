use thiserror::Error;

/// Errors raised by the fixed-point math routines.
///
/// Arithmetic failures are fatal to the enclosing operation; callers abort
/// and roll back rather than clamping or saturating a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow detected")]
    Overflow,

    #[error("arithmetic underflow detected")]
    Underflow,

    #[error("division by zero attempted")]
    DivisionByZero,

    #[error("tick outside the supported range")]
    TickOutOfBounds,

    #[error("invalid sqrt price range: lower >= upper")]
    InvalidPriceRange,

    #[error("liquidity computed as zero")]
    InvalidLiquidity,
}
