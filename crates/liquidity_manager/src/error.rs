use crate::amm::AmmError;
use crate::identity::IdentityError;
use crate::path::PathError;
use amm_math::MathError;
use thiserror::Error;

/// Errors raised by the liquidity manager surface.
///
/// Every error aborts the whole operation; compound operations restore their
/// pre-call state before returning one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ManagerError {
    #[error("manager is already bound to a fund")]
    AlreadyBound,

    #[error("manager is not bound to a fund")]
    NotBound,

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("caller is not authorized")]
    NotAuthorized,

    #[error("caller is not the bound fund")]
    NotFund,

    #[error("no swap route configured for the token pair")]
    RouteNotSet,

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("realized amount violates the caller-specified bound")]
    Slippage,

    #[error("requested amount exceeds the available position liquidity")]
    InsufficientLiquidity,

    #[error("idle balance is insufficient for the requested amount")]
    InsufficientBalance,

    #[error("token is not a whitelisted underlying")]
    UnknownToken,

    #[error("no position found for the requested key")]
    UnknownPosition,

    #[error("position custody is with the staking program")]
    PositionStaked,

    #[error("position custody is not with the staking program")]
    NotStaked,

    #[error("token still carries a nonzero balance or an open position")]
    NonZeroBalance,

    #[error("amount must be nonzero")]
    InvalidAmount,

    #[error(transparent)]
    Amm(#[from] AmmError),

    #[error(transparent)]
    Math(#[from] MathError),
}
