use amm_math::MathError;
use liquidity_manager::error::ManagerError;
use liquidity_manager::identity::IdentityError;
use thiserror::Error;

/// Errors raised by the fund surface.
///
/// Authorization and validation failures reject before any mutation;
/// arithmetic failures abort the whole operation with the pre-call state
/// restored. There is no partial fee application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FundError {
    #[error("fund is already bound")]
    AlreadyBound,

    #[error("fund is not bound")]
    NotBound,

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("fee ratio exceeds its denominator")]
    InvalidRatio,

    #[error("deposit would push global assets past the cap")]
    CapExceeded,

    #[error("amount must be nonzero")]
    InvalidAmount,

    #[error("share balance is insufficient")]
    InsufficientShares,

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Math(#[from] MathError),
}
