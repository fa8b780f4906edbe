//! Canonical multi-hop route codec.
//!
//! A route is `token₀ ‖ fee₀ ‖ token₁ ‖ fee₁ ‖ … ‖ tokenₙ`: 20-byte token
//! identifiers alternating with 3-byte big-endian fee tiers, no padding and
//! no delimiter. Length alone determines the hop count, so a byte string is
//! a valid route iff `len == 23·n − 3` for some integer `n ≥ 2`.
//!
//! Encoding is a pure, total function over valid inputs with no hidden state.

use crate::types::{Address, FeeTier};
use thiserror::Error;

/// Bytes per token identifier.
pub const TOKEN_LEN: usize = Address::LEN;

/// Bytes per fee tier.
pub const FEE_LEN: usize = 3;

/// Bytes consumed per hop (one token plus one fee tier).
pub const HOP_LEN: usize = TOKEN_LEN + FEE_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("route byte length does not describe a whole number of hops")]
    MalformedRoute,

    #[error("token and fee sequences are inconsistent")]
    LengthMismatch,

    #[error("fee tier does not fit in 3 bytes")]
    FeeTooLarge,
}

/// Encodes an ordered hop sequence into canonical route bytes.
///
/// Requires at least two tokens and exactly one fee tier per adjacent pair.
pub fn encode_path(tokens: &[Address], fees: &[FeeTier]) -> Result<Vec<u8>, PathError> {
    if tokens.len() < 2 || fees.len() != tokens.len() - 1 {
        return Err(PathError::LengthMismatch);
    }
    if fees.iter().any(|fee| *fee >= 1 << (FEE_LEN * 8)) {
        return Err(PathError::FeeTooLarge);
    }

    let mut bytes = Vec::with_capacity(tokens.len() * TOKEN_LEN + fees.len() * FEE_LEN);
    for (i, token) in tokens.iter().enumerate() {
        bytes.extend_from_slice(token.as_bytes());
        if i < fees.len() {
            let fee = fees[i];
            bytes.extend_from_slice(&[(fee >> 16) as u8, (fee >> 8) as u8, fee as u8]);
        }
    }
    Ok(bytes)
}

/// Decodes canonical route bytes back into the token and fee sequences.
///
/// Exact inverse of [`encode_path`]; fails with [`PathError::MalformedRoute`]
/// on any length that is not `23·n − 3` for integer `n ≥ 2`.
pub fn decode_path(bytes: &[u8]) -> Result<(Vec<Address>, Vec<FeeTier>), PathError> {
    let padded = bytes.len() + FEE_LEN;
    if padded % HOP_LEN != 0 || padded / HOP_LEN < 2 {
        return Err(PathError::MalformedRoute);
    }
    let token_count = padded / HOP_LEN;

    let mut tokens = Vec::with_capacity(token_count);
    let mut fees = Vec::with_capacity(token_count - 1);
    let mut offset = 0;
    for i in 0..token_count {
        let mut token = [0u8; TOKEN_LEN];
        token.copy_from_slice(&bytes[offset..offset + TOKEN_LEN]);
        tokens.push(Address::new(token));
        offset += TOKEN_LEN;
        if i < token_count - 1 {
            let fee = ((bytes[offset] as u32) << 16)
                | ((bytes[offset + 1] as u32) << 8)
                | bytes[offset + 2] as u32;
            fees.push(fee);
            offset += FEE_LEN;
        }
    }
    Ok((tokens, fees))
}

/// First and last token of an encoded route.
pub fn path_endpoints(bytes: &[u8]) -> Result<(Address, Address), PathError> {
    let (tokens, _) = decode_path(bytes)?;
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => Ok((*first, *last)),
        _ => Err(PathError::MalformedRoute),
    }
}
