//! Shared protocol identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 20-byte token or account identifier.
///
/// The width is fixed by the canonical route byte format, which packs
/// addresses and 3-byte fee tiers with no padding.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const LEN: usize = 20;

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Builds an address from a small integer, big-endian in the low bytes.
    pub fn from_low_u64_be(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Pool fee tier in hundredths of a basis point; stored as 3 bytes in routes.
pub type FeeTier = u32;

/// Handle of a position held at the external AMM.
pub type TokenId = u64;

/// Fixed-point scale for proportions: 1e18 is 100%.
pub const PROPORTION_SCALE: u128 = 1_000_000_000_000_000_000;
