use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Fee units (photons) per byte of serialized transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeRate(u64);

impl FeeRate {
    pub const DEFAULT_PHOTONS_PER_BYTE: u64 = 10_000;

    pub const fn new(photons_per_byte: u64) -> Self {
        Self(photons_per_byte)
    }

    pub fn photons_per_byte(&self) -> u64 {
        self.0
    }

    /// fee of a transaction whose fee-basis size is `size` bytes
    pub fn fee_for(&self, size: usize) -> u64 {
        (size as u64).saturating_mul(self.0)
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self(Self::DEFAULT_PHOTONS_PER_BYTE)
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} photons/byte", self.0)
    }
}
