// crates/zkapp-crypto/src/field.rs

//! Opaque field element.
//!
//! The transaction core never does arithmetic on field elements; it only
//! hashes, compares and moves them around. A fixed 32-byte little-endian
//! encoding is therefore all we need.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A field element in canonical 32-byte little-endian encoding.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Field(pub [u8; 32]);

impl Field {
    /// The zero element (also the empty-forest sentinel).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Borrow the canonical encoding.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Decode a small value, if the element fits into a `u64`.
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        if self.0[8..].iter().any(|&b| b != 0) {
            return None;
        }
        let mut lo = [0u8; 8];
        lo.copy_from_slice(&self.0[..8]);
        Some(u64::from_le_bytes(lo))
    }

    /// True iff this is [`Field::ZERO`].
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<u64> for Field {
    fn from(x: u64) -> Self {
        let mut out = [0u8; 32];
        out[..8].copy_from_slice(&x.to_le_bytes());
        Self(out)
    }
}

impl From<u32> for Field {
    fn from(x: u32) -> Self {
        Self::from(u64::from(x))
    }
}

impl From<bool> for Field {
    fn from(b: bool) -> Self {
        Self::from(u64::from(b))
    }
}

impl From<[u8; 32]> for Field {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Field {
    // Short form keeps nested debug output of lists readable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_u64() {
            Some(x) => write!(f, "Field({x})"),
            None => write!(f, "Field(0x{}..)", hex::encode(&self.0[..6])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Field;
    use proptest::prelude::*;

    #[test]
    fn small_values_decode() {
        assert_eq!(Field::from(0u64), Field::ZERO);
        assert_eq!(Field::from(true).to_u64(), Some(1));
        assert_eq!(Field::from(u64::MAX).to_u64(), Some(u64::MAX));

        let mut big = [0u8; 32];
        big[31] = 1;
        assert_eq!(Field(big).to_u64(), None);
    }

    #[test]
    fn display_is_full_hex() {
        let s = Field::from(1u64).to_string();
        assert_eq!(s.len(), 64);
        assert!(s.starts_with("01"));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn u64_roundtrip(x in any::<u64>()) {
            prop_assert_eq!(Field::from(x).to_u64(), Some(x));
        }
    }
}
