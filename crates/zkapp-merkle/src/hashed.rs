// crates/zkapp-merkle/src/hashed.rs

//! A value together with its commitment.

use zkapp_crypto::Field;

use crate::MerkleError;

/// Types with a canonical commitment.
pub trait Commit {
    /// Commitment of `self`.
    fn commit(&self) -> Field;
}

/// `(hash, value)` pair with `hash == Commit(value)`.
///
/// The value may be withheld (never known, or erased after use). The hash
/// stays valid either way; only operations that need the value fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashedValue<T> {
    hash: Field,
    value: Option<T>,
}

impl<T> HashedValue<T> {
    /// Pair `value` with a commitment computed by `commit`.
    pub fn with_commit(value: T, commit: impl FnOnce(&T) -> Field) -> Self {
        let hash = commit(&value);
        Self {
            hash,
            value: Some(value),
        }
    }

    /// A value known only by its hash.
    #[must_use]
    pub const fn deferred(hash: Field) -> Self {
        Self { hash, value: None }
    }

    /// The commitment.
    #[inline]
    #[must_use]
    pub const fn hash(&self) -> Field {
        self.hash
    }

    /// The value, if not withheld.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The value, or [`MerkleError::Withheld`].
    pub fn unhash(&self) -> Result<&T, MerkleError> {
        self.value
            .as_ref()
            .ok_or(MerkleError::Withheld { hash: self.hash })
    }

    /// Consume into the value, or [`MerkleError::Withheld`].
    pub fn into_value(self) -> Result<T, MerkleError> {
        let hash = self.hash;
        self.value.ok_or(MerkleError::Withheld { hash })
    }

    /// Drop the value, keeping only the hash.
    pub fn erase(&mut self) {
        self.value = None;
    }

    /// True when the value is available.
    #[inline]
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.value.is_some()
    }
}

impl<T: Commit> HashedValue<T> {
    /// Pair `value` with its canonical commitment.
    pub fn new(value: T) -> Self {
        Self::with_commit(value, T::commit)
    }

    /// Pair a value with a claimed hash, checking the claim.
    pub fn from_parts(value: T, hash: Field) -> Result<Self, MerkleError> {
        let actual = value.commit();
        if actual != hash {
            return Err(MerkleError::HashMismatch {
                expected: hash,
                actual,
            });
        }
        Ok(Self {
            hash,
            value: Some(value),
        })
    }

    /// Re-check `hash == Commit(value)`; withheld values pass trivially.
    pub fn check(&self) -> Result<(), MerkleError> {
        match &self.value {
            Some(v) => {
                let actual = v.commit();
                if actual == self.hash {
                    Ok(())
                } else {
                    Err(MerkleError::HashMismatch {
                        expected: self.hash,
                        actual,
                    })
                }
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkapp_crypto::{hash_with_prefix, Prefix};

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Pair(u64, u64);

    impl Commit for Pair {
        fn commit(&self) -> Field {
            hash_with_prefix(Prefix::Event, &[self.0.into(), self.1.into()])
        }
    }

    #[test]
    fn erase_keeps_hash() {
        let mut hv = HashedValue::new(Pair(1, 2));
        let h = hv.hash();
        assert!(hv.is_resolved());
        hv.erase();
        assert_eq!(hv.hash(), h);
        assert_eq!(hv.unhash(), Err(MerkleError::Withheld { hash: h }));
        assert!(hv.check().is_ok());
    }

    #[test]
    fn from_parts_rejects_wrong_hash() {
        let good = Pair(3, 4).commit();
        assert!(HashedValue::from_parts(Pair(3, 4), good).is_ok());
        let err = HashedValue::from_parts(Pair(3, 5), good).unwrap_err();
        assert!(matches!(err, MerkleError::HashMismatch { .. }));
    }

    #[test]
    fn deferred_has_no_value() {
        let hv: HashedValue<Pair> = HashedValue::deferred(Field::from(9u64));
        assert!(!hv.is_resolved());
        assert!(hv.into_value().is_err());
    }
}
