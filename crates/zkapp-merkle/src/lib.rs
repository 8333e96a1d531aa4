// crates/zkapp-merkle/src/lib.rs

//! Hash-consed sequences and hashed values.
//!
//! - [`MerkleList`]: an ordered sequence committed by one rolling hash
//!   `hash' = next_hash(hash, element)`, starting from a fixed empty hash.
//!   Pops are LIFO and must present the true head as witness.
//! - [`HashedValue`]: a value paired with its commitment; the value can be
//!   withheld once only the hash is needed.
//!
//! Both are generic over how elements are committed, so account-update
//! forests, event lists and action stacks all share the same machinery.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]

/// Hashed values and the `Commit` trait.
pub mod hashed;
/// The generic hash-consed list.
pub mod list;

pub use crate::hashed::{Commit, HashedValue};
pub use crate::list::{ListHasher, MerkleList, WithHash};

use zkapp_crypto::Field;

/// Errors raised by list and hashed-value checks.
///
/// Every variant corresponds to a failed circuit assertion: callers must
/// abort the surrounding construction rather than retry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// The witnessed head does not hash to the list commitment.
    #[error("witness mismatch: list commits to {expected}, witness hashes to {computed}")]
    WitnessMismatch {
        /// Commitment held by the list.
        expected: Field,
        /// Hash recomputed from the witness.
        computed: Field,
    },

    /// The commitment is non-empty but no witness is available.
    #[error("no witness available for non-empty list commitment {hash}")]
    MissingWitness {
        /// Commitment held by the list.
        hash: Field,
    },

    /// `pop_exn` (or a taken `pop_if`) on an empty list.
    #[error("pop from an empty list")]
    Empty,

    /// Bounded iteration over a list longer than its bound.
    #[error("list holds {len} elements, more than the bound {max}")]
    TooLong {
        /// Actual number of elements.
        len: usize,
        /// Fixed iteration bound.
        max: usize,
    },

    /// The value was withheld; only its hash is known.
    #[error("value withheld; only its hash {hash} is known")]
    Withheld {
        /// Hash of the withheld value.
        hash: Field,
    },

    /// A commitment differs from the expected one.
    #[error("commitment mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Expected commitment.
        expected: Field,
        /// Actual commitment.
        actual: Field,
    },
}
