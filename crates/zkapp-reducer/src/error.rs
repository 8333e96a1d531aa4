//! Reducer errors.
//!
//! Every variant except [`ReducerError::Config`] stands for a failed
//! in-circuit assertion: the batch cannot be submitted and
//! `prepare_batches` has to be re-run against fresh state.

use zkapp_core::ForestError;
use zkapp_crypto::Field;
use zkapp_merkle::MerkleError;

/// Failures of the reducer, its proof program and its action sources.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReducerError {
    /// Rejected configuration.
    #[error("invalid reducer config: {0}")]
    Config(&'static str),

    /// A list pop, bound or commitment check failed.
    #[error(transparent)]
    Merkle(#[from] MerkleError),

    /// The calling update could not be edited.
    #[error(transparent)]
    Forest(#[from] ForestError),

    /// A witnessed value differs from the trusted one.
    #[error("{what} mismatch: expected {expected}, got {actual}")]
    Mismatch {
        /// What was compared.
        what: &'static str,
        /// Trusted value.
        expected: Field,
        /// Witnessed value.
        actual: Field,
    },

    /// The prior proof did not verify.
    #[error("proof rejected: {0}")]
    ProofRejected(String),

    /// The backend failed to produce a proof.
    #[error("prover failed: {0}")]
    Prover(String),

    /// One update dispatched more actions than a batch step can take.
    #[error("an update dispatched {len} actions, more than max_actions_per_update = {max}")]
    ListTooLarge {
        /// Actions in the list.
        len: usize,
        /// Configured bound.
        max: usize,
    },

    /// More witnesses than one chunk can pop.
    #[error("{len} action witnesses exceed the chunk size {max}")]
    TooManyWitnesses {
        /// Witnesses supplied.
        len: usize,
        /// Chunk size.
        max: usize,
    },

    /// Fetched fields do not decode to an action (or not canonically).
    #[error("malformed action encoding ({len} fields)")]
    MalformedAction {
        /// Number of fields in the rejected encoding.
        len: usize,
    },
}

/// Fail with [`ReducerError::Mismatch`] unless `expected == actual`.
pub(crate) fn ensure_eq(what: &'static str, expected: Field, actual: Field) -> Result<(), ReducerError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ReducerError::Mismatch {
            what,
            expected,
            actual,
        })
    }
}
