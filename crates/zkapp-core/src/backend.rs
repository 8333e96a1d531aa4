//! Backend abstraction for proving and verification.
//!
//! Implementors provide a *stateless* API (associated functions) over a
//! [`Statement`]: the program name plus its public input and output, all as
//! field elements. Recursive programs verify their prior proof themselves
//! (through [`ProvingBackend::verify`]) before asking for a new one.
//!
//! ## Contracts implementors should uphold
//! - `prove` must bind the proof to every part of the statement.
//! - `verify` must reject if the proof was produced for another program,
//!   another input or another output, and must reject dummy proofs.
//! - `dummy` must be cheap and infallible; it stands in for the prior proof
//!   of a non-recursive step and is never verified.
//! - Neither function should panic for malformed inputs; return `Err` instead.

use std::fmt::Debug;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use zkapp_crypto::Field;

/// Public statement of one proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    /// Program (circuit) name.
    pub program: &'static str,
    /// Public input.
    pub public_input: Vec<Field>,
    /// Public output.
    pub public_output: Vec<Field>,
}

impl Statement {
    /// Assemble a statement.
    #[must_use]
    pub const fn new(program: &'static str, public_input: Vec<Field>, public_output: Vec<Field>) -> Self {
        Self {
            program,
            public_input,
            public_output,
        }
    }
}

/// Minimal backend API the rest of the system depends on.
///
/// Backends are used as type parameters, e.g.
/// `ActionStackProgram::<MacBackend>::prove_action_stack(...)`.
pub trait ProvingBackend {
    /// Serialized proof object.
    type Proof: Clone + Debug + Serialize + DeserializeOwned;

    /// Short backend label carried in proof envelopes.
    const NAME: &'static str;

    /// Produce a proof of `statement`.
    ///
    /// # Errors
    /// Returns an error if the backend cannot construct a proof.
    fn prove(statement: &Statement) -> Result<Self::Proof>;

    /// Verify `proof` against `statement`.
    ///
    /// # Errors
    /// Returns an error if the proof is invalid for the statement.
    fn verify(statement: &Statement, proof: &Self::Proof) -> Result<()>;

    /// A placeholder proof that never verifies.
    fn dummy(statement: &Statement) -> Self::Proof;
}
