// crates/zkapp-reducer/src/program.rs

//! Recursive action-stack program.
//!
//! Reverses the pending backlog of action lists into a *stack* commitment
//! while doing a bounded amount of work per proof. Public input is the
//! account action state at the end of the backlog; public output is an
//! [`ActionStackState`]: the backlog commitment still to be reversed and
//! the stack built so far.
//!
//! One step pops up to `max_updates_per_proof` lists off the backlog (newest
//! first) and pushes each onto the stack, so the stack pops oldest first.
//! Steps run from the newest chunk to the oldest, each verifying the
//! previous proof and starting where it ended.

use std::marker::PhantomData;

use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};
use zkapp_core::{update_sequence_state, ActionStateList, ProvingBackend, Statement};
use zkapp_crypto::Field;

use crate::api::{ActionStackState, ActionWitness, ACTION_STACK_PROGRAM};
use crate::error::{ensure_eq, ReducerError};

/* ------------------------- versioned proof envelope ------------------------ */

#[repr(u16)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
enum WireVersion {
    V1 = 1,
}

/// A proof of the action-stack program plus its public values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStackProof<P> {
    /// Account action state the reversal started from.
    pub public_input: Field,
    /// What is left of the backlog and the stack built so far.
    pub public_output: ActionStackState,
    /// Backend proof object.
    pub proof: P,
}

impl<P: Serialize + DeserializeOwned> ActionStackProof<P> {
    /// Encode as a versioned `bincode` envelope.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        bincode::serialize(&(WireVersion::V1, self)).context("serializing action-stack proof")
    }

    /// Decode an envelope produced by [`ActionStackProof::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let (ver, proof): (WireVersion, Self) =
            bincode::deserialize(bytes).context("decoding action-stack proof envelope")?;
        anyhow::ensure!(ver == WireVersion::V1, "unsupported action-stack proof version");
        Ok(proof)
    }
}

/// Pop up to `max` action lists off `start.actions` (newest first) and push
/// each onto `start.stack`.
///
/// `witnesses` are oldest first; every one must chain into the current
/// backlog commitment.
pub fn action_stack_chunk(
    max: usize,
    start: ActionStackState,
    witnesses: &[ActionWitness],
) -> Result<ActionStackState, ReducerError> {
    if witnesses.len() > max {
        return Err(ReducerError::TooManyWitnesses {
            len: witnesses.len(),
            max,
        });
    }
    let mut actions = start.actions;
    let mut stack = ActionStateList::empty_from(start.stack);
    // Fixed number of slots; slots past the witnesses are no-ops.
    for i in (0..max).rev() {
        let Some(w) = witnesses.get(i) else {
            continue;
        };
        ensure_eq("action state", actions, update_sequence_state(w.state_before, w.hash))?;
        actions = w.state_before;
        stack.push(w.hash);
    }
    Ok(ActionStackState {
        actions,
        stack: stack.hash(),
    })
}

/// Output of [`ActionStackProgram::prove_partial_action_stack`].
#[derive(Clone, Debug)]
pub struct PartialActionStack<P> {
    /// Proof over every list except the oldest `final_witnesses`.
    pub proof: ActionStackProof<P>,
    /// Whether `proof` covers anything; `false` means it is a dummy.
    pub is_recursive: bool,
    /// Oldest lists, left for the batch step to pop itself.
    pub final_witnesses: Vec<ActionWitness>,
}

/// The action-stack program over backend `B`.
#[derive(Debug)]
pub struct ActionStackProgram<B> {
    max_updates_per_proof: usize,
    _backend: PhantomData<fn() -> B>,
}

impl<B> Clone for ActionStackProgram<B> {
    fn clone(&self) -> Self {
        Self {
            max_updates_per_proof: self.max_updates_per_proof,
            _backend: PhantomData,
        }
    }
}

impl<B: ProvingBackend> ActionStackProgram<B> {
    /// Program popping `max_updates_per_proof` lists per step.
    pub fn new(max_updates_per_proof: usize) -> Result<Self, ReducerError> {
        if max_updates_per_proof == 0 {
            return Err(ReducerError::Config("max_updates_per_proof must be positive"));
        }
        Ok(Self {
            max_updates_per_proof,
            _backend: PhantomData,
        })
    }

    /// Lists popped per step.
    #[must_use]
    pub const fn max_updates_per_proof(&self) -> usize {
        self.max_updates_per_proof
    }

    /// Backend statement for `input -> output`.
    #[must_use]
    pub fn statement(input: Field, output: ActionStackState) -> Statement {
        Statement::new(ACTION_STACK_PROGRAM, vec![input], output.to_fields())
    }

    /// A placeholder proof claiming `input -> output`; never verifies.
    #[must_use]
    pub fn dummy(input: Field, output: ActionStackState) -> ActionStackProof<B::Proof> {
        ActionStackProof {
            public_input: input,
            public_output: output,
            proof: B::dummy(&Self::statement(input, output)),
        }
    }

    /// Verify `proof` against its own public values.
    pub fn verify(&self, proof: &ActionStackProof<B::Proof>) -> Result<(), ReducerError> {
        let st = Self::statement(proof.public_input, proof.public_output);
        B::verify(&st, &proof.proof).map_err(|e| ReducerError::ProofRejected(format!("{e:#}")))
    }

    /// One recursive step.
    ///
    /// When `is_recursive`, `prior` must verify and share this step's
    /// `input`; the step continues from its output. Otherwise `prior` is
    /// ignored and the step starts a fresh reversal at `input`.
    pub fn prove_chunk(
        &self,
        input: Field,
        prior: &ActionStackProof<B::Proof>,
        is_recursive: bool,
        witnesses: &[ActionWitness],
    ) -> Result<ActionStackProof<B::Proof>, ReducerError> {
        let start = if is_recursive {
            self.verify(prior)?;
            ensure_eq("prior proof input", input, prior.public_input)?;
            prior.public_output
        } else {
            ActionStackState::initial(input)
        };
        let output = action_stack_chunk(self.max_updates_per_proof, start, witnesses)?;
        let proof = B::prove(&Self::statement(input, output)).map_err(|e| ReducerError::Prover(format!("{e:#}")))?;
        debug!(lists = witnesses.len(), is_recursive, backend = B::NAME, "proved action-stack chunk");
        Ok(ActionStackProof {
            public_input: input,
            public_output: output,
            proof,
        })
    }

    /// Reverse every list in `witnesses` (oldest first), which must end at
    /// the account action state `end`.
    ///
    /// With proofs disabled the result is a dummy carrying the output the
    /// chunks would have produced.
    pub fn prove_action_stack(
        &self,
        end: Field,
        witnesses: &[ActionWitness],
        proofs_enabled: bool,
    ) -> Result<ActionStackProof<B::Proof>, ReducerError> {
        if witnesses.is_empty() {
            return Ok(Self::dummy(end, ActionStackState::initial(end)));
        }

        let mut stack = ActionStateList::empty();
        for w in witnesses.iter().rev() {
            stack.push(w.hash);
        }

        if !proofs_enabled {
            let actions = witnesses.first().map_or(end, |w| w.state_before);
            return Ok(Self::dummy(
                end,
                ActionStackState {
                    actions,
                    stack: stack.hash(),
                },
            ));
        }

        let chunks: Vec<&[ActionWitness]> = witnesses.chunks(self.max_updates_per_proof).collect();
        let mut proof = Self::dummy(end, ActionStackState::initial(end));
        for (i, chunk) in chunks.iter().enumerate().rev() {
            let is_recursive = i + 1 < chunks.len();
            proof = self.prove_chunk(end, &proof, is_recursive, chunk)?;
        }
        ensure_eq("action stack", stack.hash(), proof.public_output.stack)?;
        info!(lists = witnesses.len(), chunks = chunks.len(), "proved action stack");
        Ok(proof)
    }

    /// Leave the oldest `final_chunk_size` lists to the batch step and
    /// prove the rest.
    pub fn prove_partial_action_stack(
        &self,
        end: Field,
        witnesses: &[ActionWitness],
        final_chunk_size: usize,
        proofs_enabled: bool,
    ) -> Result<PartialActionStack<B::Proof>, ReducerError> {
        let split = witnesses.len().min(final_chunk_size);
        let (final_witnesses, remaining) = witnesses.split_at(split);
        let proof = self.prove_action_stack(end, remaining, proofs_enabled)?;
        Ok(PartialActionStack {
            proof,
            is_recursive: !remaining.is_empty(),
            final_witnesses: final_witnesses.to_vec(),
        })
    }
}
