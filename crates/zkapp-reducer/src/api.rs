//! Public API traits and small types for the batch reducer.
//!
//! These are the values that cross the boundary between the off-chain
//! preparation step, the proof program and the on-chain batch step.

use serde::{Deserialize, Serialize};
use zkapp_core::empty_action_state;
use zkapp_crypto::Field;

use crate::error::ReducerError;

/// Domain separator for MACs of the mock backend.
pub const DS_MAC_BACKEND: &str = "zkapp/mac-backend/v1";

/// Name of the action-stack proof program.
pub const ACTION_STACK_PROGRAM: &str = "action-stack-prover";

/// Environment override for [`ReducerConfig::batch_size`].
pub const ENV_BATCH_SIZE: &str = "ZKAPP_BATCH_SIZE";
/// Environment override for [`ReducerConfig::max_updates_per_proof`].
pub const ENV_MAX_UPDATES_PER_PROOF: &str = "ZKAPP_MAX_UPDATES_PER_PROOF";
/// Environment override for [`ReducerConfig::max_updates_final_proof`].
pub const ENV_MAX_UPDATES_FINAL_PROOF: &str = "ZKAPP_MAX_UPDATES_FINAL_PROOF";
/// Environment override for [`ReducerConfig::max_actions_per_update`].
pub const ENV_MAX_ACTIONS_PER_UPDATE: &str = "ZKAPP_MAX_ACTIONS_PER_UPDATE";
/// Environment override for [`ReducerConfig::proofs_enabled`].
pub const ENV_PROOFS_ENABLED: &str = "ZKAPP_PROOFS_ENABLED";

/// A value that can be dispatched as an action.
///
/// `from_fields(to_fields(a))` must give back `a`; fetched encodings that do
/// not round-trip are rejected.
pub trait Actionable: Clone {
    /// Field encoding.
    fn to_fields(&self) -> Vec<Field>;

    /// Decode; `None` for malformed input.
    fn from_fields(fields: &[Field]) -> Option<Self>;

    /// Placeholder handed to the callback for dummy slots.
    fn empty() -> Self;
}

impl Actionable for Field {
    fn to_fields(&self) -> Vec<Field> {
        vec![*self]
    }

    fn from_fields(fields: &[Field]) -> Option<Self> {
        match fields {
            [x] => Some(*x),
            _ => None,
        }
    }

    fn empty() -> Self {
        Self::ZERO
    }
}

impl Actionable for u64 {
    fn to_fields(&self) -> Vec<Field> {
        vec![Field::from(*self)]
    }

    fn from_fields(fields: &[Field]) -> Option<Self> {
        match fields {
            [x] => x.to_u64(),
            _ => None,
        }
    }

    fn empty() -> Self {
        0
    }
}

/// Intermediate result of popping action lists off the backlog and stacking
/// them in reverse order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStackState {
    /// Remaining backlog commitment (an account action state).
    pub actions: Field,
    /// Reversed-stack commitment built so far.
    pub stack: Field,
}

impl ActionStackState {
    /// Start of a fresh reversal at `actions`.
    #[must_use]
    pub fn initial(actions: Field) -> Self {
        Self {
            actions,
            stack: empty_action_state(),
        }
    }

    /// Field encoding `[actions, stack]`.
    #[must_use]
    pub fn to_fields(&self) -> Vec<Field> {
        vec![self.actions, self.stack]
    }
}

/// One pending action list as seen by the proof program: its hash and the
/// account action state right before it was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionWitness {
    /// Action-list commitment.
    pub hash: Field,
    /// Account action state before this list.
    pub state_before: Field,
}

/// The contract's own reducer anchors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducerState {
    /// Last fully processed action state.
    pub action_state: Field,
    /// Commitment to the not yet processed reversed stack.
    pub action_stack: Field,
}

impl Default for ReducerState {
    fn default() -> Self {
        Self {
            action_state: empty_action_state(),
            action_stack: empty_action_state(),
        }
    }
}

/// Fixed sizes of the reducer's circuits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReducerConfig {
    /// Action slots handed to the callback per batch.
    pub batch_size: usize,
    /// Action lists popped per recursive proof step.
    pub max_updates_per_proof: usize,
    /// Action lists popped inside the batch step itself.
    pub max_updates_final_proof: usize,
    /// Largest action list one update may dispatch.
    pub max_actions_per_update: usize,
    /// Produce and verify real proofs (dummies otherwise).
    pub proofs_enabled: bool,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ReducerConfig {
    /// Defaults for the given batch size.
    #[must_use]
    pub const fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            max_updates_per_proof: 300,
            max_updates_final_proof: 100,
            max_actions_per_update: batch_size,
            proofs_enabled: true,
        }
    }

    /// Reject sizes no circuit could be built for.
    pub fn validate(&self) -> Result<(), ReducerError> {
        if self.batch_size == 0 {
            return Err(ReducerError::Config("batch_size must be positive"));
        }
        if self.max_updates_per_proof == 0 {
            return Err(ReducerError::Config("max_updates_per_proof must be positive"));
        }
        if self.max_updates_final_proof == 0 {
            return Err(ReducerError::Config("max_updates_final_proof must be positive"));
        }
        if self.max_actions_per_update == 0 {
            return Err(ReducerError::Config("max_actions_per_update must be positive"));
        }
        // Whole lists are processed at once, so one must always fit.
        if self.max_actions_per_update > self.batch_size {
            return Err(ReducerError::Config(
                "max_actions_per_update must not exceed batch_size",
            ));
        }
        Ok(())
    }

    /// Merge environment overrides.
    ///
    /// Recognized variables:
    /// - `ZKAPP_BATCH_SIZE` = `<usize>`
    /// - `ZKAPP_MAX_UPDATES_PER_PROOF` = `<usize>`
    /// - `ZKAPP_MAX_UPDATES_FINAL_PROOF` = `<usize>`
    /// - `ZKAPP_MAX_ACTIONS_PER_UPDATE` = `<usize>`
    /// - `ZKAPP_PROOFS_ENABLED` = `0` | `1` | `true` | `false`
    ///
    /// Unparsable values are ignored.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        let read = |name: &str| std::env::var(name).ok().and_then(|v| v.trim().parse::<usize>().ok());
        if let Some(v) = read(ENV_BATCH_SIZE) {
            self.batch_size = v;
        }
        if let Some(v) = read(ENV_MAX_UPDATES_PER_PROOF) {
            self.max_updates_per_proof = v;
        }
        if let Some(v) = read(ENV_MAX_UPDATES_FINAL_PROOF) {
            self.max_updates_final_proof = v;
        }
        if let Some(v) = read(ENV_MAX_ACTIONS_PER_UPDATE) {
            self.max_actions_per_update = v;
        }
        if let Ok(v) = std::env::var(ENV_PROOFS_ENABLED) {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => self.proofs_enabled = true,
                "0" | "false" => self.proofs_enabled = false,
                _ => {}
            }
        }
        self
    }
}
