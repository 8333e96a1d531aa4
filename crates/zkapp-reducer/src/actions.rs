//! Typed action lists and fetching them as proof witnesses.
//!
//! - [`ActionList`]: one update's actions, hashed exactly like the update's
//!   committed action list, so its hash is the value folded into the
//!   account's action state.
//! - [`MerkleActions`]: a list of action lists, committed like the account
//!   action state itself (`state' = update_sequence_state(state, list)`).
//!   Built over the backlog it reproduces the account state; built in
//!   reverse it is the *stack* the batch step pops from.

use anyhow::{Context, Result};
use tracing::info;
use zkapp_core::{empty_action_state, empty_actions_hash, hash_event, push_action_hash, update_sequence_state};
use zkapp_crypto::Field;
use zkapp_merkle::{HashedValue, ListHasher, MerkleList};

use crate::api::{ActionWitness, Actionable};
use crate::error::ReducerError;
use crate::source::{ActionSource, ContractAddress};

/// Hasher for [`ActionList`].
#[derive(Debug)]
pub struct ActionListHasher;

impl<A> ListHasher<HashedValue<A>> for ActionListHasher {
    fn next_hash(previous: Field, element: &HashedValue<A>) -> Field {
        push_action_hash(previous, element.hash())
    }

    fn empty_hash() -> Field {
        empty_actions_hash()
    }
}

/// Actions of one update, in dispatch order (pops newest first).
pub type ActionList<A> = MerkleList<HashedValue<A>, ActionListHasher>;

/// Hasher for [`MerkleActions`].
#[derive(Debug)]
pub struct MerkleActionsHasher;

impl<A> ListHasher<ActionList<A>> for MerkleActionsHasher {
    fn next_hash(previous: Field, element: &ActionList<A>) -> Field {
        update_sequence_state(previous, element.hash())
    }

    fn empty_hash() -> Field {
        empty_action_state()
    }
}

/// A list of per-update action lists.
pub type MerkleActions<A> = MerkleList<ActionList<A>, MerkleActionsHasher>;

/// Pair an action with its event hash.
#[must_use]
pub fn hashed_action<A: Actionable>(action: A) -> HashedValue<A> {
    HashedValue::with_commit(action, |a| hash_event(&a.to_fields()))
}

/// Build one update's action list from dispatch-ordered actions.
pub fn action_list<A: Actionable>(actions: impl IntoIterator<Item = A>) -> ActionList<A> {
    actions.into_iter().map(hashed_action).collect()
}

/// Decode one fetched list; encodings must round-trip.
pub fn action_list_from_fields<A: Actionable>(fields: &[Vec<Field>]) -> Result<ActionList<A>, ReducerError> {
    let mut list = ActionList::empty();
    for f in fields {
        let action = A::from_fields(f)
            .filter(|a| a.to_fields() == *f)
            .ok_or(ReducerError::MalformedAction { len: f.len() })?;
        list.push(hashed_action(action));
    }
    Ok(list)
}

/// Pending actions as fetched: decoded lists plus per-list witnesses.
#[derive(Clone, Debug)]
pub struct FetchedActions<A> {
    /// Account action state after the last fetched list.
    pub end_action_state: Field,
    /// One witness per list, oldest first.
    pub witnesses: Vec<ActionWitness>,
    /// The lists, pushed oldest first on top of the start state.
    pub actions: MerkleActions<A>,
}

/// Fetch every list applied after `from` and derive its witnesses.
pub fn fetch_action_witnesses<A, S>(
    source: &S,
    contract: &ContractAddress,
    from: Field,
) -> Result<FetchedActions<A>>
where
    A: Actionable,
    S: ActionSource + ?Sized,
{
    let fetched = source
        .fetch_actions(contract, from)
        .with_context(|| format!("fetching actions of {contract}"))?;

    let mut actions = MerkleActions::empty_from(from);
    let mut witnesses = Vec::with_capacity(fetched.len());
    let mut state = from;
    for (i, fields) in fetched.iter().enumerate() {
        let list = action_list_from_fields::<A>(fields).with_context(|| format!("decoding action list {i}"))?;
        witnesses.push(ActionWitness {
            hash: list.hash(),
            state_before: state,
        });
        state = update_sequence_state(state, list.hash());
        actions.push(list);
    }

    info!(
        lists = witnesses.len(),
        actions = fetched.iter().map(Vec::len).sum::<usize>(),
        "fetched action witnesses"
    );
    Ok(FetchedActions {
        end_action_state: state,
        witnesses,
        actions,
    })
}
