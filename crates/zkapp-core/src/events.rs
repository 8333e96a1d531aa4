//! Per-update event and action lists, and the account action state.
//!
//! Each update carries two hash-consed lists of field vectors:
//! `hash' = H(prefix, [hash, H(event, fields)])`. A non-empty action list is
//! folded into the account's action state when the transaction is applied:
//! `state' = H(sequence-events, [state, actions.hash])`.

use zkapp_crypto::{empty_hash_with_prefix, hash_with_prefix, Field, Prefix};
use zkapp_merkle::{ListHasher, MerkleList};

/// Commitment of one event/action.
#[must_use]
pub fn hash_event(fields: &[Field]) -> Field {
    hash_with_prefix(Prefix::Event, fields)
}

/// Push an already-hashed action onto an action-list commitment.
#[must_use]
pub fn push_action_hash(list_hash: Field, event_hash: Field) -> Field {
    hash_with_prefix(Prefix::SequenceEvents, &[list_hash, event_hash])
}

/// Commitment of an empty action list.
#[must_use]
pub fn empty_actions_hash() -> Field {
    empty_hash_with_prefix(Prefix::SequenceEmpty)
}

/// Account action state before any action was ever dispatched.
#[must_use]
pub fn empty_action_state() -> Field {
    empty_hash_with_prefix(Prefix::SequenceStateEmpty)
}

/// Fold one action-list commitment into an action state.
#[must_use]
pub fn update_sequence_state(state: Field, list_hash: Field) -> Field {
    hash_with_prefix(Prefix::SequenceEvents, &[state, list_hash])
}

/// Hasher for [`Events`].
#[derive(Debug)]
pub struct EventsHasher;

impl ListHasher<Vec<Field>> for EventsHasher {
    fn next_hash(previous: Field, element: &Vec<Field>) -> Field {
        hash_with_prefix(Prefix::Events, &[previous, hash_event(element)])
    }

    fn empty_hash() -> Field {
        empty_hash_with_prefix(Prefix::EventsEmpty)
    }
}

/// Hasher for [`Actions`].
#[derive(Debug)]
pub struct ActionsHasher;

impl ListHasher<Vec<Field>> for ActionsHasher {
    fn next_hash(previous: Field, element: &Vec<Field>) -> Field {
        push_action_hash(previous, hash_event(element))
    }

    fn empty_hash() -> Field {
        empty_actions_hash()
    }
}

/// Events emitted by one update.
pub type Events = MerkleList<Vec<Field>, EventsHasher>;

/// Actions dispatched by one update, in dispatch order.
pub type Actions = MerkleList<Vec<Field>, ActionsHasher>;

/// Hasher for the account action state viewed as a list of action-list hashes.
#[derive(Debug)]
pub struct ActionStateHasher;

impl ListHasher<Field> for ActionStateHasher {
    fn next_hash(previous: Field, element: &Field) -> Field {
        update_sequence_state(previous, *element)
    }

    fn empty_hash() -> Field {
        empty_action_state()
    }
}

/// Account action state as a list of action-list hashes.
pub type ActionStateList = MerkleList<Field, ActionStateHasher>;

#[cfg(test)]
mod tests {
    use super::*;

    fn action(xs: &[u64]) -> Vec<Field> {
        xs.iter().copied().map(Field::from).collect()
    }

    #[test]
    fn actions_and_events_differ() {
        let mut a = Actions::empty();
        let mut e = Events::empty();
        a.push(action(&[1, 2]));
        e.push(action(&[1, 2]));
        assert_ne!(a.hash(), e.hash());
        assert_ne!(Actions::empty().hash(), Events::empty().hash());
    }

    #[test]
    fn action_list_hash_matches_manual_fold() {
        let xs = [action(&[1]), action(&[2, 3])];
        let list: Actions = xs.iter().cloned().collect();
        let manual = xs
            .iter()
            .fold(empty_actions_hash(), |h, x| push_action_hash(h, hash_event(x)));
        assert_eq!(list.hash(), manual);
    }

    #[test]
    fn action_state_list_folds_sequence_state() {
        let l1 = Field::from(11u64);
        let l2 = Field::from(12u64);
        let list: ActionStateList = [l1, l2].into_iter().collect();
        let manual = update_sequence_state(update_sequence_state(empty_action_state(), l1), l2);
        assert_eq!(list.hash(), manual);
    }
}
