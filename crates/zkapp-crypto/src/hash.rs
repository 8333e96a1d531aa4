// crates/zkapp-crypto/src/hash.rs

//! Prefix-keyed hashing of field vectors.
//!
//! Every protocol commitment in the workspace (update bodies, forest nodes,
//! event lists, action states) goes through [`hash_with_prefix`] so that two
//! commitments of different kinds can never collide on equal inputs.

use blake3::Hasher;

use crate::field::Field;

/// Versioned outer domain separator; bump when the encoding changes.
const HASH_DOMAIN: &[u8] = b"zkapp/hash-with-prefix/v1";

/// Domain separator for salted "empty" constants.
const EMPTY_DOMAIN: &[u8] = b"zkapp/empty-hash/v1";

/// Canonical protocol prefixes.
///
/// Avoids stringly-typed mistakes in domain separation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Prefix {
    /// Account update body commitment.
    AccountUpdateBody,
    /// Forest node: `(update hash, children hash)`.
    AccountUpdateNode,
    /// Forest cons cell: `(node hash, rest-of-forest hash)`.
    AccountUpdateCons,
    /// A single event or action, hashed from its fields.
    Event,
    /// Cons cell of an events list.
    Events,
    /// Cons cell of an actions list, and of the account action state.
    SequenceEvents,
    /// Empty events list.
    EventsEmpty,
    /// Empty actions list.
    SequenceEmpty,
    /// Empty account action state.
    SequenceStateEmpty,
    /// Transaction commitment extended with fee payer and memo.
    FullCommitment,
}

impl Prefix {
    /// Borrow the canonical string.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Prefix::AccountUpdateBody => "zkapp/account-update-body",
            Prefix::AccountUpdateNode => "zkapp/account-update-node",
            Prefix::AccountUpdateCons => "zkapp/account-update-cons",
            Prefix::Event => "zkapp/event",
            Prefix::Events => "zkapp/events",
            Prefix::SequenceEvents => "zkapp/sequence-events",
            Prefix::EventsEmpty => "zkapp/events-empty",
            Prefix::SequenceEmpty => "zkapp/sequence-empty",
            Prefix::SequenceStateEmpty => "zkapp/sequence-state-empty-elt",
            Prefix::FullCommitment => "zkapp/full-commitment",
        }
    }
}

/// Hash a vector of field elements under `prefix`.
///
/// The input length is absorbed before the elements, so `[a]` and `[a, 0]`
/// commit differently.
#[must_use]
pub fn hash_with_prefix(prefix: Prefix, inputs: &[Field]) -> Field {
    let mut h = Hasher::new();
    h.update(HASH_DOMAIN);
    absorb_prefix(&mut h, prefix);
    h.update(&(inputs.len() as u64).to_le_bytes());
    for x in inputs {
        h.update(x.as_bytes());
    }
    Field(*h.finalize().as_bytes())
}

/// Salted constant used as the commitment of an empty list of some kind.
#[must_use]
pub fn empty_hash_with_prefix(prefix: Prefix) -> Field {
    let mut h = Hasher::new();
    h.update(EMPTY_DOMAIN);
    absorb_prefix(&mut h, prefix);
    Field(*h.finalize().as_bytes())
}

fn absorb_prefix(h: &mut Hasher, prefix: Prefix) {
    let s = prefix.as_str();
    h.update(&(s.len() as u32).to_le_bytes());
    h.update(s.as_bytes());
}
