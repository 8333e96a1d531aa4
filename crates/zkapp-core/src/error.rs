//! Errors for forest construction and layout mutation.

use zkapp_merkle::MerkleError;

use crate::account_update::AccountUpdateId;

/// Failures while building, mutating or finalizing a call graph.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ForestError {
    /// A list or hashed-value check failed.
    #[error(transparent)]
    Merkle(#[from] MerkleError),

    /// The id is not part of this layout.
    #[error("account update {0} is not part of this layout")]
    UnknownNode(AccountUpdateId),

    /// The node is already a child of another parent.
    #[error("account update {node} already has parent {parent}; disattach it first")]
    AlreadyAttached {
        /// Node being attached.
        node: AccountUpdateId,
        /// Its current parent.
        parent: AccountUpdateId,
    },

    /// A node cannot be its own child.
    #[error("account update {0} cannot be attached to itself")]
    SelfParent(AccountUpdateId),

    /// Attaching would make a node its own ancestor.
    #[error("account update {node} is an ancestor of {parent}; attaching would form a cycle")]
    Cycle {
        /// Node being attached.
        node: AccountUpdateId,
        /// Requested parent, a descendant of `node`.
        parent: AccountUpdateId,
    },

    /// The operation needs a mutable node or forest, but it was finalized.
    #[error("account update {0} is finalized")]
    Finalized(AccountUpdateId),

    /// `set_children` would silently drop already-pushed children.
    #[error("account update {0} already has mutable children; refusing to replace them")]
    NonEmptyChildren(AccountUpdateId),

    /// A flat update list skips a nesting level.
    #[error("update {index} has call depth {depth}, expected at most {max}")]
    DepthJump {
        /// Position in the flat list.
        index: usize,
        /// Its call depth.
        depth: u32,
        /// Largest admissible depth at that position.
        max: u32,
    },
}
