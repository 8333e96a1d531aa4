//! Mutable staging nodes for the call graph.
//!
//! An [`UnfinishedTree`] holds either a still-mutable update or an already
//! hashed one, plus an [`UnfinishedForest`] of children that is either a
//! mutable list of arena ids or a finalized [`AccountUpdateForest`].
//! Parent/child links are ids into the owning
//! [`AccountUpdateLayout`](crate::layout::AccountUpdateLayout).

use zkapp_crypto::Field;
use zkapp_merkle::HashedValue;

use crate::account_update::{AccountUpdate, AccountUpdateId};
use crate::forest::{AccountUpdateForest, AccountUpdateTree};

/// The update held by a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeContent {
    /// Still editable.
    Mutable(AccountUpdate),
    /// Hashed and frozen.
    Final(HashedValue<AccountUpdate>),
}

impl NodeContent {
    /// Commitment of the held update.
    #[must_use]
    pub fn hash(&self) -> Field {
        match self {
            Self::Mutable(u) => u.hash(),
            Self::Final(h) => h.hash(),
        }
    }

    /// The update, if known.
    #[must_use]
    pub const fn update(&self) -> Option<&AccountUpdate> {
        match self {
            Self::Mutable(u) => Some(u),
            Self::Final(h) => h.value(),
        }
    }
}

/// Children of a staging node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnfinishedForest {
    /// Child ids in call order.
    Mutable(Vec<AccountUpdateId>),
    /// Finalized; no further pushes or removals.
    Final(AccountUpdateForest),
}

impl Default for UnfinishedForest {
    fn default() -> Self {
        Self::empty()
    }
}

impl UnfinishedForest {
    /// An empty mutable forest.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Mutable(Vec::new())
    }

    /// Wrap a finalized forest.
    #[must_use]
    pub const fn from_forest(forest: AccountUpdateForest) -> Self {
        Self::Final(forest)
    }

    /// True once finalized.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }

    /// True for an empty mutable list, or a final forest with empty hash.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Mutable(ids) => ids.is_empty(),
            Self::Final(f) => f.is_empty(),
        }
    }

    /// Mutable child ids (empty when final).
    #[must_use]
    pub fn mutable_ids(&self) -> &[AccountUpdateId] {
        match self {
            Self::Mutable(ids) => ids,
            Self::Final(_) => &[],
        }
    }
}

/// One staging node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnfinishedTree {
    pub(crate) id: AccountUpdateId,
    pub(crate) content: NodeContent,
    pub(crate) children: UnfinishedForest,
    pub(crate) parent: Option<AccountUpdateId>,
    pub(crate) is_dummy: bool,
}

impl UnfinishedTree {
    /// A mutable node; the dummy flag is taken from the update.
    #[must_use]
    pub fn create(update: AccountUpdate) -> Self {
        Self {
            id: update.id,
            is_dummy: update.is_dummy(),
            content: NodeContent::Mutable(update),
            children: UnfinishedForest::empty(),
            parent: None,
        }
    }

    /// A final node mirroring a finalized tree.
    #[must_use]
    pub fn from_tree(tree: AccountUpdateTree) -> Self {
        Self {
            id: tree.id,
            is_dummy: false,
            content: NodeContent::Final(tree.update),
            children: UnfinishedForest::from_forest(tree.children),
            parent: None,
        }
    }

    /// Node id.
    #[must_use]
    pub const fn id(&self) -> AccountUpdateId {
        self.id
    }

    /// Held update.
    #[must_use]
    pub const fn content(&self) -> &NodeContent {
        &self.content
    }

    /// Children.
    #[must_use]
    pub const fn children(&self) -> &UnfinishedForest {
        &self.children
    }

    /// Current parent, if attached.
    #[must_use]
    pub const fn parent(&self) -> Option<AccountUpdateId> {
        self.parent
    }

    /// Witnessed dummy flag; dummies are dropped at finalization.
    #[must_use]
    pub const fn is_dummy(&self) -> bool {
        self.is_dummy
    }

    /// True if the update is frozen.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self.content, NodeContent::Final(_))
    }

    /// Turn a final node back into a mutable one holding `update`.
    ///
    /// The finalized children are dropped and the dummy flag is kept. A
    /// mutable node is left untouched, so edits made in place survive a
    /// stale copy being pushed again.
    pub(crate) fn set_to_update(&mut self, update: AccountUpdate) {
        if !self.is_final() {
            return;
        }
        self.children = UnfinishedForest::empty();
        self.is_dummy |= update.is_dummy();
        self.content = NodeContent::Mutable(update);
    }

    /// Replace the node with a finalized tree; returns orphaned child ids.
    pub(crate) fn set_to_tree(&mut self, tree: AccountUpdateTree) -> Vec<AccountUpdateId> {
        let orphans = match std::mem::replace(
            &mut self.children,
            UnfinishedForest::from_forest(tree.children),
        ) {
            UnfinishedForest::Mutable(ids) => ids,
            UnfinishedForest::Final(_) => Vec::new(),
        };
        self.content = NodeContent::Final(tree.update);
        self.is_dummy = false;
        orphans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_update::{PublicKey, TokenId};

    #[test]
    fn create_picks_up_dummy_flag() {
        assert!(UnfinishedTree::create(AccountUpdate::dummy()).is_dummy());
        let real = AccountUpdate::create(PublicKey(Field::from(1u64)), TokenId::DEFAULT);
        let node = UnfinishedTree::create(real.clone());
        assert!(!node.is_dummy());
        assert!(!node.is_final());
        assert_eq!(node.content().hash(), real.hash());
    }

    #[test]
    fn set_to_switches_variants() {
        let real = AccountUpdate::create(PublicKey(Field::from(1u64)), TokenId::DEFAULT);
        let mut node = UnfinishedTree::create(real.clone());
        node.children = UnfinishedForest::Mutable(vec![AccountUpdateId(5)]);

        let mut tree = AccountUpdateTree::from_update(real.clone());
        tree.children.push(AccountUpdate::create(PublicKey(Field::from(2u64)), TokenId::DEFAULT));
        let orphans = node.set_to_tree(tree.clone());
        assert_eq!(orphans, vec![AccountUpdateId(5)]);
        assert!(node.is_final());
        assert_eq!(node.children(), &UnfinishedForest::Final(tree.children));

        node.is_dummy = true;
        node.set_to_update(real);
        assert!(!node.is_final());
        assert!(node.is_dummy());
        assert_eq!(node.children(), &UnfinishedForest::empty());
    }

    #[test]
    fn set_to_update_leaves_mutable_nodes_alone() {
        let real = AccountUpdate::create(PublicKey(Field::from(1u64)), TokenId::DEFAULT);
        let mut node = UnfinishedTree::create(real.clone());
        node.is_dummy = true;
        node.children = UnfinishedForest::Mutable(vec![AccountUpdateId(5)]);
        if let NodeContent::Mutable(u) = &mut node.content {
            u.body.balance_change = 3;
        }

        node.set_to_update(real);
        assert!(node.is_dummy());
        assert_eq!(node.children().mutable_ids(), &[AccountUpdateId(5)]);
        assert_eq!(node.content().update().map(|u| u.body.balance_change), Some(3));
    }
}
