//! Hash-committed call forest.
//!
//! - Node: `H(node, [update.hash, children.hash])` binds an update to its
//!   whole subtree.
//! - Forest: a [`MerkleList`] of trees with cons `H(cons, [node, rest])`
//!   and empty hash `0`. Pop order is call order.
//!
//! A forest flattens pre-order into the transaction's update list; call
//! depth is not committed, so it is recomputed while flattening.

use zkapp_crypto::{hash_with_prefix, Field, Prefix};
use zkapp_merkle::{HashedValue, ListHasher, MerkleError, MerkleList};

use crate::account_update::{AccountUpdate, AccountUpdateId};
use crate::error::ForestError;
use crate::layout::{AccountUpdateLayout, NodeRef};

/// Node commitment.
#[must_use]
pub fn hash_node(update_hash: Field, children_hash: Field) -> Field {
    hash_with_prefix(Prefix::AccountUpdateNode, &[update_hash, children_hash])
}

/// Forest cons commitment.
#[must_use]
pub fn hash_cons(node_hash: Field, forest_hash: Field) -> Field {
    hash_with_prefix(Prefix::AccountUpdateCons, &[node_hash, forest_hash])
}

/// Hasher for [`AccountUpdateForest`].
#[derive(Debug)]
pub struct ForestHasher;

impl ListHasher<AccountUpdateTree> for ForestHasher {
    fn next_hash(previous: Field, element: &AccountUpdateTree) -> Field {
        hash_cons(element.hash(), previous)
    }

    fn empty_hash() -> Field {
        Field::ZERO
    }
}

/// One update and its committed subtree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountUpdateTree {
    /// Id of the root update.
    pub id: AccountUpdateId,
    /// Root update with its commitment.
    pub update: HashedValue<AccountUpdate>,
    /// Child calls.
    pub children: AccountUpdateForest,
}

impl AccountUpdateTree {
    /// Assemble a tree.
    #[must_use]
    pub const fn new(
        id: AccountUpdateId,
        update: HashedValue<AccountUpdate>,
        children: AccountUpdateForest,
    ) -> Self {
        Self {
            id,
            update,
            children,
        }
    }

    /// A childless tree.
    #[must_use]
    pub fn from_update(update: AccountUpdate) -> Self {
        Self {
            id: update.id,
            update: update.hashed(),
            children: AccountUpdateForest::empty(),
        }
    }

    /// Node commitment.
    #[must_use]
    pub fn hash(&self) -> Field {
        hash_node(self.update.hash(), self.children.hash())
    }

    /// True if the root update is known and is a dummy.
    #[must_use]
    pub fn is_dummy(&self) -> bool {
        self.update.value().is_some_and(AccountUpdate::is_dummy)
    }

    /// Adopt `child` as the next child call.
    ///
    /// The child is first detached from `layout` (if it lives there) so it
    /// cannot end up with two parents. A bare dummy update is dropped; a
    /// tree is always kept, whatever its root. An id is finalized out of
    /// `layout` and fails with [`ForestError::UnknownNode`] without one.
    pub fn approve(
        &mut self,
        child: impl Into<NodeRef>,
        layout: Option<&mut AccountUpdateLayout>,
    ) -> Result<(), ForestError> {
        let (keep, child) = match (child.into(), layout) {
            (NodeRef::Update(update), layout) => {
                if let Some(layout) = layout {
                    layout.disattach(update.id)?;
                }
                (!update.is_dummy(), Self::from_update(update))
            }
            (NodeRef::Tree(tree), layout) => {
                if let Some(layout) = layout {
                    layout.disattach(tree.id)?;
                }
                (true, tree)
            }
            (NodeRef::Id(id), Some(layout)) => {
                let is_dummy = layout.get(id).ok_or(ForestError::UnknownNode(id))?.is_dummy();
                layout.disattach(id)?;
                (!is_dummy, layout.finalize_tree(id)?)
            }
            (NodeRef::Id(id), None) => return Err(ForestError::UnknownNode(id)),
        };
        self.children.push_tree_if(keep, child);
        Ok(())
    }
}

/// Plain nested update structure, before hashing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleTree {
    /// Root update.
    pub update: AccountUpdate,
    /// Child calls, in call order.
    pub children: Vec<SimpleTree>,
}

/// Ordered, hash-committed list of call trees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountUpdateForest(MerkleList<AccountUpdateTree, ForestHasher>);

impl AccountUpdateForest {
    /// The empty forest (hash `0`).
    #[must_use]
    pub fn empty() -> Self {
        Self(MerkleList::empty())
    }

    /// Forest whose call order equals `trees` order.
    #[must_use]
    pub fn from_reverse(trees: Vec<AccountUpdateTree>) -> Self {
        Self(MerkleList::from_reverse(trees))
    }

    /// Forest commitment.
    #[must_use]
    pub const fn hash(&self) -> Field {
        self.0.hash()
    }

    /// True iff the commitment is the empty one.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of top-level trees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Top-level trees in call order.
    pub fn iter(&self) -> impl Iterator<Item = &AccountUpdateTree> + '_ {
        self.0.iter()
    }

    /// Underlying list.
    #[must_use]
    pub const fn as_list(&self) -> &MerkleList<AccountUpdateTree, ForestHasher> {
        &self.0
    }

    /// Push a bare update as a childless tree.
    ///
    /// The new tree becomes the first in call order.
    pub fn push(&mut self, update: AccountUpdate) {
        self.push_tree(AccountUpdateTree::from_update(update));
    }

    /// Push a bare update iff `cond`.
    pub fn push_if(&mut self, cond: bool, update: AccountUpdate) {
        if cond {
            self.push(update);
        }
    }

    /// Push a tree.
    pub fn push_tree(&mut self, tree: AccountUpdateTree) {
        self.0.push(tree);
    }

    /// Push a tree iff `cond`.
    pub fn push_tree_if(&mut self, cond: bool, tree: AccountUpdateTree) {
        self.0.push_if(cond, tree);
    }

    /// Pop the first tree in call order.
    pub fn pop(&mut self) -> Result<Option<AccountUpdateTree>, MerkleError> {
        self.0.pop()
    }

    /// Pre-order flattening; with `mutate`, each update's `call_depth` is
    /// set from its position, starting at `depth`.
    pub fn to_flat_array(&self, mutate: bool, depth: u32) -> Result<Vec<AccountUpdate>, MerkleError> {
        let mut out = Vec::new();
        self.flatten_into(mutate, depth, &mut out)?;
        Ok(out)
    }

    pub(crate) fn flatten_into(
        &self,
        mutate: bool,
        depth: u32,
        out: &mut Vec<AccountUpdate>,
    ) -> Result<(), MerkleError> {
        for tree in self.iter() {
            let mut update = tree.update.unhash()?.clone();
            if mutate {
                update.body.call_depth = depth;
            }
            out.push(update);
            tree.children.flatten_into(mutate, depth + 1, out)?;
        }
        Ok(())
    }

    /// Rebuild a forest from a flat pre-order list annotated with call depths.
    pub fn from_flat_array(updates: Vec<AccountUpdate>) -> Result<Self, ForestError> {
        let mut it = updates.into_iter().enumerate().peekable();
        let simple = group_by_depth(&mut it, 0)?;
        Ok(Self::from_simple_forest(simple))
    }

    /// Hash a plain nested forest bottom-up (children before parents).
    #[must_use]
    pub fn from_simple_forest(trees: Vec<SimpleTree>) -> Self {
        let nodes = trees
            .into_iter()
            .map(|t| AccountUpdateTree {
                id: t.update.id,
                update: t.update.hashed(),
                children: Self::from_simple_forest(t.children),
            })
            .collect();
        Self::from_reverse(nodes)
    }

    /// Require every update in the forest to be known and to match its hash.
    pub fn assert_constant(&self) -> Result<(), ForestError> {
        self.0.verify_chain()?;
        for tree in self.iter() {
            tree.update.unhash()?;
            tree.update.check()?;
            tree.children.assert_constant()?;
        }
        Ok(())
    }
}

type Numbered = std::iter::Peekable<std::iter::Enumerate<std::vec::IntoIter<AccountUpdate>>>;

fn group_by_depth(it: &mut Numbered, depth: u32) -> Result<Vec<SimpleTree>, ForestError> {
    let mut out = Vec::new();
    while let Some((index, next)) = it.peek() {
        let d = next.body.call_depth;
        if d < depth {
            break;
        }
        if d > depth {
            return Err(ForestError::DepthJump {
                index: *index,
                depth: d,
                max: depth,
            });
        }
        let Some((_, update)) = it.next() else { break };
        let children = group_by_depth(it, depth + 1)?;
        out.push(SimpleTree { update, children });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_update::{PublicKey, TokenId};

    fn upd(x: u64) -> AccountUpdate {
        AccountUpdate::create(PublicKey(Field::from(x)), TokenId::DEFAULT).with_label(x.to_string())
    }

    fn labels(xs: &[AccountUpdate]) -> Vec<(String, u32)> {
        xs.iter().map(|u| (u.label.clone(), u.body.call_depth)).collect()
    }

    #[test]
    fn empty_forest_hashes_to_zero() {
        assert_eq!(AccountUpdateForest::empty().hash(), Field::ZERO);
        assert!(AccountUpdateForest::empty().is_empty());
    }

    #[test]
    fn node_hash_binds_subtree() {
        let mut t = AccountUpdateTree::from_update(upd(1));
        let before = t.hash();
        t.children.push(upd(2));
        assert_ne!(t.hash(), before);
        assert_eq!(t.hash(), hash_node(t.update.hash(), t.children.hash()));
    }

    #[test]
    fn flatten_is_preorder_with_depths() {
        let simple = vec![
            SimpleTree {
                update: upd(1),
                children: vec![
                    SimpleTree {
                        update: upd(2),
                        children: vec![SimpleTree { update: upd(3), children: vec![] }],
                    },
                    SimpleTree { update: upd(4), children: vec![] },
                ],
            },
            SimpleTree { update: upd(5), children: vec![] },
        ];
        let forest = AccountUpdateForest::from_simple_forest(simple);
        let flat = forest.to_flat_array(true, 0).unwrap();
        assert_eq!(
            labels(&flat),
            vec![
                ("1".into(), 0),
                ("2".into(), 1),
                ("3".into(), 2),
                ("4".into(), 1),
                ("5".into(), 0)
            ]
        );

        let rebuilt = AccountUpdateForest::from_flat_array(flat).unwrap();
        assert_eq!(rebuilt.hash(), forest.hash());
    }

    #[test]
    fn flatten_without_mutate_keeps_depths() {
        let mut u = upd(1);
        u.body.call_depth = 9;
        let mut f = AccountUpdateForest::empty();
        f.push(u);
        assert_eq!(f.to_flat_array(false, 0).unwrap()[0].body.call_depth, 9);
        assert_eq!(f.to_flat_array(true, 2).unwrap()[0].body.call_depth, 2);
    }

    #[test]
    fn depth_jump_is_rejected() {
        let a = upd(1);
        let mut b = upd(2);
        b.body.call_depth = 2;
        let err = AccountUpdateForest::from_flat_array(vec![a, b]).unwrap_err();
        assert_eq!(
            err,
            ForestError::DepthJump {
                index: 1,
                depth: 2,
                max: 1
            }
        );
    }

    #[test]
    fn push_if_false_is_noop() {
        let mut f = AccountUpdateForest::empty();
        f.push_if(false, upd(1));
        assert!(f.is_empty());
        f.push_if(true, upd(1));
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn assert_constant_needs_resolved_values() {
        let mut f = AccountUpdateForest::empty();
        f.push(upd(1));
        assert!(f.assert_constant().is_ok());

        let mut t = AccountUpdateTree::from_update(upd(2));
        t.update.erase();
        let mut g = AccountUpdateForest::empty();
        g.push_tree(t);
        assert!(matches!(
            g.assert_constant(),
            Err(ForestError::Merkle(MerkleError::Withheld { .. }))
        ));
        assert!(g.to_flat_array(true, 0).is_err());
    }

    #[test]
    fn approve_drops_dummies() {
        let mut t = AccountUpdateTree::from_update(upd(1));
        t.approve(AccountUpdate::dummy(), None).unwrap();
        assert!(t.children.is_empty());
        t.approve(upd(2), None).unwrap();
        assert_eq!(t.children.len(), 1);
    }

    #[test]
    fn approve_keeps_dummy_rooted_trees() {
        let mut t = AccountUpdateTree::from_update(upd(1));
        let mut dummy = AccountUpdateTree::from_update(AccountUpdate::dummy());
        dummy.children.push(upd(3));
        t.approve(dummy.clone(), None).unwrap();
        assert_eq!(t.children.len(), 1);
        assert_eq!(t.children.hash(), {
            let mut f = AccountUpdateForest::empty();
            f.push_tree(dummy);
            f.hash()
        });
    }

    #[test]
    fn approve_by_id_takes_the_node_out_of_the_layout() {
        let mut layout = AccountUpdateLayout::new(None);
        let a = layout.push_top_level(upd(2)).unwrap();
        layout.push_child(a, upd(3)).unwrap();
        let d = layout.push_top_level(upd(4)).unwrap();
        layout.set_dummy_if(d, true).unwrap();

        let mut t = AccountUpdateTree::from_update(upd(1));
        t.approve(a, Some(&mut layout)).unwrap();
        t.approve(d, Some(&mut layout)).unwrap();
        assert_eq!(t.children.len(), 1);
        assert_eq!(t.children.to_flat_array(true, 1).unwrap().len(), 2);
        assert!(layout.to_flat_list(false).unwrap().is_empty());

        let missing = AccountUpdateId(999);
        assert_eq!(t.approve(missing, None), Err(ForestError::UnknownNode(missing)));
    }
}
