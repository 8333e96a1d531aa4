//! `AccountUpdateLayout`: arena owner of one call's pending update graph.
//!
//! Nodes live in a map keyed by [`AccountUpdateId`]; parent/child links are
//! ids. The layout starts with a synthetic root (a dummy update unless one
//! is given) whose children are the top-level calls. Entries are created on
//! demand when an update is first pushed.
//!
//! Hash-consing is deferred: the graph is edited freely (attach, detach,
//! replace) and [`AccountUpdateLayout::finalize_children`] hashes it once,
//! bottom-up, caching each finalized forest in its owner.
//!
//! ## Invariants
//! - every node has at most one parent; re-attaching requires
//!   [`AccountUpdateLayout::disattach`] first,
//! - a finalized forest is never mutated again,
//! - the parent links form a forest: attaching a node under one of its
//!   descendants fails with [`ForestError::Cycle`].

use std::collections::HashMap;

use tracing::{debug, trace};
use zkapp_merkle::{HashedValue, MerkleError};

use crate::account_update::{AccountUpdate, AccountUpdateId};
use crate::error::ForestError;
use crate::forest::{AccountUpdateForest, AccountUpdateTree};
use crate::unfinished::{NodeContent, UnfinishedForest, UnfinishedTree};

/// Anything that designates a layout node.
#[derive(Clone, Debug)]
pub enum NodeRef {
    /// An existing node.
    Id(AccountUpdateId),
    /// A bare update; creates a mutable node or replaces an existing one.
    Update(AccountUpdate),
    /// A finalized tree; creates a final node or replaces an existing one.
    Tree(AccountUpdateTree),
}

impl From<AccountUpdateId> for NodeRef {
    fn from(id: AccountUpdateId) -> Self {
        Self::Id(id)
    }
}

impl From<AccountUpdate> for NodeRef {
    fn from(update: AccountUpdate) -> Self {
        Self::Update(update)
    }
}

impl From<AccountUpdateTree> for NodeRef {
    fn from(tree: AccountUpdateTree) -> Self {
        Self::Tree(tree)
    }
}

/// Per-transaction (or per-call) index of staged nodes.
#[derive(Clone, Debug)]
pub struct AccountUpdateLayout {
    root: AccountUpdateId,
    nodes: HashMap<AccountUpdateId, UnfinishedTree>,
}

impl AccountUpdateLayout {
    /// New layout rooted at `root` (a dummy update if `None`).
    #[must_use]
    pub fn new(root: Option<AccountUpdate>) -> Self {
        let mut node = UnfinishedTree::create(root.unwrap_or_else(AccountUpdate::dummy));
        // The synthetic root is never dropped.
        node.is_dummy = false;
        let root = node.id;
        let mut nodes = HashMap::new();
        nodes.insert(root, node);
        Self { root, nodes }
    }

    /// Root id.
    #[must_use]
    pub const fn root(&self) -> AccountUpdateId {
        self.root
    }

    /// Number of staged nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if only the root exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Staged node for `id`.
    #[must_use]
    pub fn get(&self, id: AccountUpdateId) -> Option<&UnfinishedTree> {
        self.nodes.get(&id)
    }

    fn node(&self, id: AccountUpdateId) -> Result<&UnfinishedTree, ForestError> {
        self.nodes.get(&id).ok_or(ForestError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: AccountUpdateId) -> Result<&mut UnfinishedTree, ForestError> {
        self.nodes.get_mut(&id).ok_or(ForestError::UnknownNode(id))
    }

    /// Resolve `node` to an id, creating or replacing its entry.
    ///
    /// A tree whose id is already staged replaces the node's content and
    /// makes it final (its old mutable children are unlinked). An update
    /// whose id is already staged turns a final node mutable again with no
    /// children, keeping its dummy flag; a node that is still mutable is
    /// left as is, so a stale copy never overwrites edits made in place.
    pub fn get_or_create(&mut self, node: impl Into<NodeRef>) -> Result<AccountUpdateId, ForestError> {
        let id = match node.into() {
            NodeRef::Id(id) => {
                self.node(id)?;
                return Ok(id);
            }
            NodeRef::Update(update) => {
                let id = update.id;
                match self.nodes.get_mut(&id) {
                    Some(existing) => existing.set_to_update(update),
                    None => {
                        self.nodes.insert(id, UnfinishedTree::create(update));
                    }
                }
                id
            }
            NodeRef::Tree(tree) => {
                let id = tree.id;
                match self.nodes.get_mut(&id) {
                    Some(existing) => {
                        let orphans = existing.set_to_tree(tree);
                        for o in orphans {
                            if let Some(n) = self.nodes.get_mut(&o) {
                                n.parent = None;
                            }
                        }
                    }
                    None => {
                        self.nodes.insert(id, UnfinishedTree::from_tree(tree));
                    }
                }
                id
            }
        };
        if id == self.root {
            self.node_mut(id)?.is_dummy = false;
        }
        Ok(id)
    }

    /// The staged update, if known.
    #[must_use]
    pub fn update(&self, id: AccountUpdateId) -> Option<&AccountUpdate> {
        self.nodes.get(&id).and_then(|n| n.content.update())
    }

    /// Mutable access to a staged update.
    ///
    /// Fails once the update is hashed, or once the forest containing it
    /// has been finalized.
    pub fn update_mut(&mut self, id: AccountUpdateId) -> Result<&mut AccountUpdate, ForestError> {
        let parent = self.node(id)?.parent;
        if let Some(p) = parent {
            if self.node(p)?.children.is_final() {
                return Err(ForestError::Finalized(id));
            }
        }
        match &mut self.node_mut(id)?.content {
            NodeContent::Mutable(u) => Ok(u),
            NodeContent::Final(_) => Err(ForestError::Finalized(id)),
        }
    }

    /// Append `child` to `parent`'s children, creating entries as needed.
    ///
    /// Pushing a child under the parent it already has is a no-op; under
    /// any other parent it fails with [`ForestError::AlreadyAttached`].
    pub fn push_child(
        &mut self,
        parent: impl Into<NodeRef>,
        child: impl Into<NodeRef>,
    ) -> Result<AccountUpdateId, ForestError> {
        let parent = self.get_or_create(parent)?;
        let child = self.get_or_create(child)?;
        self.attach(parent, child)?;
        Ok(child)
    }

    /// Append `child` to the top-level calls.
    pub fn push_top_level(&mut self, child: impl Into<NodeRef>) -> Result<AccountUpdateId, ForestError> {
        self.push_child(self.root, child)
    }

    fn attach(&mut self, parent: AccountUpdateId, child: AccountUpdateId) -> Result<(), ForestError> {
        if parent == child {
            return Err(ForestError::SelfParent(child));
        }
        let mut ancestor = self.node(parent)?.parent;
        while let Some(a) = ancestor {
            if a == child {
                return Err(ForestError::Cycle { node: child, parent });
            }
            ancestor = self.node(a)?.parent;
        }
        match self.node(child)?.parent {
            Some(p) if p == parent => return Ok(()),
            Some(p) => {
                return Err(ForestError::AlreadyAttached {
                    node: child,
                    parent: p,
                })
            }
            None => {}
        }
        match &mut self.node_mut(parent)?.children {
            UnfinishedForest::Mutable(ids) => ids.push(child),
            UnfinishedForest::Final(_) => return Err(ForestError::Finalized(parent)),
        }
        self.node_mut(child)?.parent = Some(parent);
        trace!(%parent, %child, "attached account update");
        Ok(())
    }

    /// Replace `parent`'s children with a finalized forest.
    ///
    /// Refuses to drop children that were already pushed.
    pub fn set_children(
        &mut self,
        parent: impl Into<NodeRef>,
        children: AccountUpdateForest,
    ) -> Result<(), ForestError> {
        let parent = self.get_or_create(parent)?;
        let node = self.node_mut(parent)?;
        if !node.children.mutable_ids().is_empty() {
            return Err(ForestError::NonEmptyChildren(parent));
        }
        node.children = UnfinishedForest::from_forest(children);
        Ok(())
    }

    /// Replace the top-level calls with a finalized forest.
    pub fn set_top_level(&mut self, children: AccountUpdateForest) -> Result<(), ForestError> {
        self.set_children(self.root, children)
    }

    /// Flag a node as dummy iff `cond`; dummies vanish at finalization.
    pub fn set_dummy_if(&mut self, id: AccountUpdateId, cond: bool) -> Result<(), ForestError> {
        let node = self.node_mut(id)?;
        node.is_dummy |= cond;
        Ok(())
    }

    /// Detach a node from its parent without deleting it.
    ///
    /// Unknown ids yield `Ok(None)`; detached nodes stay in the arena and can
    /// be pushed elsewhere.
    pub fn disattach(&mut self, id: AccountUpdateId) -> Result<Option<&UnfinishedTree>, ForestError> {
        let Some(parent) = self.nodes.get(&id).map(|n| n.parent) else {
            return Ok(None);
        };
        if let Some(parent) = parent {
            match &mut self.node_mut(parent)?.children {
                UnfinishedForest::Mutable(ids) => ids.retain(|c| *c != id),
                UnfinishedForest::Final(_) => return Err(ForestError::Finalized(parent)),
            }
            self.node_mut(id)?.parent = None;
            trace!(%parent, child = %id, "detached account update");
        }
        Ok(self.nodes.get(&id))
    }

    /// Detach `id`, then finalize and return the forest of its children.
    ///
    /// Used to embed a call's children elsewhere (e.g. as a method's
    /// returned forest). Unknown ids yield `Ok(None)`.
    pub fn finalize_and_remove(&mut self, id: AccountUpdateId) -> Result<Option<AccountUpdateForest>, ForestError> {
        if !self.nodes.contains_key(&id) {
            return Ok(None);
        }
        self.disattach(id)?;
        self.finalize_forest(id).map(Some)
    }

    /// Finalize the children of `owner` (idempotent, cached).
    ///
    /// Children are finalized first; dummy nodes are dropped with order
    /// preserved.
    pub fn finalize_forest(&mut self, owner: AccountUpdateId) -> Result<AccountUpdateForest, ForestError> {
        let ids = match &self.node(owner)?.children {
            UnfinishedForest::Final(forest) => return Ok(forest.clone()),
            UnfinishedForest::Mutable(ids) => ids.clone(),
        };

        let mut finalized = Vec::with_capacity(ids.len());
        for id in ids {
            let is_dummy = self.node(id)?.is_dummy;
            finalized.push((is_dummy, self.finalize_tree(id)?));
        }

        // Push in reverse so call order matches the mutable list.
        let mut forest = AccountUpdateForest::empty();
        for (is_dummy, tree) in finalized.into_iter().rev() {
            forest.push_tree_if(!is_dummy, tree);
        }
        self.node_mut(owner)?.children = UnfinishedForest::from_forest(forest.clone());
        Ok(forest)
    }

    /// Finalize one node into a tree.
    pub fn finalize_tree(&mut self, id: AccountUpdateId) -> Result<AccountUpdateTree, ForestError> {
        let children = self.finalize_forest(id)?;
        let update = match &self.node(id)?.content {
            NodeContent::Mutable(u) => HashedValue::new(u.clone()),
            NodeContent::Final(h) => h.clone(),
        };
        Ok(AccountUpdateTree::new(id, update, children))
    }

    /// Finalize the top-level calls and check every witness is resolved.
    pub fn finalize_children(&mut self) -> Result<AccountUpdateForest, ForestError> {
        let forest = self.finalize_forest(self.root)?;
        forest.assert_constant()?;
        debug!(hash = %forest.hash(), top_level = forest.len(), "finalized account update layout");
        Ok(forest)
    }

    /// Pre-order update list of the current (possibly unfinished) graph,
    /// skipping dummies and their subtrees.
    pub fn to_flat_list(&self, mutate: bool) -> Result<Vec<AccountUpdate>, ForestError> {
        let mut out = Vec::new();
        self.flatten(self.root, mutate, 0, &mut out)?;
        Ok(out)
    }

    fn flatten(
        &self,
        owner: AccountUpdateId,
        mutate: bool,
        depth: u32,
        out: &mut Vec<AccountUpdate>,
    ) -> Result<(), ForestError> {
        match &self.node(owner)?.children {
            UnfinishedForest::Final(forest) => forest.flatten_into(mutate, depth, out)?,
            UnfinishedForest::Mutable(ids) => {
                for &id in ids {
                    let node = self.node(id)?;
                    if node.is_dummy {
                        continue;
                    }
                    let mut update = node
                        .content
                        .update()
                        .ok_or(MerkleError::Withheld {
                            hash: node.content.hash(),
                        })?
                        .clone();
                    if mutate {
                        update.body.call_depth = depth;
                    }
                    out.push(update);
                    self.flatten(id, mutate, depth + 1, out)?;
                }
            }
        }
        Ok(())
    }

    /// Visit every update that precedes `id` in flat order.
    pub fn for_each_predecessor(
        &self,
        id: AccountUpdateId,
        mut f: impl FnMut(&AccountUpdate),
    ) -> Result<(), ForestError> {
        for update in self.to_flat_list(false)? {
            if update.id == id {
                break;
            }
            f(&update);
        }
        Ok(())
    }

    /// Indented rendering of the graph, one node per line.
    #[must_use]
    pub fn print(&self) -> String {
        let mut out = String::new();
        self.render(self.root, 0, &mut out);
        out
    }

    fn render(&self, owner: AccountUpdateId, indent: usize, out: &mut String) {
        let Some(node) = self.nodes.get(&owner) else {
            return;
        };
        match &node.children {
            UnfinishedForest::Mutable(ids) => {
                for id in ids {
                    let Some(child) = self.nodes.get(id) else {
                        continue;
                    };
                    let name = child
                        .content
                        .update()
                        .map_or_else(|| id.to_string(), AccountUpdate::display_name);
                    let dummy = if child.is_dummy { " (dummy)" } else { "" };
                    let fin = if child.is_final() { " (final)" } else { "" };
                    out.push_str(&format!("{:indent$}{name}{dummy}{fin}\n", ""));
                    self.render(*id, indent + 2, out);
                }
            }
            UnfinishedForest::Final(forest) => render_forest(forest, indent, out),
        }
    }
}

fn render_forest(forest: &AccountUpdateForest, indent: usize, out: &mut String) {
    for tree in forest.iter() {
        let name = tree
            .update
            .value()
            .map_or_else(|| tree.id.to_string(), AccountUpdate::display_name);
        out.push_str(&format!("{:indent$}{name} (final)\n", ""));
        render_forest(&tree.children, indent + 2, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_update::{PublicKey, TokenId};
    use zkapp_crypto::Field;

    fn upd(x: u64) -> AccountUpdate {
        AccountUpdate::create(PublicKey(Field::from(x)), TokenId::DEFAULT).with_label(format!("u{x}"))
    }

    fn flat_labels(layout: &AccountUpdateLayout) -> Vec<(String, u32)> {
        layout
            .to_flat_list(true)
            .unwrap()
            .into_iter()
            .map(|u| (u.label, u.body.call_depth))
            .collect()
    }

    #[test]
    fn push_and_flatten() {
        let mut l = AccountUpdateLayout::new(None);
        let a = l.push_top_level(upd(1)).unwrap();
        l.push_child(a, upd(2)).unwrap();
        l.push_top_level(upd(3)).unwrap();
        assert_eq!(
            flat_labels(&l),
            vec![("u1".into(), 0), ("u2".into(), 1), ("u3".into(), 0)]
        );
        assert_eq!(l.len(), 4);
    }

    #[test]
    fn finalize_matches_flat_list_and_is_idempotent() {
        let mut l = AccountUpdateLayout::new(None);
        let a = l.push_top_level(upd(1)).unwrap();
        l.push_child(a, upd(2)).unwrap();
        l.push_top_level(upd(3)).unwrap();
        let before = l.to_flat_list(true).unwrap();

        let f1 = l.finalize_children().unwrap();
        let f2 = l.finalize_children().unwrap();
        assert_eq!(f1.hash(), f2.hash());
        assert_eq!(f1.to_flat_array(true, 0).unwrap(), before);
    }

    #[test]
    fn dummies_are_dropped() {
        let mut l = AccountUpdateLayout::new(None);
        l.push_top_level(upd(1)).unwrap();
        let d = l.push_top_level(AccountUpdate::dummy()).unwrap();
        l.push_child(d, upd(9)).unwrap();
        let b = l.push_top_level(upd(2)).unwrap();
        l.set_dummy_if(b, false).unwrap();
        let c = l.push_top_level(upd(3)).unwrap();
        l.set_dummy_if(c, true).unwrap();

        assert_eq!(flat_labels(&l), vec![("u1".into(), 0), ("u2".into(), 0)]);
        let forest = l.finalize_children().unwrap();
        assert_eq!(forest.len(), 2);
    }

    #[test]
    fn reattach_requires_disattach() {
        let mut l = AccountUpdateLayout::new(None);
        let a = l.push_top_level(upd(1)).unwrap();
        let b = l.push_top_level(upd(2)).unwrap();
        let c = l.push_child(a, upd(3)).unwrap();

        // Same parent again: tolerated.
        assert_eq!(l.push_child(a, c).unwrap(), c);
        assert_eq!(l.get(a).unwrap().children().mutable_ids(), &[c]);

        assert_eq!(
            l.push_child(b, c),
            Err(ForestError::AlreadyAttached { node: c, parent: a })
        );
        assert_eq!(l.push_child(c, c), Err(ForestError::SelfParent(c)));

        l.disattach(c).unwrap();
        assert_eq!(l.get(c).unwrap().parent(), None);
        l.push_child(b, c).unwrap();
        assert_eq!(l.get(c).unwrap().parent(), Some(b));
        assert!(l.get(a).unwrap().children().mutable_ids().is_empty());
        assert_eq!(
            flat_labels(&l),
            vec![("u1".into(), 0), ("u2".into(), 0), ("u3".into(), 1)]
        );
    }

    #[test]
    fn attaching_under_a_descendant_fails() {
        let mut l = AccountUpdateLayout::new(None);
        let a = l.push_top_level(upd(1)).unwrap();
        let b = l.push_child(a, upd(2)).unwrap();
        let c = l.push_child(b, upd(3)).unwrap();

        l.disattach(a).unwrap();
        assert_eq!(l.push_child(c, a), Err(ForestError::Cycle { node: a, parent: c }));
        assert_eq!(l.push_child(b, a), Err(ForestError::Cycle { node: a, parent: b }));
        assert_eq!(l.get(a).unwrap().parent(), None);
        assert_eq!(l.get(c).unwrap().children().mutable_ids(), &[] as &[AccountUpdateId]);

        l.push_top_level(a).unwrap();
        assert_eq!(
            flat_labels(&l),
            vec![("u1".into(), 0), ("u2".into(), 1), ("u3".into(), 2)]
        );
    }

    #[test]
    fn stale_repush_keeps_dummy_flag() {
        let mut l = AccountUpdateLayout::new(None);
        let u = upd(1);
        let a = l.push_top_level(u.clone()).unwrap();
        l.set_dummy_if(a, true).unwrap();
        l.push_top_level(u).unwrap();

        assert!(l.get(a).unwrap().is_dummy());
        assert!(l.finalize_children().unwrap().is_empty());
    }

    #[test]
    fn stale_repush_keeps_in_place_edits() {
        let mut l = AccountUpdateLayout::new(None);
        let u = upd(1);
        let a = l.push_top_level(u.clone()).unwrap();
        l.update_mut(a).unwrap().body.actions.push(vec![Field::from(42u64)]);
        let c = l.push_child(a, upd(2)).unwrap();
        l.push_top_level(u).unwrap();

        assert_eq!(l.update(a).unwrap().body.actions.len(), 1);
        assert_eq!(l.get(a).unwrap().children().mutable_ids(), &[c]);
        let flat = l.finalize_children().unwrap().to_flat_array(true, 0).unwrap();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].body.actions.len(), 1);
    }

    #[test]
    fn disattach_unknown_is_none() {
        let mut l = AccountUpdateLayout::new(None);
        assert!(l.disattach(AccountUpdateId(42)).unwrap().is_none());
        assert!(l.finalize_and_remove(AccountUpdateId(42)).unwrap().is_none());
    }

    #[test]
    fn finalize_and_remove_returns_children() {
        let mut l = AccountUpdateLayout::new(None);
        let a = l.push_top_level(upd(1)).unwrap();
        l.push_child(a, upd(2)).unwrap();
        l.push_child(a, upd(3)).unwrap();

        let children = l.finalize_and_remove(a).unwrap().unwrap();
        let labels: Vec<_> = children
            .to_flat_array(true, 1)
            .unwrap()
            .into_iter()
            .map(|u| u.label)
            .collect();
        assert_eq!(labels, vec!["u2", "u3"]);
        assert!(l.to_flat_list(true).unwrap().is_empty());
    }

    #[test]
    fn finalized_forests_are_frozen() {
        let mut l = AccountUpdateLayout::new(None);
        let a = l.push_top_level(upd(1)).unwrap();
        l.finalize_children().unwrap();
        assert_eq!(l.update_mut(a).unwrap_err(), ForestError::Finalized(a));
        assert_eq!(
            l.push_top_level(upd(2)).unwrap_err(),
            ForestError::Finalized(l.root())
        );
        assert_eq!(l.disattach(a).unwrap_err(), ForestError::Finalized(l.root()));
    }

    #[test]
    fn set_children_refuses_to_drop_pushed_children() {
        let mut l = AccountUpdateLayout::new(None);
        let a = l.push_top_level(upd(1)).unwrap();
        let mut forest = AccountUpdateForest::empty();
        forest.push(upd(5));
        l.set_children(a, forest.clone()).unwrap();
        assert_eq!(
            flat_labels(&l),
            vec![("u1".into(), 0), ("u5".into(), 1)]
        );

        let b = l.push_top_level(upd(2)).unwrap();
        l.push_child(b, upd(3)).unwrap();
        assert_eq!(
            l.set_children(b, forest),
            Err(ForestError::NonEmptyChildren(b))
        );
    }

    #[test]
    fn set_top_level_replaces_root_children() {
        let mut l = AccountUpdateLayout::new(None);
        let mut forest = AccountUpdateForest::empty();
        forest.push(upd(7));
        l.set_top_level(forest.clone()).unwrap();
        assert_eq!(l.finalize_children().unwrap().hash(), forest.hash());
    }

    #[test]
    fn replacing_with_a_tree_unlinks_old_children() {
        let mut l = AccountUpdateLayout::new(None);
        let u = upd(1);
        let a = l.push_top_level(u.clone()).unwrap();
        let c = l.push_child(a, upd(2)).unwrap();

        let mut tree = AccountUpdateTree::from_update(u.clone());
        tree.children.push(upd(3));
        l.get_or_create(tree).unwrap();
        assert_eq!(l.get(c).unwrap().parent(), None);
        assert!(l.get(a).unwrap().is_final());
        assert_eq!(
            flat_labels(&l),
            vec![("u1".into(), 0), ("u3".into(), 1)]
        );

        // And back to a mutable update.
        l.get_or_create(u).unwrap();
        assert!(!l.get(a).unwrap().is_final());
        assert_eq!(flat_labels(&l), vec![("u1".into(), 0)]);
    }

    #[test]
    fn predecessors_are_visited_in_order() {
        let mut l = AccountUpdateLayout::new(None);
        let a = l.push_top_level(upd(1)).unwrap();
        l.push_child(a, upd(2)).unwrap();
        let c = l.push_top_level(upd(3)).unwrap();
        l.push_top_level(upd(4)).unwrap();

        let mut seen = Vec::new();
        l.for_each_predecessor(c, |u| seen.push(u.label.clone())).unwrap();
        assert_eq!(seen, vec!["u1", "u2"]);
    }

    #[test]
    fn update_mut_edits_before_finalization() {
        let mut l = AccountUpdateLayout::new(None);
        let a = l.push_top_level(upd(1)).unwrap();
        l.update_mut(a).unwrap().body.balance_change = 10;
        let flat = l.finalize_children().unwrap().to_flat_array(true, 0).unwrap();
        assert_eq!(flat[0].body.balance_change, 10);
    }

    #[test]
    fn print_renders_indented_labels() {
        let mut l = AccountUpdateLayout::new(None);
        let a = l.push_top_level(upd(1)).unwrap();
        l.push_child(a, upd(2)).unwrap();
        l.push_top_level(AccountUpdate::dummy().with_label("d")).unwrap();
        assert_eq!(l.print(), "u1\n  u2\nd (dummy)\n");
    }
}
