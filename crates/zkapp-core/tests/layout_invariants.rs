//! Invariants for the mutable layout and its finalized forest.
//!
//! Random call graphs are built node by node (each new node picks an earlier
//! node, or the root, as parent) with random dummy flags. These tests treat:
//! - pre-order over non-dummy nodes as the reference flat order,
//! - the finalized forest as authoritative for the commitment.

use proptest::prelude::*;
use zkapp_core::{AccountUpdate, AccountUpdateId, AccountUpdateLayout, AccountUpdateForest, PublicKey, TokenId};
use zkapp_crypto::Field;

/// A random graph: `(parent_choice, is_dummy)` per node.
type Shape = Vec<(usize, bool)>;

prop_compose! {
    fn shape()(nodes in prop::collection::vec((any::<usize>(), any::<bool>()), 0..24)) -> Shape {
        nodes
    }
}

#[track_caller]
fn upd(i: usize) -> AccountUpdate {
    AccountUpdate::create(PublicKey(Field::from(i as u64 + 1)), TokenId::DEFAULT).with_label(format!("n{i}"))
}

/// Build the layout and the reference `(label, depth)` list.
#[track_caller]
fn build(shape: &Shape) -> (AccountUpdateLayout, Vec<(String, u32)>) {
    let mut layout = AccountUpdateLayout::new(None);
    let mut ids: Vec<AccountUpdateId> = Vec::new();
    // children[0] is the root; children[i + 1] is node i.
    let mut children: Vec<Vec<usize>> = vec![Vec::new()];
    let mut dummy = Vec::new();

    for (i, &(choice, is_dummy)) in shape.iter().enumerate() {
        let parent = choice % (i + 1);
        let parent_id = if parent == 0 { layout.root() } else { ids[parent - 1] };
        let id = layout.push_child(parent_id, upd(i)).unwrap();
        layout.set_dummy_if(id, is_dummy).unwrap();
        ids.push(id);
        children[parent].push(i);
        children.push(Vec::new());
        dummy.push(is_dummy);
    }

    fn walk(
        owner: usize,
        depth: u32,
        children: &[Vec<usize>],
        dummy: &[bool],
        out: &mut Vec<(String, u32)>,
    ) {
        for &i in &children[owner] {
            if dummy[i] {
                continue;
            }
            out.push((format!("n{i}"), depth));
            walk(i + 1, depth + 1, children, dummy, out);
        }
    }
    let mut expected = Vec::new();
    walk(0, 0, &children, &dummy, &mut expected);
    (layout, expected)
}

fn labels(updates: &[AccountUpdate]) -> Vec<(String, u32)> {
    updates
        .iter()
        .map(|u| (u.label.clone(), u.body.call_depth))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    /// The unfinished flat list is pre-order over non-dummy nodes.
    #[test]
    fn unfinished_flat_list_is_preorder(s in shape()) {
        let (layout, expected) = build(&s);
        prop_assert_eq!(labels(&layout.to_flat_list(true).unwrap()), expected);
    }

    /// Finalizing does not change the flat list and is idempotent.
    #[test]
    fn finalize_preserves_order(s in shape()) {
        let (mut layout, expected) = build(&s);
        let first = layout.finalize_children().unwrap();
        let second = layout.finalize_children().unwrap();
        prop_assert_eq!(first.hash(), second.hash());

        let flat = first.to_flat_array(true, 0).unwrap();
        prop_assert_eq!(labels(&flat), expected.clone());
        prop_assert_eq!(labels(&layout.to_flat_list(true).unwrap()), expected);

        // The flat list alone determines the commitment.
        let rebuilt = AccountUpdateForest::from_flat_array(flat).unwrap();
        prop_assert_eq!(rebuilt.hash(), first.hash());
    }

    /// After `disattach`, a node can be pushed under any other parent and
    /// ends up with exactly that one parent.
    #[test]
    fn moved_nodes_have_one_parent(s in shape(), pick in any::<usize>()) {
        prop_assume!(!s.is_empty());
        let (mut layout, _) = build(&s);
        let flat = layout.to_flat_list(false).unwrap();
        let n = s.len();
        let moved = flat.iter().map(|u| u.id).nth(pick % flat.len().max(1));
        prop_assume!(moved.is_some());
        let moved = moved.unwrap();

        layout.disattach(moved).unwrap();
        layout.push_top_level(moved).unwrap();
        prop_assert_eq!(layout.get(moved).unwrap().parent(), Some(layout.root()));

        let after = layout.to_flat_list(false).unwrap();
        let hits = after.iter().filter(|u| u.id == moved).count();
        prop_assert_eq!(hits, 1);
        prop_assert!(after.len() <= n);
    }
}

#[test]
fn empty_layout_finalizes_to_empty_forest() {
    let mut layout = AccountUpdateLayout::new(None);
    assert!(layout.is_empty());
    let forest = layout.finalize_children().unwrap();
    assert!(forest.is_empty());
    assert_eq!(forest.hash(), Field::ZERO);
}
