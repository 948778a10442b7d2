//! Property tests for the tree primitives and selection relocation

use folio_model::{
    deserialize_state, nodes, serialize_state, DirtySet, EditorState, Node, NodeKey, NodeMap, NodeRegistry,
    Point, Selection,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    InsertElement { parent: usize, index: usize },
    InsertText { parent: usize, index: usize, text: String },
    Remove { target: usize },
    Move { target: usize, parent: usize, index: usize },
    SplitText { target: usize, offset: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), any::<usize>()).prop_map(|(parent, index)| Op::InsertElement { parent, index }),
        (any::<usize>(), any::<usize>(), "[a-zé]{0,6}")
            .prop_map(|(parent, index, text)| Op::InsertText { parent, index, text }),
        any::<usize>().prop_map(|target| Op::Remove { target }),
        (any::<usize>(), any::<usize>(), any::<usize>())
            .prop_map(|(target, parent, index)| Op::Move { target, parent, index }),
        (any::<usize>(), any::<usize>()).prop_map(|(target, offset)| Op::SplitText { target, offset }),
    ]
}

fn pick(keys: &[NodeKey], choice: usize) -> NodeKey {
    keys[choice % keys.len()].clone()
}

fn elements(map: &NodeMap) -> Vec<NodeKey> {
    map.document_order()
        .into_iter()
        .filter(|key| map.get(key).is_some_and(Node::is_element))
        .collect()
}

fn texts(map: &NodeMap) -> Vec<NodeKey> {
    map.document_order()
        .into_iter()
        .filter(|key| map.get(key).is_some_and(Node::is_text))
        .collect()
}

/// Apply one op; on error the map must be untouched
fn apply(map: &mut NodeMap, op: &Op, counter: &mut usize) -> Result<(), TestCaseError> {
    let before = map.clone();
    let mut dirty = DirtySet::new();
    let mut fresh = || {
        *counter += 1;
        NodeKey::new(format!("n{counter}"))
    };

    let result = match op {
        Op::InsertElement { parent, index } | Op::InsertText { parent, index, .. } => {
            let parent = pick(&elements(map), *parent);
            let key = fresh();
            let node = match op {
                Op::InsertText { text, .. } => Node::text(key.clone(), nodes::TEXT, text.clone()),
                _ => Node::element(key.clone(), nodes::PARAGRAPH),
            };
            let len = map.children(&parent).map(<[NodeKey]>::len).unwrap_or(0);
            map.insert_detached(node)
                .and_then(|_| map.insert_child(&parent, index % (len + 1), &key, &mut dirty))
        }
        Op::Remove { target } => {
            let target = pick(&map.document_order(), *target);
            map.remove(&target, &mut dirty).map(|_| ())
        }
        Op::Move { target, parent, index } => {
            let target = pick(&map.document_order(), *target);
            let parent = pick(&elements(map), *parent);
            let len = map.children(&parent).map(<[NodeKey]>::len).unwrap_or(0);
            map.move_node(&target, &parent, index % (len + 1), &mut dirty)
        }
        Op::SplitText { target, offset } => {
            let candidates = texts(map);
            if candidates.is_empty() {
                return Ok(());
            }
            let target = pick(&candidates, *target);
            let len = map.get(&target).map(Node::max_offset).unwrap_or(0);
            let key = fresh();
            map.split_text(&target, offset % (len + 1), key, &mut dirty).map(|_| ())
        }
    };

    match result {
        Ok(()) => {
            prop_assert!(map.validate().is_ok(), "invariant broken after {:?}: {:?}", op, map.validate());
            for key in dirty.removed() {
                prop_assert!(!map.contains(key));
            }
        }
        Err(_) => prop_assert_eq!(&*map, &before, "failed {:?} changed the map", op),
    }
    Ok(())
}

proptest! {
    /// Every successful primitive keeps the tree valid; every failing one is a no-op
    #[test]
    fn prop_primitives_preserve_tree(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut map = NodeMap::with_root();
        let mut counter = 0;
        for op in &ops {
            apply(&mut map, op, &mut counter)?;
        }
        prop_assert_eq!(map.document_order().len(), map.len());
    }

    /// Removing any node leaves the selection on keys that still resolve
    #[test]
    fn prop_removal_keeps_selection_resolvable(
        ops in prop::collection::vec(arb_op(), 1..30),
        anchor in any::<usize>(),
        focus in any::<usize>(),
        victim in any::<usize>(),
    ) {
        let mut map = NodeMap::with_root();
        let mut counter = 0;
        for op in &ops {
            apply(&mut map, op, &mut counter)?;
        }
        let order = map.document_order();
        let point = |choice: usize| {
            let key = pick(&order, choice);
            let node = map.get(&key).unwrap();
            let offset = choice % (node.max_offset() + 1);
            if node.is_text() {
                Point::text(key, offset)
            } else if node.is_element() {
                Point::element(key, offset)
            } else {
                Point::element(NodeKey::root(), 0)
            }
        };
        let mut selection = Selection::new(point(anchor), point(focus));
        prop_assume!(order.len() > 1);

        let victim = pick(&order[1..], victim);
        let (parent, index) = map.position(&victim).unwrap();
        selection.relocate_for_removal(&map, &victim);
        selection.adjust_for_detach(&parent, index);
        map.remove(&victim, &mut DirtySet::new()).unwrap();

        prop_assert!(selection.resolves_in(&map), "{:?} does not resolve", selection);
    }

    /// Exporting and re-importing reproduces the same records
    #[test]
    fn prop_json_round_trip(ops in prop::collection::vec(arb_op(), 1..30)) {
        let mut map = NodeMap::with_root();
        let mut counter = 0;
        for op in &ops {
            apply(&mut map, op, &mut counter)?;
        }
        let registry = NodeRegistry::with_builtins();
        let state = EditorState::new(map, None);

        let json = serialize_state(&state, &registry).unwrap();
        let restored = deserialize_state(&json, &registry).unwrap();

        prop_assert_eq!(restored.nodes(), state.nodes());
    }
}

#[test]
fn test_move_into_own_subtree_is_rejected() {
    let mut map = NodeMap::with_root();
    let mut dirty = DirtySet::new();
    let outer = NodeKey::new("outer");
    let inner = NodeKey::new("inner");
    map.insert_detached(Node::element(outer.clone(), nodes::QUOTE)).unwrap();
    map.append(&NodeKey::root(), &outer, &mut dirty).unwrap();
    map.insert_detached(Node::element(inner.clone(), nodes::PARAGRAPH)).unwrap();
    map.append(&outer, &inner, &mut dirty).unwrap();

    let before = map.clone();
    assert!(map.move_node(&outer, &inner, 0, &mut dirty).is_err());
    assert_eq!(map, before);
}
