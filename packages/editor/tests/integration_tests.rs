//! Integration tests for the editor update pipeline

use folio_editor::{split_block_at, Editor, EditorConfig, EditorError, MutationKind};
use folio_model::{nodes, Node, NodeKey, NodeKind, NodeType, Point, PointKind, Selection, TreeError, ViewAttrs};
use folio_reconciler::{ViewPatch, ViewTree};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Root holding one paragraph per entry, each with a single text node
fn editor_with(paragraphs: &[&str]) -> (Editor, Vec<(NodeKey, NodeKey)>) {
    let mut editor = Editor::default();
    let keys = editor
        .update(|txn| {
            let mut keys = Vec::new();
            for text in paragraphs {
                let paragraph = txn.create_node(nodes::PARAGRAPH)?;
                let text = txn.create_text(text)?;
                txn.append(&paragraph, &text)?;
                txn.append(&NodeKey::root(), &paragraph)?;
                keys.push((paragraph, text));
            }
            Ok(keys)
        })
        .unwrap();
    (editor, keys)
}

fn attach_view(editor: &mut Editor) -> Rc<RefCell<ViewTree>> {
    let view = Rc::new(RefCell::new(ViewTree::new()));
    editor.attach_view(view.clone()).unwrap();
    view
}

fn record_patches(editor: &mut Editor) -> Rc<RefCell<Vec<Vec<ViewPatch>>>> {
    let commits = Rc::new(RefCell::new(Vec::new()));
    let sink = commits.clone();
    editor.register_update_listener(move |event| sink.borrow_mut().push(event.patches.clone()));
    commits
}

fn assert_view_matches(editor: &Editor, view: &Rc<RefCell<ViewTree>>) {
    let state = editor.state();
    let expected = ViewTree::from_map(state.nodes(), editor.registry()).unwrap();
    assert!(
        view.borrow().same_structure(&expected),
        "view drifted from state:\n{}\nexpected:\n{}",
        view.borrow().render(),
        expected.render()
    );
}

#[test]
fn test_update_commits_new_state() {
    let (editor, keys) = editor_with(&["Before", "Hello", "After"]);

    let state = editor.state();
    assert_eq!(state.text_content(), "Before\n\nHello\n\nAfter");
    assert_eq!(state.nodes().children(&NodeKey::root()).unwrap().len(), 3);
    assert!(state.nodes().validate().is_ok());
    assert!(!editor.has_pending());
    assert_eq!(state.nodes().get(&keys[1].1).and_then(|node| node.parent()), Some(&keys[1].0));
}

#[test]
fn test_mount_creates_whole_tree() {
    let (mut editor, keys) = editor_with(&["One", "Two"]);
    let view = attach_view(&mut editor);

    assert_eq!(view.borrow().len(), 5);
    assert_eq!(view.borrow().get(&keys[0].0).map(|node| node.tag.as_str()), Some("p"));
    assert_view_matches(&editor, &view);
}

#[test]
fn test_split_paragraph_emits_create_and_update() {
    let (mut editor, keys) = editor_with(&["Before", "Hello", "After"]);
    let (hello_block, hello) = keys[1].clone();
    editor
        .update(|txn| txn.set_selection(Some(Selection::caret(Point::text(hello.clone(), 3)))))
        .unwrap();
    let view = attach_view(&mut editor);
    let commits = record_patches(&mut editor);

    let new_block = editor
        .update(|txn| split_block_at(txn, &hello, 3))
        .unwrap();

    let state = editor.state();
    let tail = state.nodes().children(&new_block).unwrap()[0].clone();
    assert_eq!(state.text_content(), "Before\n\nHel\n\nlo\n\nAfter");
    assert_eq!(state.nodes().children(&hello_block).unwrap(), &[hello.clone()]);

    let commits = commits.borrow();
    assert_eq!(commits.len(), 1);
    let expected = vec![
        ViewPatch::Create {
            key: new_block.clone(),
            tag: "p".to_string(),
            attrs: ViewAttrs::new(),
            parent: Some(NodeKey::root()),
            index: 2,
        },
        ViewPatch::Create {
            key: tail.clone(),
            tag: "span".to_string(),
            attrs: ViewAttrs::from([("text".to_string(), "lo".to_string())]),
            parent: Some(new_block.clone()),
            index: 0,
        },
        ViewPatch::Update {
            key: hello.clone(),
            delta: BTreeMap::from([("text".to_string(), Some("Hel".to_string()))]),
        },
    ];
    assert_eq!(commits[0], expected);

    // Nothing touches the unrelated paragraphs
    for (block, text) in [&keys[0], &keys[2]] {
        assert!(commits[0].iter().all(|patch| patch.key() != block && patch.key() != text));
    }

    assert_view_matches(&editor, &view);
    let selection = view.borrow().selection().cloned().unwrap();
    assert_eq!(selection.anchor.key, tail);
    assert_eq!(selection.anchor.offset, 0);
    assert_eq!(selection.anchor.kind, PointKind::Text);
}

#[test]
fn test_remove_block_emits_single_remove() {
    let (mut editor, keys) = editor_with(&["One", "Two", "Three"]);
    let view = attach_view(&mut editor);
    let commits = record_patches(&mut editor);

    editor.update(|txn| txn.remove(&keys[1].0)).unwrap();

    assert_eq!(
        commits.borrow()[0],
        vec![ViewPatch::Remove {
            key: keys[1].0.clone()
        }]
    );
    assert_view_matches(&editor, &view);
    assert!(!editor.state().nodes().contains(&keys[1].1));
}

#[test]
fn test_failed_update_keeps_committed_state() {
    let (mut editor, keys) = editor_with(&["Hello"]);
    let before = editor.state();
    let commits = record_patches(&mut editor);

    let result = editor.update(|txn| {
        txn.set_text(&keys[0].1, "Changed")?;
        // A paragraph cannot adopt the root
        txn.move_node(&NodeKey::root(), &keys[0].0, 0)
    });

    assert!(matches!(result, Err(EditorError::Structural(_))));
    assert!(std::sync::Arc::ptr_eq(&before, &editor.state()));
    assert!(!editor.has_pending());
    assert!(commits.borrow().is_empty());
}

#[test]
fn test_swallowed_structural_error_still_aborts() {
    let (mut editor, keys) = editor_with(&["Hello"]);
    let before = editor.state();

    let result = editor.update(|txn| {
        txn.set_text(&keys[0].1, "Changed")?;
        let _ = txn.append(&keys[0].1, &keys[0].0);
        Ok(())
    });

    assert!(matches!(result, Err(EditorError::Structural(_))));
    assert_eq!(editor.state().text_content(), "Hello");
    assert!(std::sync::Arc::ptr_eq(&before, &editor.state()));
}

#[test]
fn test_read_transaction_rejects_mutation() {
    let (editor, keys) = editor_with(&["Hello"]);

    let text = editor
        .read(|txn| {
            assert!(txn.is_read_only());
            let err = txn.set_text(&keys[0].1, "Nope").unwrap_err();
            assert!(matches!(err, EditorError::ReadOnlyViolation { .. }));
            assert!(txn.create_node(nodes::PARAGRAPH).is_err());
            Ok(txn.text_content())
        })
        .unwrap();

    assert_eq!(text, "Hello");
    assert_eq!(editor.state().text_content(), "Hello");
}

#[test]
fn test_batch_coalesces_into_one_commit() {
    let (mut editor, keys) = editor_with(&["One", "Two"]);
    let commits = record_patches(&mut editor);

    editor
        .batch(|editor| {
            editor.update(|txn| txn.set_text(&keys[0].1, "Uno"))?;
            assert!(editor.has_pending());
            editor.update(|txn| txn.set_text(&keys[1].1, "Dos"))
        })
        .unwrap();

    assert_eq!(commits.borrow().len(), 1);
    assert_eq!(commits.borrow()[0].len(), 2);
    assert_eq!(editor.state().text_content(), "Uno\n\nDos");
}

#[test]
fn test_failed_batch_discards_earlier_updates() {
    let (mut editor, keys) = editor_with(&["One"]);

    let result: Result<(), EditorError> = editor.batch(|editor| {
        editor.update(|txn| txn.set_text(&keys[0].1, "Uno"))?;
        editor.update(|txn| txn.remove(&NodeKey::root()).map(|_| ()))
    });

    assert!(result.is_err());
    assert!(!editor.has_pending());
    assert_eq!(editor.state().text_content(), "One");
}

#[test]
fn test_noop_update_commits_nothing() {
    let (mut editor, keys) = editor_with(&["Hello"]);
    let before = editor.state();
    let commits = record_patches(&mut editor);

    editor.update(|txn| txn.set_text(&keys[0].1, "Hello")).unwrap();
    editor.update(|txn| txn.mark_dirty(&keys[0].0)).unwrap();

    assert!(commits.borrow().is_empty());
    assert!(std::sync::Arc::ptr_eq(&before, &editor.state()));
}

#[test]
fn test_unattached_nodes_are_collected() {
    let (mut editor, keys) = editor_with(&["Hello"]);

    let stray = editor
        .update(|txn| {
            let stray = txn.create_node(nodes::QUOTE)?;
            txn.set_text(&keys[0].1, "Hello!")?;
            Ok(stray)
        })
        .unwrap();

    let state = editor.state();
    assert!(!state.nodes().contains(&stray));
    assert_eq!(state.text_content(), "Hello!");
    assert!(state.nodes().validate().is_ok());
}

#[test]
fn test_runaway_transform_aborts_update() {
    let config = EditorConfig {
        max_transform_passes: 10,
        ..EditorConfig::default()
    };
    let mut editor = Editor::new(config);
    let paragraph = editor
        .update(|txn| {
            let paragraph = txn.create_node(nodes::PARAGRAPH)?;
            txn.append(&NodeKey::root(), &paragraph)?;
            Ok(paragraph)
        })
        .unwrap();
    let before = editor.state();
    editor
        .register_node_transform(nodes::PARAGRAPH, |txn, key| txn.mark_dirty(key))
        .unwrap();

    let result = editor.update(|txn| txn.set_indent(&paragraph, 1));

    match result {
        Err(EditorError::TransformNonConvergence { passes, .. }) => assert_eq!(passes, 10),
        other => panic!("expected non-convergence, got {other:?}"),
    }
    assert!(std::sync::Arc::ptr_eq(&before, &editor.state()));
    assert!(!editor.has_pending());
}

#[test]
fn test_transform_sees_committed_fixpoint() {
    let (mut editor, keys) = editor_with(&["hello"]);
    editor
        .register_node_transform(nodes::TEXT, |txn, key| {
            let upper = txn.node(key)?.text_content().map(str::to_uppercase);
            match upper {
                Some(upper) => txn.set_text(key, &upper),
                None => Ok(()),
            }
        })
        .unwrap();

    editor.update(|txn| txn.set_text(&keys[0].1, "shout")).unwrap();

    assert_eq!(editor.state().text_content(), "SHOUT");
}

#[test]
fn test_adjacent_text_merges_and_translates_caret() {
    let (mut editor, keys) = editor_with(&["Hel"]);
    let (block, head) = keys[0].clone();

    editor
        .update(|txn| {
            let tail = txn.create_text("lo")?;
            txn.insert_after(&head, &tail)?;
            txn.set_selection(Some(Selection::caret(Point::text(tail, 1))))
        })
        .unwrap();

    let state = editor.state();
    assert_eq!(state.nodes().children(&block).unwrap(), &[head.clone()]);
    assert_eq!(state.text_content(), "Hello");
    assert_eq!(state.selection().unwrap().anchor, Point::text(head, 4));
}

#[test]
fn test_removing_selected_block_relocates_caret() {
    let (mut editor, keys) = editor_with(&["One", "Two"]);
    editor
        .update(|txn| txn.set_selection(Some(Selection::caret(Point::text(keys[1].1.clone(), 2)))))
        .unwrap();

    editor.update(|txn| txn.remove(&keys[1].0)).unwrap();

    let state = editor.state();
    let anchor = &state.selection().unwrap().anchor;
    assert!(state.nodes().contains(&anchor.key));
    assert_eq!(anchor, &Point::element(keys[0].0.clone(), 1));
}

#[test]
fn test_mutation_listener_reports_by_type() {
    let (mut editor, keys) = editor_with(&["One", "Two"]);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    editor
        .register_mutation_listener(nodes::TEXT, move |record, _| {
            sink.borrow_mut().push(record.clone());
        })
        .unwrap();

    editor.update(|txn| txn.set_text(&keys[0].1, "Uno")).unwrap();
    let added = editor
        .update(|txn| {
            let text = txn.create_text(" more")?;
            txn.set_text_format(&text, folio_model::TextFormat::BOLD)?;
            txn.append(&keys[1].0, &text)?;
            Ok(text)
        })
        .unwrap();
    editor.update(|txn| txn.remove(&keys[0].0)).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].get(&keys[0].1), Some(&MutationKind::Updated));
    assert_eq!(seen[0].len(), 1);
    assert_eq!(seen[1].get(&added), Some(&MutationKind::Created));
    assert_eq!(seen[2].get(&keys[0].1), Some(&MutationKind::Destroyed));
}

#[test]
fn test_unregistered_listener_is_silent() {
    let (mut editor, keys) = editor_with(&["One"]);
    let count = Rc::new(RefCell::new(0));
    let sink = count.clone();
    let handle = editor.register_update_listener(move |_| *sink.borrow_mut() += 1);

    editor.update(|txn| txn.set_text(&keys[0].1, "Two")).unwrap();
    assert!(editor.unregister(handle));
    assert!(!editor.unregister(handle));
    editor.update(|txn| txn.set_text(&keys[0].1, "Three")).unwrap();

    assert_eq!(*count.borrow(), 1);
}

#[test]
fn test_set_state_reconciles_view() {
    let (mut editor, _) = editor_with(&["Old one", "Old two"]);
    let view = attach_view(&mut editor);
    let (other, _) = editor_with(&["New"]);

    let json = other.state_to_json().unwrap();
    let replacement = editor.parse_state(&json).unwrap();
    assert!(editor.set_state(replacement).unwrap());

    assert_eq!(editor.state().text_content(), "New");
    assert_view_matches(&editor, &view);
}

#[test]
fn test_state_json_round_trip() -> anyhow::Result<()> {
    let (mut editor, keys) = editor_with(&["Hello", "World"]);
    editor.update(|txn| {
        txn.toggle_format(&keys[0].1, folio_model::TextFormat::ITALIC)?;
        txn.set_selection(Some(Selection::new(
            Point::text(keys[0].1.clone(), 1),
            Point::text(keys[1].1.clone(), 3),
        )))
    })?;

    let json = editor.state_to_json()?;
    let restored = editor.parse_state(&json)?;

    assert_eq!(restored.nodes(), editor.state().nodes());
    assert_eq!(restored.selection(), editor.state().selection());
    Ok(())
}

#[test]
fn test_parse_state_rejects_missing_parent() {
    let editor = Editor::default();
    let json = r#"{"nodes": {
        "root": {"type": "root", "parent": null, "children": ["5"]},
        "5": {"type": "paragraph", "parent": "99", "children": []}
    }}"#;

    let err = editor.parse_state(json).unwrap_err();
    assert!(matches!(err, EditorError::Deserialization(_)));
    assert!(editor.state().is_empty());
}

#[test]
fn test_split_requires_parent_block() {
    let mut editor = Editor::default();
    let result = editor.update(|txn| {
        let text = txn.create_text("loose")?;
        split_block_at(txn, &text, 2).map(|_| ())
    });

    assert!(matches!(
        result,
        Err(EditorError::Structural(TreeError::Orphan(_)))
    ));
}

#[test]
fn test_existing_node_under_unattached_node_aborts() {
    let (mut editor, keys) = editor_with(&["Kept", "Moved"]);
    let view = attach_view(&mut editor);
    let commits = record_patches(&mut editor);
    let before = editor.state();
    let (moved, moved_text) = keys[1].clone();

    let result = editor.update(|txn| {
        let quote = txn.create_node(nodes::QUOTE)?;
        txn.move_node(&moved, &quote, 0)
    });

    match result {
        Err(EditorError::Structural(TreeError::Orphan(key))) => assert_eq!(key, moved),
        other => panic!("expected an orphan error, got {other:?}"),
    }
    assert!(!editor.has_pending());
    assert!(commits.borrow().is_empty());
    let state = editor.state();
    assert_eq!(state.nodes(), before.nodes());
    assert!(state.nodes().contains(&moved_text));
    assert_view_matches(&editor, &view);
}

/// Element type whose copies carry a revision counter
#[derive(Debug)]
struct RevisedNode;

impl NodeType for RevisedNode {
    fn tag(&self) -> &'static str {
        "revised"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn view_tag(&self, _node: &Node) -> String {
        "section".to_string()
    }

    fn clone_node(&self, node: &Node) -> Node {
        let revision = node.prop_u64("revision").unwrap_or(0);
        node.clone().with_prop("revision", revision + 1)
    }
}

#[test]
fn test_copy_on_write_uses_type_clone() {
    let mut editor = Editor::default();
    editor.register_node_type(RevisedNode).unwrap();
    let revised = editor
        .update(|txn| {
            let revised = txn.create_node("revised")?;
            txn.append(&NodeKey::root(), &revised)?;
            Ok(revised)
        })
        .unwrap();
    let revision = |editor: &Editor| {
        editor
            .state()
            .nodes()
            .get(&revised)
            .and_then(|node| node.prop_u64("revision"))
    };
    assert_eq!(revision(&editor), None);

    // One copy per update, however many writes it makes
    editor
        .update(|txn| {
            txn.set_indent(&revised, 1)?;
            txn.set_indent(&revised, 2)
        })
        .unwrap();
    assert_eq!(revision(&editor), Some(1));

    editor.update(|txn| txn.set_indent(&revised, 3)).unwrap();
    assert_eq!(revision(&editor), Some(2));
}
