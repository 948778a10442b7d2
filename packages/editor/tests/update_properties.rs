//! Random update sequences keep the committed state valid and the view in sync

use folio_editor::{split_block_at, Editor, Transaction};
use folio_model::{nodes, NodeKey, Point, Selection, TextFormat};
use folio_reconciler::ViewTree;
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone)]
enum Step {
    AddParagraph { index: usize, text: String },
    AddText { block: usize, text: String },
    Remove { target: usize },
    MoveBlock { target: usize, index: usize },
    SetText { target: usize, text: String },
    ToggleBold { target: usize },
    Split { target: usize, offset: usize },
    PlaceCaret { target: usize, offset: usize },
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (any::<usize>(), "[a-z]{0,4}").prop_map(|(index, text)| Step::AddParagraph { index, text }),
        (any::<usize>(), "[a-z]{0,4}").prop_map(|(block, text)| Step::AddText { block, text }),
        any::<usize>().prop_map(|target| Step::Remove { target }),
        (any::<usize>(), any::<usize>()).prop_map(|(target, index)| Step::MoveBlock { target, index }),
        (any::<usize>(), "[a-z]{0,4}").prop_map(|(target, text)| Step::SetText { target, text }),
        any::<usize>().prop_map(|target| Step::ToggleBold { target }),
        (any::<usize>(), 0usize..6).prop_map(|(target, offset)| Step::Split { target, offset }),
        (any::<usize>(), 0usize..6).prop_map(|(target, offset)| Step::PlaceCaret { target, offset }),
    ]
}

fn pick(keys: &[NodeKey], choice: usize) -> Option<NodeKey> {
    (!keys.is_empty()).then(|| keys[choice % keys.len()].clone())
}

fn of_type(txn: &Transaction<'_>, node_type: &str) -> Vec<NodeKey> {
    txn.nodes()
        .document_order()
        .into_iter()
        .filter(|key| txn.node_type(key) == Some(node_type))
        .collect()
}

/// Apply one step; a step whose targets are missing does nothing
fn apply(txn: &mut Transaction<'_>, step: &Step) -> folio_editor::EditorResult<()> {
    let blocks = of_type(txn, nodes::PARAGRAPH);
    let texts = of_type(txn, nodes::TEXT);

    match step {
        Step::AddParagraph { index, text } => {
            let paragraph = txn.create_node(nodes::PARAGRAPH)?;
            let node = txn.create_text(text)?;
            txn.append(&paragraph, &node)?;
            let len = txn.children(&NodeKey::root())?.len();
            txn.insert_child(&NodeKey::root(), index % (len + 1), &paragraph)?;
        }
        Step::AddText { block, text } => {
            if let Some(block) = pick(&blocks, *block) {
                let node = txn.create_text(text)?;
                txn.append(&block, &node)?;
            }
        }
        Step::Remove { target } => {
            if let Some(target) = pick(&blocks, *target).filter(|_| target % 2 == 0) {
                txn.remove(&target)?;
            } else if let Some(target) = pick(&texts, *target) {
                txn.remove(&target)?;
            }
        }
        Step::MoveBlock { target, index } => {
            if let Some(target) = pick(&blocks, *target) {
                let len = txn.children(&NodeKey::root())?.len();
                txn.move_node(&target, &NodeKey::root(), index % len)?;
            }
        }
        Step::SetText { target, text } => {
            if let Some(target) = pick(&texts, *target) {
                txn.set_text(&target, text)?;
            }
        }
        Step::ToggleBold { target } => {
            if let Some(target) = pick(&texts, *target) {
                txn.toggle_format(&target, TextFormat::BOLD)?;
            }
        }
        Step::Split { target, offset } => {
            if let Some(target) = pick(&texts, *target) {
                let len = txn.node(&target)?.max_offset();
                split_block_at(txn, &target, (*offset).min(len))?;
            }
        }
        Step::PlaceCaret { target, offset } => {
            if let Some(target) = pick(&texts, *target) {
                let len = txn.node(&target)?.max_offset();
                txn.set_selection(Some(Selection::caret(Point::text(target, (*offset).min(len)))))?;
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_view_tracks_committed_state(steps in prop::collection::vec(arb_step(), 1..24)) {
        let mut editor = Editor::default();
        let view = Rc::new(RefCell::new(ViewTree::new()));
        editor.attach_view(view.clone()).unwrap();

        for step in &steps {
            // Structural failures roll back; the invariants must hold either way
            let _ = editor.update(|txn| apply(txn, step));

            let state = editor.state();
            prop_assert!(state.nodes().validate().is_ok());
            prop_assert!(!editor.has_pending());

            let expected = ViewTree::from_map(state.nodes(), editor.registry()).unwrap();
            prop_assert!(
                view.borrow().same_structure(&expected),
                "after {:?}\nview:\n{}\nstate:\n{}",
                step,
                view.borrow().render(),
                expected.render()
            );

            if let Some(selection) = state.selection() {
                prop_assert!(selection.resolves_in(state.nodes()));
            }
        }
    }

    #[test]
    fn prop_reading_never_changes_state(steps in prop::collection::vec(arb_step(), 1..12)) {
        let mut editor = Editor::default();
        for step in &steps {
            let _ = editor.update(|txn| apply(txn, step));
        }
        let before = editor.state();

        for step in &steps {
            let result = editor.read(|txn| apply(txn, step));
            if let Err(err) = result {
                let read_only = matches!(err, folio_editor::EditorError::ReadOnlyViolation { .. });
                prop_assert!(read_only);
            }
        }

        prop_assert!(std::sync::Arc::ptr_eq(&before, &editor.state()));
    }
}
