//! Update and mutation listeners notified after each commit

use folio_model::{DirtySet, EditorState, NodeKey};
use folio_reconciler::{ResolvedSelection, ViewPatch};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Everything a listener can learn about one commit
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    pub prev_state: Arc<EditorState>,
    pub state: Arc<EditorState>,
    pub dirty: DirtySet,
    pub patches: Vec<ViewPatch>,
    pub selection: Option<ResolvedSelection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Created,
    Updated,
    Destroyed,
}

/// Mutated keys of one node type, in dirty order
pub type MutationRecord = IndexMap<NodeKey, MutationKind>;

pub type UpdateListener = Rc<dyn Fn(&UpdateEvent)>;
pub type MutationListener = Rc<dyn Fn(&MutationRecord, &UpdateEvent)>;

/// Returned by listener and transform registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub(crate) u64);

/// Group the nodes touched by a commit by type.
///
/// A key counts as updated only when its record actually changed; a node
/// marked dirty and left as it was is not reported.
pub(crate) fn collect_mutations(event: &UpdateEvent) -> HashMap<String, MutationRecord> {
    let prev = event.prev_state.nodes();
    let next = event.state.nodes();
    let mut by_type: HashMap<String, MutationRecord> = HashMap::new();

    for key in event.dirty.touched() {
        let Some(node) = next.get(key) else {
            continue;
        };
        let kind = match prev.record(key) {
            None => MutationKind::Created,
            Some(_) if next.shares_record(prev, key) => continue,
            Some(before) if before.as_ref() == node => continue,
            Some(_) => MutationKind::Updated,
        };
        by_type
            .entry(node.node_type().to_string())
            .or_default()
            .insert(key.clone(), kind);
    }

    for key in event.dirty.removed() {
        if let Some(node) = prev.get(key) {
            by_type
                .entry(node.node_type().to_string())
                .or_default()
                .insert(key.clone(), MutationKind::Destroyed);
        }
    }
    by_type
}
