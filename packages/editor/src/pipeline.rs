//! # Flush Pipeline
//!
//! Turns the pending state into the next committed state:
//!
//! ```text
//! pending ─→ transforms ─→ collect unattached ─→ validate ─→ settle selection
//!                                                                  │
//! listeners ←─ view host ←─ swap committed pointer ←─ reconcile ←──┘
//! ```
//!
//! A failure before the swap drops the pending state; the previously
//! committed state stays authoritative. Once swapped, a state is final:
//! a view host error is reported to the caller but does not undo the commit.

use crate::editor::Editor;
use crate::errors::{EditorError, EditorResult};
use crate::listeners::{collect_mutations, UpdateEvent};
use crate::transaction::PendingState;
use crate::transforms::run_transforms;
use folio_model::{DirtySet, EditorState, NodeKey, NodeMap, NodeRegistry, Selection, TreeError};
use folio_reconciler::{reconcile, resolve_selection};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

impl Editor {
    /// Commit the pending state, if any. Returns whether a new state was
    /// committed; an update with no net effect commits nothing.
    #[instrument(skip(self), fields(namespace = %self.config.namespace))]
    pub fn flush(&mut self) -> EditorResult<bool> {
        let Some(mut pending) = self.pending.take() else {
            return Ok(false);
        };

        if let Err(err) = run_transforms(&mut pending, &self.registry, &self.transforms, &self.config) {
            warn!(error = %err, "Update aborted by transforms");
            return Err(err);
        }
        self.commit(pending, false)
    }

    pub(crate) fn commit(&mut self, mut pending: PendingState, full_validation: bool) -> EditorResult<bool> {
        let prev = self.state.clone();

        let purged = match pending.nodes.purge_detached(pending.created.iter(), prev.nodes()) {
            Ok(purged) => purged,
            Err(err) => {
                warn!(error = %err, "Update left an existing node detached");
                return Err(EditorError::Structural(err));
            }
        };
        if !purged.is_empty() {
            debug!(count = purged.len(), "Collected unattached nodes");
        }
        pending.dirty.retain_existing(&pending.nodes);

        let full = full_validation || self.config.validate_full_tree;
        if let Err(err) = validate(&pending, &self.registry, full) {
            warn!(error = %err, "Update aborted by invariant check");
            return Err(EditorError::Structural(err));
        }

        let selection = settle_selection(prev.nodes(), &pending.nodes, pending.selection.take());
        if !has_changes(prev.nodes(), &pending.nodes, &pending.dirty) && selection.as_ref() == prev.selection() {
            debug!("Update had no net effect");
            return Ok(false);
        }

        let patches = reconcile(prev.nodes(), &pending.nodes, &pending.dirty, &self.registry)?;

        let PendingState { mut nodes, dirty, .. } = pending;
        nodes.clear_registry();
        let state = Arc::new(EditorState::new(nodes, selection));
        self.state = state.clone();
        info!(
            patches = patches.len(),
            dirty = dirty.len(),
            nodes = state.nodes().len(),
            "Committed editor state"
        );

        let resolved = resolve_selection(prev.nodes(), state.nodes(), state.selection());
        let event = UpdateEvent {
            prev_state: prev,
            state,
            dirty,
            patches,
            selection: resolved,
        };
        let view_result = self.push_to_view(&event);
        self.notify(&event);
        view_result.map(|_| true)
    }

    fn push_to_view(&mut self, event: &UpdateEvent) -> EditorResult<()> {
        if let Some(view) = self.view.as_mut() {
            view.apply_patches(&event.patches)?;
            view.set_selection(event.selection.as_ref());
        }
        Ok(())
    }

    fn notify(&self, event: &UpdateEvent) {
        for (_, listener) in &self.update_listeners {
            listener(event);
        }
        if self.mutation_listeners.is_empty() {
            return;
        }
        let mutations = collect_mutations(event);
        for (_, node_type, listener) in &self.mutation_listeners {
            if let Some(record) = mutations.get(node_type) {
                listener(record, event);
            }
        }
    }
}

fn validate(pending: &PendingState, registry: &NodeRegistry, full: bool) -> Result<(), TreeError> {
    let nodes = &pending.nodes;
    if full {
        nodes.validate()?;
        return nodes.keys().try_for_each(|key| check_filled(nodes, registry, key));
    }
    if nodes.root().is_none() {
        return Err(TreeError::NodeNotFound(NodeKey::root()));
    }
    nodes.validate_keys(pending.dirty.touched())?;
    pending
        .dirty
        .touched()
        .try_for_each(|key| check_filled(nodes, registry, key))
}

/// Elements whose type must hold content may not end an update empty
fn check_filled(nodes: &NodeMap, registry: &NodeRegistry, key: &NodeKey) -> Result<(), TreeError> {
    let Some(node) = nodes.get(key) else {
        return Ok(());
    };
    if key.is_root() || !node.is_element() || !node.children().is_empty() {
        return Ok(());
    }
    if registry.for_node(node)?.can_be_empty() {
        return Ok(());
    }
    Err(TreeError::EmptyContainer {
        key: key.clone(),
        node_type: node.node_type().to_string(),
    })
}

/// Pin the selection to nodes that exist, then clamp it
fn settle_selection(prev: &NodeMap, next: &NodeMap, selection: Option<Selection>) -> Option<Selection> {
    let selection = selection?;
    let mut selection = if next.contains(&selection.anchor.key) && next.contains(&selection.focus.key) {
        selection
    } else {
        resolve_selection(prev, next, Some(&selection))?.to_selection()
    };
    selection.normalize(next);
    Some(selection)
}

fn has_changes(prev: &NodeMap, next: &NodeMap, dirty: &DirtySet) -> bool {
    if dirty.removed().iter().any(|key| prev.contains(key)) {
        return true;
    }
    dirty.touched().any(|key| match (prev.record(key), next.record(key)) {
        (Some(before), Some(after)) => !Arc::ptr_eq(before, after) && before != after,
        (None, Some(_)) => true,
        _ => false,
    })
}
