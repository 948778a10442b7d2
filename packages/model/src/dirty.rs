//! Per-transaction record of touched keys

use crate::key::NodeKey;
use crate::node_map::NodeMap;
use indexmap::IndexSet;
use std::sync::Arc;

/// Keys touched by a transaction, in the order they were first touched.
///
/// `nodes` holds created, attribute-mutated and reparented keys, `elements`
/// the containers whose child list changed and `removed` every key deleted
/// from the map. `recent` is the transform work-list: keys marked since the
/// last [`DirtySet::take_recent`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirtySet {
    nodes: IndexSet<NodeKey>,
    elements: IndexSet<NodeKey>,
    removed: IndexSet<NodeKey>,
    recent: IndexSet<NodeKey>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_node(&mut self, key: &NodeKey) {
        self.nodes.insert(key.clone());
        self.recent.insert(key.clone());
    }

    pub fn mark_children(&mut self, key: &NodeKey) {
        self.elements.insert(key.clone());
        self.recent.insert(key.clone());
    }

    pub fn mark_removed(&mut self, key: &NodeKey) {
        self.nodes.shift_remove(key);
        self.elements.shift_remove(key);
        self.recent.shift_remove(key);
        self.removed.insert(key.clone());
    }

    /// Drain the transform work-list
    pub fn take_recent(&mut self) -> Vec<NodeKey> {
        std::mem::take(&mut self.recent).into_iter().collect()
    }

    pub fn nodes(&self) -> &IndexSet<NodeKey> {
        &self.nodes
    }

    pub fn elements(&self) -> &IndexSet<NodeKey> {
        &self.elements
    }

    pub fn removed(&self) -> &IndexSet<NodeKey> {
        &self.removed
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.elements.is_empty() && self.removed.is_empty()
    }

    /// Dirty keys (attribute or child order), without duplicates
    pub fn touched(&self) -> impl Iterator<Item = &NodeKey> {
        self.nodes
            .iter()
            .chain(self.elements.iter().filter(|key| !self.nodes.contains(*key)))
    }

    pub fn len(&self) -> usize {
        self.touched().count() + self.removed.len()
    }

    /// Drop keys that no longer exist in `map` from the live sets
    pub fn retain_existing(&mut self, map: &NodeMap) {
        self.nodes.retain(|key| map.contains(key));
        self.elements.retain(|key| map.contains(key));
        self.recent.retain(|key| map.contains(key));
    }

    /// Derive a dirty set by comparing two full snapshots.
    ///
    /// Used when a state arrives without transaction history (a loaded or
    /// externally built state). Records shared between the snapshots are
    /// skipped without comparison.
    pub fn between(prev: &NodeMap, next: &NodeMap) -> Self {
        let mut dirty = DirtySet::new();
        for key in next.document_order() {
            let Some(next_node) = next.record(&key) else {
                continue;
            };
            match prev.record(&key) {
                None => dirty.mark_node(&key),
                Some(prev_node) if Arc::ptr_eq(prev_node, next_node) => {}
                Some(prev_node) => {
                    if prev_node.parent() != next_node.parent()
                        || !prev_node.same_attributes(next_node)
                    {
                        dirty.mark_node(&key);
                    }
                    if prev_node.children() != next_node.children() {
                        dirty.mark_children(&key);
                    }
                }
            }
        }
        for key in prev.keys() {
            if !next.contains(key) {
                dirty.removed.insert(key.clone());
            }
        }
        dirty.recent.clear();
        dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_drains_independently() {
        let mut dirty = DirtySet::new();
        let key = NodeKey::new("1");
        dirty.mark_node(&key);

        assert_eq!(dirty.take_recent(), vec![key.clone()]);
        assert!(dirty.take_recent().is_empty());
        assert!(dirty.nodes().contains(&key));

        dirty.mark_node(&key);
        assert_eq!(dirty.take_recent(), vec![key]);
    }

    #[test]
    fn test_removed_keys_leave_live_sets() {
        let mut dirty = DirtySet::new();
        let key = NodeKey::new("1");
        dirty.mark_node(&key);
        dirty.mark_children(&key);
        dirty.mark_removed(&key);

        assert!(!dirty.nodes().contains(&key));
        assert!(!dirty.elements().contains(&key));
        assert!(dirty.removed().contains(&key));
        assert_eq!(dirty.len(), 1);
    }

    #[test]
    fn test_touched_deduplicates() {
        let mut dirty = DirtySet::new();
        let a = NodeKey::new("a");
        let b = NodeKey::new("b");
        dirty.mark_node(&a);
        dirty.mark_children(&a);
        dirty.mark_children(&b);

        let touched: Vec<_> = dirty.touched().cloned().collect();
        assert_eq!(touched, vec![a, b]);
    }
}
