//! # State Reconciliation
//!
//! Turns a (previous, next) pair of committed states into the ordered patch
//! list that brings a view of `prev` to a view of `next`.
//!
//! The work runs in two phases over a simulated view, so every emitted
//! index is exact at the moment the patch is applied:
//!
//! 1. **Removal.** Keys gone from `next`, plus dirty keys whose view tag
//!    changed (they are rebuilt), are removed top-most first. Any survivor
//!    that lived under a removed subtree is rebuilt at its new place.
//! 2. **Placement.** Dirty keys are visited in `next` document order. Each
//!    gets an `update` when its view attributes changed; each element whose
//!    children changed gets its child list rebuilt with the fewest moves
//!    (longest common subsequence of old and new order) and recursive
//!    creates for new children.
//!
//! Only dirty keys and their parents are looked at; an untouched subtree is
//! never read, so the cost follows the size of the edit.

use crate::lcs::stable_keys;
use crate::patch::{diff_attrs, PatchStats, ViewPatch};
use folio_model::{DirtySet, NodeKey, NodeMap, NodeRegistry, TreeResult};
use std::collections::{HashMap, HashSet};
use tracing::instrument;

/// Patches turning a view of `prev` into a view of `next`.
///
/// `dirty` scopes the work: it must cover every key whose record differs
/// between the two maps (a transaction's dirty set does, and
/// [`DirtySet::between`] builds one for states without history).
#[instrument(skip_all, fields(dirty = dirty.len()))]
pub fn reconcile(
    prev: &NodeMap,
    next: &NodeMap,
    dirty: &DirtySet,
    registry: &NodeRegistry,
) -> TreeResult<Vec<ViewPatch>> {
    let mut differ = Differ::new(prev, next, registry);
    differ.remove_phase(dirty)?;
    differ.placement_phase(dirty)?;

    let stats = PatchStats::of(&differ.patches);
    tracing::debug!(
        creates = stats.creates,
        updates = stats.updates,
        moves = stats.moves,
        removes = stats.removes,
        "Reconciled"
    );
    Ok(differ.patches)
}

/// Patches creating the whole of `next` in an empty view
#[instrument(skip_all, fields(nodes = next.len()))]
pub fn mount(next: &NodeMap, registry: &NodeRegistry) -> TreeResult<Vec<ViewPatch>> {
    let empty = NodeMap::new();
    let mut differ = Differ::new(&empty, next, registry);
    differ.create_subtree(&NodeKey::root(), None, 0)?;
    Ok(differ.patches)
}

struct Differ<'a> {
    prev: &'a NodeMap,
    next: &'a NodeMap,
    registry: &'a NodeRegistry,
    patches: Vec<ViewPatch>,
    /// Previous keys whose view node no longer exists
    destroyed: HashSet<NodeKey>,
    /// Keys whose view node was built by this run
    created: HashSet<NodeKey>,
    /// Simulated child lists, loaded from `prev` on first touch
    children: HashMap<NodeKey, Vec<NodeKey>>,
    /// Simulated parents that differ from `prev`
    parents: HashMap<NodeKey, NodeKey>,
}

impl<'a> Differ<'a> {
    fn new(prev: &'a NodeMap, next: &'a NodeMap, registry: &'a NodeRegistry) -> Self {
        Self {
            prev,
            next,
            registry,
            patches: Vec::new(),
            destroyed: HashSet::new(),
            created: HashSet::new(),
            children: HashMap::new(),
            parents: HashMap::new(),
        }
    }

    fn is_live(&self, key: &NodeKey) -> bool {
        self.created.contains(key) || (self.prev.contains(key) && !self.destroyed.contains(key))
    }

    fn view_parent(&self, key: &NodeKey) -> Option<NodeKey> {
        self.parents
            .get(key)
            .cloned()
            .or_else(|| self.prev.get(key)?.parent().cloned())
    }

    fn view_children(&mut self, key: &NodeKey) -> &mut Vec<NodeKey> {
        let (prev, destroyed) = (self.prev, &self.destroyed);
        self.children.entry(key.clone()).or_insert_with(|| {
            prev.get(key)
                .map(|node| {
                    node.children()
                        .iter()
                        .filter(|child| !destroyed.contains(*child))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    fn detach_in_view(&mut self, key: &NodeKey) {
        if let Some(parent) = self.view_parent(key) {
            self.view_children(&parent).retain(|child| child != key);
        }
    }

    /// Index right after the already placed `previous` sibling
    fn index_after(&mut self, parent: &NodeKey, previous: Option<&NodeKey>) -> usize {
        match previous {
            Some(previous) => self
                .view_children(parent)
                .iter()
                .position(|child| child == previous)
                .map(|index| index + 1)
                .unwrap_or(0),
            None => 0,
        }
    }

    // Phase 1

    fn remove_phase(&mut self, dirty: &DirtySet) -> TreeResult<()> {
        let mut doomed: HashSet<NodeKey> = dirty
            .removed()
            .iter()
            .filter(|key| self.prev.contains(key) && !self.next.contains(key))
            .cloned()
            .collect();

        for key in dirty.touched() {
            if key.is_root() || doomed.contains(key) {
                continue;
            }
            if let (Some(old), Some(new)) = (self.prev.get(key), self.next.get(key)) {
                if self.registry.view_tag(old)? != self.registry.view_tag(new)? {
                    tracing::debug!(key = %key, "View tag changed, rebuilding");
                    doomed.insert(key.clone());
                }
            }
        }

        let mut tops: Vec<(Vec<usize>, NodeKey)> = doomed
            .iter()
            .filter(|key| !self.prev.ancestors(key).iter().any(|ancestor| doomed.contains(ancestor)))
            .filter_map(|key| Some((self.prev.path(key)?, key.clone())))
            .collect();
        tops.sort();

        for (_, key) in tops {
            self.detach_in_view(&key);
            self.destroyed.extend(self.prev.descendants(&key));
            self.patches.push(ViewPatch::Remove { key });
        }
        Ok(())
    }

    // Phase 2

    fn placement_phase(&mut self, dirty: &DirtySet) -> TreeResult<()> {
        let mut check_attrs: HashSet<NodeKey> = HashSet::new();
        let mut check_children: HashSet<NodeKey> = dirty
            .elements()
            .iter()
            .filter(|key| self.next.contains(key))
            .cloned()
            .collect();

        for key in dirty.nodes() {
            let Some(node) = self.next.get(key) else {
                continue;
            };
            check_attrs.insert(key.clone());
            if let Some(parent) = node.parent() {
                check_children.insert(parent.clone());
            }
        }
        // Survivors of removed subtrees are rebuilt by their new parent
        for key in &self.destroyed {
            if let Some(parent) = self.next.get(key).and_then(|node| node.parent()) {
                check_children.insert(parent.clone());
            }
        }

        let mut visit: Vec<(Vec<usize>, NodeKey)> = check_attrs
            .union(&check_children)
            .filter_map(|key| Some((self.next.path(key)?, key.clone())))
            .collect();
        visit.sort();

        for (_, key) in visit {
            if !self.is_live(&key) || self.created.contains(&key) {
                continue;
            }
            if check_attrs.contains(&key) {
                self.update_attrs(&key)?;
            }
            if check_children.contains(&key) {
                self.place_children(&key)?;
            }
        }
        Ok(())
    }

    fn update_attrs(&mut self, key: &NodeKey) -> TreeResult<()> {
        let (Some(old), Some(new)) = (self.prev.get(key), self.next.get(key)) else {
            return Ok(());
        };
        let delta = diff_attrs(&self.registry.view_attrs(old)?, &self.registry.view_attrs(new)?);
        if !delta.is_empty() {
            self.patches.push(ViewPatch::Update {
                key: key.clone(),
                delta,
            });
        }
        Ok(())
    }

    fn place_children(&mut self, parent: &NodeKey) -> TreeResult<()> {
        let target = self.next.children(parent)?.to_vec();
        let next = self.next;
        let current: Vec<NodeKey> = self
            .view_children(parent)
            .iter()
            .filter(|child| next.get(child).and_then(|node| node.parent()) == Some(parent))
            .cloned()
            .collect();
        let stable = stable_keys(&current, &target);

        let mut previous: Option<NodeKey> = None;
        for child in &target {
            if !self.is_live(child) {
                let index = self.index_after(parent, previous.as_ref());
                self.create_subtree(child, Some(parent), index)?;
            } else if self.view_parent(child).as_ref() != Some(parent) || !stable.contains(child) {
                self.move_after(child, parent, previous.as_ref());
            }
            previous = Some(child.clone());
        }
        Ok(())
    }

    /// Move `key` right behind `previous` (or to the front); the index is
    /// taken after `key` has left its old place
    fn move_after(&mut self, key: &NodeKey, parent: &NodeKey, previous: Option<&NodeKey>) {
        self.detach_in_view(key);
        let index = self.index_after(parent, previous);
        self.view_children(parent).insert(index, key.clone());
        self.parents.insert(key.clone(), parent.clone());
        self.patches.push(ViewPatch::Move {
            key: key.clone(),
            parent: parent.clone(),
            index,
        });
    }

    fn create_subtree(&mut self, key: &NodeKey, parent: Option<&NodeKey>, index: usize) -> TreeResult<()> {
        let node = self.next.node(key)?;
        let tag = self.registry.view_tag(node)?;
        let attrs = self.registry.view_attrs(node)?;
        let children = node.children().to_vec();

        self.created.insert(key.clone());
        self.children.insert(key.clone(), Vec::new());
        if let Some(parent) = parent {
            self.view_children(parent).insert(index, key.clone());
            self.parents.insert(key.clone(), parent.clone());
        }
        self.patches.push(ViewPatch::Create {
            key: key.clone(),
            tag,
            attrs,
            parent: parent.cloned(),
            index,
        });

        for (child_index, child) in children.iter().enumerate() {
            if self.is_live(child) {
                let previous = child_index.checked_sub(1).map(|before| &children[before]);
                self.move_after(child, key, previous);
            } else {
                self.create_subtree(child, Some(key), child_index)?;
            }
        }
        Ok(())
    }
}
