//! # Transactions
//!
//! A transaction is the only handle through which a document is read or
//! changed. Read transactions look at the committed state; write transactions
//! work on the pending clone that becomes the next committed state when the
//! update is flushed.
//!
//! Every primitive keeps the selection in step with the tree: points inside a
//! removed subtree are relocated before the subtree goes, element offsets
//! shift as children come and go, and a split moves points past the split
//! onto the new text node.

use crate::errors::{EditorError, EditorResult};
use folio_model::{
    next_key, nodes, Direction, DirtySet, EditorState, ElementFormat, Node, NodeKey, NodeMap,
    NodeRegistry, Point, PointKind, Selection, TextData, TextDetail, TextFormat, TextMode,
    TreeError, TreeResult,
};
use indexmap::IndexSet;
use serde_json::Value;

/// Working copy owned by the update in progress
#[derive(Debug, Clone)]
pub struct PendingState {
    pub(crate) nodes: NodeMap,
    pub(crate) selection: Option<Selection>,
    pub(crate) dirty: DirtySet,
    /// Keys created during the update, collected if never attached
    pub(crate) created: IndexSet<NodeKey>,
}

impl PendingState {
    pub(crate) fn from_state(state: &EditorState) -> Self {
        Self {
            nodes: state.nodes().clone(),
            selection: state.selection().cloned(),
            dirty: DirtySet::new(),
            created: IndexSet::new(),
        }
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }
}

enum Target<'a> {
    Read(&'a EditorState),
    Write(&'a mut PendingState),
}

pub struct Transaction<'a> {
    target: Target<'a>,
    registry: &'a NodeRegistry,
    /// First structural failure; a poisoned update is never committed
    poison: Option<TreeError>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn read(state: &'a EditorState, registry: &'a NodeRegistry) -> Self {
        Self {
            target: Target::Read(state),
            registry,
            poison: None,
        }
    }

    pub(crate) fn write(pending: &'a mut PendingState, registry: &'a NodeRegistry) -> Self {
        if !pending.nodes.has_registry() {
            pending.nodes.install_registry(registry);
        }
        Self {
            target: Target::Write(pending),
            registry,
            poison: None,
        }
    }

    pub(crate) fn into_poison(self) -> Option<TreeError> {
        self.poison
    }

    // Queries

    pub fn is_read_only(&self) -> bool {
        matches!(self.target, Target::Read(_))
    }

    pub fn registry(&self) -> &NodeRegistry {
        self.registry
    }

    pub fn nodes(&self) -> &NodeMap {
        match &self.target {
            Target::Read(state) => state.nodes(),
            Target::Write(pending) => &pending.nodes,
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        match &self.target {
            Target::Read(state) => state.selection(),
            Target::Write(pending) => pending.selection.as_ref(),
        }
    }

    /// Dirty set accumulated so far; empty in read transactions
    pub fn dirty(&self) -> Option<&DirtySet> {
        match &self.target {
            Target::Read(_) => None,
            Target::Write(pending) => Some(&pending.dirty),
        }
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes().contains(key)
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes().get(key)
    }

    pub fn node(&self, key: &NodeKey) -> EditorResult<&Node> {
        Ok(self.nodes().node(key)?)
    }

    pub fn node_type(&self, key: &NodeKey) -> Option<&str> {
        self.get(key).map(Node::node_type)
    }

    pub fn parent(&self, key: &NodeKey) -> Option<NodeKey> {
        self.get(key)?.parent().cloned()
    }

    /// Owned copy of the child list, safe to hold across mutations
    pub fn children(&self, key: &NodeKey) -> EditorResult<Vec<NodeKey>> {
        Ok(self.nodes().children(key)?.to_vec())
    }

    pub fn index_in_parent(&self, key: &NodeKey) -> Option<usize> {
        self.nodes().index_in_parent(key)
    }

    pub fn previous_sibling(&self, key: &NodeKey) -> Option<NodeKey> {
        self.nodes().previous_sibling(key).cloned()
    }

    pub fn next_sibling(&self, key: &NodeKey) -> Option<NodeKey> {
        self.nodes().next_sibling(key).cloned()
    }

    pub fn is_attached(&self, key: &NodeKey) -> bool {
        self.nodes().is_attached(key)
    }

    /// Plain text of the whole document, blocks separated by blank lines
    pub fn text_content(&self) -> String {
        let nodes = self.nodes();
        nodes
            .children(&NodeKey::root())
            .map(|blocks| {
                blocks
                    .iter()
                    .map(|block| nodes.text_content(block))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            })
            .unwrap_or_default()
    }

    // Plumbing

    fn pending(&mut self, operation: &'static str) -> EditorResult<&mut PendingState> {
        match &mut self.target {
            Target::Write(pending) => Ok(&mut **pending),
            Target::Read(_) => Err(EditorError::ReadOnlyViolation { operation }),
        }
    }

    fn check<T>(&mut self, result: TreeResult<T>) -> EditorResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                if self.poison.is_none() {
                    self.poison = Some(err.clone());
                }
                Err(EditorError::Structural(err))
            }
        }
    }

    fn update_with<T>(
        &mut self,
        operation: &'static str,
        apply: impl FnOnce(&mut NodeMap, &mut DirtySet) -> TreeResult<T>,
    ) -> EditorResult<T> {
        let pending = self.pending(operation)?;
        let result = apply(&mut pending.nodes, &mut pending.dirty);
        self.check(result)
    }

    // Creation

    /// Construct a detached node of a registered type
    pub fn create_node(&mut self, node_type: &str) -> EditorResult<NodeKey> {
        self.pending("create a node")?;
        let node = self.registry.construct(node_type, next_key());
        let node = self.check(node)?;
        self.insert_node(node)
    }

    pub fn create_text(&mut self, text: &str) -> EditorResult<NodeKey> {
        self.pending("create a text node")?;
        let node = self
            .registry
            .construct(nodes::TEXT, next_key())
            .map(|node| node.with_text_data(TextData::new(text)));
        let node = self.check(node)?;
        self.insert_node(node)
    }

    /// Add a fully built detached node
    pub fn insert_node(&mut self, node: Node) -> EditorResult<NodeKey> {
        let pending = self.pending("insert a node")?;
        let key = node.key().clone();
        let result = pending.nodes.insert_detached(node);
        if result.is_ok() {
            pending.created.insert(key.clone());
        }
        self.check(result).map(|_| key)
    }

    // Structure

    pub fn insert_child(&mut self, parent: &NodeKey, index: usize, child: &NodeKey) -> EditorResult<()> {
        let pending = self.pending("insert a child")?;
        let result = pending.nodes.insert_child(parent, index, child, &mut pending.dirty);
        if result.is_ok() {
            if let Some(selection) = pending.selection.as_mut() {
                selection.adjust_for_insert(parent, index);
            }
        }
        self.check(result)
    }

    pub fn append(&mut self, parent: &NodeKey, child: &NodeKey) -> EditorResult<()> {
        let len = self.pending("append a child")?.nodes.children(parent).map(<[NodeKey]>::len);
        match len {
            Ok(len) => self.insert_child(parent, len, child),
            Err(err) => self.check(Err(err)),
        }
    }

    pub fn insert_before(&mut self, sibling: &NodeKey, node: &NodeKey) -> EditorResult<()> {
        let position = self.pending("insert a sibling")?.nodes.position(sibling);
        match position {
            Ok((parent, index)) => self.insert_child(&parent, index, node),
            Err(err) => self.check(Err(err)),
        }
    }

    pub fn insert_after(&mut self, sibling: &NodeKey, node: &NodeKey) -> EditorResult<()> {
        let position = self.pending("insert a sibling")?.nodes.position(sibling);
        match position {
            Ok((parent, index)) => self.insert_child(&parent, index + 1, node),
            Err(err) => self.check(Err(err)),
        }
    }

    /// Delete a node and its subtree. Returns every removed key.
    ///
    /// A parent left empty goes too when its type may not be empty, and so
    /// on up the chain.
    pub fn remove(&mut self, key: &NodeKey) -> EditorResult<Vec<NodeKey>> {
        let pending = self.pending("remove a node")?;
        let PendingState {
            nodes,
            selection,
            dirty,
            ..
        } = pending;

        let position = nodes.position(key).ok();
        if let Some(selection) = selection.as_mut() {
            if nodes.contains(key) && !key.is_root() {
                selection.relocate_for_removal(nodes, key);
            }
        }
        let result = nodes.remove(key, dirty);
        if let (Ok(_), Some((parent, index)), Some(selection)) = (&result, &position, selection.as_mut()) {
            selection.adjust_for_detach(parent, *index);
        }
        let mut removed = self.check(result)?;
        if let Some((parent, _)) = position {
            removed.extend(self.remove_if_emptied(&parent)?);
        }
        Ok(removed)
    }

    fn remove_if_emptied(&mut self, key: &NodeKey) -> EditorResult<Vec<NodeKey>> {
        let Some(node) = self.get(key) else {
            return Ok(Vec::new());
        };
        if key.is_root() || !node.is_element() || !node.children().is_empty() {
            return Ok(Vec::new());
        }
        let can_be_empty = self.registry.for_node(node).map(|node_type| node_type.can_be_empty());
        if self.check(can_be_empty)? {
            return Ok(Vec::new());
        }
        self.remove(key)
    }

    /// Reparent `key` under `parent` at `index` (counted without `key`)
    pub fn move_node(&mut self, key: &NodeKey, parent: &NodeKey, index: usize) -> EditorResult<()> {
        let pending = self.pending("move a node")?;
        let PendingState {
            nodes,
            selection,
            dirty,
            ..
        } = pending;

        let from = nodes.position(key).ok();
        let result = nodes.move_node(key, parent, index, dirty);
        if let (Ok(_), Some(selection)) = (&result, selection.as_mut()) {
            if let Some((old_parent, old_index)) = &from {
                selection.adjust_for_detach(old_parent, *old_index);
            }
            selection.adjust_for_insert(parent, index);
        }
        self.check(result)
    }

    /// Put detached `replacement` in place of `key`
    pub fn replace(&mut self, key: &NodeKey, replacement: &NodeKey, carry_children: bool) -> EditorResult<()> {
        let registry = self.registry;
        let pending = self.pending("replace a node")?;
        let PendingState {
            nodes,
            selection,
            dirty,
            ..
        } = pending;

        if let Some(selection) = selection.as_mut() {
            if carry_children {
                selection.translate_points(|point| {
                    (&point.key == key && point.kind == PointKind::Element)
                        .then(|| Point::element(replacement.clone(), point.offset))
                });
            } else if nodes.contains(key) && !key.is_root() {
                selection.relocate_for_removal(nodes, key);
            }
        }
        let result = nodes.replace(registry, key, replacement, carry_children, dirty);
        self.check(result)
    }

    /// Split a text node at a character offset. Returns the tail's key.
    pub fn split_text(&mut self, key: &NodeKey, offset: usize) -> EditorResult<NodeKey> {
        let pending = self.pending("split a text node")?;
        let PendingState {
            nodes,
            selection,
            dirty,
            ..
        } = pending;

        let position = nodes.position(key).ok();
        let result = nodes.split_text(key, offset, next_key(), dirty);
        if let (Ok(tail), Some(selection)) = (&result, selection.as_mut()) {
            selection.translate_points(|point| {
                (&point.key == key && point.kind == PointKind::Text && point.offset > offset)
                    .then(|| Point::text(tail.clone(), point.offset - offset))
            });
            if let Some((parent, index)) = &position {
                selection.adjust_for_insert(parent, *index);
            }
        }
        self.check(result)
    }

    // Attributes

    /// Queue a node for transforms without changing it
    pub fn mark_dirty(&mut self, key: &NodeKey) -> EditorResult<()> {
        self.update_with("mark a node dirty", |nodes, dirty| nodes.mark_dirty(key, dirty))
    }

    pub fn set_text(&mut self, key: &NodeKey, text: &str) -> EditorResult<()> {
        self.update_with("set text", |nodes, dirty| nodes.set_text(key, text, dirty))
    }

    pub fn set_text_format(&mut self, key: &NodeKey, format: TextFormat) -> EditorResult<()> {
        self.update_with("set a text format", |nodes, dirty| nodes.set_text_format(key, format, dirty))
    }

    pub fn toggle_format(&mut self, key: &NodeKey, format: TextFormat) -> EditorResult<()> {
        self.update_with("toggle a text format", |nodes, dirty| {
            let current = nodes
                .node(key)?
                .as_text()
                .map(|text| text.format)
                .ok_or_else(|| TreeError::NotText(key.clone()))?;
            nodes.set_text_format(key, current.toggled(format), dirty)
        })
    }

    pub fn set_style(&mut self, key: &NodeKey, style: &str) -> EditorResult<()> {
        self.update_with("set a text style", |nodes, dirty| nodes.set_style(key, style, dirty))
    }

    pub fn set_mode(&mut self, key: &NodeKey, mode: TextMode) -> EditorResult<()> {
        self.update_with("set a text mode", |nodes, dirty| nodes.set_mode(key, mode, dirty))
    }

    pub fn set_detail(&mut self, key: &NodeKey, detail: TextDetail) -> EditorResult<()> {
        self.update_with("set text detail", |nodes, dirty| nodes.set_detail(key, detail, dirty))
    }

    pub fn set_direction(&mut self, key: &NodeKey, direction: Option<Direction>) -> EditorResult<()> {
        self.update_with("set a direction", |nodes, dirty| nodes.set_direction(key, direction, dirty))
    }

    pub fn set_element_format(&mut self, key: &NodeKey, format: ElementFormat) -> EditorResult<()> {
        self.update_with("set an alignment", |nodes, dirty| {
            nodes.set_element_format(key, format, dirty)
        })
    }

    pub fn set_indent(&mut self, key: &NodeKey, indent: u32) -> EditorResult<()> {
        self.update_with("set an indent", |nodes, dirty| nodes.set_indent(key, indent, dirty))
    }

    pub fn set_prop(&mut self, key: &NodeKey, name: &str, value: impl Into<Value>) -> EditorResult<()> {
        let value = value.into();
        self.update_with("set a property", |nodes, dirty| nodes.set_prop(key, name, value, dirty))
    }

    pub fn remove_prop(&mut self, key: &NodeKey, name: &str) -> EditorResult<()> {
        self.update_with("remove a property", |nodes, dirty| nodes.remove_prop(key, name, dirty))
    }

    // Selection

    /// Replace the selection; it is normalized when the update is flushed
    pub fn set_selection(&mut self, selection: Option<Selection>) -> EditorResult<()> {
        self.pending("set the selection")?.selection = selection;
        Ok(())
    }

    /// Remap selection points; returns how many moved
    pub fn translate_points<F>(&mut self, mapper: F) -> EditorResult<usize>
    where
        F: FnMut(&Point) -> Option<Point>,
    {
        let pending = self.pending("move the selection")?;
        Ok(pending
            .selection
            .as_mut()
            .map(|selection| selection.translate_points(mapper))
            .unwrap_or(0))
    }
}
