//! # Node Map
//!
//! Flat `key → record` storage for one snapshot, plus the tree primitives.
//!
//! Records are held behind `Arc` so a cloned map shares every record with
//! its source. A primitive copies a record only when it actually writes to it
//! (`Arc::make_mut`), which keeps a write transaction's cost proportional to
//! the nodes it touches. Committed records are never written in place.
//!
//! Every primitive checks the tree invariant before it changes anything: a
//! failing call leaves the map exactly as it was.
//!
//! A map working for an update carries the node registry. With it installed,
//! first-touch copies go through each type's `clone_node` and insertions ask
//! the neighbouring types whether the new order is allowed. A bare map (a
//! committed snapshot, a test fixture) uses plain `Clone` and skips the
//! sibling check.

use crate::dirty::DirtySet;
use crate::error::{TreeError, TreeResult};
use crate::format::{Direction, ElementFormat, TextDetail, TextFormat, TextMode};
use crate::key::NodeKey;
use crate::node::{ElementData, Node, TextData};
use crate::registry::NodeRegistry;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct NodeMap {
    nodes: HashMap<NodeKey, Arc<Node>>,
    registry: Option<NodeRegistry>,
}

impl PartialEq for NodeMap {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl NodeMap {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            registry: None,
        }
    }

    /// Consult `registry` for copies and sibling checks from now on
    pub fn install_registry(&mut self, registry: &NodeRegistry) {
        self.registry = Some(registry.clone());
    }

    pub fn has_registry(&self) -> bool {
        self.registry.is_some()
    }

    pub fn clear_registry(&mut self) {
        self.registry = None;
    }

    /// Map holding only an empty root
    pub fn with_root() -> Self {
        let mut map = Self::new();
        map.nodes.insert(
            NodeKey::root(),
            Arc::new(Node::element(NodeKey::root(), crate::nodes::ROOT)),
        );
        map
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key).map(Arc::as_ref)
    }

    pub fn record(&self, key: &NodeKey) -> Option<&Arc<Node>> {
        self.nodes.get(key)
    }

    pub fn node(&self, key: &NodeKey) -> TreeResult<&Node> {
        self.get(key)
            .ok_or_else(|| TreeError::NodeNotFound(key.clone()))
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.get(crate::key::ROOT_KEY).map(Arc::as_ref)
    }

    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.nodes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &Node)> {
        self.nodes.iter().map(|(key, node)| (key, node.as_ref()))
    }

    /// True when both maps hold the very same record for `key`
    pub fn shares_record(&self, other: &NodeMap, key: &NodeKey) -> bool {
        match (self.nodes.get(key), other.nodes.get(key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Writable record for `key`, copied first if another snapshot shares it
    fn write(&mut self, key: &NodeKey) -> TreeResult<&mut Node> {
        let record = self
            .nodes
            .get_mut(key)
            .ok_or_else(|| TreeError::NodeNotFound(key.clone()))?;
        if Arc::get_mut(record).is_none() {
            let current: &Node = record;
            let copy = match &self.registry {
                Some(registry) => registry.for_node(current)?.clone_node(current),
                None => current.clone(),
            };
            *record = Arc::new(copy);
        }
        Ok(Arc::make_mut(record))
    }

    /// Whether `child` may sit at `index` among `parent`'s children.
    ///
    /// The child list is taken without `child` itself, so a move within the
    /// same parent is checked against its final neighbours.
    fn check_siblings(&self, parent: &NodeKey, index: usize, child: &NodeKey) -> TreeResult<()> {
        let Some(registry) = &self.registry else {
            return Ok(());
        };
        let child_node = self.node(child)?;
        let siblings: Vec<&NodeKey> = self.children(parent)?.iter().filter(|key| *key != child).collect();
        let before = index.checked_sub(1).and_then(|prev| siblings.get(prev));
        let after = siblings.get(index);

        if let Some(before) = before {
            let before_node = self.node(before)?;
            if !registry.for_node(before_node)?.can_insert_after(before_node, child_node) {
                return Err(TreeError::IncompatibleSibling {
                    node: before_node.node_type().to_string(),
                    sibling: child_node.node_type().to_string(),
                });
            }
        }
        if let Some(after) = after {
            let after_node = self.node(after)?;
            if !registry.for_node(child_node)?.can_insert_after(child_node, after_node) {
                return Err(TreeError::IncompatibleSibling {
                    node: child_node.node_type().to_string(),
                    sibling: after_node.node_type().to_string(),
                });
            }
        }
        Ok(())
    }

    // Queries

    pub fn children(&self, key: &NodeKey) -> TreeResult<&[NodeKey]> {
        let node = self.node(key)?;
        node.as_element()
            .map(|element| element.children.as_slice())
            .ok_or_else(|| TreeError::NotAnElement(key.clone()))
    }

    pub fn index_in_parent(&self, key: &NodeKey) -> Option<usize> {
        let parent = self.get(key)?.parent()?;
        self.get(parent)?.children().iter().position(|child| child == key)
    }

    pub fn previous_sibling(&self, key: &NodeKey) -> Option<&NodeKey> {
        let index = self.index_in_parent(key)?;
        let parent = self.get(key)?.parent()?;
        index
            .checked_sub(1)
            .and_then(|prev| self.get(parent)?.children().get(prev))
    }

    pub fn next_sibling(&self, key: &NodeKey) -> Option<&NodeKey> {
        let index = self.index_in_parent(key)?;
        let parent = self.get(key)?.parent()?;
        self.get(parent)?.children().get(index + 1)
    }

    /// Parent chain, nearest first. Stops at a missing link or a repeated key.
    pub fn ancestors(&self, key: &NodeKey) -> Vec<NodeKey> {
        let mut chain = Vec::new();
        let mut current = self.get(key).and_then(Node::parent);
        while let Some(parent) = current {
            if chain.len() > self.nodes.len() || chain.contains(parent) {
                break;
            }
            chain.push(parent.clone());
            current = self.get(parent).and_then(Node::parent);
        }
        chain
    }

    /// Strict ancestry test
    pub fn is_ancestor(&self, ancestor: &NodeKey, key: &NodeKey) -> bool {
        self.ancestors(key).iter().any(|candidate| candidate == ancestor)
    }

    /// Whether the node's parent chain reaches the root
    pub fn is_attached(&self, key: &NodeKey) -> bool {
        if key.is_root() {
            return self.contains(key);
        }
        self.ancestors(key)
            .last()
            .map(NodeKey::is_root)
            .unwrap_or(false)
    }

    /// Pre-order keys of the subtree rooted at `key`, `key` first
    pub fn descendants(&self, key: &NodeKey) -> Vec<NodeKey> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![key.clone()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.get(&current) {
                stack.extend(node.children().iter().rev().cloned());
                order.push(current);
            }
        }
        order
    }

    /// Every key reachable from the root, in document order
    pub fn document_order(&self) -> Vec<NodeKey> {
        if self.root().is_none() {
            return Vec::new();
        }
        self.descendants(&NodeKey::root())
    }

    /// Child indices leading from the root to `key`; `None` when detached
    pub fn path(&self, key: &NodeKey) -> Option<Vec<usize>> {
        if !self.is_attached(key) {
            return None;
        }
        let mut path = Vec::new();
        let mut current = key.clone();
        while !current.is_root() {
            path.push(self.index_in_parent(&current)?);
            current = self.get(&current)?.parent()?.clone();
        }
        path.reverse();
        Some(path)
    }

    pub fn depth(&self, key: &NodeKey) -> usize {
        self.ancestors(key).len()
    }

    /// Concatenated text of the subtree
    pub fn text_content(&self, key: &NodeKey) -> String {
        self.descendants(key)
            .iter()
            .filter_map(|descendant| self.get(descendant)?.text_content())
            .collect()
    }

    // Structure

    /// Add a node that has no parent yet; it must be attached before commit
    pub fn insert_detached(&mut self, node: Node) -> TreeResult<()> {
        if self.nodes.contains_key(node.key()) {
            return Err(TreeError::DuplicateKey {
                key: node.key().clone(),
            });
        }
        if let Some(parent) = node.parent() {
            return Err(TreeError::AlreadyAttached {
                key: node.key().clone(),
                parent: parent.clone(),
            });
        }
        if !node.children().is_empty() {
            return Err(TreeError::broken_link(
                node.key(),
                "a detached node cannot arrive with children",
            ));
        }
        self.nodes.insert(node.key().clone(), Arc::new(node));
        Ok(())
    }

    pub fn insert_child(
        &mut self,
        parent: &NodeKey,
        index: usize,
        child: &NodeKey,
        dirty: &mut DirtySet,
    ) -> TreeResult<()> {
        let len = self.children(parent)?.len();
        let child_node = self.node(child)?;
        if child.is_root() {
            return Err(TreeError::Cycle {
                key: child.clone(),
                parent: parent.clone(),
            });
        }
        if let Some(current) = child_node.parent() {
            return Err(TreeError::AlreadyAttached {
                key: child.clone(),
                parent: current.clone(),
            });
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(TreeError::Cycle {
                key: child.clone(),
                parent: parent.clone(),
            });
        }
        if index > len {
            return Err(TreeError::out_of_bounds(parent, index, len));
        }
        self.check_siblings(parent, index, child)?;

        self.write(child)?.parent = Some(parent.clone());
        let siblings = {
            let element = self
                .write(parent)?
                .element_mut()
                .ok_or_else(|| TreeError::NotAnElement(parent.clone()))?;
            element.children.insert(index, child.clone());
            neighbours(&element.children, index)
        };

        dirty.mark_node(child);
        dirty.mark_children(parent);
        for sibling in siblings {
            dirty.mark_node(&sibling);
        }
        Ok(())
    }

    pub fn append(&mut self, parent: &NodeKey, child: &NodeKey, dirty: &mut DirtySet) -> TreeResult<()> {
        let len = self.children(parent)?.len();
        self.insert_child(parent, len, child, dirty)
    }

    pub fn insert_before(&mut self, sibling: &NodeKey, node: &NodeKey, dirty: &mut DirtySet) -> TreeResult<()> {
        let (parent, index) = self.position(sibling)?;
        self.insert_child(&parent, index, node, dirty)
    }

    pub fn insert_after(&mut self, sibling: &NodeKey, node: &NodeKey, dirty: &mut DirtySet) -> TreeResult<()> {
        let (parent, index) = self.position(sibling)?;
        self.insert_child(&parent, index + 1, node, dirty)
    }

    /// Parent key and index of an attached node
    pub fn position(&self, key: &NodeKey) -> TreeResult<(NodeKey, usize)> {
        let node = self.node(key)?;
        let parent = node.parent().ok_or_else(|| TreeError::Orphan(key.clone()))?;
        let index = self
            .index_in_parent(key)
            .ok_or_else(|| TreeError::broken_link(key, format!("not listed by parent {parent}")))?;
        Ok((parent.clone(), index))
    }

    /// Unlink a node from its parent, keeping it (and its subtree) in the map.
    /// Returns the former parent and index, or `None` if already detached.
    pub fn detach(&mut self, key: &NodeKey, dirty: &mut DirtySet) -> TreeResult<Option<(NodeKey, usize)>> {
        if key.is_root() {
            return Err(TreeError::CannotRemoveRoot);
        }
        if self.node(key)?.parent().is_none() {
            return Ok(None);
        }
        let (parent, index) = self.position(key)?;

        let siblings = {
            let element = self
                .write(&parent)?
                .element_mut()
                .ok_or_else(|| TreeError::NotAnElement(parent.clone()))?;
            element.children.remove(index);
            let mut siblings = Vec::new();
            if index > 0 {
                siblings.extend(element.children.get(index - 1).cloned());
            }
            siblings.extend(element.children.get(index).cloned());
            siblings
        };
        self.write(key)?.parent = None;

        dirty.mark_node(key);
        dirty.mark_children(&parent);
        for sibling in siblings {
            dirty.mark_node(&sibling);
        }
        Ok(Some((parent, index)))
    }

    /// Remove a node and its whole subtree from the map
    pub fn remove(&mut self, key: &NodeKey, dirty: &mut DirtySet) -> TreeResult<Vec<NodeKey>> {
        if key.is_root() {
            return Err(TreeError::CannotRemoveRoot);
        }
        self.node(key)?;
        self.detach(key, dirty)?;

        let removed = self.descendants(key);
        for removed_key in &removed {
            self.nodes.remove(removed_key);
            dirty.mark_removed(removed_key);
        }
        Ok(removed)
    }

    /// Reparent `key` under `parent` at `index` (index in the list after removal)
    pub fn move_node(
        &mut self,
        key: &NodeKey,
        parent: &NodeKey,
        index: usize,
        dirty: &mut DirtySet,
    ) -> TreeResult<()> {
        self.children(parent)?;
        if key == parent || self.is_ancestor(key, parent) {
            return Err(TreeError::Cycle {
                key: key.clone(),
                parent: parent.clone(),
            });
        }

        let mut len = self.children(parent)?.len();
        if self.get(key).and_then(Node::parent) == Some(parent) {
            len -= 1;
        }
        if index > len {
            return Err(TreeError::out_of_bounds(parent, index, len));
        }
        self.check_siblings(parent, index, key)?;

        self.detach(key, dirty)?;
        self.insert_child(parent, index, key, dirty)
    }

    /// Put detached `replacement` where `key` is and drop `key`'s subtree.
    ///
    /// Compatibility is decided by the registry's `can_replace_with`
    /// capability of the replaced node's type. With `carry_children` the
    /// replaced element's children move over to the replacement first.
    pub fn replace(
        &mut self,
        registry: &NodeRegistry,
        key: &NodeKey,
        replacement: &NodeKey,
        carry_children: bool,
        dirty: &mut DirtySet,
    ) -> TreeResult<()> {
        if key.is_root() {
            return Err(TreeError::CannotRemoveRoot);
        }
        let old = self.node(key)?;
        let new = self.node(replacement)?;
        if let Some(parent) = new.parent() {
            return Err(TreeError::AlreadyAttached {
                key: replacement.clone(),
                parent: parent.clone(),
            });
        }
        if old.parent().is_none() {
            return Err(TreeError::Orphan(key.clone()));
        }
        if !registry.for_node(old)?.can_replace_with(old, new) {
            return Err(TreeError::IncompatibleReplacement {
                from: old.node_type().to_string(),
                to: new.node_type().to_string(),
            });
        }
        if carry_children && old.is_element() && !new.is_element() {
            return Err(TreeError::NotAnElement(replacement.clone()));
        }

        let (parent, index) = self.position(key)?;
        self.insert_child(&parent, index + 1, replacement, dirty)?;

        if carry_children {
            let children = self.children(key).map(<[NodeKey]>::to_vec).unwrap_or_default();
            for child in children {
                self.detach(&child, dirty)?;
                self.append(replacement, &child, dirty)?;
            }
        }

        self.remove(key, dirty)?;
        Ok(())
    }

    /// Split a text node at `offset`; the tail moves into a new sibling
    /// `new_key` carrying the same formatting. Returns the new key.
    pub fn split_text(
        &mut self,
        key: &NodeKey,
        offset: usize,
        new_key: NodeKey,
        dirty: &mut DirtySet,
    ) -> TreeResult<NodeKey> {
        let node = self.node(key)?;
        let text = node.as_text().ok_or_else(|| TreeError::NotText(key.clone()))?;
        let len = text.len();
        if offset > len {
            return Err(TreeError::OffsetOutOfBounds {
                key: key.clone(),
                offset,
                len,
            });
        }
        if node.parent().is_none() {
            return Err(TreeError::Orphan(key.clone()));
        }

        let byte = byte_offset(&text.text, offset);
        let mut tail_data = text.clone();
        tail_data.text = text.text[byte..].to_string();
        let head = text.text[..byte].to_string();

        let tail = Node::text(new_key.clone(), node.node_type(), "")
            .with_text_data(tail_data);
        let tail = Node {
            props: node.props.clone(),
            ..tail
        };

        self.insert_detached(tail)?;
        self.insert_after(key, &new_key, dirty)?;
        self.set_text(key, &head, dirty)?;
        Ok(new_key)
    }

    // Attributes

    pub fn mark_dirty(&mut self, key: &NodeKey, dirty: &mut DirtySet) -> TreeResult<()> {
        self.node(key)?;
        dirty.mark_node(key);
        Ok(())
    }

    pub fn set_text(&mut self, key: &NodeKey, text: &str, dirty: &mut DirtySet) -> TreeResult<()> {
        let current = self
            .node(key)?
            .as_text()
            .ok_or_else(|| TreeError::NotText(key.clone()))?;
        if current.text == text {
            return Ok(());
        }
        if let Some(data) = self.write(key)?.text_mut() {
            data.text = text.to_string();
        }
        dirty.mark_node(key);
        Ok(())
    }

    pub fn set_text_format(&mut self, key: &NodeKey, format: TextFormat, dirty: &mut DirtySet) -> TreeResult<()> {
        self.update_text(key, dirty, |data| data.format == format, |data| data.format = format)
    }

    pub fn set_style(&mut self, key: &NodeKey, style: &str, dirty: &mut DirtySet) -> TreeResult<()> {
        self.update_text(key, dirty, |data| data.style == style, |data| data.style = style.to_string())
    }

    pub fn set_mode(&mut self, key: &NodeKey, mode: TextMode, dirty: &mut DirtySet) -> TreeResult<()> {
        self.update_text(key, dirty, |data| data.mode == mode, |data| data.mode = mode)
    }

    pub fn set_detail(&mut self, key: &NodeKey, detail: TextDetail, dirty: &mut DirtySet) -> TreeResult<()> {
        self.update_text(key, dirty, |data| data.detail == detail, |data| data.detail = detail)
    }

    pub fn set_direction(
        &mut self,
        key: &NodeKey,
        direction: Option<Direction>,
        dirty: &mut DirtySet,
    ) -> TreeResult<()> {
        self.update_element(key, dirty, |data| data.direction == direction, |data| {
            data.direction = direction
        })
    }

    pub fn set_element_format(
        &mut self,
        key: &NodeKey,
        format: ElementFormat,
        dirty: &mut DirtySet,
    ) -> TreeResult<()> {
        self.update_element(key, dirty, |data| data.format == format, |data| data.format = format)
    }

    pub fn set_indent(&mut self, key: &NodeKey, indent: u32, dirty: &mut DirtySet) -> TreeResult<()> {
        self.update_element(key, dirty, |data| data.indent == indent, |data| data.indent = indent)
    }

    pub fn set_prop(
        &mut self,
        key: &NodeKey,
        name: &str,
        value: Value,
        dirty: &mut DirtySet,
    ) -> TreeResult<()> {
        if self.node(key)?.prop(name) == Some(&value) {
            return Ok(());
        }
        self.write(key)?.props.insert(name.to_string(), value);
        dirty.mark_node(key);
        Ok(())
    }

    pub fn remove_prop(&mut self, key: &NodeKey, name: &str, dirty: &mut DirtySet) -> TreeResult<()> {
        if self.node(key)?.prop(name).is_none() {
            return Ok(());
        }
        self.write(key)?.props.remove(name);
        dirty.mark_node(key);
        Ok(())
    }

    fn update_text(
        &mut self,
        key: &NodeKey,
        dirty: &mut DirtySet,
        unchanged: impl FnOnce(&TextData) -> bool,
        apply: impl FnOnce(&mut TextData),
    ) -> TreeResult<()> {
        let current = self
            .node(key)?
            .as_text()
            .ok_or_else(|| TreeError::NotText(key.clone()))?;
        if unchanged(current) {
            return Ok(());
        }
        if let Some(data) = self.write(key)?.text_mut() {
            apply(data);
        }
        dirty.mark_node(key);
        Ok(())
    }

    fn update_element(
        &mut self,
        key: &NodeKey,
        dirty: &mut DirtySet,
        unchanged: impl FnOnce(&ElementData) -> bool,
        apply: impl FnOnce(&mut ElementData),
    ) -> TreeResult<()> {
        let current = self
            .node(key)?
            .as_element()
            .ok_or_else(|| TreeError::NotAnElement(key.clone()))?;
        if unchanged(current) {
            return Ok(());
        }
        if let Some(data) = self.write(key)?.element_mut() {
            apply(data);
        }
        dirty.mark_node(key);
        Ok(())
    }

    // Invariants

    /// Check the links of one node: its parent lists it exactly once, its
    /// children point back at it, and its parent chain reaches the root.
    pub fn validate_node(&self, key: &NodeKey) -> TreeResult<()> {
        let node = self.node(key)?;
        match node.parent() {
            None if key.is_root() => {}
            None => return Err(TreeError::Orphan(key.clone())),
            Some(parent) => {
                let listed = self
                    .children(parent)
                    .map_err(|_| TreeError::broken_link(key, format!("parent {parent} is not an element")))?
                    .iter()
                    .filter(|child| *child == key)
                    .count();
                if listed != 1 {
                    return Err(TreeError::broken_link(
                        key,
                        format!("listed {listed} times by parent {parent}"),
                    ));
                }
                if !self.is_attached(key) {
                    return Err(TreeError::Orphan(key.clone()));
                }
            }
        }
        for child in node.children() {
            let child_node = self.node(child)?;
            if child_node.parent() != Some(key) {
                return Err(TreeError::broken_link(
                    child,
                    format!("listed by {key} but parent is {:?}", child_node.parent()),
                ));
            }
        }
        Ok(())
    }

    pub fn validate_keys<'a>(&self, keys: impl IntoIterator<Item = &'a NodeKey>) -> TreeResult<()> {
        for key in keys {
            if self.contains(key) {
                self.validate_node(key)?;
            }
        }
        Ok(())
    }

    /// Full invariant check: single root, consistent links, no orphans
    pub fn validate(&self) -> TreeResult<()> {
        let root = self
            .root()
            .ok_or_else(|| TreeError::NodeNotFound(NodeKey::root()))?;
        if root.parent().is_some() {
            return Err(TreeError::broken_link(root.key(), "root has a parent"));
        }
        for key in self.nodes.keys() {
            self.validate_node(key)?;
        }
        let reachable = self.document_order();
        if reachable.len() != self.nodes.len() {
            let reachable: HashSet<_> = reachable.into_iter().collect();
            if let Some(orphan) = self.nodes.keys().find(|key| !reachable.contains(*key)) {
                return Err(TreeError::Orphan(orphan.clone()));
            }
        }
        Ok(())
    }

    /// Drop detached nodes among `candidates` together with their subtrees.
    /// Returns the purged keys.
    ///
    /// Only nodes absent from `committed` may be collected this way. An
    /// existing node left hanging under a never-attached one is an orphan,
    /// and the map is left untouched.
    pub fn purge_detached<'a>(
        &mut self,
        candidates: impl IntoIterator<Item = &'a NodeKey>,
        committed: &NodeMap,
    ) -> TreeResult<Vec<NodeKey>> {
        let mut doomed: Vec<NodeKey> = Vec::new();
        let mut seen = HashSet::new();
        for key in candidates {
            if key.is_root() || !self.contains(key) || self.is_attached(key) {
                continue;
            }
            let top = self
                .ancestors(key)
                .last()
                .cloned()
                .unwrap_or_else(|| key.clone());
            for descendant in self.descendants(&top) {
                if committed.contains(&descendant) {
                    return Err(TreeError::Orphan(descendant));
                }
                if seen.insert(descendant.clone()) {
                    doomed.push(descendant);
                }
            }
        }
        for key in &doomed {
            self.nodes.remove(key);
        }
        Ok(doomed)
    }
}

fn neighbours(children: &[NodeKey], index: usize) -> Vec<NodeKey> {
    let mut siblings = Vec::new();
    if index > 0 {
        siblings.extend(children.get(index - 1).cloned());
    }
    siblings.extend(children.get(index + 1).cloned());
    siblings
}

/// Byte index of the `offset`-th character
pub fn byte_offset(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{PARAGRAPH, TEXT};

    fn key(name: &str) -> NodeKey {
        NodeKey::new(name)
    }

    fn paragraph_with_text(map: &mut NodeMap, dirty: &mut DirtySet, p: &str, t: &str, text: &str) {
        map.insert_detached(Node::element(key(p), PARAGRAPH)).unwrap();
        map.insert_detached(Node::text(key(t), TEXT, text)).unwrap();
        map.append(&key(p), &key(t), dirty).unwrap();
        map.append(&NodeKey::root(), &key(p), dirty).unwrap();
    }

    #[test]
    fn test_append_and_query() {
        let mut map = NodeMap::with_root();
        let mut dirty = DirtySet::new();
        paragraph_with_text(&mut map, &mut dirty, "p1", "t1", "Hello");

        assert_eq!(map.children(&NodeKey::root()).unwrap(), &[key("p1")]);
        assert_eq!(map.path(&key("t1")), Some(vec![0, 0]));
        assert_eq!(map.text_content(&NodeKey::root()), "Hello");
        assert!(dirty.elements().contains(&NodeKey::root()));
        map.validate().unwrap();
    }

    #[test]
    fn test_attached_node_cannot_be_inserted_twice() {
        let mut map = NodeMap::with_root();
        let mut dirty = DirtySet::new();
        paragraph_with_text(&mut map, &mut dirty, "p1", "t1", "a");
        map.insert_detached(Node::element(key("p2"), PARAGRAPH)).unwrap();
        map.append(&NodeKey::root(), &key("p2"), &mut dirty).unwrap();

        let err = map.append(&key("p2"), &key("t1"), &mut dirty).unwrap_err();
        assert_eq!(
            err,
            TreeError::AlreadyAttached {
                key: key("t1"),
                parent: key("p1")
            }
        );
        map.validate().unwrap();
    }

    #[test]
    fn test_move_into_own_descendant_is_a_cycle() {
        let mut map = NodeMap::with_root();
        let mut dirty = DirtySet::new();
        map.insert_detached(Node::element(key("outer"), PARAGRAPH)).unwrap();
        map.insert_detached(Node::element(key("inner"), PARAGRAPH)).unwrap();
        map.append(&NodeKey::root(), &key("outer"), &mut dirty).unwrap();
        map.append(&key("outer"), &key("inner"), &mut dirty).unwrap();

        let before = map.clone();
        let err = map.move_node(&key("outer"), &key("inner"), 0, &mut dirty).unwrap_err();
        assert!(matches!(err, TreeError::Cycle { .. }));
        assert_eq!(map, before);
    }

    #[test]
    fn test_remove_cascades() {
        let mut map = NodeMap::with_root();
        let mut dirty = DirtySet::new();
        paragraph_with_text(&mut map, &mut dirty, "p1", "t1", "a");

        let removed = map.remove(&key("p1"), &mut dirty).unwrap();
        assert_eq!(removed, vec![key("p1"), key("t1")]);
        assert!(!map.contains(&key("t1")));
        assert!(dirty.removed().contains(&key("t1")));
        assert_eq!(map.remove(&NodeKey::root(), &mut dirty), Err(TreeError::CannotRemoveRoot));
        map.validate().unwrap();
    }

    #[test]
    fn test_clone_shares_untouched_records() {
        let mut map = NodeMap::with_root();
        let mut dirty = DirtySet::new();
        paragraph_with_text(&mut map, &mut dirty, "p1", "t1", "a");
        paragraph_with_text(&mut map, &mut dirty, "p2", "t2", "b");

        let mut next = map.clone();
        next.set_text(&key("t1"), "changed", &mut DirtySet::new()).unwrap();

        assert!(!next.shares_record(&map, &key("t1")));
        assert!(next.shares_record(&map, &key("t2")));
        assert!(next.shares_record(&map, &key("p1")));
        assert_eq!(map.get(&key("t1")).unwrap().text_content(), Some("a"));
    }

    #[test]
    fn test_setting_same_value_does_not_dirty() {
        let mut map = NodeMap::with_root();
        let mut setup = DirtySet::new();
        paragraph_with_text(&mut map, &mut setup, "p1", "t1", "same");

        let mut dirty = DirtySet::new();
        map.set_text(&key("t1"), "same", &mut dirty).unwrap();
        map.set_indent(&key("p1"), 0, &mut dirty).unwrap();
        assert!(dirty.is_empty());
    }

    #[test]
    fn test_split_text_keeps_formatting() {
        let mut map = NodeMap::with_root();
        let mut dirty = DirtySet::new();
        paragraph_with_text(&mut map, &mut dirty, "p1", "t1", "Hello");
        map.set_text_format(&key("t1"), TextFormat::BOLD, &mut dirty).unwrap();

        map.split_text(&key("t1"), 3, key("t2"), &mut dirty).unwrap();
        assert_eq!(map.get(&key("t1")).unwrap().text_content(), Some("Hel"));
        let tail = map.get(&key("t2")).unwrap();
        assert_eq!(tail.text_content(), Some("lo"));
        assert_eq!(tail.as_text().unwrap().format, TextFormat::BOLD);
        assert_eq!(map.children(&key("p1")).unwrap(), &[key("t1"), key("t2")]);
    }

    #[test]
    fn test_purge_detached() {
        let mut map = NodeMap::with_root();
        map.insert_detached(Node::element(key("loose"), PARAGRAPH)).unwrap();
        map.insert_detached(Node::text(key("loose-text"), TEXT, "x")).unwrap();
        map.append(&key("loose"), &key("loose-text"), &mut DirtySet::new()).unwrap();

        let purged = map.purge_detached([&key("loose-text")], &NodeMap::with_root()).unwrap();
        assert_eq!(purged.len(), 2);
        assert_eq!(map.len(), 1);
        map.validate().unwrap();
    }

    #[test]
    fn test_purge_refuses_committed_nodes() {
        let mut committed = NodeMap::with_root();
        let mut dirty = DirtySet::new();
        paragraph_with_text(&mut committed, &mut dirty, "p1", "t1", "kept");

        let mut map = committed.clone();
        map.insert_detached(Node::element(key("loose"), PARAGRAPH)).unwrap();
        map.move_node(&key("p1"), &key("loose"), 0, &mut dirty).unwrap();

        let before = map.clone();
        let err = map.purge_detached([&key("loose")], &committed).unwrap_err();
        assert_eq!(err, TreeError::Orphan(key("p1")));
        assert_eq!(map, before);
    }

    #[derive(Debug)]
    struct Tail;

    impl crate::registry::NodeType for Tail {
        fn tag(&self) -> &'static str {
            "tail"
        }

        fn kind(&self) -> crate::node::NodeKind {
            crate::node::NodeKind::Element
        }

        fn view_tag(&self, _node: &Node) -> String {
            "footer".to_string()
        }

        fn can_insert_after(&self, _node: &Node, _sibling: &Node) -> bool {
            false
        }
    }

    #[test]
    fn test_sibling_check_needs_a_registry() {
        let mut registry = NodeRegistry::with_builtins();
        registry.register(Tail).unwrap();
        let mut map = NodeMap::with_root();
        let mut dirty = DirtySet::new();
        map.insert_detached(Node::element(key("end"), "tail")).unwrap();
        map.append(&NodeKey::root(), &key("end"), &mut dirty).unwrap();
        map.insert_detached(Node::element(key("p1"), PARAGRAPH)).unwrap();

        let mut checked = map.clone();
        checked.install_registry(&registry);
        let before = checked.clone();
        let err = checked.append(&NodeKey::root(), &key("p1"), &mut dirty).unwrap_err();
        assert_eq!(
            err,
            TreeError::IncompatibleSibling {
                node: "tail".to_string(),
                sibling: PARAGRAPH.to_string(),
            }
        );
        assert_eq!(checked, before);
        checked.insert_before(&key("end"), &key("p1"), &mut dirty).unwrap();

        map.append(&NodeKey::root(), &key("p1"), &mut dirty).unwrap();
    }
}
