//! In-memory view mirror and the host seam that receives patches

use crate::patch::ViewPatch;
use crate::selection::ResolvedSelection;
use folio_model::{NodeKey, NodeMap, NodeRegistry, TreeResult, ViewAttrs};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("View node not found: {0}")]
    NotFound(NodeKey),

    #[error("View node {0} already exists")]
    AlreadyExists(NodeKey),

    #[error("View already has a root")]
    RootExists,

    #[error("Index {index} out of bounds for view node {parent} with {len} children")]
    IndexOutOfBounds {
        parent: NodeKey,
        index: usize,
        len: usize,
    },

    #[error("Moving {key} under {parent} would create a cycle")]
    Cycle { key: NodeKey, parent: NodeKey },

    #[error("View root {0} cannot be moved")]
    MoveRoot(NodeKey),
}

/// Receives the output of every flush
pub trait ViewHost {
    fn apply_patches(&mut self, patches: &[ViewPatch]) -> Result<(), ViewError>;

    fn set_selection(&mut self, _selection: Option<&ResolvedSelection>) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewNode {
    pub tag: String,
    pub attrs: ViewAttrs,
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
}

/// Key-addressed mirror of the rendered view.
///
/// Applying the patches of `reconcile(prev, next)` to a mirror of `prev`
/// yields a mirror equal to one built directly from `next`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewTree {
    nodes: HashMap<NodeKey, ViewNode>,
    root: Option<NodeKey>,
    selection: Option<ResolvedSelection>,
}

impl ViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the mirror of a node map straight from the registry
    pub fn from_map(map: &NodeMap, registry: &NodeRegistry) -> TreeResult<Self> {
        let mut tree = ViewTree::new();
        for key in map.document_order() {
            let node = map.node(&key)?;
            tree.nodes.insert(
                key.clone(),
                ViewNode {
                    tag: registry.view_tag(node)?,
                    attrs: registry.view_attrs(node)?,
                    parent: node.parent().cloned(),
                    children: node.children().to_vec(),
                },
            );
            if node.parent().is_none() {
                tree.root = Some(key);
            }
        }
        Ok(tree)
    }

    pub fn root(&self) -> Option<&NodeKey> {
        self.root.as_ref()
    }

    pub fn get(&self, key: &NodeKey) -> Option<&ViewNode> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn selection(&self) -> Option<&ResolvedSelection> {
        self.selection.as_ref()
    }

    /// Structural equality ignoring the mirrored selection
    pub fn same_structure(&self, other: &ViewTree) -> bool {
        self.root == other.root && self.nodes == other.nodes
    }

    pub fn apply_all(&mut self, patches: &[ViewPatch]) -> Result<(), ViewError> {
        for patch in patches {
            self.apply(patch)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, patch: &ViewPatch) -> Result<(), ViewError> {
        match patch {
            ViewPatch::Create {
                key,
                tag,
                attrs,
                parent,
                index,
            } => {
                if self.nodes.contains_key(key) {
                    return Err(ViewError::AlreadyExists(key.clone()));
                }
                match parent {
                    Some(parent) => self.insert_child(parent, *index, key)?,
                    None if self.root.is_some() => return Err(ViewError::RootExists),
                    None => self.root = Some(key.clone()),
                }
                self.nodes.insert(
                    key.clone(),
                    ViewNode {
                        tag: tag.clone(),
                        attrs: attrs.clone(),
                        parent: parent.clone(),
                        children: Vec::new(),
                    },
                );
            }
            ViewPatch::Update { key, delta } => {
                let node = self
                    .nodes
                    .get_mut(key)
                    .ok_or_else(|| ViewError::NotFound(key.clone()))?;
                for (name, value) in delta {
                    match value {
                        Some(value) => node.attrs.insert(name.clone(), value.clone()),
                        None => node.attrs.remove(name),
                    };
                }
            }
            ViewPatch::Move { key, parent, index } => {
                if !self.nodes.contains_key(key) {
                    return Err(ViewError::NotFound(key.clone()));
                }
                if self.root.as_ref() == Some(key) {
                    return Err(ViewError::MoveRoot(key.clone()));
                }
                if key == parent || self.is_ancestor(key, parent) {
                    return Err(ViewError::Cycle {
                        key: key.clone(),
                        parent: parent.clone(),
                    });
                }
                let len = self.child_count_without(parent, key)?;
                if *index > len {
                    return Err(ViewError::IndexOutOfBounds {
                        parent: parent.clone(),
                        index: *index,
                        len,
                    });
                }
                self.detach(key);
                self.insert_child(parent, *index, key)?;
                if let Some(node) = self.nodes.get_mut(key) {
                    node.parent = Some(parent.clone());
                }
            }
            ViewPatch::Remove { key } => {
                if !self.nodes.contains_key(key) {
                    return Err(ViewError::NotFound(key.clone()));
                }
                self.detach(key);
                let mut stack = vec![key.clone()];
                while let Some(current) = stack.pop() {
                    if let Some(node) = self.nodes.remove(&current) {
                        stack.extend(node.children);
                    }
                }
                if self.root.as_ref() == Some(key) {
                    self.root = None;
                }
            }
        }
        Ok(())
    }

    fn child_count_without(&self, parent: &NodeKey, key: &NodeKey) -> Result<usize, ViewError> {
        let node = self
            .nodes
            .get(parent)
            .ok_or_else(|| ViewError::NotFound(parent.clone()))?;
        Ok(node.children.iter().filter(|child| *child != key).count())
    }

    fn insert_child(&mut self, parent: &NodeKey, index: usize, key: &NodeKey) -> Result<(), ViewError> {
        let node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| ViewError::NotFound(parent.clone()))?;
        if index > node.children.len() {
            return Err(ViewError::IndexOutOfBounds {
                parent: parent.clone(),
                index,
                len: node.children.len(),
            });
        }
        node.children.insert(index, key.clone());
        Ok(())
    }

    fn detach(&mut self, key: &NodeKey) {
        let parent = self.nodes.get(key).and_then(|node| node.parent.clone());
        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.retain(|child| child != key);
            }
        }
    }

    fn is_ancestor(&self, ancestor: &NodeKey, key: &NodeKey) -> bool {
        let mut current = self.nodes.get(key).and_then(|node| node.parent.as_ref());
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                break;
            }
            current = self.nodes.get(parent).and_then(|node| node.parent.as_ref());
        }
        false
    }

    /// Markup-like rendering, one node per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(root) = &self.root {
            self.render_node(root, 0, &mut out);
        }
        out
    }

    fn render_node(&self, key: &NodeKey, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{indent}<{} key=\"{key}\"", node.tag);
        for (name, value) in node.attrs.iter().filter(|(name, _)| *name != "text") {
            let _ = write!(out, " {name}=\"{value}\"");
        }
        match node.attrs.get("text") {
            Some(text) => {
                let _ = writeln!(out, ">{text}</{}>", node.tag);
            }
            None if node.children.is_empty() => {
                let _ = writeln!(out, " />");
            }
            None => {
                let _ = writeln!(out, ">");
                for child in &node.children {
                    self.render_node(child, depth + 1, out);
                }
                let _ = writeln!(out, "{indent}</{}>", node.tag);
            }
        }
    }
}

impl ViewHost for ViewTree {
    fn apply_patches(&mut self, patches: &[ViewPatch]) -> Result<(), ViewError> {
        self.apply_all(patches)
    }

    fn set_selection(&mut self, selection: Option<&ResolvedSelection>) {
        self.selection = selection.cloned();
    }
}

/// Shared host, so a caller can keep a handle to a view it attached
impl<H: ViewHost> ViewHost for Rc<RefCell<H>> {
    fn apply_patches(&mut self, patches: &[ViewPatch]) -> Result<(), ViewError> {
        self.borrow_mut().apply_patches(patches)
    }

    fn set_selection(&mut self, selection: Option<&ResolvedSelection>) {
        self.borrow_mut().set_selection(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn create(key: &str, parent: Option<&str>, index: usize) -> ViewPatch {
        ViewPatch::Create {
            key: NodeKey::new(key),
            tag: "p".to_string(),
            attrs: BTreeMap::new(),
            parent: parent.map(NodeKey::new),
            index,
        }
    }

    #[test]
    fn test_patches_build_and_reshape() {
        let mut view = ViewTree::new();
        view.apply_all(&[
            create("root", None, 0),
            create("a", Some("root"), 0),
            create("b", Some("root"), 1),
            ViewPatch::Move {
                key: NodeKey::new("b"),
                parent: NodeKey::root(),
                index: 0,
            },
        ])
        .unwrap();

        assert_eq!(
            view.get(&NodeKey::root()).unwrap().children,
            vec![NodeKey::new("b"), NodeKey::new("a")]
        );
    }

    #[test]
    fn test_move_into_descendant_rejected() {
        let mut view = ViewTree::new();
        view.apply_all(&[create("root", None, 0), create("a", Some("root"), 0), create("b", Some("a"), 0)])
            .unwrap();
        let result = view.apply(&ViewPatch::Move {
            key: NodeKey::new("a"),
            parent: NodeKey::new("b"),
            index: 0,
        });
        assert!(matches!(result, Err(ViewError::Cycle { .. })));
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut view = ViewTree::new();
        view.apply_all(&[
            create("root", None, 0),
            create("a", Some("root"), 0),
            create("b", Some("a"), 0),
            ViewPatch::Remove { key: NodeKey::new("a") },
        ])
        .unwrap();
        assert_eq!(view.len(), 1);
        assert!(view.get(&NodeKey::root()).unwrap().children.is_empty());
    }
}
