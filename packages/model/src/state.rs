//! Immutable document snapshot

use crate::error::{DeserializeError, SerializeError};
use crate::key::NodeKey;
use crate::node_map::NodeMap;
use crate::registry::NodeRegistry;
use crate::selection::Selection;
use crate::serialize::{deserialize_state, serialize_state};

/// A committed document: the node map plus the selection.
///
/// Committed states are shared behind `Arc` and never mutated; a write
/// transaction clones the map (sharing records) and edits the clone.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    nodes: NodeMap,
    selection: Option<Selection>,
}

impl EditorState {
    pub fn new(nodes: NodeMap, selection: Option<Selection>) -> Self {
        Self { nodes, selection }
    }

    /// State holding only an empty root and no selection
    pub fn empty() -> Self {
        Self::new(NodeMap::with_root(), None)
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn into_parts(self) -> (NodeMap, Option<Selection>) {
        (self.nodes, self.selection)
    }

    /// True when the root has no children
    pub fn is_empty(&self) -> bool {
        self.nodes
            .children(&NodeKey::root())
            .map(<[NodeKey]>::is_empty)
            .unwrap_or(true)
    }

    /// Plain text of the document, blocks separated by a blank line
    pub fn text_content(&self) -> String {
        self.nodes
            .children(&NodeKey::root())
            .unwrap_or_default()
            .iter()
            .map(|block| self.nodes.text_content(block))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn from_json(json: &str, registry: &NodeRegistry) -> Result<Self, DeserializeError> {
        deserialize_state(json, registry)
    }

    pub fn to_json(&self, registry: &NodeRegistry) -> Result<String, SerializeError> {
        serialize_state(self, registry)
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::empty()
    }
}
