//! # Node Registry
//!
//! Maps a type tag to the behaviour of that node type. Core algorithms only
//! ever ask the registry about a node (how to build its view, whether it can
//! merge or be replaced) and never switch on type names, so new node types
//! plug in without core changes.

use crate::error::{DeserializeError, RegistryError, TreeError, TreeResult};
use crate::key::NodeKey;
use crate::node::{Node, NodeBody, NodeKind};
use crate::nodes;
use crate::serialize::SerializedNode;
use smol_str::SmolStr;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Attributes of the view-layer element built for a node
pub type ViewAttrs = BTreeMap<String, String>;

/// Behaviour table for one node type
pub trait NodeType: Send + Sync + fmt::Debug {
    /// Type tag stored in every node record of this type
    fn tag(&self) -> &'static str;

    fn kind(&self) -> NodeKind;

    /// Build a fresh, detached node of this type
    fn construct(&self, key: NodeKey) -> Node {
        match self.kind() {
            NodeKind::Element => Node::element(key, self.tag()),
            NodeKind::Text => Node::text(key, self.tag(), ""),
            NodeKind::Leaf => Node::leaf(key, self.tag()),
        }
    }

    fn clone_node(&self, node: &Node) -> Node {
        node.clone()
    }

    fn export(&self, node: &Node) -> SerializedNode {
        SerializedNode::from_node(node)
    }

    /// Build a detached node from a persisted record (children are attached later)
    fn import(&self, key: NodeKey, record: &SerializedNode) -> Result<Node, DeserializeError> {
        record.to_node(key, self.tag(), self.kind())
    }

    /// View element name for the node (the DOM-equivalent construct)
    fn view_tag(&self, node: &Node) -> String;

    fn view_attrs(&self, node: &Node) -> ViewAttrs {
        base_view_attrs(node)
    }

    fn is_inline(&self) -> bool {
        self.kind() != NodeKind::Element
    }

    /// Whether an element of this type may be left without children
    fn can_be_empty(&self) -> bool {
        true
    }

    /// Whether `other` may be folded into `node`
    fn can_merge_with(&self, _node: &Node, _other: &Node) -> bool {
        false
    }

    fn can_replace_with(&self, _node: &Node, _replacement: &Node) -> bool {
        true
    }

    fn can_insert_after(&self, _node: &Node, _sibling: &Node) -> bool {
        true
    }

    /// Type created when a block of this type is split
    fn new_block_after(&self) -> Option<&'static str> {
        None
    }
}

/// Attributes common to every node of a given kind
pub fn base_view_attrs(node: &Node) -> ViewAttrs {
    let mut attrs = ViewAttrs::new();
    match node.body() {
        NodeBody::Element(element) => {
            if let Some(direction) = element.direction {
                attrs.insert("dir".to_string(), direction.as_str().to_string());
            }
            if !element.format.as_str().is_empty() {
                attrs.insert("align".to_string(), element.format.as_str().to_string());
            }
            if element.indent > 0 {
                attrs.insert("indent".to_string(), element.indent.to_string());
            }
        }
        NodeBody::Text(text) => {
            attrs.insert("text".to_string(), text.text.clone());
            if !text.format.is_empty() {
                attrs.insert("format".to_string(), text.format.bits().to_string());
            }
            if !text.style.is_empty() {
                attrs.insert("style".to_string(), text.style.clone());
            }
            if text.mode != crate::format::TextMode::Normal {
                attrs.insert("mode".to_string(), text.mode.as_str().to_string());
            }
        }
        NodeBody::Leaf => {}
    }
    attrs
}

#[derive(Clone, Default)]
pub struct NodeRegistry {
    types: HashMap<SmolStr, Arc<dyn NodeType>>,
}

impl NodeRegistry {
    /// Empty registry; most callers want [`NodeRegistry::with_builtins`]
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registry holding root, paragraph, heading, quote, text and linebreak
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for node_type in nodes::builtin_types() {
            registry.types.insert(SmolStr::new(node_type.tag()), node_type);
        }
        registry
    }

    pub fn register<T: NodeType + 'static>(&mut self, node_type: T) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(node_type))
    }

    pub fn register_arc(&mut self, node_type: Arc<dyn NodeType>) -> Result<(), RegistryError> {
        let tag = SmolStr::new(node_type.tag());
        if self.types.contains_key(&tag) {
            return Err(RegistryError::DuplicateType(tag.to_string()));
        }
        tracing::debug!(tag = %tag, "Registering node type");
        self.types.insert(tag, node_type);
        Ok(())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.types.contains_key(tag)
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<dyn NodeType>> {
        self.types.get(tag)
    }

    pub fn resolve(&self, tag: &str) -> TreeResult<&dyn NodeType> {
        self.types
            .get(tag)
            .map(|node_type| node_type.as_ref())
            .ok_or_else(|| TreeError::UnknownNodeType(tag.to_string()))
    }

    pub fn for_node(&self, node: &Node) -> TreeResult<&dyn NodeType> {
        self.resolve(node.node_type())
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.types.keys().map(SmolStr::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn construct(&self, tag: &str, key: NodeKey) -> TreeResult<Node> {
        Ok(self.resolve(tag)?.construct(key))
    }

    pub fn can_merge(&self, node: &Node, other: &Node) -> bool {
        self.for_node(node)
            .map(|node_type| node_type.can_merge_with(node, other))
            .unwrap_or(false)
    }

    pub fn view_tag(&self, node: &Node) -> TreeResult<String> {
        Ok(self.for_node(node)?.view_tag(node))
    }

    pub fn view_attrs(&self, node: &Node) -> TreeResult<ViewAttrs> {
        Ok(self.for_node(node)?.view_attrs(node))
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.tags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CalloutNode;

    impl NodeType for CalloutNode {
        fn tag(&self) -> &'static str {
            "callout"
        }

        fn kind(&self) -> NodeKind {
            NodeKind::Element
        }

        fn view_tag(&self, _node: &Node) -> String {
            "aside".to_string()
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = NodeRegistry::with_builtins();
        for tag in ["root", "paragraph", "heading", "quote", "text", "linebreak"] {
            assert!(registry.contains(tag), "missing {tag}");
        }
    }

    #[test]
    fn test_custom_type_registration() {
        let mut registry = NodeRegistry::with_builtins();
        registry.register(CalloutNode).unwrap();

        let node = registry.construct("callout", NodeKey::new("c1")).unwrap();
        assert!(node.is_element());
        assert_eq!(registry.view_tag(&node).unwrap(), "aside");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = NodeRegistry::new();
        registry.register(CalloutNode).unwrap();
        assert_eq!(
            registry.register(CalloutNode),
            Err(RegistryError::DuplicateType("callout".to_string()))
        );
    }

    #[test]
    fn test_unknown_type() {
        let registry = NodeRegistry::with_builtins();
        assert!(matches!(
            registry.construct("table", NodeKey::new("t")),
            Err(TreeError::UnknownNodeType(_))
        ));
    }
}
