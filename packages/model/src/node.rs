//! # Node Records
//!
//! A node is a small record addressed by key. Tree topology is expressed only
//! through the `parent` key and, for elements, the ordered child key list.
//! Nodes never hold references to other nodes.

use crate::format::{Direction, ElementFormat, TextDetail, TextFormat, TextMode};
use crate::key::NodeKey;
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Type-specific properties (list type, heading tag, item value, ...)
pub type Props = BTreeMap<String, Value>;

/// Broad shape of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Container with ordered children
    Element,
    /// Leaf carrying text content and formatting
    Text,
    /// Leaf with no content (line breaks, decorators)
    Leaf,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementData {
    pub(crate) children: Vec<NodeKey>,
    pub direction: Option<Direction>,
    pub format: ElementFormat,
    pub indent: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextData {
    pub text: String,
    pub format: TextFormat,
    pub style: String,
    pub mode: TextMode,
    pub detail: TextDetail,
}

impl TextData {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Length in characters, the unit of text point offsets
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Plain mergeable text: normal mode and not flagged unmergeable
    pub fn is_simple(&self) -> bool {
        self.mode == TextMode::Normal && !self.detail.contains(TextDetail::UNMERGEABLE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeBody {
    Element(ElementData),
    Text(TextData),
    Leaf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) key: NodeKey,
    pub(crate) node_type: SmolStr,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) body: NodeBody,
    pub(crate) props: Props,
}

impl Node {
    pub fn element(key: NodeKey, node_type: &str) -> Self {
        Self::with_body(key, node_type, NodeBody::Element(ElementData::default()))
    }

    pub fn text(key: NodeKey, node_type: &str, text: impl Into<String>) -> Self {
        Self::with_body(key, node_type, NodeBody::Text(TextData::new(text)))
    }

    pub fn leaf(key: NodeKey, node_type: &str) -> Self {
        Self::with_body(key, node_type, NodeBody::Leaf)
    }

    fn with_body(key: NodeKey, node_type: &str, body: NodeBody) -> Self {
        Self {
            key,
            node_type: SmolStr::new(node_type),
            parent: None,
            body,
            props: Props::new(),
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn with_text_data(mut self, data: TextData) -> Self {
        if let NodeBody::Text(text) = &mut self.body {
            *text = data;
        }
        self
    }

    /// Set element attributes; children are never taken from the argument
    pub fn with_element_data(mut self, data: ElementData) -> Self {
        if let NodeBody::Element(element) = &mut self.body {
            element.direction = data.direction;
            element.format = data.format;
            element.indent = data.indent;
        }
        self
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn parent(&self) -> Option<&NodeKey> {
        self.parent.as_ref()
    }

    pub fn is_attached_to(&self, parent: &NodeKey) -> bool {
        self.parent.as_ref() == Some(parent)
    }

    pub fn kind(&self) -> NodeKind {
        match self.body {
            NodeBody::Element(_) => NodeKind::Element,
            NodeBody::Text(_) => NodeKind::Text,
            NodeBody::Leaf => NodeKind::Leaf,
        }
    }

    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    pub fn is_element(&self) -> bool {
        matches!(self.body, NodeBody::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.body, NodeBody::Text(_))
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.body {
            NodeBody::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextData> {
        match &self.body {
            NodeBody::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Child keys; empty for non-element nodes
    pub fn children(&self) -> &[NodeKey] {
        match &self.body {
            NodeBody::Element(element) => &element.children,
            _ => &[],
        }
    }

    pub fn text_content(&self) -> Option<&str> {
        self.as_text().map(|text| text.text.as_str())
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }

    pub fn prop_str(&self, name: &str) -> Option<&str> {
        self.props.get(name).and_then(Value::as_str)
    }

    pub fn prop_u64(&self, name: &str) -> Option<u64> {
        self.props.get(name).and_then(Value::as_u64)
    }

    /// Offset range for points inside this node
    pub fn max_offset(&self) -> usize {
        match &self.body {
            NodeBody::Element(element) => element.children.len(),
            NodeBody::Text(text) => text.len(),
            NodeBody::Leaf => 0,
        }
    }

    /// Attribute equality ignoring topology (parent and children)
    pub fn same_attributes(&self, other: &Node) -> bool {
        if self.node_type != other.node_type || self.props != other.props {
            return false;
        }
        match (&self.body, &other.body) {
            (NodeBody::Element(a), NodeBody::Element(b)) => {
                a.direction == b.direction && a.format == b.format && a.indent == b.indent
            }
            (NodeBody::Text(a), NodeBody::Text(b)) => a == b,
            (NodeBody::Leaf, NodeBody::Leaf) => true,
            _ => false,
        }
    }

    pub(crate) fn element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.body {
            NodeBody::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn text_mut(&mut self) -> Option<&mut TextData> {
        match &mut self.body {
            NodeBody::Text(text) => Some(text),
            _ => None,
        }
    }
}
