//! Built-in node types

use crate::node::{Node, NodeKind};
use crate::registry::{base_view_attrs, NodeType, ViewAttrs};
use std::sync::Arc;

pub const ROOT: &str = "root";
pub const PARAGRAPH: &str = "paragraph";
pub const HEADING: &str = "heading";
pub const QUOTE: &str = "quote";
pub const TEXT: &str = "text";
pub const LINEBREAK: &str = "linebreak";

pub(crate) fn builtin_types() -> Vec<Arc<dyn NodeType>> {
    vec![
        Arc::new(RootNode),
        Arc::new(ParagraphNode),
        Arc::new(HeadingNode),
        Arc::new(QuoteNode),
        Arc::new(TextNode),
        Arc::new(LineBreakNode),
    ]
}

#[derive(Debug)]
pub struct RootNode;

impl NodeType for RootNode {
    fn tag(&self) -> &'static str {
        ROOT
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn view_tag(&self, _node: &Node) -> String {
        "div".to_string()
    }

    fn can_replace_with(&self, _node: &Node, _replacement: &Node) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct ParagraphNode;

impl NodeType for ParagraphNode {
    fn tag(&self) -> &'static str {
        PARAGRAPH
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn view_tag(&self, _node: &Node) -> String {
        "p".to_string()
    }

    fn new_block_after(&self) -> Option<&'static str> {
        Some(PARAGRAPH)
    }
}

/// Heading block; the level lives in the `tag` prop (h1..h6)
#[derive(Debug)]
pub struct HeadingNode;

impl NodeType for HeadingNode {
    fn tag(&self) -> &'static str {
        HEADING
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn construct(&self, key: crate::NodeKey) -> Node {
        Node::element(key, HEADING).with_prop("tag", "h1")
    }

    fn view_tag(&self, node: &Node) -> String {
        match node.prop_str("tag") {
            Some(tag @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6")) => tag.to_string(),
            _ => "h1".to_string(),
        }
    }

    fn new_block_after(&self) -> Option<&'static str> {
        Some(PARAGRAPH)
    }
}

#[derive(Debug)]
pub struct QuoteNode;

impl NodeType for QuoteNode {
    fn tag(&self) -> &'static str {
        QUOTE
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn view_tag(&self, _node: &Node) -> String {
        "blockquote".to_string()
    }

    fn new_block_after(&self) -> Option<&'static str> {
        Some(PARAGRAPH)
    }
}

#[derive(Debug)]
pub struct TextNode;

impl NodeType for TextNode {
    fn tag(&self) -> &'static str {
        TEXT
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Text
    }

    fn view_tag(&self, _node: &Node) -> String {
        "span".to_string()
    }

    fn view_attrs(&self, node: &Node) -> ViewAttrs {
        base_view_attrs(node)
    }

    /// Adjacent simple text with identical formatting and style folds together
    fn can_merge_with(&self, node: &Node, other: &Node) -> bool {
        match (node.as_text(), other.as_text()) {
            (Some(a), Some(b)) => {
                node.node_type() == other.node_type()
                    && a.is_simple()
                    && b.is_simple()
                    && a.format == b.format
                    && a.style == b.style
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct LineBreakNode;

impl NodeType for LineBreakNode {
    fn tag(&self) -> &'static str {
        LINEBREAK
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Leaf
    }

    fn view_tag(&self, _node: &Node) -> String {
        "br".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TextFormat;
    use crate::node::TextData;
    use crate::NodeKey;

    #[test]
    fn test_text_merge_requires_matching_format() {
        let plain = Node::text(NodeKey::new("a"), TEXT, "ab");
        let other = Node::text(NodeKey::new("b"), TEXT, "cd");
        let bold = Node::text(NodeKey::new("c"), TEXT, "ef").with_text_data(TextData {
            text: "ef".to_string(),
            format: TextFormat::BOLD,
            ..Default::default()
        });

        assert!(TextNode.can_merge_with(&plain, &other));
        assert!(!TextNode.can_merge_with(&plain, &bold));
    }

    #[test]
    fn test_heading_view_tag_from_prop() {
        let node = HeadingNode.construct(NodeKey::new("h")).with_prop("tag", "h3");
        assert_eq!(HeadingNode.view_tag(&node), "h3");

        let bogus = Node::element(NodeKey::new("h"), HEADING).with_prop("tag", "script");
        assert_eq!(HeadingNode.view_tag(&bogus), "h1");
    }
}
