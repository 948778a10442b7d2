//! # Persisted Form
//!
//! A state serializes to a flat map of records keyed by node key plus an
//! optional selection:
//!
//! ```json
//! {
//!   "nodes": {
//!     "root": { "type": "root", "parent": null, "children": ["1"] },
//!     "1": { "type": "paragraph", "parent": "root", "children": ["2"] },
//!     "2": { "type": "text", "parent": "1", "text": "Hello", "format": 1 }
//!   },
//!   "selection": {
//!     "anchor": { "key": "2", "offset": 5, "kind": "text" },
//!     "focus": { "key": "2", "offset": 5, "kind": "text" }
//!   }
//! }
//! ```
//!
//! Loading validates the whole record set before anything is built, so a
//! rejected document never produces a partial state. Keys are preserved
//! verbatim and fed to the key generator so fresh keys cannot collide.

use crate::dirty::DirtySet;
use crate::error::{DeserializeError, SerializeError, TreeError};
use crate::format::{Direction, ElementFormat, TextDetail, TextFormat, TextMode};
use crate::key::{observe_key, NodeKey};
use crate::node::{ElementData, Node, NodeBody, NodeKind, Props, TextData};
use crate::node_map::NodeMap;
use crate::registry::NodeRegistry;
use crate::selection::{Point, PointKind, Selection};
use crate::state::EditorState;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::instrument;

/// One persisted node record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SerializedNode {
    #[serde(rename = "type")]
    pub node_type: String,
    pub parent: Option<NodeKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TextMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<ElementFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indent: Option<u32>,
    /// Type-specific properties, stored inline next to the common fields
    #[serde(flatten)]
    pub props: Props,
}

impl SerializedNode {
    pub fn from_node(node: &Node) -> Self {
        let mut record = SerializedNode {
            node_type: node.node_type().to_string(),
            parent: node.parent().cloned(),
            props: node.props().clone(),
            ..Default::default()
        };
        match node.body() {
            NodeBody::Element(element) => {
                record.children = Some(element.children.clone());
                record.direction = element.direction;
                if element.format != ElementFormat::Unset {
                    record.align = Some(element.format);
                }
                if element.indent > 0 {
                    record.indent = Some(element.indent);
                }
            }
            NodeBody::Text(text) => {
                record.text = Some(text.text.clone());
                if !text.format.is_empty() {
                    record.format = Some(text.format.bits());
                }
                if !text.style.is_empty() {
                    record.style = Some(text.style.clone());
                }
                if text.mode != TextMode::Normal {
                    record.mode = Some(text.mode);
                }
                if !text.detail.is_empty() {
                    record.detail = Some(text.detail.bits());
                }
            }
            NodeBody::Leaf => {}
        }
        record
    }

    /// Build a detached node of `kind`. Children are attached by the loader.
    pub fn to_node(&self, key: NodeKey, tag: &str, kind: NodeKind) -> Result<Node, DeserializeError> {
        let invalid = |message: &str| DeserializeError::InvalidRecord {
            key: key.clone(),
            message: message.to_string(),
        };
        let has_children = self.children.as_ref().is_some_and(|children| !children.is_empty());

        let node = match kind {
            NodeKind::Element => {
                if self.text.is_some() {
                    return Err(invalid("element records cannot carry text"));
                }
                Node::element(key.clone(), tag).with_element_data(ElementData {
                    direction: self.direction,
                    format: self.align.unwrap_or_default(),
                    indent: self.indent.unwrap_or(0),
                    ..Default::default()
                })
            }
            NodeKind::Text => {
                if has_children {
                    return Err(DeserializeError::NotAContainer {
                        key,
                        node_type: tag.to_string(),
                    });
                }
                let format = TextFormat::from_bits(self.format.unwrap_or(0))
                    .ok_or_else(|| invalid("unknown text format bits"))?;
                let detail = TextDetail::from_bits(self.detail.unwrap_or(0))
                    .ok_or_else(|| invalid("unknown text detail bits"))?;
                Node::text(key.clone(), tag, "").with_text_data(TextData {
                    text: self.text.clone().unwrap_or_default(),
                    format,
                    style: self.style.clone().unwrap_or_default(),
                    mode: self.mode.unwrap_or_default(),
                    detail,
                })
            }
            NodeKind::Leaf => {
                if has_children {
                    return Err(DeserializeError::NotAContainer {
                        key,
                        node_type: tag.to_string(),
                    });
                }
                Node::leaf(key.clone(), tag)
            }
        };

        Ok(self
            .props
            .iter()
            .fold(node, |node, (name, value)| node.with_prop(name.clone(), value.clone())))
    }
}

/// Record set in document order.
///
/// Deserialization keeps every entry, duplicates included, so the loader can
/// report them instead of silently keeping the last one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SerializedNodes(pub Vec<(NodeKey, SerializedNode)>);

impl Serialize for SerializedNodes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, record) in &self.0 {
            map.serialize_entry(key, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SerializedNodes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordsVisitor;

        impl<'de> Visitor<'de> for RecordsVisitor {
            type Value = SerializedNodes;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of node key to node record")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut records = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, record)) = access.next_entry::<NodeKey, SerializedNode>()? {
                    records.push((key, record));
                }
                Ok(SerializedNodes(records))
            }
        }

        deserializer.deserialize_map(RecordsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedPoint {
    pub key: NodeKey,
    pub offset: usize,
    pub kind: PointKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedSelection {
    pub anchor: SerializedPoint,
    pub focus: SerializedPoint,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SerializedState {
    pub nodes: SerializedNodes,
    #[serde(default)]
    pub selection: Option<SerializedSelection>,
}

impl From<&Point> for SerializedPoint {
    fn from(point: &Point) -> Self {
        Self {
            key: point.key.clone(),
            offset: point.offset,
            kind: point.kind,
        }
    }
}

impl From<&SerializedPoint> for Point {
    fn from(point: &SerializedPoint) -> Self {
        Point {
            key: point.key.clone(),
            offset: point.offset,
            kind: point.kind,
        }
    }
}

impl From<&Selection> for SerializedSelection {
    fn from(selection: &Selection) -> Self {
        Self {
            anchor: (&selection.anchor).into(),
            focus: (&selection.focus).into(),
        }
    }
}

/// Export every attached node through its type's `export` capability
pub fn export_state(state: &EditorState, registry: &NodeRegistry) -> Result<SerializedState, TreeError> {
    let map = state.nodes();
    let mut records = Vec::with_capacity(map.len());
    for key in map.document_order() {
        let node = map.node(&key)?;
        records.push((key, registry.for_node(node)?.export(node)));
    }
    Ok(SerializedState {
        nodes: SerializedNodes(records),
        selection: state.selection().map(SerializedSelection::from),
    })
}

#[instrument(skip(state, registry), fields(nodes = state.nodes().len()))]
pub fn serialize_state(state: &EditorState, registry: &NodeRegistry) -> Result<String, SerializeError> {
    let serialized = export_state(state, registry)?;
    Ok(serde_json::to_string_pretty(&serialized)?)
}

#[instrument(skip(json, registry), fields(bytes = json.len()))]
pub fn deserialize_state(json: &str, registry: &NodeRegistry) -> Result<EditorState, DeserializeError> {
    let serialized: SerializedState = serde_json::from_str(json)?;
    import_state(&serialized, registry)
}

/// Validate a record set and rebuild the state it describes
pub fn import_state(serialized: &SerializedState, registry: &NodeRegistry) -> Result<EditorState, DeserializeError> {
    let records = index_records(&serialized.nodes)?;
    check_links(&serialized.nodes, &records, registry)?;
    let order = reachable_order(&records)?;

    let mut map = NodeMap::new();
    let mut scratch = DirtySet::new();
    for key in &order {
        let record = records[key];
        let node_type = registry
            .get(&record.node_type)
            .ok_or_else(|| DeserializeError::UnknownType {
                key: key.clone(),
                node_type: record.node_type.clone(),
            })?;
        map.insert_detached(node_type.import(key.clone(), record)?)?;
        if let Some(parent) = &record.parent {
            map.append(parent, key, &mut scratch)?;
        }
    }

    let selection = match &serialized.selection {
        Some(selection) => {
            let selection = Selection::new((&selection.anchor).into(), (&selection.focus).into());
            check_point(&map, &selection.anchor)?;
            check_point(&map, &selection.focus)?;
            Some(selection)
        }
        None => None,
    };

    for key in &order {
        observe_key(key);
    }
    tracing::debug!(nodes = map.len(), "Loaded state");
    Ok(EditorState::new(map, selection))
}

fn index_records(nodes: &SerializedNodes) -> Result<HashMap<NodeKey, &SerializedNode>, DeserializeError> {
    let mut records = HashMap::with_capacity(nodes.0.len());
    for (key, record) in &nodes.0 {
        if records.insert(key.clone(), record).is_some() {
            return Err(DeserializeError::DuplicateKey(key.clone()));
        }
    }
    Ok(records)
}

fn check_links(
    nodes: &SerializedNodes,
    records: &HashMap<NodeKey, &SerializedNode>,
    registry: &NodeRegistry,
) -> Result<(), DeserializeError> {
    let root = records
        .get(crate::key::ROOT_KEY)
        .ok_or(DeserializeError::MissingRoot)?;
    if root.parent.is_some() {
        return Err(DeserializeError::InvalidRecord {
            key: NodeKey::root(),
            message: "the root cannot have a parent".to_string(),
        });
    }
    if registry.get(&root.node_type).map(|node_type| node_type.kind()) != Some(NodeKind::Element) {
        return Err(DeserializeError::NotAContainer {
            key: NodeKey::root(),
            node_type: root.node_type.clone(),
        });
    }

    let mut listed = HashSet::new();
    for (key, record) in &nodes.0 {
        let node_type = registry
            .get(&record.node_type)
            .ok_or_else(|| DeserializeError::UnknownType {
                key: key.clone(),
                node_type: record.node_type.clone(),
            })?;

        match &record.parent {
            None if key.is_root() => {}
            None => return Err(DeserializeError::UnexpectedRoot { key: key.clone() }),
            Some(parent) => {
                let parent_record = records.get(parent).ok_or_else(|| DeserializeError::MissingParent {
                    key: key.clone(),
                    parent: parent.clone(),
                })?;
                let lists_child = parent_record
                    .children
                    .as_ref()
                    .is_some_and(|children| children.contains(key));
                if !lists_child {
                    return Err(DeserializeError::InvalidRecord {
                        key: key.clone(),
                        message: format!("parent {parent} does not list it as a child"),
                    });
                }
            }
        }

        let Some(children) = &record.children else {
            continue;
        };
        if node_type.kind() != NodeKind::Element && !children.is_empty() {
            return Err(DeserializeError::NotAContainer {
                key: key.clone(),
                node_type: record.node_type.clone(),
            });
        }
        for child in children {
            let child_record = records.get(child).ok_or_else(|| DeserializeError::MissingChild {
                parent: key.clone(),
                child: child.clone(),
            })?;
            if child_record.parent.as_ref() != Some(key) {
                return Err(DeserializeError::ParentMismatch {
                    child: child.clone(),
                    listed_by: key.clone(),
                    parent: child_record.parent.clone(),
                });
            }
            if !listed.insert(child.clone()) {
                return Err(DeserializeError::DuplicateChild { key: child.clone() });
            }
        }
    }
    Ok(())
}

/// Breadth-first order from the root; anything left over sits on a cycle
fn reachable_order(records: &HashMap<NodeKey, &SerializedNode>) -> Result<Vec<NodeKey>, DeserializeError> {
    let mut order = Vec::with_capacity(records.len());
    let mut queue = VecDeque::from([NodeKey::root()]);
    while let Some(key) = queue.pop_front() {
        if let Some(children) = records.get(&key).and_then(|record| record.children.as_ref()) {
            queue.extend(children.iter().cloned());
        }
        order.push(key);
    }

    if order.len() != records.len() {
        let reached: HashSet<&NodeKey> = order.iter().collect();
        let mut stray: Vec<&NodeKey> = records.keys().filter(|key| !reached.contains(key)).collect();
        stray.sort();
        if let Some(key) = stray.first() {
            return Err(DeserializeError::Cycle { key: (*key).clone() });
        }
    }
    Ok(order)
}

fn check_point(map: &NodeMap, point: &Point) -> Result<(), DeserializeError> {
    let invalid = |message: String| DeserializeError::InvalidSelection {
        key: point.key.clone(),
        message,
    };
    let node = map
        .get(&point.key)
        .ok_or_else(|| invalid("node does not exist".to_string()))?;
    match (point.kind, node.kind()) {
        (PointKind::Text, NodeKind::Text) | (PointKind::Element, NodeKind::Element) => {}
        (kind, _) => return Err(invalid(format!("{kind:?} point on a {} node", node.node_type()))),
    }
    if point.offset > node.max_offset() {
        return Err(invalid(format!(
            "offset {} exceeds {}",
            point.offset,
            node.max_offset()
        )));
    }
    Ok(())
}
