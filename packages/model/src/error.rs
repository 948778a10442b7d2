//! Error types for the document model

use crate::key::NodeKey;
use thiserror::Error;

pub type TreeResult<T> = Result<T, TreeError>;

/// Structural invariant violations raised by tree primitives.
///
/// Any of these aborts the enclosing write transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("Node {0} is not an element")]
    NotAnElement(NodeKey),

    #[error("Node {0} is not a text node")]
    NotText(NodeKey),

    #[error("Node {key} is already attached to {parent}")]
    AlreadyAttached { key: NodeKey, parent: NodeKey },

    #[error("Node {key} already exists in the node map")]
    DuplicateKey { key: NodeKey },

    #[error("Inserting {key} under {parent} would create a cycle")]
    Cycle { key: NodeKey, parent: NodeKey },

    #[error("The root node cannot be removed or detached")]
    CannotRemoveRoot,

    #[error("Index {index} out of bounds for {parent} with {len} children")]
    IndexOutOfBounds {
        parent: NodeKey,
        index: usize,
        len: usize,
    },

    #[error("Node {0} is not reachable from the root")]
    Orphan(NodeKey),

    #[error("Node {key} has an inconsistent parent link: {message}")]
    BrokenLink { key: NodeKey, message: String },

    #[error("A {from} node cannot be replaced with a {to} node")]
    IncompatibleReplacement { from: String, to: String },

    #[error("A {sibling} node cannot be inserted after a {node} node")]
    IncompatibleSibling { node: String, sibling: String },

    #[error("A {node_type} node cannot be left empty ({key})")]
    EmptyContainer { key: NodeKey, node_type: String },

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Offset {offset} out of bounds for {key} (length {len})")]
    OffsetOutOfBounds {
        key: NodeKey,
        offset: usize,
        len: usize,
    },
}

impl TreeError {
    pub fn out_of_bounds(parent: &NodeKey, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            parent: parent.clone(),
            index,
            len,
        }
    }

    pub fn broken_link(key: &NodeKey, message: impl Into<String>) -> Self {
        Self::BrokenLink {
            key: key.clone(),
            message: message.into(),
        }
    }
}

/// Malformed persisted state. A failed load installs nothing.
#[derive(Error, Debug)]
pub enum DeserializeError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate record for key {0}")]
    DuplicateKey(NodeKey),

    #[error("State has no root record")]
    MissingRoot,

    #[error("Record {key} has a null parent but is not the root")]
    UnexpectedRoot { key: NodeKey },

    #[error("Record {key} references missing parent {parent}")]
    MissingParent { key: NodeKey, parent: NodeKey },

    #[error("Record {parent} lists missing child {child}")]
    MissingChild { parent: NodeKey, child: NodeKey },

    #[error("Record {child} is listed by {listed_by} but its parent is {parent:?}")]
    ParentMismatch {
        child: NodeKey,
        listed_by: NodeKey,
        parent: Option<NodeKey>,
    },

    #[error("Record {key} appears in more than one child list")]
    DuplicateChild { key: NodeKey },

    #[error("Record {key} is part of a parent cycle")]
    Cycle { key: NodeKey },

    #[error("Record {key} has type {node_type} which cannot hold children")]
    NotAContainer { key: NodeKey, node_type: String },

    #[error("Unknown node type {node_type} for record {key}")]
    UnknownType { key: NodeKey, node_type: String },

    #[error("Invalid record {key}: {message}")]
    InvalidRecord { key: NodeKey, message: String },

    #[error("Selection point references {key}: {message}")]
    InvalidSelection { key: NodeKey, message: String },

    #[error("Tree reconstruction failed: {0}")]
    Tree(#[from] TreeError),
}

/// Failure turning a state into its persisted form.
#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Node type '{0}' is already registered")]
    DuplicateType(String),
}
