//! # Folio Model
//!
//! Document model for the folio editing engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: keyed node records + tree primitives │
//! │  - NodeMap (copy-on-write records)          │
//! │  - NodeRegistry (per-type behaviour)        │
//! │  - Selection points and relocation          │
//! │  - Persisted form with validation           │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ reconciler: state diff → view patches       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: transactions, transforms, commands  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Keys, not pointers**: nodes refer to each other only by key
//! 2. **Snapshots are immutable**: edits clone the map, sharing untouched records
//! 3. **Primitives are atomic**: a failing primitive leaves the map unchanged
//! 4. **Behaviour by registry**: core code never switches on type names
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_model::{DirtySet, Node, NodeKey, NodeMap, next_key, nodes};
//!
//! let mut map = NodeMap::with_root();
//! let mut dirty = DirtySet::new();
//!
//! let paragraph = next_key();
//! map.insert_detached(Node::element(paragraph.clone(), nodes::PARAGRAPH))?;
//! map.append(&NodeKey::root(), &paragraph, &mut dirty)?;
//! ```

mod dirty;
mod error;
mod format;
mod key;
mod node;
mod node_map;
pub mod nodes;
mod registry;
mod selection;
mod serialize;
mod state;

pub use dirty::DirtySet;
pub use error::{DeserializeError, RegistryError, SerializeError, TreeError, TreeResult};
pub use format::{Direction, ElementFormat, TextDetail, TextFormat, TextMode};
pub use key::{next_key, observe_key, NodeKey, ROOT_KEY};
pub use node::{ElementData, Node, NodeBody, NodeKind, Props, TextData};
pub use node_map::{byte_offset, NodeMap};
pub use registry::{base_view_attrs, NodeRegistry, NodeType, ViewAttrs};
pub use selection::{Point, PointKind, Selection};
pub use serialize::{
    deserialize_state, export_state, import_state, serialize_state, SerializedNode,
    SerializedNodes, SerializedPoint, SerializedSelection, SerializedState,
};
pub use state::EditorState;
