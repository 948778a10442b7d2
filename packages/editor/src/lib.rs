//! # Folio Editor
//!
//! Editing engine for folio documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ collaborators: UI plugins, lists, commands  │
//! └─────────────────────────────────────────────┘
//!                     ↓ dispatch / update
//! ┌─────────────────────────────────────────────┐
//! │ editor: transactions + flush pipeline       │
//! │  - Read and write transactions              │
//! │  - Batched updates, one flush per batch     │
//! │  - Transforms run to a fixpoint             │
//! │  - Prioritized, stoppable commands          │
//! └─────────────────────────────────────────────┘
//!                     ↓ commit
//! ┌─────────────────────────────────────────────┐
//! │ reconciler: prev/next state → view patches  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ view host + update/mutation listeners       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **One committed state**: the only mutable thing is which immutable
//!    state is current
//! 2. **All or nothing**: a failed update leaves the committed state as it was
//! 3. **Explicit context**: transactions are handed to closures, never global
//! 4. **Bounded transforms**: a transform that never settles fails the update
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_editor::{Editor, EditorConfig};
//! use folio_model::{nodes, NodeKey};
//!
//! let mut editor = Editor::new(EditorConfig::default());
//! editor.update(|txn| {
//!     let paragraph = txn.create_node(nodes::PARAGRAPH)?;
//!     let text = txn.create_text("Hello")?;
//!     txn.append(&paragraph, &text)?;
//!     txn.append(&NodeKey::root(), &paragraph)
//! })?;
//!
//! assert_eq!(editor.state().text_content(), "Hello");
//! ```

mod commands;
mod config;
mod editing;
mod editor;
mod errors;
mod listeners;
pub mod lists;
mod normalize;
mod pipeline;
mod transaction;
mod transforms;

pub use commands::{
    Command, CommandHandle, CommandHandler, CommandId, CommandPriority, CLEAR_EDITOR,
    DELETE_CHARACTER, FORMAT_ELEMENT, FORMAT_TEXT, INDENT_CONTENT, INSERT_LINE_BREAK,
    INSERT_PARAGRAPH, INSERT_TEXT, OUTDENT_CONTENT, SELECTION_CHANGE,
};
pub use config::{EditorConfig, DEFAULT_CONFIG_NAME};
pub use editing::split_block_at;
pub use editor::Editor;
pub use errors::{EditorError, EditorResult};
pub use listeners::{
    ListenerHandle, MutationKind, MutationListener, MutationRecord, UpdateEvent, UpdateListener,
};
pub use transaction::{PendingState, Transaction};
pub use transforms::NodeTransform;
