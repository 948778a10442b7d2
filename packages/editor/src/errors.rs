//! Error types for the editor

use folio_model::{DeserializeError, RegistryError, SerializeError, TreeError};
use folio_reconciler::ViewError;
use thiserror::Error;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug)]
pub enum EditorError {
    /// Aborts the whole pending update; the committed state is untouched
    #[error("Structural invariant violated: {0}")]
    Structural(#[from] TreeError),

    /// Aborts only the offending call
    #[error("Cannot {operation} inside a read transaction")]
    ReadOnlyViolation { operation: &'static str },

    #[error("Transforms did not settle after {passes} passes ({pending} nodes still dirty)")]
    TransformNonConvergence { passes: usize, pending: usize },

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] DeserializeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializeError),

    #[error("Cannot change the handlers of {command} while it is being dispatched")]
    DispatchReentrancy { command: &'static str },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("View error: {0}")]
    View(#[from] ViewError),

    #[error("{operation} is not supported by {node_type} nodes")]
    Unsupported {
        operation: &'static str,
        node_type: String,
    },

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
