//! # Node Transforms
//!
//! Per-type callbacks run against dirty nodes before an update commits.
//!
//! ## Design
//!
//! The fixpoint is an explicit work list rather than a chain of callbacks:
//!
//! ```text
//! dirty.recent ──take──→ [normalize text] → [transforms by type] ──┐
//!      ↑                                                           │
//!      └──────────── keys dirtied during the pass ─────────────────┘
//! ```
//!
//! Each pass drains the keys dirtied since the previous pass. The loop ends
//! when a pass dirties nothing; a pass count above the configured ceiling
//! aborts the update with `TransformNonConvergence`.
//!
//! Transforms should be:
//! - **Idempotent**: setting a value to what it already is dirties nothing
//! - **Local**: touch the node handed in and its immediate surroundings

use crate::config::EditorConfig;
use crate::errors::{EditorError, EditorResult};
use crate::normalize::normalize_text;
use crate::transaction::{PendingState, Transaction};
use folio_model::{NodeKey, NodeRegistry};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, instrument, warn};

/// Callback invoked with an attached dirty node of the registered type
pub type NodeTransform = Rc<dyn Fn(&mut Transaction<'_>, &NodeKey) -> EditorResult<()>>;

#[derive(Clone, Default)]
pub(crate) struct TransformTable {
    by_type: HashMap<String, Vec<(u64, NodeTransform)>>,
}

impl TransformTable {
    pub fn register<F>(&mut self, node_type: &str, id: u64, transform: F)
    where
        F: Fn(&mut Transaction<'_>, &NodeKey) -> EditorResult<()> + 'static,
    {
        self.by_type
            .entry(node_type.to_string())
            .or_default()
            .push((id, Rc::new(transform)));
    }

    pub fn unregister(&mut self, id: u64) -> bool {
        let mut found = false;
        for transforms in self.by_type.values_mut() {
            let before = transforms.len();
            transforms.retain(|(existing, _)| *existing != id);
            found |= transforms.len() != before;
        }
        found
    }

    fn for_type(&self, node_type: &str) -> Vec<NodeTransform> {
        self.by_type
            .get(node_type)
            .map(|transforms| transforms.iter().map(|(_, transform)| transform.clone()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for TransformTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .by_type
            .iter()
            .map(|(tag, transforms)| (tag.as_str(), transforms.len()))
            .collect();
        f.debug_struct("TransformTable").field("by_type", &counts).finish()
    }
}

/// Run normalization and transforms until no pass dirties anything.
/// Returns the number of passes that did work.
#[instrument(skip_all, fields(max_passes = config.max_transform_passes))]
pub(crate) fn run_transforms(
    pending: &mut PendingState,
    registry: &NodeRegistry,
    table: &TransformTable,
    config: &EditorConfig,
) -> EditorResult<usize> {
    let mut passes = 0;
    loop {
        let work = pending.dirty.take_recent();
        if work.is_empty() {
            return Ok(passes);
        }
        if passes >= config.max_transform_passes {
            warn!(passes, pending = work.len(), "Transforms did not converge");
            return Err(EditorError::TransformNonConvergence {
                passes,
                pending: work.len(),
            });
        }
        passes += 1;
        debug!(pass = passes, keys = work.len(), "Transform pass");

        let mut txn = Transaction::write(pending, registry);
        if config.normalize_text {
            normalize_text(&mut txn, &work)?;
        }
        for key in &work {
            if !txn.is_attached(key) {
                continue;
            }
            let Some(node_type) = txn.node_type(key).map(str::to_string) else {
                continue;
            };
            for transform in table.for_type(&node_type) {
                if !txn.is_attached(key) {
                    break;
                }
                transform(&mut txn, key)?;
            }
        }
        if let Some(err) = txn.into_poison() {
            return Err(EditorError::Structural(err));
        }
    }
}
