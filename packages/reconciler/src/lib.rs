//! # Folio Reconciler
//!
//! Computes the view patches between two committed editor states.
//!
//! ## Pipeline
//!
//! ```text
//! prev state ─┐
//! next state ─┼─→ reconcile() ─→ [create | update | move | remove] ─→ ViewHost
//! dirty set  ─┘                                                        ↑
//! next selection ──→ resolve_selection() ──────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Patches applied in order to a view of `prev` give a view of `next`
//! - Reconciling a state against itself yields no patches
//! - Child reorders cost the minimum number of moves
//! - Subtrees outside the dirty set are never visited
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_reconciler::{reconcile, ViewTree};
//!
//! let patches = reconcile(prev.nodes(), next.nodes(), &dirty, &registry)?;
//! view.apply_all(&patches)?;
//! ```

mod differ;
mod lcs;
mod patch;
mod selection;
mod view;

pub use differ::{mount, reconcile};
pub use lcs::{longest_increasing_subsequence, stable_keys};
pub use patch::{diff_attrs, AttrDelta, PatchStats, ViewPatch};
pub use selection::{resolve_selection, ResolvedPoint, ResolvedSelection};
pub use view::{ViewError, ViewHost, ViewNode, ViewTree};
