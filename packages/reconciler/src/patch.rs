//! View-patch contract toward the rendering collaborator

use folio_model::{NodeKey, ViewAttrs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Changed attributes: `Some` sets a value, `None` removes the attribute
pub type AttrDelta = BTreeMap<String, Option<String>>;

/// One view operation. Patches are applied in emitted order.
///
/// `index` always refers to the parent's child list at application time,
/// after a moved node has been taken out of its old place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ViewPatch {
    Create {
        key: NodeKey,
        tag: String,
        attrs: ViewAttrs,
        /// `None` only for the root
        parent: Option<NodeKey>,
        index: usize,
    },
    Update {
        key: NodeKey,
        delta: AttrDelta,
    },
    Move {
        key: NodeKey,
        parent: NodeKey,
        index: usize,
    },
    Remove {
        key: NodeKey,
    },
}

impl ViewPatch {
    pub fn key(&self) -> &NodeKey {
        match self {
            ViewPatch::Create { key, .. }
            | ViewPatch::Update { key, .. }
            | ViewPatch::Move { key, .. }
            | ViewPatch::Remove { key } => key,
        }
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            ViewPatch::Create { .. } => "create",
            ViewPatch::Update { .. } => "update",
            ViewPatch::Move { .. } => "move",
            ViewPatch::Remove { .. } => "remove",
        }
    }
}

/// Attribute delta turning `prev` into `next`
pub fn diff_attrs(prev: &ViewAttrs, next: &ViewAttrs) -> AttrDelta {
    let mut delta = AttrDelta::new();
    for (name, value) in next {
        if prev.get(name) != Some(value) {
            delta.insert(name.clone(), Some(value.clone()));
        }
    }
    for name in prev.keys() {
        if !next.contains_key(name) {
            delta.insert(name.clone(), None);
        }
    }
    delta
}

/// Per-op totals, used for logging and reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatchStats {
    pub creates: usize,
    pub updates: usize,
    pub moves: usize,
    pub removes: usize,
}

impl PatchStats {
    pub fn of(patches: &[ViewPatch]) -> Self {
        let mut stats = PatchStats::default();
        for patch in patches {
            match patch {
                ViewPatch::Create { .. } => stats.creates += 1,
                ViewPatch::Update { .. } => stats.updates += 1,
                ViewPatch::Move { .. } => stats.moves += 1,
                ViewPatch::Remove { .. } => stats.removes += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, &str)]) -> ViewAttrs {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_attr_delta_sets_and_clears() {
        let prev = attrs(&[("text", "Hello"), ("format", "1")]);
        let next = attrs(&[("text", "Hel")]);

        let delta = diff_attrs(&prev, &next);
        assert_eq!(delta.get("text"), Some(&Some("Hel".to_string())));
        assert_eq!(delta.get("format"), Some(&None));
        assert!(diff_attrs(&next, &next).is_empty());
    }

    #[test]
    fn test_patch_wire_shape() {
        let patch = ViewPatch::Move {
            key: NodeKey::new("3"),
            parent: NodeKey::root(),
            index: 0,
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "op": "move", "key": "3", "parent": "root", "index": 0 })
        );
    }
}
