//! Selection resolution against a freshly patched view

use folio_model::{NodeKey, NodeMap, Point, PointKind, Selection};
use serde::Serialize;

/// A selection point pinned to a node that exists in the patched view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPoint {
    pub key: NodeKey,
    pub offset: usize,
    pub kind: PointKind,
    /// The requested node was gone and the point fell back to an ancestor
    pub relocated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSelection {
    pub anchor: ResolvedPoint,
    pub focus: ResolvedPoint,
    pub is_backward: bool,
}

impl ResolvedSelection {
    pub fn is_collapsed(&self) -> bool {
        self.anchor.key == self.focus.key && self.anchor.offset == self.focus.offset
    }

    pub fn to_selection(&self) -> Selection {
        Selection::new(
            Point {
                key: self.anchor.key.clone(),
                offset: self.anchor.offset,
                kind: self.anchor.kind,
            },
            Point {
                key: self.focus.key.clone(),
                offset: self.focus.offset,
                kind: self.focus.kind,
            },
        )
    }
}

/// Pin `selection` (taken from the next state) onto `next`.
///
/// A point whose node survived is clamped into range. A point whose node is
/// gone falls back to the gap its subtree occupied in the nearest ancestor
/// (from `prev`) that still exists in `next`, or to the start of the root.
pub fn resolve_selection(
    prev: &NodeMap,
    next: &NodeMap,
    selection: Option<&Selection>,
) -> Option<ResolvedSelection> {
    let selection = selection?;
    let anchor = resolve_point(prev, next, &selection.anchor);
    let focus = resolve_point(prev, next, &selection.focus);

    let resolved = Selection::new(
        Point {
            key: anchor.key.clone(),
            offset: anchor.offset,
            kind: anchor.kind,
        },
        Point {
            key: focus.key.clone(),
            offset: focus.offset,
            kind: focus.kind,
        },
    );
    let is_backward = resolved.is_backward(next);
    Some(ResolvedSelection {
        anchor,
        focus,
        is_backward,
    })
}

fn resolve_point(prev: &NodeMap, next: &NodeMap, point: &Point) -> ResolvedPoint {
    if next.is_attached(&point.key) {
        let mut normalized = Selection::caret(point.clone());
        normalized.normalize(next);
        let point = normalized.anchor;
        return ResolvedPoint {
            key: point.key,
            offset: point.offset,
            kind: point.kind,
            relocated: false,
        };
    }

    // Walk up the previous tree, remembering the child we came from
    let mut child = point.key.clone();
    for ancestor in prev.ancestors(&point.key) {
        let surviving = next
            .get(&ancestor)
            .filter(|node| node.is_element() && next.is_attached(&ancestor));
        if let Some(node) = surviving {
            let gap = prev
                .get(&ancestor)
                .and_then(|old| old.children().iter().position(|key| *key == child))
                .unwrap_or(0)
                .min(node.children().len());
            return ResolvedPoint {
                key: ancestor,
                offset: gap,
                kind: PointKind::Element,
                relocated: true,
            };
        }
        child = ancestor;
    }

    ResolvedPoint {
        key: NodeKey::root(),
        offset: 0,
        kind: PointKind::Element,
        relocated: true,
    }
}
