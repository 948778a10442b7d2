//! # Selection Model
//!
//! A selection is an anchor and a focus point. A point addresses either a
//! gap between an element's children (element point) or a character offset
//! inside a text node (text point). Offsets of text points count characters.
//!
//! Structural edits keep points valid through the primitives here: removal
//! relocates points that lived inside the removed subtree, detaching and
//! inserting shift element points on the affected parent, and
//! [`Selection::translate_points`] lets callers remap points when content
//! moves between nodes (text merging, block splitting, list nesting).

use crate::key::NodeKey;
use crate::node::NodeBody;
use crate::node_map::NodeMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    Element,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
    pub kind: PointKind,
}

impl Point {
    pub fn text(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            kind: PointKind::Text,
        }
    }

    pub fn element(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            kind: PointKind::Element,
        }
    }

    /// First position inside (or, for leaves, just before) a node
    pub fn start_of(map: &NodeMap, key: &NodeKey) -> Option<Point> {
        let node = map.get(key)?;
        match node.body() {
            NodeBody::Text(_) => Some(Point::text(key.clone(), 0)),
            NodeBody::Element(_) => Some(Point::element(key.clone(), 0)),
            NodeBody::Leaf => {
                let (parent, index) = map.position(key).ok()?;
                Some(Point::element(parent, index))
            }
        }
    }

    /// Last position inside (or, for leaves, just after) a node
    pub fn end_of(map: &NodeMap, key: &NodeKey) -> Option<Point> {
        let node = map.get(key)?;
        match node.body() {
            NodeBody::Text(text) => Some(Point::text(key.clone(), text.len())),
            NodeBody::Element(element) => Some(Point::element(key.clone(), element.children.len())),
            NodeBody::Leaf => {
                let (parent, index) = map.position(key).ok()?;
                Some(Point::element(parent, index + 1))
            }
        }
    }

    /// Sortable document position: the node path followed by the offset
    fn position(&self, map: &NodeMap) -> Option<Vec<usize>> {
        let mut path = map.path(&self.key)?;
        path.push(self.offset);
        Some(path)
    }

    /// Document-order comparison; `None` if either point is unresolvable
    pub fn compare(&self, other: &Point, map: &NodeMap) -> Option<Ordering> {
        Some(self.position(map)?.cmp(&other.position(map)?))
    }

    pub fn resolves_in(&self, map: &NodeMap) -> bool {
        match map.get(&self.key) {
            Some(node) => {
                let kind_matches = match self.kind {
                    PointKind::Text => node.is_text(),
                    PointKind::Element => node.is_element(),
                };
                kind_matches && self.offset <= node.max_offset()
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn caret(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Focus precedes anchor in document order
    pub fn is_backward(&self, map: &NodeMap) -> bool {
        self.focus.compare(&self.anchor, map) == Some(Ordering::Less)
    }

    /// The point that comes first in the document, regardless of direction
    pub fn start(&self, map: &NodeMap) -> &Point {
        if self.is_backward(map) {
            &self.focus
        } else {
            &self.anchor
        }
    }

    pub fn end(&self, map: &NodeMap) -> &Point {
        if self.is_backward(map) {
            &self.anchor
        } else {
            &self.focus
        }
    }

    pub fn references(&self, key: &NodeKey) -> bool {
        &self.anchor.key == key || &self.focus.key == key
    }

    pub fn resolves_in(&self, map: &NodeMap) -> bool {
        self.anchor.resolves_in(map) && self.focus.resolves_in(map)
    }

    fn points_mut(&mut self) -> [&mut Point; 2] {
        [&mut self.anchor, &mut self.focus]
    }

    /// Remap points through `mapper`; a `None` result leaves the point alone.
    /// Returns how many points moved.
    pub fn translate_points<F>(&mut self, mut mapper: F) -> usize
    where
        F: FnMut(&Point) -> Option<Point>,
    {
        let mut moved = 0;
        for point in self.points_mut() {
            if let Some(next) = mapper(point) {
                if *point != next {
                    *point = next;
                    moved += 1;
                }
            }
        }
        moved
    }

    /// A child is leaving `parent` at `index`
    pub fn adjust_for_detach(&mut self, parent: &NodeKey, index: usize) {
        for point in self.points_mut() {
            if point.kind == PointKind::Element && &point.key == parent && point.offset > index {
                point.offset -= 1;
            }
        }
    }

    /// A child arrived in `parent` at `index`
    pub fn adjust_for_insert(&mut self, parent: &NodeKey, index: usize) {
        for point in self.points_mut() {
            if point.kind == PointKind::Element && &point.key == parent && point.offset > index {
                point.offset += 1;
            }
        }
    }

    /// Move points out of the subtree rooted at `removed` before it is deleted.
    ///
    /// The map must still hold the subtree. A point falls back to the end of
    /// the previous sibling, else the start of the next sibling, else the gap
    /// the subtree leaves in its parent.
    pub fn relocate_for_removal(&mut self, map: &NodeMap, removed: &NodeKey) -> usize {
        let inside = |key: &NodeKey| key == removed || map.is_ancestor(removed, key);
        if !inside(&self.anchor.key) && !inside(&self.focus.key) {
            return 0;
        }
        let Ok((parent, index)) = map.position(removed) else {
            return 0;
        };
        let fallback = map
            .previous_sibling(removed)
            .and_then(|prev| Point::end_of(map, prev))
            .or_else(|| {
                map.next_sibling(removed)
                    .and_then(|next| Point::start_of(map, next))
            })
            .unwrap_or_else(|| Point::element(parent, index));

        self.translate_points(|point| inside(&point.key).then(|| fallback.clone()))
    }

    /// Clamp offsets and fix point kinds against `map`. Points on missing
    /// keys are left for the caller. Returns whether anything changed.
    pub fn normalize(&mut self, map: &NodeMap) -> bool {
        let mut changed = false;
        for point in self.points_mut() {
            let Some(node) = map.get(&point.key) else {
                continue;
            };
            let normalized = match node.body() {
                NodeBody::Text(text) => Point::text(point.key.clone(), point.offset.min(text.len())),
                NodeBody::Element(element) => {
                    Point::element(point.key.clone(), point.offset.min(element.children.len()))
                }
                NodeBody::Leaf => {
                    let Ok((parent, index)) = map.position(&point.key) else {
                        continue;
                    };
                    let offset = if point.offset > 0 { index + 1 } else { index };
                    Point::element(parent, offset)
                }
            };
            if *point != normalized {
                *point = normalized;
                changed = true;
            }
        }
        changed
    }
}
