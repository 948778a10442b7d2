//! Built-in text normalization.
//!
//! Runs on the dirty keys of every transform pass, ahead of registered
//! transforms. Empty simple text nodes are dropped and runs of adjacent
//! mergeable text nodes fold into the leftmost one. Selection points on a
//! folded node are re-expressed as offsets into the survivor.

use crate::errors::EditorResult;
use crate::transaction::Transaction;
use folio_model::{NodeKey, Point, PointKind};
use tracing::debug;

pub(crate) fn normalize_text(txn: &mut Transaction<'_>, keys: &[NodeKey]) -> EditorResult<()> {
    for key in keys {
        let Some(text) = txn.get(key).and_then(|node| node.as_text()) else {
            continue;
        };
        if !txn.is_attached(key) {
            continue;
        }
        if text.is_empty() && text.is_simple() {
            debug!(key = %key, "Dropping empty text node");
            txn.remove(key)?;
            continue;
        }

        let survivor = merge_backward(txn, key)?;
        merge_forward(txn, &survivor)?;
    }
    Ok(())
}

/// Fold `key` into mergeable previous siblings; returns the surviving key
fn merge_backward(txn: &mut Transaction<'_>, key: &NodeKey) -> EditorResult<NodeKey> {
    let mut current = key.clone();
    while let Some(previous) = txn.previous_sibling(&current) {
        if !mergeable(txn, &previous, &current) {
            break;
        }
        merge_into(txn, &previous, &current)?;
        current = previous;
    }
    Ok(current)
}

fn merge_forward(txn: &mut Transaction<'_>, key: &NodeKey) -> EditorResult<()> {
    while let Some(next) = txn.next_sibling(key) {
        if !mergeable(txn, key, &next) {
            break;
        }
        merge_into(txn, key, &next)?;
    }
    Ok(())
}

fn mergeable(txn: &Transaction<'_>, target: &NodeKey, source: &NodeKey) -> bool {
    match (txn.get(target), txn.get(source)) {
        (Some(target), Some(source)) if target.is_text() && source.is_text() => {
            txn.registry().can_merge(target, source)
        }
        _ => false,
    }
}

/// Append `source`'s text to `target` and remove `source`
fn merge_into(txn: &mut Transaction<'_>, target: &NodeKey, source: &NodeKey) -> EditorResult<()> {
    let (merged, shift) = {
        let head = txn.node(target)?.as_text();
        let tail = txn.node(source)?.as_text();
        match (head, tail) {
            (Some(head), Some(tail)) => (format!("{}{}", head.text, tail.text), head.len()),
            _ => return Ok(()),
        }
    };

    debug!(target = %target, source = %source, "Merging text nodes");
    txn.translate_points(|point| {
        (&point.key == source && point.kind == PointKind::Text)
            .then(|| Point::text(target.clone(), shift + point.offset))
    })?;
    txn.set_text(target, &merged)?;
    txn.remove(source)?;
    Ok(())
}
