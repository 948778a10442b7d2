//! Block-level editing helpers built on transaction primitives

use crate::errors::{EditorError, EditorResult};
use crate::transaction::Transaction;
use folio_model::{Node, NodeKey, Point, PointKind, TextData, TreeError};

/// Split the block holding `text` at a character offset.
///
/// The new block (of the type the block's `new_block_after` names) is
/// inserted right after the original and receives the text past the split
/// plus the run of inline siblings that follows it; the first block-level
/// sibling ends the run and stays behind. A caret sitting exactly on the
/// split lands at the start of the new block. Returns the new block's key.
pub fn split_block_at(txn: &mut Transaction<'_>, text: &NodeKey, offset: usize) -> EditorResult<NodeKey> {
    let len = txn
        .node(text)?
        .as_text()
        .map(TextData::len)
        .ok_or_else(|| TreeError::NotText(text.clone()))?;
    if offset > len {
        return Err(TreeError::OffsetOutOfBounds {
            key: text.clone(),
            offset,
            len,
        }
        .into());
    }
    let block = txn.parent(text).ok_or_else(|| TreeError::Orphan(text.clone()))?;
    let block_type = txn.node(&block)?.node_type().to_string();
    let new_type = txn
        .registry()
        .resolve(&block_type)?
        .new_block_after()
        .ok_or_else(|| EditorError::Unsupported {
            operation: "split_block_at",
            node_type: block_type.clone(),
        })?;

    let siblings = txn.children(&block)?;
    let index = siblings
        .iter()
        .position(|sibling| sibling == text)
        .ok_or_else(|| TreeError::broken_link(text, format!("not listed by parent {block}")))?;

    let head = match offset {
        0 => Some(text.clone()),
        _ if offset == len => None,
        _ => Some(txn.split_text(text, offset)?),
    };
    let new_block = txn.create_node(new_type)?;
    txn.insert_after(&block, &new_block)?;

    let mut trailing = Vec::new();
    for sibling in &siblings[index + 1..] {
        let node = txn.node(sibling)?;
        if !txn.registry().for_node(node)?.is_inline() {
            break;
        }
        trailing.push(sibling.clone());
    }
    let moving: Vec<NodeKey> = head.into_iter().chain(trailing).collect();
    for (position, key) in moving.iter().enumerate() {
        txn.move_node(key, &new_block, position)?;
    }

    if offset > 0 {
        let start = moving
            .first()
            .filter(|key| txn.get(key).is_some_and(Node::is_text))
            .map(|key| Point::text(key.clone(), 0))
            .unwrap_or_else(|| Point::element(new_block.clone(), 0));
        txn.translate_points(|point| {
            (&point.key == text && point.kind == PointKind::Text && point.offset == offset)
                .then(|| start.clone())
        })?;
    }
    Ok(new_block)
}
