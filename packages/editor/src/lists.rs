//! # Lists
//!
//! List and list-item node types, numbering, nesting, and the operations
//! that move content into and out of a list.
//!
//! Nesting follows the wrapper convention: a nested list lives inside a
//! list item that holds nothing else.
//!
//! ```text
//! list
//! ├── listitem (value 1) "One"
//! ├── listitem (value 2)          ← wrapper, not counted
//! │   └── list
//! │       └── listitem (value 1) "One.a"
//! └── listitem (value 2) "Two"
//! ```

use crate::commands::{CommandHandle, CommandPriority, DELETE_CHARACTER, INDENT_CONTENT, OUTDENT_CONTENT};
use crate::editor::Editor;
use crate::errors::{EditorError, EditorResult};
use crate::listeners::ListenerHandle;
use crate::transaction::Transaction;
use folio_model::{
    base_view_attrs, nodes, Node, NodeKey, NodeKind, NodeMap, NodeType, Point, PointKind, TreeError, ViewAttrs,
};
use tracing::warn;

pub const LIST: &str = "list";
pub const LIST_ITEM: &str = "listitem";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListType {
    Bullet,
    Number,
}

impl ListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::Bullet => "bullet",
            ListType::Number => "number",
        }
    }

    fn of(node: &Node) -> ListType {
        match node.prop_str("listType") {
            Some("number") => ListType::Number,
            _ => ListType::Bullet,
        }
    }
}

#[derive(Debug)]
pub struct ListNode;

impl NodeType for ListNode {
    fn tag(&self) -> &'static str {
        LIST
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn construct(&self, key: NodeKey) -> Node {
        Node::element(key, LIST)
            .with_prop("listType", ListType::Bullet.as_str())
            .with_prop("start", 1)
    }

    fn view_tag(&self, node: &Node) -> String {
        match ListType::of(node) {
            ListType::Number => "ol".to_string(),
            ListType::Bullet => "ul".to_string(),
        }
    }

    fn view_attrs(&self, node: &Node) -> ViewAttrs {
        let mut attrs = base_view_attrs(node);
        let start = node.prop_u64("start").unwrap_or(1);
        if ListType::of(node) == ListType::Number && start != 1 {
            attrs.insert("start".to_string(), start.to_string());
        }
        attrs
    }

    fn can_be_empty(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct ListItemNode;

impl NodeType for ListItemNode {
    fn tag(&self) -> &'static str {
        LIST_ITEM
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    fn construct(&self, key: NodeKey) -> Node {
        Node::element(key, LIST_ITEM).with_prop("value", 1)
    }

    fn view_tag(&self, _node: &Node) -> String {
        "li".to_string()
    }

    fn view_attrs(&self, node: &Node) -> ViewAttrs {
        let mut attrs = base_view_attrs(node);
        if let Some(value) = node.prop_u64("value") {
            attrs.insert("value".to_string(), value.to_string());
        }
        attrs
    }

    fn can_merge_with(&self, _node: &Node, other: &Node) -> bool {
        matches!(other.node_type(), nodes::PARAGRAPH | LIST_ITEM)
    }

    fn can_replace_with(&self, _node: &Node, replacement: &Node) -> bool {
        replacement.node_type() == LIST_ITEM
    }

    fn can_insert_after(&self, _node: &Node, sibling: &Node) -> bool {
        sibling.node_type() == LIST_ITEM
    }

    fn new_block_after(&self) -> Option<&'static str> {
        Some(LIST_ITEM)
    }
}

/// Register both list types and the numbering transform
pub fn register_lists(editor: &mut Editor) -> EditorResult<ListenerHandle> {
    editor.register_node_type(ListNode)?;
    editor.register_node_type(ListItemNode)?;
    editor.register_node_transform(LIST, renumber_list)
}

/// Wire indent/outdent of the selected list item to the content commands,
/// and a backward delete at the start of an item to collapsing it
pub fn register_list_commands(editor: &mut Editor) -> EditorResult<[CommandHandle; 3]> {
    let indent = editor.register_command(&INDENT_CONTENT, CommandPriority::Low, |_, editor| {
        apply_to_selected_item(editor, indent_list_item)
    })?;
    let outdent = editor.register_command(&OUTDENT_CONTENT, CommandPriority::Low, |_, editor| {
        apply_to_selected_item(editor, outdent_list_item)
    })?;
    let collapse = editor.register_command(&DELETE_CHARACTER, CommandPriority::Low, |backward, editor| {
        *backward && apply_to_selected_item(editor, collapse_at_caret)
    })?;
    Ok([indent, outdent, collapse])
}

fn collapse_at_caret(txn: &mut Transaction<'_>, item: &NodeKey) -> EditorResult<bool> {
    let Some(selection) = txn.selection() else {
        return Ok(false);
    };
    let point = &selection.anchor;
    let at_start = selection.is_collapsed()
        && point.offset == 0
        && match point.kind {
            PointKind::Element => &point.key == item,
            PointKind::Text => txn.children(item)?.first() == Some(&point.key),
        };
    if !at_start {
        return Ok(false);
    }
    collapse_list_item_at_start(txn, item)
}

fn apply_to_selected_item(
    editor: &mut Editor,
    operation: fn(&mut Transaction<'_>, &NodeKey) -> EditorResult<bool>,
) -> bool {
    let result = editor.update(|txn| match selected_list_item(txn) {
        Some(item) => operation(txn, &item),
        None => Ok(false),
    });
    match result {
        Ok(handled) => handled,
        Err(err) => {
            warn!(error = %err, "List command failed");
            false
        }
    }
}

/// Nearest list item at or above the selection anchor
fn selected_list_item(txn: &Transaction<'_>) -> Option<NodeKey> {
    let mut current = Some(txn.selection()?.anchor.key.clone());
    while let Some(key) = current {
        if txn.node_type(&key) == Some(LIST_ITEM) {
            return Some(key);
        }
        current = txn.parent(&key);
    }
    None
}

pub fn create_list(txn: &mut Transaction<'_>, list_type: ListType) -> EditorResult<NodeKey> {
    let list = txn.create_node(LIST)?;
    txn.set_prop(&list, "listType", list_type.as_str())?;
    Ok(list)
}

/// True for an item whose only content is nested lists
pub fn is_nested_list_wrapper(map: &NodeMap, item: &NodeKey) -> bool {
    let Ok(children) = map.children(item) else {
        return false;
    };
    !children.is_empty()
        && children
            .iter()
            .all(|child| map.get(child).is_some_and(|node| node.node_type() == LIST))
}

/// Number items from the list's `start`; wrappers take the next number
/// without consuming it
pub fn renumber_list(txn: &mut Transaction<'_>, list: &NodeKey) -> EditorResult<()> {
    let mut value = txn.node(list)?.prop_u64("start").unwrap_or(1);
    for item in txn.children(list)? {
        if txn.node_type(&item) != Some(LIST_ITEM) {
            continue;
        }
        txn.set_prop(&item, "value", value)?;
        if !is_nested_list_wrapper(txn.nodes(), &item) {
            value += 1;
        }
    }
    Ok(())
}

fn append_moved(txn: &mut Transaction<'_>, key: &NodeKey, parent: &NodeKey) -> EditorResult<()> {
    let len = txn.children(parent)?.len();
    txn.move_node(key, parent, len)
}

fn wrapped_list(txn: &Transaction<'_>, wrapper: &NodeKey, last: bool) -> EditorResult<Option<NodeKey>> {
    let children = txn.children(wrapper)?;
    let list = if last { children.last() } else { children.first() };
    Ok(list.cloned())
}

/// Nest `item` one level deeper. Returns false when it is not a list item.
///
/// The item joins an adjacent nested list when there is one; otherwise a
/// new wrapper and list are created in its place.
pub fn indent_list_item(txn: &mut Transaction<'_>, item: &NodeKey) -> EditorResult<bool> {
    let Some(list) = txn.parent(item) else {
        return Ok(false);
    };
    if txn.node_type(item) != Some(LIST_ITEM)
        || txn.node_type(&list) != Some(LIST)
        || is_nested_list_wrapper(txn.nodes(), item)
    {
        return Ok(false);
    }

    let previous = txn
        .previous_sibling(item)
        .filter(|key| is_nested_list_wrapper(txn.nodes(), key));
    let next = txn
        .next_sibling(item)
        .filter(|key| is_nested_list_wrapper(txn.nodes(), key));

    match (previous, next) {
        (Some(previous), next) => {
            let Some(inner) = wrapped_list(txn, &previous, true)? else {
                return Ok(false);
            };
            append_moved(txn, item, &inner)?;
            // The item no longer separates two nested lists; join them
            if let Some(next) = next {
                if let Some(following) = wrapped_list(txn, &next, false)? {
                    for child in txn.children(&following)? {
                        append_moved(txn, &child, &inner)?;
                    }
                }
                txn.remove(&next)?;
            }
        }
        (None, Some(next)) => {
            let Some(inner) = wrapped_list(txn, &next, false)? else {
                return Ok(false);
            };
            txn.move_node(item, &inner, 0)?;
        }
        (None, None) => {
            let list_type = ListType::of(txn.node(&list)?);
            let wrapper = txn.create_node(LIST_ITEM)?;
            let inner = create_list(txn, list_type)?;
            txn.insert_before(item, &wrapper)?;
            txn.append(&wrapper, &inner)?;
            txn.move_node(item, &inner, 0)?;
        }
    }
    Ok(true)
}

/// Lift `item` out of its nested list. Returns false at the top level.
///
/// Items before it stay nested above, items after it move into a new
/// nested list below.
pub fn outdent_list_item(txn: &mut Transaction<'_>, item: &NodeKey) -> EditorResult<bool> {
    let Some(inner) = txn.parent(item) else {
        return Ok(false);
    };
    let Some(wrapper) = txn.parent(&inner) else {
        return Ok(false);
    };
    let Some(outer) = txn.parent(&wrapper) else {
        return Ok(false);
    };
    if txn.node_type(item) != Some(LIST_ITEM)
        || txn.node_type(&inner) != Some(LIST)
        || txn.node_type(&wrapper) != Some(LIST_ITEM)
        || txn.node_type(&outer) != Some(LIST)
    {
        return Ok(false);
    }

    let siblings = txn.children(&inner)?;
    let Some(index) = siblings.iter().position(|sibling| sibling == item) else {
        return Ok(false);
    };
    let Some(wrapper_index) = txn.index_in_parent(&wrapper) else {
        return Ok(false);
    };

    if siblings.len() == 1 {
        txn.move_node(item, &outer, wrapper_index)?;
        txn.remove(&wrapper)?;
    } else if index == 0 {
        txn.move_node(item, &outer, wrapper_index)?;
    } else if index == siblings.len() - 1 {
        txn.move_node(item, &outer, wrapper_index + 1)?;
    } else {
        txn.move_node(item, &outer, wrapper_index + 1)?;
        let list_type = ListType::of(txn.node(&inner)?);
        let tail_wrapper = txn.create_node(LIST_ITEM)?;
        let tail_list = create_list(txn, list_type)?;
        txn.insert_after(item, &tail_wrapper)?;
        txn.append(&tail_wrapper, &tail_list)?;
        for sibling in &siblings[index + 1..] {
            append_moved(txn, sibling, &tail_list)?;
        }
    }
    Ok(true)
}

/// Parent list of a list item, or an error naming `operation`
fn parent_list(txn: &Transaction<'_>, item: &NodeKey, operation: &'static str) -> EditorResult<NodeKey> {
    let list = txn.parent(item).ok_or_else(|| TreeError::Orphan(item.clone()))?;
    let item_type = txn.node(item)?.node_type();
    if item_type != LIST_ITEM || txn.node_type(&list) != Some(LIST) {
        return Err(EditorError::Unsupported {
            operation,
            node_type: item_type.to_string(),
        });
    }
    Ok(list)
}

/// Put detached `replacement` where `item` is.
///
/// Another list item simply takes the slot. Anything else has to leave the
/// list: it goes before the list in place of the first item, after it in
/// place of the last, and between the two halves of a split list in place
/// of a middle one. A list emptied this way is removed. With
/// `carry_children` the item's children move into the replacement first.
pub fn replace_list_item(
    txn: &mut Transaction<'_>,
    item: &NodeKey,
    replacement: &NodeKey,
    carry_children: bool,
) -> EditorResult<()> {
    if txn.node_type(replacement) == Some(LIST_ITEM) {
        return txn.replace(item, replacement, carry_children);
    }
    let list = parent_list(txn, item, "replace_list_item")?;

    if carry_children {
        for child in txn.children(item)? {
            append_moved(txn, &child, replacement)?;
        }
        txn.translate_points(|point| {
            (&point.key == item && point.kind == PointKind::Element)
                .then(|| Point::element(replacement.clone(), point.offset))
        })?;
    }

    let siblings = txn.children(&list)?;
    let index = siblings
        .iter()
        .position(|sibling| sibling == item)
        .ok_or_else(|| TreeError::broken_link(item, format!("not listed by parent {list}")))?;
    if index == 0 {
        txn.insert_before(&list, replacement)?;
    } else if index == siblings.len() - 1 {
        txn.insert_after(&list, replacement)?;
    } else {
        txn.insert_after(&list, replacement)?;
        move_into_new_list(txn, &list, replacement, &siblings[index + 1..])?;
    }
    txn.remove(item)?;
    Ok(())
}

/// Put detached `node` right after `item`.
///
/// List items join the list directly. A list of the same type is merged
/// item by item and then dropped. Anything else splits the list: `node`
/// follows the list and the items after `item` move to a new list behind it.
pub fn insert_after_list_item(txn: &mut Transaction<'_>, item: &NodeKey, node: &NodeKey) -> EditorResult<()> {
    let list = parent_list(txn, item, "insert_after_list_item")?;
    let node_type = txn.node(node)?.node_type().to_string();
    if node_type == LIST_ITEM {
        return txn.insert_after(item, node);
    }

    let list_type = ListType::of(txn.node(&list)?);
    if node_type == LIST && ListType::of(txn.node(node)?) == list_type {
        let mut anchor = item.clone();
        for child in txn.children(node)? {
            let index = txn
                .index_in_parent(&anchor)
                .ok_or_else(|| TreeError::Orphan(anchor.clone()))?;
            txn.move_node(&child, &list, index + 1)?;
            anchor = child;
        }
        txn.remove(node)?;
        return Ok(());
    }

    let siblings = txn.children(&list)?;
    let index = txn
        .index_in_parent(item)
        .ok_or_else(|| TreeError::Orphan(item.clone()))?;
    txn.insert_after(&list, node)?;
    move_into_new_list(txn, &list, node, &siblings[index + 1..])
}

/// Move `items` out of `list` into a new list of the same type placed
/// right after `anchor`. Nothing happens for an empty slice.
fn move_into_new_list(
    txn: &mut Transaction<'_>,
    list: &NodeKey,
    anchor: &NodeKey,
    items: &[NodeKey],
) -> EditorResult<()> {
    if items.is_empty() {
        return Ok(());
    }
    let list_type = ListType::of(txn.node(list)?);
    let tail = create_list(txn, list_type)?;
    txn.insert_after(anchor, &tail)?;
    for item in items {
        append_moved(txn, item, &tail)?;
    }
    Ok(())
}

/// Turn `item` back into ordinary content, as a backspace at its start
/// does. Returns false for anything but a content-holding list item.
///
/// A nested item moves up one level. A top-level item becomes a
/// paragraph holding its children, taking the item's place outside the
/// list (see [`replace_list_item`]).
pub fn collapse_list_item_at_start(txn: &mut Transaction<'_>, item: &NodeKey) -> EditorResult<bool> {
    let Some(list) = txn.parent(item) else {
        return Ok(false);
    };
    if txn.node_type(item) != Some(LIST_ITEM)
        || txn.node_type(&list) != Some(LIST)
        || is_nested_list_wrapper(txn.nodes(), item)
    {
        return Ok(false);
    }
    let nested = txn
        .parent(&list)
        .is_some_and(|parent| txn.node_type(&parent) == Some(LIST_ITEM));
    if nested {
        return outdent_list_item(txn, item);
    }

    let paragraph = txn.create_node(nodes::PARAGRAPH)?;
    replace_list_item(txn, item, &paragraph, true)?;
    Ok(true)
}
