//! # Commands
//!
//! Typed intent tokens dispatched to prioritized handlers.
//!
//! A command is identified by the token itself, never by its name: two tokens
//! that share a name are still different commands. Handlers run from the
//! highest priority down; the first one to return `true` stops propagation.
//!
//! ```rust,ignore
//! static SHOUT: Command<String> = Command::new("SHOUT");
//!
//! editor.register_command(&SHOUT, CommandPriority::Normal, |text, editor| {
//!     editor.update(|txn| insert_upper(txn, text)).is_ok()
//! })?;
//! editor.dispatch(&SHOUT, &"hello".to_string())?;
//! ```

use crate::errors::{EditorError, EditorResult};
use crate::Editor;
use folio_model::{ElementFormat, TextFormat};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u64);

/// Command token carrying payloads of type `P`
pub struct Command<P: 'static> {
    name: &'static str,
    id: OnceLock<CommandId>,
    _payload: PhantomData<fn(&P)>,
}

impl<P: 'static> Command<P> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            id: OnceLock::new(),
            _payload: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Identity of this token, assigned on first use
    pub fn id(&self) -> CommandId {
        *self
            .id
            .get_or_init(|| CommandId(NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed)))
    }
}

impl<P: 'static> fmt::Debug for Command<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandPriority {
    Editor = 0,
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
}

/// Returned by registration; pass back to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandHandle {
    command: CommandId,
    name: &'static str,
    id: u64,
}

pub type CommandHandler<P> = Rc<dyn Fn(&P, &mut Editor) -> bool>;

struct HandlerEntry {
    id: u64,
    priority: CommandPriority,
    /// A `CommandHandler<P>` for the command's payload type
    handler: Rc<dyn Any>,
}

#[derive(Default)]
pub(crate) struct CommandRegistry {
    handlers: HashMap<CommandId, Vec<HandlerEntry>>,
    dispatching: HashMap<CommandId, usize>,
    next_handle: u64,
}

impl CommandRegistry {
    fn guard(&self, command: CommandId, name: &'static str) -> EditorResult<()> {
        if self.dispatching.get(&command).copied().unwrap_or(0) > 0 {
            return Err(EditorError::DispatchReentrancy { command: name });
        }
        Ok(())
    }

    pub fn register<P: 'static>(
        &mut self,
        command: &Command<P>,
        priority: CommandPriority,
        handler: CommandHandler<P>,
    ) -> EditorResult<CommandHandle> {
        let command_id = command.id();
        self.guard(command_id, command.name())?;

        self.next_handle += 1;
        let entry = HandlerEntry {
            id: self.next_handle,
            priority,
            handler: Rc::new(handler),
        };
        let entries = self.handlers.entry(command_id).or_default();
        let position = entries
            .iter()
            .position(|existing| existing.priority < priority)
            .unwrap_or(entries.len());
        entries.insert(position, entry);

        Ok(CommandHandle {
            command: command_id,
            name: command.name(),
            id: self.next_handle,
        })
    }

    pub fn unregister(&mut self, handle: CommandHandle) -> EditorResult<bool> {
        self.guard(handle.command, handle.name)?;
        let Some(entries) = self.handlers.get_mut(&handle.command) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != handle.id);
        Ok(entries.len() != before)
    }

    /// Handlers for `command` in dispatch order
    pub fn snapshot<P: 'static>(&self, command: &Command<P>) -> Vec<CommandHandler<P>> {
        self.handlers
            .get(&command.id())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.handler.downcast_ref::<CommandHandler<P>>().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn begin(&mut self, command: CommandId) {
        *self.dispatching.entry(command).or_insert(0) += 1;
    }

    pub fn end(&mut self, command: CommandId) {
        if let Some(depth) = self.dispatching.get_mut(&command) {
            *depth = depth.saturating_sub(1);
            if *depth == 0 {
                self.dispatching.remove(&command);
            }
        }
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.handlers.len())
            .field("dispatching", &self.dispatching.len())
            .finish()
    }
}

// Built-in tokens. The engine registers no handlers for them.

pub static SELECTION_CHANGE: Command<()> = Command::new("SELECTION_CHANGE");
pub static INSERT_TEXT: Command<String> = Command::new("INSERT_TEXT");
pub static INSERT_PARAGRAPH: Command<()> = Command::new("INSERT_PARAGRAPH");
/// Payload: whether the caret should stay before the break
pub static INSERT_LINE_BREAK: Command<bool> = Command::new("INSERT_LINE_BREAK");
/// Payload: whether deletion goes backwards
pub static DELETE_CHARACTER: Command<bool> = Command::new("DELETE_CHARACTER");
pub static FORMAT_TEXT: Command<TextFormat> = Command::new("FORMAT_TEXT");
pub static FORMAT_ELEMENT: Command<ElementFormat> = Command::new("FORMAT_ELEMENT");
pub static INDENT_CONTENT: Command<()> = Command::new("INDENT_CONTENT");
pub static OUTDENT_CONTENT: Command<()> = Command::new("OUTDENT_CONTENT");
pub static CLEAR_EDITOR: Command<()> = Command::new("CLEAR_EDITOR");

#[cfg(test)]
mod tests {
    use super::*;

    static FIRST: Command<u32> = Command::new("SAME_NAME");
    static SECOND: Command<u32> = Command::new("SAME_NAME");

    #[test]
    fn test_identity_is_not_the_name() {
        assert_eq!(FIRST.name(), SECOND.name());
        assert_ne!(FIRST.id(), SECOND.id());
        assert_eq!(FIRST.id(), FIRST.id());
    }

    #[test]
    fn test_handlers_ordered_by_priority_then_registration() {
        static ORDERED: Command<u32> = Command::new("ORDERED");
        let mut registry = CommandRegistry::default();
        let low: CommandHandler<u32> = Rc::new(|_, _| false);
        let high: CommandHandler<u32> = Rc::new(|_, _| true);
        let high_later: CommandHandler<u32> = Rc::new(|_, _| false);

        registry.register(&ORDERED, CommandPriority::Low, low.clone()).unwrap();
        registry.register(&ORDERED, CommandPriority::High, high.clone()).unwrap();
        registry.register(&ORDERED, CommandPriority::High, high_later.clone()).unwrap();

        let order = registry.snapshot(&ORDERED);
        assert_eq!(order.len(), 3);
        assert!(Rc::ptr_eq(&order[0], &high));
        assert!(Rc::ptr_eq(&order[1], &high_later));
        assert!(Rc::ptr_eq(&order[2], &low));
    }

    #[test]
    fn test_registration_blocked_during_dispatch() {
        static GUARDED: Command<()> = Command::new("GUARDED");
        let mut registry = CommandRegistry::default();
        let handle = registry
            .register(&GUARDED, CommandPriority::Editor, Rc::new(|_, _| false))
            .unwrap();

        registry.begin(GUARDED.id());
        let err = registry
            .register(&GUARDED, CommandPriority::Editor, Rc::new(|_, _| false))
            .unwrap_err();
        assert!(matches!(err, EditorError::DispatchReentrancy { command: "GUARDED" }));
        assert!(registry.unregister(handle).is_err());
        registry.end(GUARDED.id());

        assert!(registry.unregister(handle).unwrap());
        assert!(registry.snapshot(&GUARDED).is_empty());
    }
}
