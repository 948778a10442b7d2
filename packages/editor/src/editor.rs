//! The editor facade: committed state, pending update, registrations

use crate::commands::{Command, CommandHandle, CommandHandler, CommandPriority, CommandRegistry};
use crate::config::EditorConfig;
use crate::errors::{EditorError, EditorResult};
use crate::listeners::{ListenerHandle, MutationListener, MutationRecord, UpdateEvent, UpdateListener};
use crate::transaction::{PendingState, Transaction};
use crate::transforms::TransformTable;
use folio_model::{deserialize_state, serialize_state, EditorState, NodeKey, NodeRegistry, NodeType};
use folio_reconciler::{mount, resolve_selection, ViewHost};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A single document being edited.
///
/// The committed state is immutable and shared; all changes go through
/// [`Editor::update`], which stages them on a pending clone. Outside a batch
/// every update flushes immediately. Inside [`Editor::batch`] (and during
/// command dispatch) updates accumulate and flush once at the end.
pub struct Editor {
    pub(crate) config: EditorConfig,
    pub(crate) registry: NodeRegistry,
    pub(crate) state: Arc<EditorState>,
    pub(crate) pending: Option<PendingState>,
    pub(crate) batch_depth: usize,
    pub(crate) transforms: TransformTable,
    pub(crate) update_listeners: Vec<(u64, UpdateListener)>,
    pub(crate) mutation_listeners: Vec<(u64, String, MutationListener)>,
    pub(crate) commands: CommandRegistry,
    pub(crate) view: Option<Box<dyn ViewHost>>,
    next_listener: u64,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            registry: NodeRegistry::with_builtins(),
            state: Arc::new(EditorState::empty()),
            pending: None,
            batch_depth: 0,
            transforms: TransformTable::default(),
            update_listeners: Vec::new(),
            mutation_listeners: Vec::new(),
            commands: CommandRegistry::default(),
            view: None,
            next_listener: 0,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// The last committed state
    pub fn state(&self) -> Arc<EditorState> {
        self.state.clone()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn register_node_type<T: NodeType + 'static>(&mut self, node_type: T) -> EditorResult<()> {
        self.registry.register(node_type)?;
        Ok(())
    }

    // Transactions

    /// Run `f` against the committed state. Mutations fail with
    /// `ReadOnlyViolation` and leave the state untouched.
    pub fn read<R>(&self, f: impl FnOnce(&mut Transaction<'_>) -> EditorResult<R>) -> EditorResult<R> {
        let mut txn = Transaction::read(&self.state, &self.registry);
        f(&mut txn)
    }

    /// Run `f` against the pending state, then flush unless batching.
    ///
    /// An error from `f`, or any structural failure inside it, discards the
    /// whole pending state (including earlier updates of the same batch).
    pub fn update<R>(&mut self, f: impl FnOnce(&mut Transaction<'_>) -> EditorResult<R>) -> EditorResult<R> {
        let pending = self
            .pending
            .get_or_insert_with(|| PendingState::from_state(&self.state));
        let mut txn = Transaction::write(pending, &self.registry);
        let result = f(&mut txn);
        let poison = txn.into_poison();

        match (result, poison) {
            (Ok(value), None) => {
                if self.batch_depth == 0 {
                    self.flush()?;
                }
                Ok(value)
            }
            (Ok(_), Some(err)) => {
                self.discard(&err.to_string());
                Err(EditorError::Structural(err))
            }
            (Err(err), _) => {
                self.discard(&err.to_string());
                Err(err)
            }
        }
    }

    /// Coalesce every update made by `f` into one flush
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Editor) -> EditorResult<R>) -> EditorResult<R> {
        self.batch_depth += 1;
        let result = f(self);
        self.batch_depth -= 1;

        match result {
            Ok(value) => {
                if self.batch_depth == 0 {
                    self.flush()?;
                }
                Ok(value)
            }
            Err(err) => {
                self.discard(&err.to_string());
                Err(err)
            }
        }
    }

    pub(crate) fn discard(&mut self, reason: &str) {
        if self.pending.take().is_some() {
            warn!(reason, "Discarding pending update");
        }
    }

    // State

    /// Replace the committed state wholesale, reconciling against the
    /// current one by snapshot comparison. Pending changes are dropped.
    #[instrument(skip_all, fields(namespace = %self.config.namespace))]
    pub fn set_state(&mut self, state: EditorState) -> EditorResult<bool> {
        self.discard("replaced by set_state");
        state.nodes().validate()?;
        let dirty = folio_model::DirtySet::between(self.state.nodes(), state.nodes());
        let (nodes, selection) = state.into_parts();
        self.commit(
            PendingState {
                nodes,
                selection,
                dirty,
                created: Default::default(),
            },
            true,
        )
    }

    pub fn parse_state(&self, json: &str) -> EditorResult<EditorState> {
        Ok(deserialize_state(json, &self.registry)?)
    }

    pub fn state_to_json(&self) -> EditorResult<String> {
        Ok(serialize_state(&self.state, &self.registry)?)
    }

    // View

    /// Attach a view host; it immediately receives the whole current tree
    pub fn attach_view(&mut self, host: impl ViewHost + 'static) -> EditorResult<()> {
        let mut host: Box<dyn ViewHost> = Box::new(host);
        let patches = mount(self.state.nodes(), &self.registry)?;
        host.apply_patches(&patches)?;
        let selection = resolve_selection(self.state.nodes(), self.state.nodes(), self.state.selection());
        host.set_selection(selection.as_ref());
        debug!(patches = patches.len(), "Mounted view");
        self.view = Some(host);
        Ok(())
    }

    pub fn detach_view(&mut self) -> Option<Box<dyn ViewHost>> {
        self.view.take()
    }

    // Listeners and transforms

    fn next_handle(&mut self) -> ListenerHandle {
        self.next_listener += 1;
        ListenerHandle(self.next_listener)
    }

    /// Run `transform` on every attached dirty node of `node_type` until
    /// the update settles
    pub fn register_node_transform<F>(&mut self, node_type: &str, transform: F) -> EditorResult<ListenerHandle>
    where
        F: Fn(&mut Transaction<'_>, &NodeKey) -> EditorResult<()> + 'static,
    {
        self.registry.resolve(node_type)?;
        let handle = self.next_handle();
        self.transforms.register(node_type, handle.0, transform);
        Ok(handle)
    }

    pub fn register_update_listener<F>(&mut self, listener: F) -> ListenerHandle
    where
        F: Fn(&UpdateEvent) + 'static,
    {
        let handle = self.next_handle();
        self.update_listeners.push((handle.0, Rc::new(listener)));
        handle
    }

    /// Called after commits that create, change or destroy nodes of `node_type`
    pub fn register_mutation_listener<F>(&mut self, node_type: &str, listener: F) -> EditorResult<ListenerHandle>
    where
        F: Fn(&MutationRecord, &UpdateEvent) + 'static,
    {
        self.registry.resolve(node_type)?;
        let handle = self.next_handle();
        self.mutation_listeners
            .push((handle.0, node_type.to_string(), Rc::new(listener)));
        Ok(handle)
    }

    /// Remove a transform or listener; false if the handle is unknown
    pub fn unregister(&mut self, handle: ListenerHandle) -> bool {
        let before = self.update_listeners.len() + self.mutation_listeners.len();
        self.update_listeners.retain(|(id, _)| *id != handle.0);
        self.mutation_listeners.retain(|(id, _, _)| *id != handle.0);
        let removed_listener = before != self.update_listeners.len() + self.mutation_listeners.len();
        self.transforms.unregister(handle.0) || removed_listener
    }

    // Commands

    pub fn register_command<P, F>(
        &mut self,
        command: &Command<P>,
        priority: CommandPriority,
        handler: F,
    ) -> EditorResult<CommandHandle>
    where
        P: 'static,
        F: Fn(&P, &mut Editor) -> bool + 'static,
    {
        let handler: CommandHandler<P> = Rc::new(handler);
        self.commands.register(command, priority, handler)
    }

    pub fn unregister_command(&mut self, handle: CommandHandle) -> EditorResult<bool> {
        self.commands.unregister(handle)
    }

    /// Offer `payload` to the handlers of `command`, highest priority
    /// first, until one reports it handled. Updates made by handlers are
    /// flushed together once dispatch ends.
    #[instrument(skip_all, fields(command = command.name()))]
    pub fn dispatch<P: 'static>(&mut self, command: &Command<P>, payload: &P) -> EditorResult<bool> {
        let handlers = self.commands.snapshot(command);
        if handlers.is_empty() {
            return Ok(false);
        }

        let id = command.id();
        self.commands.begin(id);
        let result = self.batch(|editor| Ok(handlers.iter().any(|handler| handler(payload, editor))));
        self.commands.end(id);

        let handled = result?;
        debug!(handled, handlers = handlers.len(), "Dispatched command");
        Ok(handled)
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("namespace", &self.config.namespace)
            .field("nodes", &self.state.nodes().len())
            .field("pending", &self.pending.is_some())
            .field("batch_depth", &self.batch_depth)
            .field("transforms", &self.transforms)
            .field("update_listeners", &self.update_listeners.len())
            .field("mutation_listeners", &self.mutation_listeners.len())
            .field("commands", &self.commands)
            .field("view", &self.view.is_some())
            .finish()
    }
}
