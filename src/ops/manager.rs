use crate::model::config::{ListConfig, SortPolicy};
use crate::model::item::{Item, ItemId};
use crate::model::store::{ItemStore, ListError};
use crate::ops::engine::{Applied, ListEngine};
use crate::ops::events::ChangeEvent;
use crate::ops::history::{ChangeHistory, ChangeKind, Command, HistoryError};

/// Receives change events after every edit, undo or redo
pub trait ChangeListener {
    fn on_change(&mut self, event: &ChangeEvent);
}

impl<F: FnMut(&ChangeEvent)> ChangeListener for F {
    fn on_change(&mut self, event: &ChangeEvent) {
        self(event)
    }
}

/// Result of a delete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(Item),
    /// The first item was kept; focus moves to the given position instead
    Redirected { focus: usize },
}

/// A drag gesture in progress
#[derive(Debug)]
struct Drag {
    id: ItemId,
    before: Vec<Item>,
}

/// Coordinates a list: turns user intents into engine calls, records their
/// commands for undo, and forwards the resulting events to listeners.
pub struct ListManager {
    engine: ListEngine,
    history: ChangeHistory,
    listeners: Vec<Box<dyn ChangeListener>>,
    drag: Option<Drag>,
}

impl Default for ListManager {
    fn default() -> Self {
        Self::with_config(&ListConfig::default())
    }
}

impl ListManager {
    pub fn new(policy: SortPolicy, history_limit: usize) -> Self {
        ListManager {
            engine: ListEngine::new(policy),
            history: ChangeHistory::new(history_limit),
            listeners: Vec::new(),
            drag: None,
        }
    }

    pub fn with_config(config: &ListConfig) -> Self {
        Self::new(config.sort, config.history_limit)
    }

    /// Register a listener for change events
    pub fn subscribe(&mut self, listener: impl ChangeListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Load items, repairing ids and orders; clears history
    pub fn init(&mut self, items: Vec<Item>) {
        self.engine.init(items);
        self.history.reset();
        self.drag = None;
        self.notify();
    }

    pub fn items(&self) -> &ItemStore {
        self.engine.store()
    }

    pub fn policy(&self) -> SortPolicy {
        self.engine.policy()
    }

    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &ChangeHistory {
        &self.history
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    /// Add a new item with `body` at `position`, joining the child run it
    /// lands in. Returns the item's position after sorting.
    pub fn add(&mut self, position: usize, body: impl Into<String>) -> Result<usize, ListError> {
        let item = self.engine.new_item(position, body);
        self.add_item(position, item)
    }

    /// Add `item` (and its children) at `position`
    pub fn add_item(&mut self, position: usize, item: Item) -> Result<usize, ListError> {
        let applied = self.engine.insert(position, item);
        self.record(applied)
    }

    /// Delete the item at `position`. Asking to delete the first item
    /// without `force` deletes nothing and redirects focus to the next one.
    pub fn delete(
        &mut self,
        position: usize,
        with_children: bool,
        force: bool,
    ) -> Result<DeleteOutcome, ListError> {
        match self.engine.delete(position, with_children, force) {
            Err(ListError::RejectedDelete) => {
                let focus = if self.len() > 1 { 1 } else { 0 };
                tracing::debug!(focus, "first item kept, moving focus");
                self.notify();
                Ok(DeleteOutcome::Redirected { focus })
            }
            applied => self.record(applied).map(DeleteOutcome::Deleted),
        }
    }

    /// Move a run; see [`ListEngine::move_range`]
    pub fn move_item(
        &mut self,
        from: usize,
        count: usize,
        to: usize,
    ) -> Result<Option<usize>, ListError> {
        let applied = self.engine.move_range(from, count, to, None);
        self.record(applied)
    }

    pub fn set_is_child(
        &mut self,
        position: usize,
        value: bool,
        propagate: bool,
    ) -> Result<bool, ListError> {
        let applied = self.engine.set_is_child(position, value, propagate);
        self.record(applied)
    }

    pub fn change_checked(&mut self, position: usize, checked: bool) -> Result<usize, ListError> {
        let applied = self.engine.set_checked(position, checked);
        self.record(applied)
    }

    pub fn change_checked_for_all(&mut self, checked: bool) -> Result<(), ListError> {
        let applied = self.engine.set_checked_for_all(checked);
        self.record(applied)
    }

    pub fn delete_checked(&mut self) -> Result<Vec<Item>, ListError> {
        let applied = self.engine.delete_checked_items();
        self.record(applied)
    }

    pub fn change_text(&mut self, position: usize, body: impl Into<String>) -> Result<(), ListError> {
        let applied = self.engine.set_body(position, body);
        self.record(applied)
    }

    /// Switch the sort policy; not recorded in history
    pub fn set_policy(&mut self, policy: SortPolicy) {
        self.engine.set_policy(policy);
        self.notify();
    }

    // -----------------------------------------------------------------------
    // Drag gestures
    // -----------------------------------------------------------------------

    /// Begin dragging the item at `position`. Only one drag runs at a time.
    pub fn start_drag(&mut self, position: usize) -> Result<(), ListError> {
        if self.drag.is_some() {
            return Err(ListError::DragInProgress);
        }
        let before = self.engine.store().snapshot();
        let id = self.engine.start_drag(position)?;
        self.drag = Some(Drag { id, before });
        Ok(())
    }

    /// Move the dragged run one step; nothing is recorded until the drag ends
    pub fn drag_move(&mut self, from: usize, to: usize) -> Result<Option<usize>, ListError> {
        if self.drag.is_none() {
            return Err(ListError::NoDrag);
        }
        let applied = self.engine.move_range(from, 1, to, None);
        self.notify();
        applied.map(|a| a.value)
    }

    /// Settle the drag and record it as a single move.
    /// Returns where the dragged item ended up.
    pub fn end_drag(&mut self) -> Option<usize> {
        self.engine.end_drag();
        let drag = self.drag.take()?;
        let after = self.engine.store().snapshot();
        if after != drag.before {
            self.history.push(Command::Snapshot {
                kind: ChangeKind::Move,
                before: drag.before,
                after,
            });
        }
        self.notify();
        self.engine.store().position_of(drag.id)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Undo the last change. Returns the position to focus.
    pub fn undo(&mut self) -> Result<Option<usize>, HistoryError> {
        let focus = self.history.undo(&mut self.engine);
        self.notify();
        focus
    }

    /// Redo the last undone change. Returns the position to focus.
    pub fn redo(&mut self) -> Result<Option<usize>, HistoryError> {
        let focus = self.history.redo(&mut self.engine);
        self.notify();
        focus
    }

    fn record<T>(&mut self, applied: Result<Applied<T>, ListError>) -> Result<T, ListError> {
        let result = applied.map(|applied| {
            if let Some(command) = applied.command {
                self.history.push(command);
            }
            applied.value
        });
        self.notify();
        result
    }

    fn notify(&mut self) {
        let events = self.engine.take_events();
        for event in &events {
            for listener in &mut self.listeners {
                listener.on_change(event);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
