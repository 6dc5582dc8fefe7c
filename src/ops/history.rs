use serde::Serialize;

use crate::model::config::ListConfig;
use crate::model::item::{Item, ItemId};
use crate::model::store::ListError;
use crate::ops::engine::ListEngine;

/// Error type for undo/redo
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("there is no change to undo")]
    NoChangeToUndo,
    #[error("there is no change to redo")]
    NoChangeToRedo,
    #[error(transparent)]
    Apply(#[from] ListError),
}

/// Which way a command is replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Undo,
    Redo,
}

/// What kind of edit a snapshot command records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Add,
    Delete,
    Move,
    Checked,
    CheckedForAll,
    DeleteChecked,
    Indent,
    Outdent,
}

/// A single undoable change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// An item became a child or a parent, with nothing else affected
    IsChild {
        id: ItemId,
        old: bool,
        new: bool,
    },
    /// An item's text was edited
    Body {
        id: ItemId,
        old: String,
        new: String,
    },
    /// Any other edit: the whole list before and after
    Snapshot {
        kind: ChangeKind,
        before: Vec<Item>,
        after: Vec<Item>,
    },
}

impl Command {
    /// Short label for messages
    pub fn label(&self) -> &'static str {
        match self {
            Command::IsChild { new: true, .. } => "indent",
            Command::IsChild { new: false, .. } => "outdent",
            Command::Body { .. } => "edit",
            Command::Snapshot { kind, .. } => match kind {
                ChangeKind::Add => "add",
                ChangeKind::Delete => "delete",
                ChangeKind::Move => "move",
                ChangeKind::Checked => "check",
                ChangeKind::CheckedForAll => "check all",
                ChangeKind::DeleteChecked => "delete checked",
                ChangeKind::Indent => "indent",
                ChangeKind::Outdent => "outdent",
            },
        }
    }
}

/// Linear undo/redo log.
///
/// `cursor` counts the commands currently applied: undo steps it back, redo
/// steps it forward, and a new push drops everything past it.
#[derive(Debug)]
pub struct ChangeHistory {
    stack: Vec<Command>,
    cursor: usize,
    limit: usize,
}

impl Default for ChangeHistory {
    fn default() -> Self {
        Self::new(ListConfig::default().history_limit)
    }
}

impl ChangeHistory {
    pub fn new(limit: usize) -> Self {
        ChangeHistory {
            stack: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record a change. Anything that was undone is no longer redoable.
    pub fn push(&mut self, command: Command) {
        tracing::debug!(change = command.label(), "recording change");
        self.stack.truncate(self.cursor);
        self.stack.push(command);
        if self.stack.len() > self.limit {
            self.stack.drain(..self.stack.len() - self.limit);
        }
        self.cursor = self.stack.len();
    }

    /// Revert the last applied change. Returns the position to focus.
    pub fn undo(&mut self, engine: &mut ListEngine) -> Result<Option<usize>, HistoryError> {
        if self.cursor == 0 {
            return Err(HistoryError::NoChangeToUndo);
        }
        let command = &self.stack[self.cursor - 1];
        tracing::debug!(change = command.label(), "undo");
        let focus = engine.apply(command, Direction::Undo)?;
        self.cursor -= 1;
        Ok(focus)
    }

    /// Re-apply the last undone change. Returns the position to focus.
    pub fn redo(&mut self, engine: &mut ListEngine) -> Result<Option<usize>, HistoryError> {
        let Some(command) = self.stack.get(self.cursor) else {
            return Err(HistoryError::NoChangeToRedo);
        };
        tracing::debug!(change = command.label(), "redo");
        let focus = engine.apply(command, Direction::Redo)?;
        self.cursor += 1;
        Ok(focus)
    }

    pub fn reset(&mut self) {
        self.stack.clear();
        self.cursor = 0;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.stack.len()
    }

    /// The change the next undo would revert
    pub fn peek_undo(&self) -> Option<&Command> {
        self.cursor.checked_sub(1).and_then(|i| self.stack.get(i))
    }

    /// The change the next redo would re-apply
    pub fn peek_redo(&self) -> Option<&Command> {
        self.stack.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
