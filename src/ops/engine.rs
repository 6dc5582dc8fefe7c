use std::collections::HashSet;
use std::ops::Range;

use crate::model::config::SortPolicy;
use crate::model::item::{Item, ItemId};
use crate::model::store::{ItemRef, ItemStore, ListError};
use crate::ops::events::{diff, ChangeEvent, RowState};
use crate::ops::history::{ChangeKind, Command, Direction};
use crate::ops::ordering::Projection;

/// Outcome of a list mutation: its value, plus the command that reverses it
/// when anything changed.
#[derive(Debug)]
pub struct Applied<T> {
    pub value: T,
    pub command: Option<Command>,
}

impl<T> Applied<T> {
    fn new(value: T, command: Option<Command>) -> Self {
        Applied { value, command }
    }

    fn unchanged(value: T) -> Self {
        Applied {
            value,
            command: None,
        }
    }
}

/// The mutation API over an [`ItemStore`].
///
/// Every mutation runs inside a batch. When the outermost batch closes, the
/// flat view before and after is diffed into [`ChangeEvent`]s, collected
/// until [`ListEngine::take_events`]. A failed mutation leaves the store
/// exactly as it was.
#[derive(Debug, Default)]
pub struct ListEngine {
    store: ItemStore,
    projection: Projection,
    batch_depth: usize,
    batch_rows: Vec<RowState>,
    pending: Vec<ChangeEvent>,
}

impl ListEngine {
    pub fn new(policy: SortPolicy) -> Self {
        ListEngine {
            projection: Projection::new(policy),
            ..ListEngine::default()
        }
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn policy(&self) -> SortPolicy {
        self.projection.policy
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn get(&self, position: usize) -> Result<&Item, ListError> {
        self.store.get(position)
    }

    /// Build the item a plain "add" at `position` would create: a child when
    /// the row at or just before `position` is a child.
    pub fn new_item(&self, position: usize, body: impl Into<String>) -> Item {
        let is_child_at = |i: usize| self.store.get(i).is_ok_and(|item| item.is_child);
        let is_child = position > 0 && (is_child_at(position) || is_child_at(position - 1));
        Item {
            is_child,
            ..Item::new(body)
        }
    }

    // -----------------------------------------------------------------------
    // Batching and events
    // -----------------------------------------------------------------------

    pub fn begin_batch(&mut self) {
        if self.batch_depth == 0 {
            self.batch_rows = RowState::capture(&self.store);
        }
        self.batch_depth += 1;
    }

    pub fn end_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth > 0 {
            return;
        }
        let before = std::mem::take(&mut self.batch_rows);
        let after = RowState::capture(&self.store);
        self.pending.extend(diff(&before, &after));
        debug_assert!(
            self.store.validate().is_ok(),
            "{:?}",
            self.store.validate()
        );
    }

    /// Events collected since the last call, in replay order
    pub fn take_events(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Run `f` inside a batch, putting the store back if it fails
    fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ListError>,
    ) -> Result<T, ListError> {
        let saved = self.store.snapshot();
        self.begin_batch();
        let result = f(self);
        if result.is_err() {
            self.store.restore(saved);
        }
        self.end_batch();
        result
    }

    fn resort(&mut self) {
        self.projection.sort(&mut self.store);
    }

    fn position(&self, id: ItemId) -> Result<usize, ListError> {
        self.store.position_of(id).ok_or(ListError::UnknownId(id))
    }

    fn ids_at(&self, start: usize, count: usize) -> Result<Vec<ItemId>, ListError> {
        (start..start + count)
            .map(|i| self.store.get(i).map(|item| item.id))
            .collect()
    }

    fn snapshot_command(&self, kind: ChangeKind, before: Vec<Item>) -> Option<Command> {
        let after = self.store.snapshot();
        (before != after).then_some(Command::Snapshot {
            kind,
            before,
            after,
        })
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    /// Sort class of a row: under auto-sort, the checked state of its parent
    /// group, unless that group is being dragged. `None` matches any class.
    fn class_of(&self, row: ItemRef<'_>) -> Option<bool> {
        match self.projection.policy {
            SortPolicy::Manual => None,
            SortPolicy::AutoSortByChecked => {
                let head = row.parent.unwrap_or(row.item);
                (!head.dragged).then_some(head.checked)
            }
        }
    }

    /// Give a freshly placed run of rows orders matching where it now sits.
    ///
    /// The run takes the order of the first row after it in the same sort
    /// class, or follows the last such row before it. Orders at or above the
    /// chosen base shift up to make room, then everything is renumbered.
    fn place_orders(&mut self, run: &[ItemId]) {
        let Some(&head) = run.first() else {
            return;
        };
        let members: HashSet<ItemId> = run.iter().copied().collect();
        let rows: Vec<(ItemId, Option<usize>, Option<bool>)> = self
            .store
            .refs()
            .map(|r| (r.item.id, r.item.order, self.class_of(r)))
            .collect();
        let Some(start) = rows.iter().position(|(id, ..)| *id == head) else {
            return;
        };
        let class = rows[start].2;
        let same_class = |(id, _, c): &&(ItemId, Option<usize>, Option<bool>)| {
            !members.contains(id) && (class.is_none() || c.is_none() || *c == class)
        };

        let base = match rows[start..].iter().find(same_class).and_then(|r| r.1) {
            Some(order) => order,
            None => rows[..start]
                .iter()
                .rev()
                .find(same_class)
                .and_then(|r| r.1)
                .map_or(0, |order| order + 1),
        };

        self.store.shift_orders(base, run.len(), &members);
        for (i, id) in run.iter().enumerate() {
            if let Some(item) = self.store.item_mut(*id) {
                item.order = Some(base + i);
            }
        }
        self.store.renumber_orders();
    }

    /// Sync the checked flag of the group holding `id` and the group before it
    fn sync_around(&mut self, id: ItemId) {
        let Some(group) = self.store.group_of(id) else {
            return;
        };
        let heads: Vec<ItemId> = self.store.groups()[group.saturating_sub(1)..=group]
            .iter()
            .map(|g| g.id)
            .collect();
        for head in heads {
            self.store.sync_parent_checked(head);
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Replace the content with persisted items, repairing ids and orders.
    pub fn init(&mut self, items: Vec<Item>) {
        self.begin_batch();
        self.store = ItemStore::from_items(items);
        self.resort();
        self.end_batch();
    }

    /// Insert `item` (with its children) at `position`.
    /// Returns the position it ended up at after sorting.
    pub fn insert(&mut self, position: usize, item: Item) -> Result<Applied<usize>, ListError> {
        self.mutate(|engine| {
            let before = engine.store.snapshot();
            let rows = row_count(&item);
            let index = engine.store.insert(position, item)?;
            let run = engine.ids_at(index, rows)?;
            let id = run[0];
            engine.place_orders(&run);
            engine.sync_around(id);
            engine.resort();
            let position = engine.position(id)?;
            Ok(Applied::new(
                position,
                engine.snapshot_command(ChangeKind::Add, before),
            ))
        })
    }

    /// Delete the item at `position`, by default together with its children.
    ///
    /// The first item is only deleted with `force`. With `with_children`
    /// unset, a parent's children stay and join the parent before it.
    pub fn delete(
        &mut self,
        position: usize,
        with_children: bool,
        force: bool,
    ) -> Result<Applied<Item>, ListError> {
        self.mutate(|engine| {
            engine.store.get(position)?;
            if position == 0 && !force {
                return Err(ListError::RejectedDelete);
            }
            let before = engine.store.snapshot();
            let removed = if with_children {
                engine.store.remove_at(position)?
            } else {
                engine.store.remove_keeping_children(position)?
            };
            engine.store.renumber_orders();
            if let Ok(neighbour) = engine.store.get(position.saturating_sub(1)) {
                let id = neighbour.id;
                engine.store.sync_parent_checked(id);
            }
            engine.resort();
            Ok(Applied::new(
                removed,
                engine.snapshot_command(ChangeKind::Delete, before),
            ))
        })
    }

    /// Move the run at `from` so that it starts at `to` when moving up, or
    /// ends at `to` when moving down.
    ///
    /// A parent run is widened to whole groups; a child run must stay within
    /// its parent. Without `force_is_child` the run becomes a parent at the
    /// top, joins a child run it is dropped into, and otherwise keeps its
    /// classification. Returns `None` when the move is refused.
    pub fn move_range(
        &mut self,
        from: usize,
        count: usize,
        to: usize,
        force_is_child: Option<bool>,
    ) -> Result<Applied<Option<usize>>, ListError> {
        self.mutate(|engine| {
            let len = engine.store.len();
            let Some(run) = engine.move_run(from, count)? else {
                return Ok(Applied::unchanged(None));
            };
            if to >= len {
                return Err(ListError::NotFound { index: to, len });
            }
            if run.contains(&to) {
                tracing::debug!(from, to, "move target lies inside the moved run");
                return Ok(Applied::unchanged(None));
            }

            let before = engine.store.snapshot();
            let old_parent = engine
                .store
                .get(run.start)
                .ok()
                .and_then(|item| engine.store.find_parent_of(item.id))
                .map(|(_, parent)| parent.id);

            let mut rows = engine.store.flat_view();
            let mut moved: Vec<Item> = rows.drain(run.clone()).collect();
            let size = moved.len();
            let start = if to > run.start { to + 1 - size } else { to };

            if start == 0 {
                moved[0].is_child = false;
            } else if let Some(value) = force_is_child {
                if value {
                    moved.iter_mut().for_each(|r| r.is_child = true);
                } else {
                    moved[0].is_child = false;
                }
            } else if rows.get(start).is_some_and(|r| r.is_child) {
                moved.iter_mut().for_each(|r| r.is_child = true);
            }

            if engine.projection.policy == SortPolicy::AutoSortByChecked && !moved[0].dragged {
                if let Some(reason) = auto_sort_conflict(&rows[..start], &rows[start..], &moved) {
                    tracing::debug!(from, to, reason, "move refused");
                    return Ok(Applied::unchanged(None));
                }
            }

            let ids: Vec<ItemId> = moved.iter().map(|r| r.id).collect();
            rows.splice(start..start, moved);
            engine.store.rebuild(rows);
            engine.place_orders(&ids);
            if let Some(parent) = old_parent {
                engine.store.sync_parent_checked(parent);
            }
            engine.store.sync_parent_checked(ids[0]);
            engine.resort();
            let position = engine.position(ids[0])?;
            Ok(Applied::new(
                Some(position),
                engine.snapshot_command(ChangeKind::Move, before),
            ))
        })
    }

    /// The flat range a move starting at `from` covers
    fn move_run(&self, from: usize, count: usize) -> Result<Option<Range<usize>>, ListError> {
        let first = self.store.slot(from)?;
        let last_index = from
            .saturating_add(count.max(1) - 1)
            .min(self.store.len() - 1);
        let last = self.store.slot(last_index)?;
        if first.child.is_some() {
            if last.group != first.group {
                tracing::debug!(from, count, "child run would leave its parent");
                return Ok(None);
            }
            return Ok(Some(from..last_index + 1));
        }
        let end = self.store.group_start(last.group) + self.store.groups()[last.group].item_count();
        Ok(Some(from..end))
    }

    /// Make the item at `position` a child (absorb) or a parent (separate).
    /// The first item is never changed.
    pub fn set_is_child(
        &mut self,
        position: usize,
        value: bool,
        propagate: bool,
    ) -> Result<Applied<bool>, ListError> {
        self.mutate(|engine| {
            let id = engine.store.get(position)?.id;
            if position == 0 {
                return Ok(Applied::unchanged(false));
            }
            let before = engine.store.snapshot();
            let layout = layout_of(&engine.store);
            if !engine.reclassify(id, value, propagate)? {
                return Ok(Applied::unchanged(false));
            }
            let fine_grained = !propagate
                && layout_of(&engine.store) == layout
                && engine.reclassify_restores(id, !value, &before);
            let command = if fine_grained {
                Some(Command::IsChild {
                    id,
                    old: !value,
                    new: value,
                })
            } else {
                let kind = if value {
                    ChangeKind::Indent
                } else {
                    ChangeKind::Outdent
                };
                engine.snapshot_command(kind, before)
            };
            Ok(Applied::new(true, command))
        })
    }

    /// True when reclassifying `id` back to `value` on a scratch copy gives
    /// exactly `groups`. Parent checked sync can make the reverse lossy.
    fn reclassify_restores(&self, id: ItemId, value: bool, groups: &[Item]) -> bool {
        let mut scratch = ListEngine {
            store: self.store.clone(),
            projection: self.projection,
            ..ListEngine::default()
        };
        matches!(scratch.reclassify(id, value, false), Ok(true))
            && scratch.store.groups() == groups
    }

    fn reclassify(&mut self, id: ItemId, value: bool, propagate: bool) -> Result<bool, ListError> {
        let position = self.position(id)?;
        let old_parent = self.store.find_parent_of(id).map(|(_, parent)| parent.id);
        if !self.store.set_is_child(position, value, propagate)? {
            return Ok(false);
        }
        self.store.renumber_orders();
        if let Some(parent) = old_parent {
            self.store.sync_parent_checked(parent);
        }
        self.store.sync_parent_checked(id);
        self.resort();
        Ok(true)
    }

    /// Check or uncheck the item at `position`.
    ///
    /// A parent carries all its children along. A child updates its parent:
    /// unchecking one unchecks the parent, checking the last unchecked one
    /// checks it. Returns the item's position after sorting.
    pub fn set_checked(&mut self, position: usize, checked: bool) -> Result<Applied<usize>, ListError> {
        self.mutate(|engine| {
            let before = engine.store.snapshot();
            let item = engine.store.get_mut(position)?;
            let id = item.id;
            let is_child = item.is_child;
            if is_child {
                item.checked = checked;
            } else {
                item.check(checked, true);
            }
            if is_child {
                engine.store.sync_parent_checked(id);
            }
            engine.resort();
            let position = engine.position(id)?;
            Ok(Applied::new(
                position,
                engine.snapshot_command(ChangeKind::Checked, before),
            ))
        })
    }

    pub fn set_checked_for_all(&mut self, checked: bool) -> Result<Applied<()>, ListError> {
        self.mutate(|engine| {
            let before = engine.store.snapshot();
            for group in engine.store.groups_mut().iter_mut() {
                group.check(checked, true);
            }
            engine.resort();
            Ok(Applied::new(
                (),
                engine.snapshot_command(ChangeKind::CheckedForAll, before),
            ))
        })
    }

    /// Remove every checked parent with its children and every checked child
    /// of the parents that remain. Returns what was removed, in list order.
    pub fn delete_checked_items(&mut self) -> Result<Applied<Vec<Item>>, ListError> {
        self.mutate(|engine| {
            let before = engine.store.snapshot();
            let groups = std::mem::take(engine.store.groups_mut());
            let mut removed = Vec::new();
            let mut kept = Vec::with_capacity(groups.len());
            for mut group in groups {
                if group.checked {
                    removed.push(group);
                    continue;
                }
                let (gone, stay): (Vec<Item>, Vec<Item>) =
                    group.children.into_iter().partition(|c| c.checked);
                removed.extend(gone);
                group.children = stay;
                group.sync_checked_with_children();
                kept.push(group);
            }
            *engine.store.groups_mut() = kept;
            engine.store.renumber_orders();
            engine.resort();
            Ok(Applied::new(
                removed,
                engine.snapshot_command(ChangeKind::DeleteChecked, before),
            ))
        })
    }

    /// Replace the text of the item at `position`
    pub fn set_body(&mut self, position: usize, body: impl Into<String>) -> Result<Applied<()>, ListError> {
        let body = body.into();
        self.mutate(|engine| {
            let item = engine.store.get_mut(position)?;
            if item.body == body {
                return Ok(Applied::unchanged(()));
            }
            let old = std::mem::replace(&mut item.body, body.clone());
            Ok(Applied::new(
                (),
                Some(Command::Body {
                    id: item.id,
                    old,
                    new: body,
                }),
            ))
        })
    }

    /// Switch the sort policy; the view is re-sorted, orders are kept
    pub fn set_policy(&mut self, policy: SortPolicy) {
        self.begin_batch();
        self.projection.policy = policy;
        self.resort();
        self.end_batch();
    }

    /// Replace the content with a snapshot taken earlier
    pub fn restore(&mut self, groups: Vec<Item>) {
        self.begin_batch();
        self.store.restore(groups);
        self.resort();
        self.end_batch();
    }

    // -----------------------------------------------------------------------
    // Drag gestures
    // -----------------------------------------------------------------------

    /// Mark the item at `position` (and a parent's children) as dragged.
    /// Dragged parents sort by order alone and skip the auto-sort move checks.
    pub fn start_drag(&mut self, position: usize) -> Result<ItemId, ListError> {
        let slot = self.store.slot(position)?;
        let group = &mut self.store.groups_mut()[slot.group];
        let item = match slot.child {
            None => {
                group.children.iter_mut().for_each(|c| c.dragged = true);
                group
            }
            Some(c) => &mut group.children[c],
        };
        item.dragged = true;
        Ok(item.id)
    }

    /// Clear every drag mark and settle the view
    pub fn end_drag(&mut self) {
        self.begin_batch();
        for group in self.store.groups_mut().iter_mut() {
            group.dragged = false;
            group.children.iter_mut().for_each(|c| c.dragged = false);
        }
        self.resort();
        self.end_batch();
    }

    // -----------------------------------------------------------------------
    // History replay
    // -----------------------------------------------------------------------

    /// Replay a recorded command backwards (undo) or forwards (redo).
    /// Returns the position the view should focus.
    pub fn apply(&mut self, command: &Command, direction: Direction) -> Result<Option<usize>, ListError> {
        let first_event = self.pending.len();
        let focus = self.mutate(|engine| match command {
            Command::Snapshot { before, after, .. } => {
                let groups = match direction {
                    Direction::Undo => before,
                    Direction::Redo => after,
                };
                engine.store.restore(groups.clone());
                engine.resort();
                Ok(None)
            }
            Command::IsChild { id, old, new, .. } => {
                let value = match direction {
                    Direction::Undo => *old,
                    Direction::Redo => *new,
                };
                engine.reclassify(*id, value, false)?;
                engine.position(*id).map(Some)
            }
            Command::Body { id, old, new, .. } => {
                let position = engine.position(*id)?;
                engine.store.get_mut(position)?.body = match direction {
                    Direction::Undo => old.clone(),
                    Direction::Redo => new.clone(),
                };
                Ok(Some(position))
            }
        })?;
        Ok(focus.or_else(|| focus_of(&self.pending[first_event..], self.store.len())))
    }
}

/// Rows an item occupies once flattened
fn row_count(item: &Item) -> usize {
    1 + item.children.iter().map(row_count).sum::<usize>()
}

/// Flat sequence of ids with their checked state and order
fn layout_of(store: &ItemStore) -> Vec<(ItemId, bool, Option<usize>)> {
    store.iter().map(|i| (i.id, i.checked, i.order)).collect()
}

/// Why a move would break the auto-sort arrangement, if it would
fn auto_sort_conflict(above: &[Item], below: &[Item], moved: &[Item]) -> Option<&'static str> {
    let head = &moved[0];
    let parent_above = above.iter().rev().find(|r| !r.is_child);
    if head.is_child {
        let parent = parent_above?;
        return (parent.checked && moved.iter().any(|r| !r.checked))
            .then_some("unchecked item under a checked parent");
    }
    if !head.checked && parent_above.is_some_and(|p| p.checked) {
        return Some("unchecked item after a checked one");
    }
    let parent_below = below.iter().find(|r| !r.is_child);
    if head.checked && parent_below.is_some_and(|p| !p.checked) {
        return Some("checked item before an unchecked one");
    }
    None
}

/// First position touched by a batch of events
fn focus_of(events: &[ChangeEvent], len: usize) -> Option<usize> {
    let first = events.first()?;
    let position = match *first {
        ChangeEvent::Inserted { start, .. } | ChangeEvent::Updated { start, .. } => start,
        ChangeEvent::Moved { to, .. } => to,
        ChangeEvent::Removed { start, .. } => start.min(len.checked_sub(1)?),
    };
    Some(position)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::events::replay;
    use pretty_assertions::assert_eq;

    /// Six unchecked parents A..F
    fn six(policy: SortPolicy) -> ListEngine {
        let mut engine = ListEngine::new(policy);
        engine.init(["A", "B", "C", "D", "E", "F"].map(Item::new).to_vec());
        engine.take_events();
        engine
    }

    fn bodies(engine: &ListEngine) -> Vec<&str> {
        engine.store().iter().map(|i| i.body.as_str()).collect()
    }

    fn shape(engine: &ListEngine) -> Vec<String> {
        engine.store().groups().iter().map(|g| g.to_string()).collect()
    }

    fn orders(engine: &ListEngine) -> Vec<usize> {
        engine.store().iter().filter_map(|i| i.order).collect()
    }

    fn child(engine: &mut ListEngine, position: usize) {
        engine.set_is_child(position, true, false).unwrap();
    }

    // -----------------------------------------------------------------------
    // set_is_child
    // -----------------------------------------------------------------------

    #[test]
    fn set_is_child_builds_groups() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 1);
        assert_eq!(shape(&engine)[0], "[ ] A (B)");
        child(&mut engine, 2);
        assert_eq!(shape(&engine)[0], "[ ] A (B, C)");
        assert_eq!(orders(&engine), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn set_is_child_on_first_item_is_refused() {
        let mut engine = six(SortPolicy::Manual);
        let applied = engine.set_is_child(0, true, false).unwrap();
        assert!(!applied.value);
        assert!(applied.command.is_none());
    }

    #[test]
    fn set_is_child_records_fine_grained_command() {
        let mut engine = six(SortPolicy::Manual);
        let applied = engine.set_is_child(1, true, false).unwrap();
        let b = engine.get(1).unwrap().id;
        assert_eq!(
            applied.command,
            Some(Command::IsChild {
                id: b,
                old: false,
                new: true,
            })
        );
    }

    #[test]
    fn indent_undo_keeps_checked_parent_with_unchecked_child() {
        let mut engine = ListEngine::new(SortPolicy::Manual);
        engine.init(vec![
            Item::new("A"),
            Item::new("B").with_checked(true),
            Item::child("C"),
        ]);
        let before = shape(&engine);
        assert_eq!(before, vec!["[ ] A", "[x] B (C)"]);

        let command = engine.set_is_child(1, true, false).unwrap().command.unwrap();
        assert!(matches!(
            command,
            Command::Snapshot {
                kind: ChangeKind::Indent,
                ..
            }
        ));
        assert_eq!(shape(&engine), vec!["[ ] A (B, C)"]);

        engine.apply(&command, Direction::Undo).unwrap();
        assert_eq!(shape(&engine), before);
        engine.apply(&command, Direction::Redo).unwrap();
        assert_eq!(shape(&engine), vec!["[ ] A (B, C)"]);
    }

    #[test]
    fn outdent_with_propagate_records_outdent_snapshot() {
        let mut engine = six(SortPolicy::Manual);
        for i in 1..4 {
            child(&mut engine, i);
        }
        let command = engine.set_is_child(2, false, true).unwrap().command.unwrap();
        assert_eq!(command.label(), "outdent");
    }

    #[test]
    fn separate_takes_following_children() {
        let mut engine = six(SortPolicy::Manual);
        for i in 1..4 {
            child(&mut engine, i);
        }
        engine.set_is_child(2, false, false).unwrap();
        assert_eq!(shape(&engine)[..2], ["[ ] A (B)", "[ ] C (D)"]);

        let applied = engine.set_is_child(1, false, true).unwrap();
        assert!(matches!(applied.command, Some(Command::Snapshot { .. })));
        assert_eq!(shape(&engine)[..3], ["[ ] A", "[ ] B", "[ ] C (D)"]);
    }

    #[test]
    fn absorbing_into_checked_parent_unchecks_it() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 1);
        engine.set_checked(0, true).unwrap();
        child(&mut engine, 2);
        assert_eq!(shape(&engine)[0], "[ ] A (B, C)");
        assert!(engine.get(1).unwrap().checked);
    }

    // -----------------------------------------------------------------------
    // insert / delete
    // -----------------------------------------------------------------------

    #[test]
    fn insert_places_orders_at_the_insertion_point() {
        let mut engine = six(SortPolicy::Manual);
        let applied = engine.insert(2, Item::new("X")).unwrap();
        assert_eq!(applied.value, 2);
        assert!(matches!(
            applied.command,
            Some(Command::Snapshot {
                kind: ChangeKind::Add,
                ..
            })
        ));
        assert_eq!(bodies(&engine), vec!["A", "B", "X", "C", "D", "E", "F"]);
        assert_eq!(orders(&engine), vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn insert_item_with_children() {
        let mut engine = six(SortPolicy::Manual);
        let item = Item::new("P").with_children(vec![Item::child("Q"), Item::child("R")]);
        engine.insert(1, item).unwrap();
        assert_eq!(shape(&engine)[..2], ["[ ] A", "[ ] P (Q, R)"]);
        engine.store().validate().unwrap();
    }

    #[test]
    fn insert_unchecked_child_unchecks_parent() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 1);
        engine.set_checked(0, true).unwrap();
        engine.insert(2, Item::child("X")).unwrap();
        assert_eq!(shape(&engine)[0], "[ ] A (B, X)");
    }

    #[test]
    fn insert_checked_item_under_auto_sort_sinks() {
        let mut engine = six(SortPolicy::AutoSortByChecked);
        let position = engine.insert(1, Item::new("X").with_checked(true)).unwrap().value;
        assert_eq!(position, 6);
        assert_eq!(bodies(&engine), vec!["A", "B", "C", "D", "E", "F", "X"]);
    }

    #[test]
    fn new_item_inherits_child_run() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 2);
        // A, B(C), D, E, F
        assert!(!engine.new_item(0, "X").is_child);
        assert!(!engine.new_item(1, "X").is_child);
        assert!(engine.new_item(2, "X").is_child);
        assert!(engine.new_item(3, "X").is_child);
        assert!(!engine.new_item(4, "X").is_child);
    }

    #[test]
    fn delete_first_item_requires_force() {
        let mut engine = six(SortPolicy::Manual);
        assert_eq!(
            engine.delete(0, true, false).unwrap_err(),
            ListError::RejectedDelete
        );
        assert_eq!(engine.len(), 6);
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn delete_first_group_with_force() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 1);
        child(&mut engine, 2);
        let removed = engine.delete(0, true, true).unwrap().value;
        assert_eq!(removed.to_string(), "[ ] A (B, C)");
        assert_eq!(bodies(&engine), vec!["D", "E", "F"]);
        assert_eq!(orders(&engine), vec![0, 1, 2]);
    }

    #[test]
    fn delete_at_invalid_position() {
        let mut engine = six(SortPolicy::Manual);
        assert_eq!(
            engine.delete(10, true, true).unwrap_err(),
            ListError::NotFound { index: 10, len: 6 }
        );
    }

    #[test]
    fn delete_unchecked_child_checks_parent() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 2);
        child(&mut engine, 3);
        engine.set_checked(2, true).unwrap();
        engine.delete(3, true, false).unwrap();
        assert_eq!(shape(&engine)[1], "[x] B (C)");
        assert!(engine.get(2).unwrap().checked);
    }

    #[test]
    fn delete_unchecked_child_under_auto_sort_moves_group() {
        let mut engine = six(SortPolicy::AutoSortByChecked);
        child(&mut engine, 2);
        child(&mut engine, 3);
        engine.set_checked(2, true).unwrap();
        engine.delete(3, true, false).unwrap();
        assert_eq!(bodies(&engine), vec!["A", "E", "F", "B", "C"]);
    }

    #[test]
    fn delete_keeping_children() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 2);
        child(&mut engine, 3);
        let removed = engine.delete(1, false, false).unwrap().value;
        assert!(removed.children.is_empty());
        assert_eq!(shape(&engine)[0], "[ ] A (C, D)");
    }

    #[test]
    fn delete_checked_items_removes_groups_and_children() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 2);
        child(&mut engine, 3);
        engine.set_checked(0, true).unwrap();
        engine.set_checked(2, true).unwrap();
        engine.set_checked(4, true).unwrap();
        // [x]A, B([x]C, D), [x]E, F
        let removed = engine.delete_checked_items().unwrap().value;
        let removed: Vec<&str> = removed.iter().map(|i| i.body.as_str()).collect();
        assert_eq!(removed, vec!["A", "C", "E"]);
        assert_eq!(shape(&engine), vec!["[ ] B (D)", "[ ] F"]);
        assert_eq!(orders(&engine), vec![0, 1, 2]);
    }

    // -----------------------------------------------------------------------
    // set_checked
    // -----------------------------------------------------------------------

    #[test]
    fn check_parent_cascades() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 1);
        child(&mut engine, 2);
        engine.set_checked(0, true).unwrap();
        assert!(engine.store().iter().take(3).all(|i| i.checked));
        engine.set_checked(0, false).unwrap();
        assert!(engine.store().iter().all(|i| !i.checked));
    }

    #[test]
    fn auto_sort_check_moves_item_to_bottom() {
        let mut engine = six(SortPolicy::AutoSortByChecked);
        let position = engine.set_checked(0, true).unwrap().value;
        assert_eq!(position, 5);
        assert_eq!(bodies(&engine), vec!["B", "C", "D", "E", "F", "A"]);
        // orders keep the manual arrangement
        let a = engine.store().find_by_id(engine.get(5).unwrap().id).unwrap().1;
        assert_eq!(a.order, Some(0));
    }

    #[test]
    fn checking_last_child_checks_parent_and_keeps_orders() {
        let mut engine = six(SortPolicy::AutoSortByChecked);
        child(&mut engine, 1);
        engine.set_checked(1, true).unwrap();
        // the group is checked as a whole and sinks together
        assert_eq!(shape(&engine)[4], "[x] A (B)");
        let a = &engine.store().groups()[4];
        assert_eq!((a.order, a.children[0].order), (Some(0), Some(1)));
    }

    #[test]
    fn unchecking_child_unchecks_parent() {
        let mut engine = six(SortPolicy::AutoSortByChecked);
        child(&mut engine, 2);
        child(&mut engine, 3);
        engine.set_checked(1, true).unwrap();
        // A, E, F, [x]B(C, D)
        let position = engine.store().position_of(engine.get(4).unwrap().id).unwrap();
        engine.set_checked(position, false).unwrap();
        assert_eq!(bodies(&engine), vec!["A", "B", "C", "D", "E", "F"]);
        assert_eq!(shape(&engine)[1], "[ ] B (C, D)");
        assert!(engine.get(3).unwrap().checked);
    }

    #[test]
    fn checking_parent_with_checked_item_between() {
        let mut engine = six(SortPolicy::AutoSortByChecked);
        engine.set_checked(2, true).unwrap();
        // A, B, D, E, F, [x]C
        child(&mut engine, 2);
        // A, B(D), E, F, [x]C
        engine.set_checked(1, true).unwrap();
        assert_eq!(bodies(&engine), vec!["A", "E", "F", "B", "D", "C"]);
    }

    #[test]
    fn check_all_and_uncheck_all() {
        let mut engine = six(SortPolicy::AutoSortByChecked);
        engine.set_checked(1, true).unwrap();
        engine.set_checked_for_all(true).unwrap();
        assert!(engine.store().iter().all(|i| i.checked));
        assert_eq!(bodies(&engine), vec!["A", "B", "C", "D", "E", "F"]);
        engine.set_checked_for_all(false).unwrap();
        assert!(engine.store().iter().all(|i| !i.checked));
    }

    #[test]
    fn unchanged_check_records_nothing() {
        let mut engine = six(SortPolicy::Manual);
        let applied = engine.set_checked(3, false).unwrap();
        assert!(applied.command.is_none());
    }

    // -----------------------------------------------------------------------
    // move_range
    // -----------------------------------------------------------------------

    #[test]
    fn move_parent_without_children() {
        let mut engine = six(SortPolicy::Manual);
        let position = engine.move_range(3, 1, 1, None).unwrap().value;
        assert_eq!(position, Some(1));
        assert_eq!(bodies(&engine), vec!["A", "D", "B", "C", "E", "F"]);
        assert_eq!(orders(&engine), vec![0, 1, 2, 3, 4, 5]);

        let position = engine.move_range(1, 1, 3, None).unwrap().value;
        assert_eq!(position, Some(3));
        assert_eq!(bodies(&engine), vec!["A", "B", "C", "D", "E", "F"]);
    }

    #[test]
    fn move_with_huge_count_takes_the_rest_of_the_list() {
        let mut engine = six(SortPolicy::Manual);
        let position = engine.move_range(1, usize::MAX, 0, None).unwrap().value;
        assert_eq!(position, Some(0));
        assert_eq!(bodies(&engine), vec!["B", "C", "D", "E", "F", "A"]);
        assert_eq!(orders(&engine), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn move_parent_with_children_into_other_parent() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 1);
        child(&mut engine, 2);
        child(&mut engine, 4);
        // A(B, C), D(E), F
        let position = engine.move_range(3, 1, 2, None).unwrap().value;
        assert_eq!(position, Some(2));
        assert_eq!(bodies(&engine), vec!["A", "B", "D", "E", "C", "F"]);
        assert_eq!(shape(&engine)[0], "[ ] A (B, D, E, C)");
    }

    #[test]
    fn move_parent_with_children_to_bottom() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 1);
        child(&mut engine, 2);
        let position = engine.move_range(0, 1, 5, None).unwrap().value;
        assert_eq!(position, Some(3));
        assert_eq!(bodies(&engine), vec!["D", "E", "F", "A", "B", "C"]);
        assert_eq!(shape(&engine)[3], "[ ] A (B, C)");
    }

    #[test]
    fn move_parent_with_children_to_top() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 1);
        child(&mut engine, 4);
        engine.insert(0, Item::new("G")).unwrap();
        // G, A(B), C, D(E), F
        let position = engine.move_range(4, 1, 0, None).unwrap().value;
        assert_eq!(position, Some(0));
        assert_eq!(bodies(&engine), vec!["D", "E", "G", "A", "B", "C", "F"]);
        assert_eq!(shape(&engine)[0], "[ ] D (E)");
    }

    #[test]
    fn move_child_to_other_parent() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 3);
        let position = engine.move_range(3, 1, 1, None).unwrap().value;
        assert_eq!(position, Some(1));
        assert_eq!(bodies(&engine), vec!["A", "D", "B", "C", "E", "F"]);
        assert_eq!(shape(&engine)[..3], ["[ ] A (D)", "[ ] B", "[ ] C"]);
    }

    #[test]
    fn move_child_above_other_child() {
        let mut engine = six(SortPolicy::Manual);
        for i in 3..6 {
            child(&mut engine, i);
        }
        let position = engine.move_range(5, 1, 3, None).unwrap().value;
        assert_eq!(position, Some(3));
        assert_eq!(shape(&engine)[2], "[ ] C (F, D, E)");
    }

    #[test]
    fn move_child_to_top_becomes_parent() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 3);
        engine.move_range(3, 1, 0, None).unwrap();
        assert_eq!(bodies(&engine), vec!["D", "A", "B", "C", "E", "F"]);
        assert!(!engine.get(0).unwrap().is_child);
        assert_eq!(shape(&engine)[3], "[ ] C");
    }

    #[test]
    fn move_into_own_children_is_refused() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 3);
        child(&mut engine, 4);
        let applied = engine.move_range(2, 1, 3, None).unwrap();
        assert_eq!(applied.value, None);
        assert!(applied.command.is_none());
        assert_eq!(shape(&engine)[2], "[ ] C (D, E)");
    }

    #[test]
    fn child_run_cannot_cross_its_parent() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 1);
        assert_eq!(engine.move_range(1, 2, 4, None).unwrap().value, None);
    }

    #[test]
    fn move_under_checked_item_is_refused_with_auto_sort() {
        let mut engine = six(SortPolicy::AutoSortByChecked);
        engine.set_checked(5, true).unwrap();
        let applied = engine.move_range(2, 1, 5, None).unwrap();
        assert_eq!(applied.value, None);
        assert_eq!(bodies(&engine), vec!["A", "B", "C", "D", "E", "F"]);
    }

    #[test]
    fn move_with_forced_child() {
        let mut engine = six(SortPolicy::Manual);
        engine.move_range(4, 1, 2, Some(true)).unwrap();
        assert_eq!(shape(&engine)[1], "[ ] B (E)");
    }

    #[test]
    fn move_to_invalid_position() {
        let mut engine = six(SortPolicy::Manual);
        assert_eq!(
            engine.move_range(1, 1, 6, None).unwrap_err(),
            ListError::NotFound { index: 6, len: 6 }
        );
    }

    // -----------------------------------------------------------------------
    // set_body, policy, drag
    // -----------------------------------------------------------------------

    #[test]
    fn set_body_records_text_change() {
        let mut engine = six(SortPolicy::Manual);
        let applied = engine.set_body(2, "Cee").unwrap();
        let id = engine.get(2).unwrap().id;
        assert_eq!(
            applied.command,
            Some(Command::Body {
                id,
                old: "C".into(),
                new: "Cee".into(),
            })
        );
        assert_eq!(
            engine.take_events(),
            vec![ChangeEvent::Updated { start: 2, count: 1 }]
        );
    }

    #[test]
    fn switching_policy_resorts_without_touching_orders() {
        let mut engine = six(SortPolicy::Manual);
        engine.set_checked(0, true).unwrap();
        engine.set_policy(SortPolicy::AutoSortByChecked);
        assert_eq!(bodies(&engine), vec!["B", "C", "D", "E", "F", "A"]);
        engine.set_policy(SortPolicy::Manual);
        assert_eq!(bodies(&engine), vec!["A", "B", "C", "D", "E", "F"]);
        assert_eq!(orders(&engine), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn dragged_checked_item_can_pass_unchecked_items() {
        let mut engine = six(SortPolicy::AutoSortByChecked);
        engine.set_checked(5, true).unwrap();
        engine.start_drag(5).unwrap();
        assert_eq!(engine.move_range(5, 1, 1, None).unwrap().value, Some(1));
        assert_eq!(bodies(&engine), vec!["A", "F", "B", "C", "D", "E"]);
        engine.end_drag();
        assert_eq!(bodies(&engine), vec!["A", "B", "C", "D", "E", "F"]);
        assert_eq!(engine.get(5).unwrap().order, Some(1));
    }

    // -----------------------------------------------------------------------
    // events and replay
    // -----------------------------------------------------------------------

    #[test]
    fn events_replay_to_new_view() {
        let mut engine = six(SortPolicy::AutoSortByChecked);
        child(&mut engine, 2);
        engine.take_events();
        let before = RowState::capture(engine.store());
        engine.set_checked(1, true).unwrap();
        let after = RowState::capture(engine.store());
        let events = engine.take_events();
        assert!(!events.is_empty());
        assert_eq!(replay(&before, &after, &events), after);
    }

    #[test]
    fn failed_mutation_emits_nothing() {
        let mut engine = six(SortPolicy::Manual);
        let _ = engine.set_checked(9, true);
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn apply_snapshot_both_ways() {
        let mut engine = six(SortPolicy::Manual);
        let command = engine.move_range(3, 1, 1, None).unwrap().command.unwrap();
        engine.take_events();

        let focus = engine.apply(&command, Direction::Undo).unwrap();
        assert_eq!(bodies(&engine), vec!["A", "B", "C", "D", "E", "F"]);
        assert!(focus.is_some());

        engine.apply(&command, Direction::Redo).unwrap();
        assert_eq!(bodies(&engine), vec!["A", "D", "B", "C", "E", "F"]);
    }

    #[test]
    fn apply_is_child_both_ways() {
        let mut engine = six(SortPolicy::Manual);
        child(&mut engine, 2);
        let command = engine.set_is_child(1, true, false).unwrap().command.unwrap();
        assert_eq!(shape(&engine)[0], "[ ] A (B, C)");

        assert_eq!(engine.apply(&command, Direction::Undo).unwrap(), Some(1));
        assert_eq!(shape(&engine)[..2], ["[ ] A", "[ ] B (C)"]);

        engine.apply(&command, Direction::Redo).unwrap();
        assert_eq!(shape(&engine)[0], "[ ] A (B, C)");
    }

    #[test]
    fn init_repairs_duplicate_ids_and_missing_orders() {
        let mut engine = ListEngine::new(SortPolicy::Manual);
        let mut a = Item::new("A");
        a.order = Some(3);
        engine.init(vec![a, Item::new("B"), Item::child("C")]);
        let ids: HashSet<ItemId> = engine.store().iter().map(|i| i.id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(orders(&engine), vec![0, 1, 2]);
        assert_eq!(shape(&engine), vec!["[ ] A", "[ ] B (C)"]);
    }
}
