use std::collections::HashSet;

use crate::model::item::{Item, ItemId};

/// Error type for list operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    #[error("no item at position {index} (list has {len} items)")]
    NotFound { index: usize, len: usize },
    #[error("no item with id {0}")]
    UnknownId(ItemId),
    #[error("the first item cannot be deleted")]
    RejectedDelete,
    #[error("a drag is already in progress")]
    DragInProgress,
    #[error("no drag in progress")]
    NoDrag,
}

/// A broken structural invariant, reported by [`ItemStore::validate`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("store invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// Where a flat-view row lives inside the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Index of the parent group
    pub group: usize,
    /// Index within the group's children, `None` for the parent itself
    pub child: Option<usize>,
}

/// A row of the flat view together with its parent, if it is a child
#[derive(Debug, Clone, Copy)]
pub struct ItemRef<'a> {
    pub item: &'a Item,
    pub parent: Option<&'a Item>,
}

/// The collection of checklist items.
///
/// Stored as a list of parent groups, each parent owning its children, so the
/// children of a parent are always the rows directly following it in the
/// flat view.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    groups: Vec<Item>,
    next_id: u32,
}

impl ItemStore {
    pub fn new() -> Self {
        ItemStore::default()
    }

    /// Build a store from persisted items, flat or nested.
    ///
    /// Parent associations are rebuilt from position, duplicate ids get fresh
    /// ones, and orders are reassigned from the sequence when any is missing
    /// or repeated. Checked flags are kept as given.
    pub fn from_items(items: Vec<Item>) -> Self {
        let mut rows = flatten(items);

        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            if !seen.insert(row.id) {
                duplicates.push(i);
            }
        }
        let mut next_id = rows.iter().map(|r| r.id.0 + 1).max().unwrap_or(0);
        if !duplicates.is_empty() {
            tracing::debug!(count = duplicates.len(), "assigning ids to items with duplicate ids");
        }
        for i in duplicates {
            rows[i].id = ItemId(next_id);
            next_id += 1;
        }

        let mut orders = HashSet::new();
        let orders_valid = rows
            .iter()
            .all(|r| r.order.is_some_and(|o| orders.insert(o)));
        if !orders_valid {
            if rows.iter().any(|r| r.order.is_some()) {
                tracing::warn!("item orders missing or repeated, reassigning from list position");
            }
            for (i, row) in rows.iter_mut().enumerate() {
                row.order = Some(i);
            }
        }

        let mut store = ItemStore {
            groups: group_rows(rows),
            next_id,
        };
        store.renumber_orders();
        store
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Number of rows in the flat view
    pub fn len(&self) -> usize {
        self.groups.iter().map(Item::item_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The parents, each owning its children
    pub fn groups(&self) -> &[Item] {
        &self.groups
    }

    /// Rows of the flat view, each parent followed by its children
    pub fn iter(&self) -> impl Iterator<Item = &Item> + '_ {
        self.groups
            .iter()
            .flat_map(|g| std::iter::once(g).chain(g.children.iter()))
    }

    /// Rows of the flat view paired with their parents
    pub fn refs(&self) -> impl Iterator<Item = ItemRef<'_>> + '_ {
        self.groups.iter().flat_map(|g| {
            std::iter::once(ItemRef {
                item: g,
                parent: None,
            })
            .chain(g.children.iter().map(move |c| ItemRef {
                item: c,
                parent: Some(g),
            }))
        })
    }

    /// Deep copy of the flat view with children detached from their parents
    pub fn flat_view(&self) -> Vec<Item> {
        self.iter()
            .map(|item| Item {
                children: Vec::new(),
                ..item.clone()
            })
            .collect()
    }

    /// Rows in manual arrangement (ascending order)
    pub fn manual_sequence(&self) -> Vec<&Item> {
        let mut rows: Vec<&Item> = self.iter().collect();
        rows.sort_by_key(|r| r.order.unwrap_or(usize::MAX));
        rows
    }

    /// Locate a flat-view index in the tree
    pub fn slot(&self, index: usize) -> Result<Slot, ListError> {
        let mut start = 0;
        for (group, item) in self.groups.iter().enumerate() {
            let count = item.item_count();
            if index < start + count {
                let child = (index > start).then(|| index - start - 1);
                return Ok(Slot { group, child });
            }
            start += count;
        }
        Err(ListError::NotFound {
            index,
            len: start,
        })
    }

    /// Flat-view index of the parent heading `group`
    pub fn group_start(&self, group: usize) -> usize {
        self.groups[..group.min(self.groups.len())]
            .iter()
            .map(Item::item_count)
            .sum()
    }

    pub fn get(&self, index: usize) -> Result<&Item, ListError> {
        let slot = self.slot(index)?;
        Ok(self.at(slot))
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Item, ListError> {
        let slot = self.slot(index)?;
        let group = &mut self.groups[slot.group];
        Ok(match slot.child {
            None => group,
            Some(c) => &mut group.children[c],
        })
    }

    pub fn find_by_id(&self, id: ItemId) -> Option<(usize, &Item)> {
        self.iter().enumerate().find(|(_, item)| item.id == id)
    }

    pub fn position_of(&self, id: ItemId) -> Option<usize> {
        self.find_by_id(id).map(|(index, _)| index)
    }

    /// The parent of a child, with its flat-view index
    pub fn find_parent_of(&self, id: ItemId) -> Option<(usize, &Item)> {
        let mut start = 0;
        for group in &self.groups {
            if group.contains_child(id) {
                return Some((start, group));
            }
            start += group.item_count();
        }
        None
    }

    /// Index of the group holding `id`, as parent or as child
    pub fn group_of(&self, id: ItemId) -> Option<usize> {
        self.groups
            .iter()
            .position(|g| g.id == id || g.contains_child(id))
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.groups.iter_mut().find_map(|g| {
            if g.id == id {
                Some(g)
            } else {
                g.children.iter_mut().find(|c| c.id == id)
            }
        })
    }

    fn at(&self, slot: Slot) -> &Item {
        let group = &self.groups[slot.group];
        match slot.child {
            None => group,
            Some(c) => &group.children[c],
        }
    }

    // -----------------------------------------------------------------------
    // Structural edits
    // -----------------------------------------------------------------------

    /// Insert `item` (and its children) so it lands at flat index `index`.
    ///
    /// Fresh ids are assigned to the item and every child. A child is spliced
    /// into the nearest preceding parent; a parent dropped inside a child run
    /// takes over the rest of that run. Index 0 is always a parent.
    pub fn insert(&mut self, index: usize, mut item: Item) -> Result<usize, ListError> {
        let len = self.len();
        if index > len {
            return Err(ListError::NotFound { index, len });
        }

        let own_children = std::mem::take(&mut item.children);
        let mut rows = Vec::new();
        for child in own_children {
            rows.extend(flatten(vec![child]).into_iter().map(|mut r| {
                r.is_child = true;
                r
            }));
        }
        item.id = self.fresh_id();
        for row in &mut rows {
            row.id = self.fresh_id();
        }
        if index == 0 {
            item.is_child = false;
        }

        if item.is_child {
            let prev = self.slot(index - 1)?;
            let offset = prev.child.map_or(0, |c| c + 1);
            let parent = &mut self.groups[prev.group];
            let tail = parent.children.split_off(offset);
            parent.children.push(item);
            parent.children.extend(rows);
            parent.children.extend(tail);
        } else {
            item.children = rows;
            if index == len {
                self.groups.push(item);
            } else {
                let next = self.slot(index)?;
                match next.child {
                    None => self.groups.insert(next.group, item),
                    Some(c) => {
                        let tail = self.groups[next.group].children.split_off(c);
                        item.children.extend(tail);
                        self.groups.insert(next.group + 1, item);
                    }
                }
            }
        }
        Ok(index)
    }

    /// Remove the row at `index`; a parent goes with all its children
    pub fn remove_at(&mut self, index: usize) -> Result<Item, ListError> {
        let slot = self.slot(index)?;
        Ok(match slot.child {
            None => self.groups.remove(slot.group),
            Some(c) => self.groups[slot.group].children.remove(c),
        })
    }

    /// Remove the row at `index` but leave a parent's children in the list.
    ///
    /// The orphans join the preceding parent. When there is none the first
    /// orphan becomes a parent holding the others.
    pub fn remove_keeping_children(&mut self, index: usize) -> Result<Item, ListError> {
        let slot = self.slot(index)?;
        if slot.child.is_some() {
            return self.remove_at(index);
        }
        let mut item = self.groups.remove(slot.group);
        let orphans = std::mem::take(&mut item.children);
        if slot.group > 0 {
            self.groups[slot.group - 1].children.extend(orphans);
        } else {
            let regrouped = group_rows(orphans);
            self.groups.splice(0..0, regrouped);
        }
        Ok(item)
    }

    /// Change the parent/child classification of the row at `index`.
    ///
    /// Absorbing moves a parent and its children to the end of the preceding
    /// group. Separating makes a child a parent that takes the siblings after
    /// it, or with `propagate` promotes those siblings to parents as well.
    /// Returns false when nothing changed.
    pub fn set_is_child(
        &mut self,
        index: usize,
        value: bool,
        propagate: bool,
    ) -> Result<bool, ListError> {
        let slot = self.slot(index)?;
        match (slot.child, value) {
            (None, true) => {
                if slot.group == 0 {
                    return Ok(false);
                }
                let mut item = self.groups.remove(slot.group);
                let released = std::mem::take(&mut item.children);
                item.is_child = true;
                let parent = &mut self.groups[slot.group - 1];
                parent.children.push(item);
                parent.children.extend(released);
                Ok(true)
            }
            (Some(c), false) => {
                let parent = &mut self.groups[slot.group];
                let followers = parent.children.split_off(c + 1);
                let mut item = parent.children.remove(c);
                item.is_child = false;
                if propagate {
                    let promoted = std::iter::once(item).chain(followers.into_iter().map(|mut f| {
                        f.is_child = false;
                        f
                    }));
                    let at = slot.group + 1;
                    self.groups.splice(at..at, promoted);
                } else {
                    item.children = followers;
                    self.groups.insert(slot.group + 1, item);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Replace the whole content with a flat row sequence, regrouped by
    /// position. Ids and orders are kept.
    pub fn rebuild(&mut self, rows: Vec<Item>) {
        self.groups = group_rows(rows);
    }

    /// Bring the checked flag of the parent owning `id` in line with its
    /// children. Returns true when the flag changed.
    pub fn sync_parent_checked(&mut self, id: ItemId) -> bool {
        match self.group_of(id) {
            Some(g) => self.groups[g].sync_checked_with_children(),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Identity and order
    // -----------------------------------------------------------------------

    /// Next unused id; ids are never reused within a store
    pub fn fresh_id(&mut self) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add `delta` to every order at or above `from`, skipping `except`
    pub fn shift_orders(&mut self, from: usize, delta: usize, except: &HashSet<ItemId>) {
        let shift = |item: &mut Item| {
            if except.contains(&item.id) {
                return;
            }
            if let Some(order) = item.order.as_mut().filter(|o| **o >= from) {
                *order += delta;
            }
        };
        for group in &mut self.groups {
            shift(group);
            group.children.iter_mut().for_each(&shift);
        }
    }

    /// Make orders dense again.
    ///
    /// Groups are ranked by their parent's order, each parent followed by its
    /// children in list order, numbered from 0. The flat view is untouched.
    pub fn renumber_orders(&mut self) {
        let mut sequence: Vec<usize> = (0..self.groups.len()).collect();
        sequence.sort_by_key(|&g| self.groups[g].order.unwrap_or(usize::MAX));
        let mut next = 0;
        for g in sequence {
            let group = &mut self.groups[g];
            group.order = Some(next);
            next += 1;
            for child in &mut group.children {
                child.order = Some(next);
                next += 1;
            }
        }
    }

    /// Deep copy of all parents with their children
    pub fn snapshot(&self) -> Vec<Item> {
        self.groups.clone()
    }

    /// Replace the content with a snapshot taken earlier
    pub fn restore(&mut self, groups: Vec<Item>) {
        let max = groups
            .iter()
            .flat_map(|g| std::iter::once(g).chain(g.children.iter()))
            .map(|item| item.id.0 + 1)
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(max);
        self.groups = groups;
    }

    pub(crate) fn groups_mut(&mut self) -> &mut Vec<Item> {
        &mut self.groups
    }

    /// Check the structural invariants: depth one, unique ids, and dense
    /// orders with each parent's children directly after it.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let mut ids = HashSet::new();
        for group in &self.groups {
            if group.is_child {
                return Err(InvariantViolation(format!(
                    "parent {} is flagged as a child",
                    group.id
                )));
            }
            for child in &group.children {
                if !child.is_child {
                    return Err(InvariantViolation(format!(
                        "child {} of {} is not flagged as a child",
                        child.id, group.id
                    )));
                }
                if !child.children.is_empty() {
                    return Err(InvariantViolation(format!("child {} has children", child.id)));
                }
            }
        }
        for item in self.iter() {
            if !ids.insert(item.id) {
                return Err(InvariantViolation(format!("duplicate id {}", item.id)));
            }
        }

        let mut orders: Vec<usize> = Vec::with_capacity(ids.len());
        for group in &self.groups {
            let Some(base) = group.order else {
                return Err(InvariantViolation(format!("{} has no order", group.id)));
            };
            orders.push(base);
            for (i, child) in group.children.iter().enumerate() {
                if child.order != Some(base + i + 1) {
                    return Err(InvariantViolation(format!(
                        "child {} has order {:?}, expected {}",
                        child.id,
                        child.order,
                        base + i + 1
                    )));
                }
                orders.push(base + i + 1);
            }
        }
        orders.sort_unstable();
        if orders.iter().enumerate().any(|(i, o)| i != *o) {
            return Err(InvariantViolation(format!(
                "orders are not contiguous: {:?}",
                orders
            )));
        }
        Ok(())
    }
}

/// Expand nested items into flat rows; nested items become children
fn flatten(items: Vec<Item>) -> Vec<Item> {
    let mut rows = Vec::new();
    for mut item in items {
        let children = std::mem::take(&mut item.children);
        rows.push(item);
        for mut row in flatten(children) {
            row.is_child = true;
            rows.push(row);
        }
    }
    rows
}

/// Group flat rows by position: each child joins the nearest preceding
/// parent, a child with none becomes a parent.
fn group_rows(rows: Vec<Item>) -> Vec<Item> {
    let mut groups: Vec<Item> = Vec::new();
    for mut row in rows {
        row.children.clear();
        match groups.last_mut() {
            Some(parent) if row.is_child => parent.children.push(row),
            _ => {
                row.is_child = false;
                groups.push(row);
            }
        }
    }
    groups
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
