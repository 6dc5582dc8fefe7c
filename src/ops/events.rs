use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::item::ItemId;
use crate::model::store::ItemStore;

/// A range-based change notification for renderers.
///
/// Events are meant to be replayed in the order they are emitted; each
/// position refers to the list as left by the previous event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    Inserted { start: usize, count: usize },
    Removed { start: usize, count: usize },
    /// Remove `count` rows at `from` and reinsert them so they start at `to`
    Moved { from: usize, to: usize, count: usize },
    Updated { start: usize, count: usize },
}

/// The renderer-visible state of one flat-view row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowState {
    pub id: ItemId,
    pub body: String,
    pub checked: bool,
    pub is_child: bool,
}

impl RowState {
    /// Capture the flat view of a store
    pub fn capture(store: &ItemStore) -> Vec<RowState> {
        store
            .iter()
            .map(|item| RowState {
                id: item.id,
                body: item.body.clone(),
                checked: item.checked,
                is_child: item.is_child,
            })
            .collect()
    }
}

/// Compute the events that turn `before` into `after`.
///
/// Removals come first (highest index first), then moves, then insertions at
/// their final indices, then updates for rows whose content changed.
pub fn diff(before: &[RowState], after: &[RowState]) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    let after_ids: HashSet<ItemId> = after.iter().map(|r| r.id).collect();
    let before_ids: HashSet<ItemId> = before.iter().map(|r| r.id).collect();

    // Removals
    let removed: Vec<usize> = (0..before.len())
        .filter(|&i| !after_ids.contains(&before[i].id))
        .collect();
    for (start, count) in runs(&removed).into_iter().rev() {
        events.push(ChangeEvent::Removed { start, count });
    }

    // Moves among the survivors
    let mut working: Vec<ItemId> = before
        .iter()
        .map(|r| r.id)
        .filter(|id| after_ids.contains(id))
        .collect();
    let target: Vec<ItemId> = after
        .iter()
        .map(|r| r.id)
        .filter(|id| before_ids.contains(id))
        .collect();
    reorder(&mut working, &target, &mut events);

    // Insertions
    let inserted: Vec<usize> = (0..after.len())
        .filter(|&i| !before_ids.contains(&after[i].id))
        .collect();
    for (start, count) in runs(&inserted) {
        events.push(ChangeEvent::Inserted { start, count });
    }

    // Content updates
    let old: HashMap<ItemId, &RowState> = before.iter().map(|r| (r.id, r)).collect();
    let updated: Vec<usize> = (0..after.len())
        .filter(|&i| old.get(&after[i].id).is_some_and(|o| **o != after[i]))
        .collect();
    for (start, count) in runs(&updated) {
        events.push(ChangeEvent::Updated { start, count });
    }

    for event in &events {
        tracing::trace!(?event, "list change");
    }
    events
}

/// Turn `working` into `target` (same ids, different sequence) with moves.
///
/// At the first mismatch either the run that belongs there is pulled in, or
/// the shorter run sitting in the way is pushed to just after its
/// predecessor. Every move adds at least one correct neighbour pair, so the
/// loop ends.
fn reorder(working: &mut Vec<ItemId>, target: &[ItemId], events: &mut Vec<ChangeEvent>) {
    let target_pos: HashMap<ItemId, usize> =
        target.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut k = 0;
    while k < working.len() {
        if working[k] == target[k] {
            k += 1;
            continue;
        }

        let Some(j) = working.iter().position(|id| *id == target[k]) else {
            break;
        };
        let wanted = matching_run(working, j, target, k);

        let t = target_pos[&working[k]];
        let blocker = matching_run(working, k, target, t);

        if blocker < wanted {
            let predecessor = target[t - 1];
            let Some(q) = working.iter().position(|id| *id == predecessor) else {
                break;
            };
            let run: Vec<ItemId> = working.drain(k..k + blocker).collect();
            let to = q - blocker + 1;
            working.splice(to..to, run);
            events.push(ChangeEvent::Moved {
                from: k,
                to,
                count: blocker,
            });
        } else {
            let run: Vec<ItemId> = working.drain(j..j + wanted).collect();
            working.splice(k..k, run);
            events.push(ChangeEvent::Moved {
                from: j,
                to: k,
                count: wanted,
            });
            k += wanted;
        }
    }
}

/// Length of the run starting at `working[from]` that matches `target[at..]`
fn matching_run(working: &[ItemId], from: usize, target: &[ItemId], at: usize) -> usize {
    working[from..]
        .iter()
        .zip(&target[at..])
        .take_while(|(w, t)| w == t)
        .count()
}

/// Coalesce sorted indices into `(start, count)` runs
fn runs(indices: &[usize]) -> Vec<(usize, usize)> {
    let mut out: Vec<(usize, usize)> = Vec::new();
    for &i in indices {
        match out.last_mut() {
            Some((start, count)) if *start + *count == i => *count += 1,
            _ => out.push((i, 1)),
        }
    }
    out
}

/// Replay events against a copy of `before`, taking new rows from `after`
pub fn replay<T: Clone>(before: &[T], after: &[T], events: &[ChangeEvent]) -> Vec<T> {
    let mut rows = before.to_vec();
    for event in events {
        match *event {
            ChangeEvent::Removed { start, count } => {
                rows.drain(start..start + count);
            }
            ChangeEvent::Moved { from, to, count } => {
                let run: Vec<T> = rows.drain(from..from + count).collect();
                rows.splice(to..to, run);
            }
            ChangeEvent::Inserted { start, count } => {
                rows.splice(start..start, after[start..start + count].iter().cloned());
            }
            ChangeEvent::Updated { start, count } => {
                rows[start..start + count].clone_from_slice(&after[start..start + count]);
            }
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
