use std::cmp::Ordering;

use crate::model::config::SortPolicy;
use crate::model::item::Item;
use crate::model::store::{ItemRef, ItemStore};

/// Derives the flat display order from item attributes under a sort policy.
///
/// The projection never writes `order`; switching policy only re-sorts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Projection {
    pub policy: SortPolicy,
}

impl Projection {
    pub fn new(policy: SortPolicy) -> Self {
        Projection { policy }
    }

    /// Compare two rows of the flat view
    pub fn compare(&self, a: ItemRef<'_>, b: ItemRef<'_>) -> Ordering {
        if a.item.id == b.item.id {
            return Ordering::Equal;
        }
        match self.policy {
            SortPolicy::Manual => compare_manual(a, b),
            SortPolicy::AutoSortByChecked => compare_by_checked(a, b),
        }
    }

    /// Re-sort the store into display order.
    ///
    /// A dragged parent is only ever compared by order, so under auto-sort it
    /// is placed after sorting the rest: right before the first parent with a
    /// higher order.
    pub fn sort(&self, store: &mut ItemStore) {
        let groups = store.groups_mut();
        for group in groups.iter_mut() {
            let mut children = std::mem::take(&mut group.children);
            let parent: &Item = group;
            children.sort_by(|a, b| self.compare(child_ref(a, parent), child_ref(b, parent)));
            group.children = children;
        }

        let (mut dragged, mut settled): (Vec<Item>, Vec<Item>) =
            match self.policy {
                SortPolicy::Manual => (Vec::new(), std::mem::take(groups)),
                SortPolicy::AutoSortByChecked => {
                    std::mem::take(groups).into_iter().partition(|g| g.dragged)
                }
            };
        settled.sort_by(|a, b| self.compare(parent_ref(a), parent_ref(b)));
        dragged.sort_by_key(order_of);
        for group in dragged {
            let at = settled
                .iter()
                .position(|g| order_of(g) > order_of(&group))
                .unwrap_or(settled.len());
            settled.insert(at, group);
        }
        *groups = settled;
    }

    /// True when the store is already in display order
    pub fn is_sorted(&self, store: &ItemStore) -> bool {
        let mut sorted = store.clone();
        self.sort(&mut sorted);
        sorted.groups() == store.groups()
    }
}

fn parent_ref(item: &Item) -> ItemRef<'_> {
    ItemRef { item, parent: None }
}

fn child_ref<'a>(item: &'a Item, parent: &'a Item) -> ItemRef<'a> {
    ItemRef {
        item,
        parent: Some(parent),
    }
}

fn order_of(item: &Item) -> usize {
    item.order.unwrap_or(usize::MAX)
}

fn compare_manual(a: ItemRef<'_>, b: ItemRef<'_>) -> Ordering {
    order_of(a.item)
        .cmp(&order_of(b.item))
        .then_with(|| match (a.parent, b.parent) {
            // a descendant sorts right after its ancestor
            (Some(p), _) if p.id == b.item.id => Ordering::Greater,
            (_, Some(p)) if p.id == a.item.id => Ordering::Less,
            _ => Ordering::Equal,
        })
}

fn compare_by_checked(a: ItemRef<'_>, b: ItemRef<'_>) -> Ordering {
    match (a.parent, b.parent) {
        (Some(pa), Some(pb)) if pa.id == pb.id => order_of(a.item).cmp(&order_of(b.item)),
        (Some(pa), _) if pa.id == b.item.id => Ordering::Greater,
        (_, Some(pb)) if pb.id == a.item.id => Ordering::Less,
        (Some(pa), _) => compare_by_checked(
            ItemRef {
                item: pa,
                parent: None,
            },
            b,
        ),
        (None, Some(pb)) => compare_by_checked(
            a,
            ItemRef {
                item: pb,
                parent: None,
            },
        ),
        (None, None) => compare_parents(a.item, b.item),
    }
}

fn compare_parents(a: &Item, b: &Item) -> Ordering {
    if a.id == b.id {
        return Ordering::Equal;
    }
    let by_checked = if a.dragged || b.dragged {
        Ordering::Equal
    } else {
        a.checked.cmp(&b.checked)
    };
    by_checked.then_with(|| order_of(a).cmp(&order_of(b)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
