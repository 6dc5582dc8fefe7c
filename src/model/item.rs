use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a checklist item, assigned by the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A checklist item. Parents own their children; children never have children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Identity, reassigned when the item enters a store
    #[serde(default)]
    pub id: ItemId,
    /// Item text
    pub body: String,
    /// Checkbox state
    #[serde(default)]
    pub checked: bool,
    /// Whether this item sits under a parent
    #[serde(default)]
    pub is_child: bool,
    /// Rank in the manual arrangement (dense across the whole list)
    #[serde(default)]
    pub order: Option<usize>,
    /// Children in display order (always empty for a child)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Item>,

    // --- Gesture state ---
    /// Set while a drag gesture is carrying this item
    #[serde(skip)]
    pub dragged: bool,
}

impl Item {
    /// Create an unchecked top-level item
    pub fn new(body: impl Into<String>) -> Self {
        Item {
            id: ItemId::default(),
            body: body.into(),
            checked: false,
            is_child: false,
            order: None,
            children: Vec::new(),
            dragged: false,
        }
    }

    /// Create an unchecked child item
    pub fn child(body: impl Into<String>) -> Self {
        Item {
            is_child: true,
            ..Item::new(body)
        }
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn with_children(mut self, children: Vec<Item>) -> Self {
        self.children = children;
        self
    }

    /// Number of flat-view rows this item occupies (itself plus its children)
    pub fn item_count(&self) -> usize {
        1 + self.children.len()
    }

    /// True when the item has children and every one of them is checked
    pub fn all_children_checked(&self) -> bool {
        !self.children.is_empty() && self.children.iter().all(|c| c.checked)
    }

    /// Set checked on this item and, when `cascade` is set, on every child.
    /// Children are written first when checking, last when unchecking.
    pub fn check(&mut self, checked: bool, cascade: bool) {
        if checked {
            if cascade {
                self.children.iter_mut().for_each(|c| c.checked = true);
            }
            self.checked = true;
        } else {
            self.checked = false;
            if cascade {
                self.children.iter_mut().for_each(|c| c.checked = false);
            }
        }
    }

    /// Bring a parent's checked flag in line with its children.
    /// Returns true when the flag changed.
    pub fn sync_checked_with_children(&mut self) -> bool {
        if self.children.is_empty() {
            return false;
        }
        let all = self.all_children_checked();
        if self.checked != all {
            self.checked = all;
            true
        } else {
            false
        }
    }

    pub fn contains_child(&self, id: ItemId) -> bool {
        self.children.iter().any(|c| c.id == id)
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.body == other.body
            && self.checked == other.checked
            && self.is_child == other.is_child
            && self.order == other.order
            && self.children == other.children
    }
}

impl Eq for Item {}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_child {
            write!(f, "  ")?;
        }
        write!(f, "[{}] {}", if self.checked { 'x' } else { ' ' }, self.body)?;
        if !self.children.is_empty() {
            let bodies: Vec<&str> = self.children.iter().map(|c| c.body.as_str()).collect();
            write!(f, " ({})", bodies.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_cascades_to_children() {
        let mut parent = Item::new("A").with_children(vec![Item::child("B"), Item::child("C")]);
        parent.check(true, true);
        assert!(parent.checked);
        assert!(parent.children.iter().all(|c| c.checked));

        parent.check(false, false);
        assert!(!parent.checked);
        assert!(parent.children.iter().all(|c| c.checked));
    }

    #[test]
    fn sync_checked_follows_children() {
        let mut parent = Item::new("A")
            .with_children(vec![Item::child("B").with_checked(true), Item::child("C")]);
        assert!(!parent.sync_checked_with_children());

        parent.children[1].checked = true;
        assert!(parent.sync_checked_with_children());
        assert!(parent.checked);

        let mut lone = Item::new("D").with_checked(true);
        assert!(!lone.sync_checked_with_children());
        assert!(lone.checked);
    }

    #[test]
    fn equality_ignores_drag_state() {
        let a = Item::new("A");
        let mut b = a.clone();
        b.dragged = true;
        assert_eq!(a, b);
    }

    #[test]
    fn display_shows_children() {
        let parent = Item::new("A")
            .with_checked(true)
            .with_children(vec![Item::child("B"), Item::child("C")]);
        assert_eq!(parent.to_string(), "[x] A (B, C)");
        assert_eq!(Item::child("B").to_string(), "  [ ] B");
    }
}
