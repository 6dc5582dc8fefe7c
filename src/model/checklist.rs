use crate::model::item::Item;

/// A checklist as stored on disk: an optional title and its items in manual
/// arrangement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checklist {
    pub title: Option<String>,
    pub items: Vec<Item>,
}
