use serde::Serialize;

use crate::model::config::SortPolicy;
use crate::model::item::Item;
use crate::model::store::ItemStore;
use crate::ops::events::ChangeEvent;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ChecklistJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub sort: SortPolicy,
    pub items: Vec<ItemJson>,
}

#[derive(Serialize)]
pub struct ItemJson {
    pub position: usize,
    pub id: u32,
    pub body: String,
    pub checked: bool,
    pub is_child: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
}

/// Result of one `chk run` line
#[derive(Serialize)]
pub struct RunStepJson {
    pub line: usize,
    pub op: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<usize>,
    pub events: Vec<ChangeEvent>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn item_to_json(position: usize, item: &Item) -> ItemJson {
    ItemJson {
        position: position + 1,
        id: item.id.0,
        body: item.body.clone(),
        checked: item.checked,
        is_child: item.is_child,
        order: item.order,
    }
}

pub fn checklist_to_json(title: Option<&str>, sort: SortPolicy, store: &ItemStore) -> ChecklistJson {
    ChecklistJson {
        title: title.map(str::to_string),
        sort,
        items: store
            .iter()
            .enumerate()
            .map(|(i, item)| item_to_json(i, item))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// Format one row: 1-based position, indent for children, check mark, body
pub fn format_item_line(position: usize, width: usize, item: &Item) -> String {
    let indent = if item.is_child { "  " } else { "" };
    let mark = if item.checked { 'x' } else { ' ' };
    format!("{:>width$} {}[{}] {}", position + 1, indent, mark, item.body, width = width)
        .trim_end()
        .to_string()
}

/// Format the whole checklist in display order
pub fn format_checklist(title: Option<&str>, store: &ItemStore) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(title) = title {
        lines.push(format!("# {}", title));
    }
    if store.is_empty() {
        lines.push("(empty)".to_string());
        return lines;
    }
    let width = store.len().to_string().len();
    for (i, item) in store.iter().enumerate() {
        lines.push(format_item_line(i, width, item));
    }
    lines
}

/// One-line summary of a change event, for `chk run`
pub fn format_event(event: &ChangeEvent) -> String {
    match *event {
        ChangeEvent::Inserted { start, count } => format!("inserted {} at {}", count, start + 1),
        ChangeEvent::Removed { start, count } => format!("removed {} at {}", count, start + 1),
        ChangeEvent::Moved { from, to, count } => {
            format!("moved {} from {} to {}", count, from + 1, to + 1)
        }
        ChangeEvent::Updated { start, count } => format!("updated {} at {}", count, start + 1),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
