use crate::model::checklist::Checklist;
use crate::model::item::Item;

/// Indent (in spaces) at or beyond which an item line is a child
const CHILD_INDENT: usize = 2;

/// Parse a markdown checklist.
///
/// Recognized lines are an optional `# Title` before the first item and
/// `- [ ] body` / `- [x] body` items; items indented by two or more spaces
/// are children. Items are returned flat, in file order, with `order` set to
/// their line sequence. Any other non-blank line is returned as dropped.
pub fn parse_checklist(text: &str) -> (Checklist, Vec<String>) {
    let mut checklist = Checklist::default();
    let mut dropped = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some((indent, checked, body)) = parse_item_line(line) {
            let mut item = if indent >= CHILD_INDENT {
                Item::child(body)
            } else {
                Item::new(body)
            };
            item.checked = checked;
            item.order = Some(checklist.items.len());
            checklist.items.push(item);
            continue;
        }
        if checklist.title.is_none()
            && checklist.items.is_empty()
            && let Some(title) = line.strip_prefix("# ")
        {
            checklist.title = Some(title.trim().to_string());
            continue;
        }
        dropped.push(line.to_string());
    }

    if !dropped.is_empty() {
        tracing::warn!(count = dropped.len(), "ignored unrecognized checklist lines");
    }
    (checklist, dropped)
}

/// Split an item line into (indent, checked, body)
fn parse_item_line(line: &str) -> Option<(usize, bool, &str)> {
    let trimmed = line.trim_start_matches(' ');
    let indent = line.len() - trimmed.len();
    let rest = trimmed.strip_prefix("- [")?;
    let mut chars = rest.chars();
    let checked = match chars.next()? {
        ' ' => false,
        'x' | 'X' => true,
        _ => return None,
    };
    let body = chars.as_str().strip_prefix(']')?;
    let body = body.strip_prefix(' ').unwrap_or(body);
    Some((indent, checked, body.trim_end()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
