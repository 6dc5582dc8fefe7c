use crate::model::store::ItemStore;

/// Serialize a checklist to markdown.
///
/// Items are written in manual arrangement (ascending order), so reading the
/// file back restores the same orders whatever the display policy was.
pub fn serialize_checklist(title: Option<&str>, store: &ItemStore) -> String {
    let mut out = String::new();
    if let Some(title) = title {
        out.push_str(&format!("# {}\n\n", title));
    }
    for item in store.manual_sequence() {
        let indent = if item.is_child { "  " } else { "" };
        let mark = if item.checked { 'x' } else { ' ' };
        let body = item.body.replace(['\r', '\n'], " ");
        if body.is_empty() {
            out.push_str(&format!("{}- [{}]\n", indent, mark));
        } else {
            out.push_str(&format!("{}- [{}] {}\n", indent, mark, body));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
