use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use crate::types::PathEntry;

/// One displayable node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItem {
    pub label: String,
    pub node_id: String,
    pub is_folder: bool,
    pub expanded: bool,
    pub children: Vec<TreeItem>,
}

/// Project the level at `level_path` and every mounted level below it
///
/// `levels` maps a level's own path to its entries. A folder counts as
/// expanded when a level is mounted for it. Placeholders are never shown.
pub fn project_level(
    level_path: &str,
    levels: &HashMap<String, Arc<Vec<PathEntry>>>,
) -> Vec<TreeItem> {
    let Some(entries) = levels.get(level_path) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| !entry.is_placeholder())
        .map(|entry| {
            let expanded = entry.is_folder && levels.contains_key(&entry.path);
            TreeItem {
                label: entry.name.clone(),
                node_id: entry.path.clone(),
                is_folder: entry.is_folder,
                expanded,
                children: if expanded {
                    project_level(&entry.path, levels)
                } else {
                    Vec::new()
                },
            }
        })
        .collect()
}

/// Text rendering of one explorer: the root label, then indented items
pub fn render_text(root: &str, items: &[TreeItem]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", root);
    render_items(&mut out, items, 1);
    out
}

fn render_items(out: &mut String, items: &[TreeItem], depth: usize) {
    for item in items {
        let marker = match (item.is_folder, item.expanded) {
            (true, true) => "▾ ",
            (true, false) => "▸ ",
            (false, _) => "  ",
        };
        let _ = writeln!(out, "{}{}{}", "  ".repeat(depth), marker, item.label);
        render_items(out, &item.children, depth + 1);
    }
}
