use crate::model::{InputError, KeywordGroup};
use crate::parser::RawGroupRow;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Rows whose name starts with this are comments.
pub const COMMENT_MARKER: char = '*';
/// Placeholder spreadsheet tools write for empty cells.
pub const MISSING_SENTINEL: &str = "nan";

/// Turns raw rows into keyword groups. The group name is always the first search
/// term; extra comma-separated keywords follow it. Comment rows, blank names and
/// repeated names are dropped.
pub fn normalize_groups(rows: &[RawGroupRow], max_terms: usize) -> Result<Vec<KeywordGroup>, InputError> {
    let mut names = HashSet::new();
    let mut groups = Vec::new();

    for row in rows {
        let name = row.name.trim();
        if is_skipped_name(name) {
            debug!("Skipping row {:?}", row.name);
            continue;
        }
        if !names.insert(name.to_string()) {
            warn!("Duplicate group name {:?}, keeping the first occurrence", name);
            continue;
        }

        let mut terms = vec![name.to_string()];
        terms.extend(split_keywords(row.keywords.as_deref()));
        let mut group = KeywordGroup::new(name, terms)?;
        if group.terms().len() > max_terms {
            warn!(
                "Group {:?} has {} terms, keeping the first {}",
                name,
                group.terms().len(),
                max_terms
            );
            group = KeywordGroup::new(name, group.terms()[..max_terms].to_vec())?;
        }
        groups.push(group);
    }

    if groups.is_empty() {
        return Err(InputError::NoValidGroups);
    }
    Ok(groups)
}

fn is_skipped_name(name: &str) -> bool {
    name.is_empty() || name.starts_with(COMMENT_MARKER) || name == MISSING_SENTINEL
}

fn split_keywords(cell: Option<&str>) -> Vec<String> {
    match cell.map(str::trim) {
        Some(cell) if !cell.is_empty() && !cell.eq_ignore_ascii_case(MISSING_SENTINEL) => cell
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
