use std::fmt;

use serde::Serialize;

use crate::domain::CatalogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Name has no extension; the node is a folder or placeholder.
    NoExtension,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoExtension => write!(f, "no file extension"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryClass {
    Downloadable,
    Skip(SkipReason),
}

pub fn classify_entry(entry: &CatalogEntry) -> EntryClass {
    if has_extension(entry.name()) {
        EntryClass::Downloadable
    } else {
        EntryClass::Skip(SkipReason::NoExtension)
    }
}

/// True when the last segment of `name` has a `.` followed by at least one
/// character. `.gitignore` counts; `notes.` does not.
pub fn has_extension(name: &str) -> bool {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match last.rfind('.') {
        Some(idx) => idx + 1 < last.len(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_rule() {
        assert!(has_extension("file.yaml"));
        assert!(has_extension("archive.tar.gz"));
        assert!(has_extension(".gitignore"));
        assert!(!has_extension("folder"));
        assert!(!has_extension("notes."));
        assert!(!has_extension(""));
        assert!(!has_extension("dir.d/readme"));
    }
}
