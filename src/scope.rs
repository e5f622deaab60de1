use std::fmt;

use serde::Serialize;

use crate::domain::ScopeContext;

/// Folder that holds everything stored at account scope.
pub const ACCOUNT_SCOPE_FOLDER: &str = "account";

/// Root segment(s) for one scope, relative to the storage root.
///
/// Never contains the storage root itself; the root is applied once, by the
/// path builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ScopeFolder(String);

impl ScopeFolder {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for ScopeFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn resolve_scope_folder(scope: &ScopeContext) -> ScopeFolder {
    match (scope.organization_id(), scope.project_id()) {
        (Some(org), Some(project)) => ScopeFolder(format!("{org}/{project}")),
        (Some(org), None) => ScopeFolder(org.to_string()),
        _ => ScopeFolder(ACCOUNT_SCOPE_FOLDER.to_string()),
    }
}
