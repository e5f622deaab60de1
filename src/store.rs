use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::ScopeContext;
use crate::error::MirrorError;
use crate::scope::{ScopeFolder, resolve_scope_folder};

pub const DEFAULT_ROOT_DIR: &str = "./filestore";

/// The single local storage root every scope is materialized under.
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn scope_dir(&self, scope: &ScopeContext) -> Utf8PathBuf {
        let folder = resolve_scope_folder(scope);
        let mut path = self.root.clone();
        for segment in folder.segments() {
            path.push(segment);
        }
        path
    }

    /// Rejects a scope whose organization or project is named like the
    /// storage root, since its destinations would repeat the root segment.
    pub fn check_scope(&self, scope: &ScopeContext) -> Result<(), MirrorError> {
        let Some(root_name) = self.root.file_name() else {
            return Ok(());
        };
        for (label, value) in [
            ("organization", scope.organization_id()),
            ("project", scope.project_id()),
        ] {
            if value == Some(root_name) {
                return Err(MirrorError::InvalidScope(format!(
                    "{label} `{root_name}` collides with the storage root {}",
                    self.root
                )));
            }
        }
        Ok(())
    }

    pub fn destination(&self, folder: &ScopeFolder, remote_path: &str) -> Utf8PathBuf {
        build_destination(&self.root, folder, remote_path)
    }

    pub fn destination_for(&self, scope: &ScopeContext, remote_path: &str) -> Utf8PathBuf {
        self.destination(&resolve_scope_folder(scope), remote_path)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_DIR)
    }
}

/// `root` + scope folder segments + remote path segments, joined once with the
/// platform separator. Empty and `.` segments of `remote_path` are dropped.
pub fn build_destination(root: &Utf8Path, folder: &ScopeFolder, remote_path: &str) -> Utf8PathBuf {
    let mut path = root.to_path_buf();
    let remote = remote_path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".");
    for segment in folder.segments().chain(remote) {
        path.push(segment);
    }
    path
}
