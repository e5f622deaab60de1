use std::fs;
use std::path::Path;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::domain::{CatalogEntry, ScopeContext};
use crate::error::MirrorError;

pub const SCHEMA_VERSION: u32 = 1;

/// Entries to materialize, grouped by the scope they belong to.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Catalog {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub scopes: Vec<ScopedEntries>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScopedEntries {
    pub scope: ScopeContext,
    #[serde(default)]
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, MirrorError> {
        let content =
            fs::read_to_string(path).map_err(|_| MirrorError::CatalogRead(path.to_path_buf()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, MirrorError> {
        let catalog: Catalog = serde_json::from_str(content)
            .map_err(|err| MirrorError::CatalogParse(err.to_string()))?;
        match catalog.schema_version {
            None | Some(SCHEMA_VERSION) => Ok(catalog),
            Some(other) => Err(MirrorError::CatalogParse(format!(
                "unsupported schema_version {other}"
            ))),
        }
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), MirrorError> {
        let content = serde_json::to_vec_pretty(self)
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        crate::fs_util::write_bytes_atomic(path, &content)
            .map_err(|err| MirrorError::Filesystem(format!("write {path}: {err}")))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.scopes.iter().map(|scoped| scoped.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScopeContext, &CatalogEntry)> {
        self.scopes
            .iter()
            .flat_map(|scoped| scoped.entries.iter().map(move |entry| (&scoped.scope, entry)))
    }
}
