//! Turns fetch and write failures into classified `DownloadError`s, and
//! collects per-entry outcomes into a run report operators can act on.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ScopedEntries};
use crate::classify::SkipReason;
use crate::domain::{CatalogEntry, ScopeContext};
use crate::download::FetchResult;
use crate::error::{DownloadError, ErrorKind, NetworkReason};
use crate::remote::TransportError;
use crate::scope::{ScopeFolder, resolve_scope_folder};

const MAX_MESSAGE_LEN: usize = 512;

/// Error payload the API returns alongside non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

pub fn classify_status(status: u16, body: &[u8]) -> DownloadError {
    let parsed = serde_json::from_slice::<ApiErrorBody>(body).ok();
    let correlation_id = parsed
        .as_ref()
        .and_then(|payload| payload.correlation_id.clone())
        .filter(|id| !id.is_empty());
    let message = parsed
        .and_then(|payload| payload.message.or(payload.code))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback_message(status, body));

    DownloadError::Api {
        status,
        message,
        correlation_id,
    }
}

pub fn classify_transport(err: TransportError) -> DownloadError {
    DownloadError::Network {
        reason: err.reason,
        message: err.message,
    }
}

pub fn classify_io(path: &Utf8Path, err: &std::io::Error) -> DownloadError {
    DownloadError::Filesystem {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn fallback_message(status: u16, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("request failed")
            .to_string();
    }
    match text.char_indices().nth(MAX_MESSAGE_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Downloaded {
        bytes: u64,
    },
    Skipped {
        reason: SkipReason,
    },
    Planned,
    Failed {
        kind: ErrorKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        network_reason: Option<NetworkReason>,
        #[serde(skip_serializing_if = "Option::is_none")]
        http_status: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        correlation_id: Option<String>,
    },
}

impl From<&FetchResult> for Outcome {
    fn from(result: &FetchResult) -> Self {
        match result {
            FetchResult::Downloaded { bytes } => Outcome::Downloaded { bytes: *bytes },
            FetchResult::Skipped(reason) => Outcome::Skipped { reason: *reason },
            FetchResult::Failed(err) => Outcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
                network_reason: match err {
                    DownloadError::Network { reason, .. } => Some(*reason),
                    _ => None,
                },
                http_status: err.status(),
                correlation_id: err.correlation_id().map(|id| id.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub identifier: String,
    pub name: String,
    pub scope: ScopeContext,
    pub remote_path: String,
    pub scope_folder: ScopeFolder,
    pub destination: Utf8PathBuf,
    pub outcome: Outcome,
}

impl EntryReport {
    pub fn new(
        scope: &ScopeContext,
        entry: &CatalogEntry,
        destination: Utf8PathBuf,
        outcome: Outcome,
    ) -> Self {
        Self {
            identifier: entry.identifier().to_string(),
            name: entry.name().to_string(),
            scope: scope.clone(),
            remote_path: entry.remote_path().to_string(),
            scope_folder: resolve_scope_folder(scope),
            destination,
            outcome,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }

    fn to_entry(&self) -> Option<CatalogEntry> {
        CatalogEntry::new(&self.identifier, &self.name, &self.remote_path).ok()
    }
}

/// Entry drained from the queue after an abort; never fetched.
#[derive(Debug, Clone, Serialize)]
pub struct NotAttempted {
    pub scope: ScopeContext,
    pub entry: CatalogEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct MirrorReport {
    pub started_at: String,
    pub finished_at: String,
    pub root: Utf8PathBuf,
    pub downloaded: usize,
    pub skipped: usize,
    pub planned: usize,
    pub failed: usize,
    pub aborted: bool,
    pub entries: Vec<EntryReport>,
    pub not_attempted: Vec<NotAttempted>,
}

impl MirrorReport {
    pub fn new(
        started_at: String,
        root: Utf8PathBuf,
        entries: Vec<EntryReport>,
        not_attempted: Vec<NotAttempted>,
        aborted: bool,
    ) -> Self {
        let downloaded = tally(&entries, |outcome| matches!(outcome, Outcome::Downloaded { .. }));
        let skipped = tally(&entries, |outcome| matches!(outcome, Outcome::Skipped { .. }));
        let planned = tally(&entries, |outcome| matches!(outcome, Outcome::Planned));
        let failed = tally(&entries, |outcome| matches!(outcome, Outcome::Failed { .. }));
        Self {
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            root,
            downloaded,
            skipped,
            planned,
            failed,
            aborted,
            entries,
            not_attempted,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || !self.not_attempted.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries.iter().filter(|entry| entry.is_failed())
    }

    /// Failed plus never-attempted entries, grouped by scope, ready to be fed
    /// back in as a catalog.
    pub fn failed_catalog(&self) -> Catalog {
        let mut grouped: BTreeMap<String, ScopedEntries> = BTreeMap::new();
        let failed = self
            .failures()
            .filter_map(|report| Some((report.scope.clone(), report.to_entry()?)));
        let skipped = self
            .not_attempted
            .iter()
            .map(|item| (item.scope.clone(), item.entry.clone()));

        for (scope, entry) in failed.chain(skipped) {
            grouped
                .entry(scope.to_string())
                .or_insert_with(|| ScopedEntries {
                    scope,
                    entries: Vec::new(),
                })
                .entries
                .push(entry);
        }

        Catalog {
            schema_version: Some(crate::catalog::SCHEMA_VERSION),
            scopes: grouped.into_values().collect(),
        }
    }
}

fn tally(entries: &[EntryReport], pred: impl Fn(&Outcome) -> bool) -> usize {
    entries.iter().filter(|entry| pred(&entry.outcome)).count()
}
