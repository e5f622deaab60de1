use std::collections::{HashMap, VecDeque};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::classify::{EntryClass, classify_entry};
use crate::domain::{CatalogEntry, ScopeContext};
use crate::download::{FetchResult, process_entry};
use crate::error::{ErrorKind, MirrorError};
use crate::remote::{RemoteClient, Session};
use crate::report::{EntryReport, MirrorReport, NotAttempted, Outcome};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct MirrorOptions {
    pub workers: usize,
    pub dry_run: bool,
    pub abort_on_filesystem_error: bool,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            workers: crate::config::DEFAULT_WORKERS,
            dry_run: false,
            abort_on_filesystem_error: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<C: RemoteClient> {
    store: Store,
    client: C,
    session: Session,
    cancel: CancelToken,
}

type WorkItem<'a> = (usize, &'a ScopeContext, &'a CatalogEntry);

impl<C: RemoteClient> App<C> {
    pub fn new(store: Store, client: C, session: Session) -> Self {
        Self {
            store,
            client,
            session,
            cancel: CancelToken::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Cancelling stops new entries from starting and aborts in-flight fetches.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn process_entry(&self, scope: &ScopeContext, entry: &CatalogEntry) -> FetchResult {
        process_entry(
            &self.client,
            &self.session,
            &self.store,
            scope,
            entry,
            &self.cancel,
        )
    }

    /// Runs every catalog entry through a bounded worker pool. Failures are
    /// recorded per entry and never stop the run, except a filesystem failure
    /// when `abort_on_filesystem_error` is set. After an abort the app's
    /// cancel token stays cancelled.
    ///
    /// A scope whose organization or project is named like the storage root
    /// is rejected before anything is fetched.
    pub fn mirror(
        &self,
        catalog: &Catalog,
        options: &MirrorOptions,
        sink: &dyn ProgressSink,
    ) -> Result<MirrorReport, MirrorError> {
        for scoped in &catalog.scopes {
            self.store.check_scope(&scoped.scope)?;
        }

        let started_at = chrono::Utc::now().to_rfc3339();
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; {} entries across {} scopes",
                catalog.len(),
                catalog.scopes.len()
            ),
            elapsed: None,
        });
        self.warn_duplicate_destinations(catalog);

        let (entries, not_attempted, aborted) = if options.dry_run {
            (self.plan(catalog), Vec::new(), false)
        } else {
            self.run_pool(catalog, options, sink, started)
        };

        let report = MirrorReport::new(
            started_at,
            self.store.root().to_path_buf(),
            entries,
            not_attempted,
            aborted,
        );
        info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed,
            not_attempted = report.not_attempted.len(),
            "mirror finished"
        );
        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; downloaded={} skipped={} failed={}",
                report.downloaded, report.skipped, report.failed
            ),
            elapsed: Some(started.elapsed()),
        });
        Ok(report)
    }

    /// Classify and resolve only; no network, no writes.
    pub fn plan(&self, catalog: &Catalog) -> Vec<EntryReport> {
        catalog
            .iter()
            .map(|(scope, entry)| {
                let destination = self.store.destination_for(scope, entry.remote_path());
                let outcome = match classify_entry(entry) {
                    EntryClass::Downloadable => Outcome::Planned,
                    EntryClass::Skip(reason) => Outcome::Skipped { reason },
                };
                EntryReport::new(scope, entry, destination, outcome)
            })
            .collect()
    }

    fn run_pool(
        &self,
        catalog: &Catalog,
        options: &MirrorOptions,
        sink: &dyn ProgressSink,
        started: Instant,
    ) -> (Vec<EntryReport>, Vec<NotAttempted>, bool) {
        let count = catalog.len();
        let work: Arc<Mutex<VecDeque<WorkItem<'_>>>> = Arc::new(Mutex::new(
            catalog
                .iter()
                .enumerate()
                .map(|(index, (scope, entry))| (index, scope, entry))
                .collect(),
        ));
        let num_workers = options.workers.max(1).min(count.max(1));
        let mut results: Vec<Option<EntryReport>> = (0..count).map(|_| None).collect();
        let mut aborted = false;

        thread::scope(|threads| {
            let (tx, rx) = mpsc::channel::<(usize, EntryReport, FetchResult)>();
            for _ in 0..num_workers {
                let work = Arc::clone(&work);
                let tx = tx.clone();
                threads.spawn(move || {
                    loop {
                        if self.cancel.is_cancelled() {
                            break;
                        }
                        let next = match work.lock() {
                            Ok(mut queue) => queue.pop_front(),
                            Err(_) => None,
                        };
                        let Some((index, scope, entry)) = next else {
                            break;
                        };
                        let result = self.process_entry(scope, entry);
                        let destination = self.store.destination_for(scope, entry.remote_path());
                        let report =
                            EntryReport::new(scope, entry, destination, Outcome::from(&result));
                        if tx.send((index, report, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for (index, report, result) in rx {
                sink.event(ProgressEvent {
                    message: format!("{} {}", report.identifier, describe(&result)),
                    elapsed: Some(started.elapsed()),
                });
                let fatal = options.abort_on_filesystem_error
                    && result.error().map(|err| err.kind()) == Some(ErrorKind::Filesystem);
                if fatal && !aborted {
                    warn!(identifier = %report.identifier, "filesystem failure, aborting run");
                    aborted = true;
                    self.cancel.cancel();
                }
                results[index] = Some(report);
            }
        });

        let not_attempted = match work.lock() {
            Ok(mut queue) => queue
                .drain(..)
                .map(|(_, scope, entry)| NotAttempted {
                    scope: scope.clone(),
                    entry: entry.clone(),
                })
                .collect(),
            Err(_) => Vec::new(),
        };

        (results.into_iter().flatten().collect(), not_attempted, aborted)
    }

    fn warn_duplicate_destinations(&self, catalog: &Catalog) {
        let mut seen: HashMap<Utf8PathBuf, &str> = HashMap::new();
        for (scope, entry) in catalog.iter() {
            if !matches!(classify_entry(entry), EntryClass::Downloadable) {
                continue;
            }
            let destination = self.store.destination_for(scope, entry.remote_path());
            if let Some(previous) = seen.insert(destination.clone(), entry.identifier()) {
                warn!(
                    %destination,
                    first = previous,
                    second = entry.identifier(),
                    "two entries resolve to the same destination; last write wins"
                );
            }
        }
    }
}

fn describe(result: &FetchResult) -> String {
    match result {
        FetchResult::Downloaded { bytes } => format!("downloaded ({bytes} bytes)"),
        FetchResult::Skipped(reason) => format!("skipped ({reason})"),
        FetchResult::Failed(err) => format!("failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use url::Url;

    use super::*;
    use crate::catalog::ScopedEntries;
    use crate::remote::{RemoteResponse, TransportError};

    struct NoopSink;

    impl ProgressSink for NoopSink {
        fn event(&self, _event: ProgressEvent) {}
    }

    #[derive(Default)]
    struct CountingClient {
        calls: AtomicUsize,
    }

    impl RemoteClient for CountingClient {
        fn fetch(
            &self,
            _url: &Url,
            _auth_token: &str,
            _cancel: &CancelToken,
        ) -> Result<RemoteResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RemoteResponse {
                status: 200,
                content_type: None,
                body: b"data".to_vec(),
            })
        }
    }

    #[test]
    fn dry_run_touches_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("filestore")).unwrap();
        let session = Session::new("http://127.0.0.1:9", "k").unwrap();
        let app = App::new(Store::new(root.clone()), CountingClient::default(), session);
        let catalog = Catalog {
            schema_version: None,
            scopes: vec![ScopedEntries {
                scope: ScopeContext::account("acc").unwrap(),
                entries: vec![
                    CatalogEntry::new("f1", "a.yaml", "/a.yaml").unwrap(),
                    CatalogEntry::new("d1", "folder", "/folder").unwrap(),
                ],
            }],
        };
        let options = MirrorOptions {
            dry_run: true,
            ..MirrorOptions::default()
        };

        let report = app.mirror(&catalog, &options, &NoopSink).unwrap();

        assert_eq!(report.planned, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(app.client.calls.load(Ordering::SeqCst), 0);
        assert!(!root.as_std_path().exists());
    }
}
