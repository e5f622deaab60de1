use camino::Utf8Path;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::classify::{EntryClass, SkipReason, classify_entry};
use crate::domain::{CatalogEntry, ScopeContext};
use crate::error::DownloadError;
use crate::remote::{RemoteClient, Session};
use crate::report::{classify_io, classify_status, classify_transport};
use crate::store::Store;

/// Outcome of one entry. Only `Downloaded` touched the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Downloaded { bytes: u64 },
    Skipped(SkipReason),
    Failed(DownloadError),
}

impl FetchResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchResult::Failed(_))
    }

    pub fn error(&self) -> Option<&DownloadError> {
        match self {
            FetchResult::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Fetches one classified file entry and writes it to `destination`.
///
/// Nothing is written unless the whole body was received with a 2xx status.
pub fn download<C: RemoteClient + ?Sized>(
    client: &C,
    session: &Session,
    scope: &ScopeContext,
    entry: &CatalogEntry,
    destination: &Utf8Path,
    cancel: &CancelToken,
) -> FetchResult {
    let url = session.download_url(scope, entry);
    debug!(identifier = entry.identifier(), %url, "fetching entry");

    let response = match client.fetch(&url, session.api_key(), cancel) {
        Ok(response) => response,
        Err(err) => return FetchResult::Failed(classify_transport(err)),
    };
    if !response.is_success() {
        return FetchResult::Failed(classify_status(response.status, &response.body));
    }

    match crate::fs_util::write_bytes_atomic(destination, &response.body) {
        Ok(bytes) => FetchResult::Downloaded { bytes },
        Err(err) => FetchResult::Failed(classify_io(destination, &err)),
    }
}

/// classify -> resolve -> download for one entry. Safe to call from many
/// threads at once; distinct destinations never interfere.
pub fn process_entry<C: RemoteClient + ?Sized>(
    client: &C,
    session: &Session,
    store: &Store,
    scope: &ScopeContext,
    entry: &CatalogEntry,
    cancel: &CancelToken,
) -> FetchResult {
    if let EntryClass::Skip(reason) = classify_entry(entry) {
        debug!(identifier = entry.identifier(), name = entry.name(), %reason, "skipping entry");
        return FetchResult::Skipped(reason);
    }

    if let Err(err) = store.check_scope(scope) {
        warn!(identifier = entry.identifier(), %scope, "{err}");
        return FetchResult::Failed(DownloadError::Filesystem {
            path: store.scope_dir(scope),
            message: err.to_string(),
        });
    }

    let destination = store.destination_for(scope, entry.remote_path());
    let result = download(client, session, scope, entry, &destination, cancel);
    match &result {
        FetchResult::Downloaded { bytes } => {
            info!(identifier = entry.identifier(), %destination, bytes, "downloaded");
        }
        FetchResult::Failed(err) => {
            warn!(
                identifier = entry.identifier(),
                %destination,
                kind = %err.kind(),
                correlation_id = err.correlation_id().unwrap_or("-"),
                "{err}"
            );
        }
        FetchResult::Skipped(_) => {}
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;
    use url::Url;

    use super::*;
    use crate::error::NetworkReason;
    use crate::remote::{RemoteResponse, TransportError};

    struct StaticClient {
        status: u16,
        body: &'static [u8],
        urls: Mutex<Vec<String>>,
    }

    impl StaticClient {
        fn new(status: u16, body: &'static [u8]) -> Self {
            Self {
                status,
                body,
                urls: Mutex::new(Vec::new()),
            }
        }
    }

    impl RemoteClient for StaticClient {
        fn fetch(
            &self,
            url: &Url,
            _auth_token: &str,
            cancel: &CancelToken,
        ) -> Result<RemoteResponse, TransportError> {
            self.urls.lock().unwrap().push(url.to_string());
            if cancel.is_cancelled() {
                return Err(TransportError::cancelled());
            }
            Ok(RemoteResponse {
                status: self.status,
                content_type: Some("application/octet-stream".to_string()),
                body: self.body.to_vec(),
            })
        }
    }

    fn temp_store() -> (tempfile::TempDir, Store) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("filestore")).unwrap();
        (temp, Store::new(root))
    }

    fn session() -> Session {
        Session::new("http://127.0.0.1:9", "test-api-key").unwrap()
    }

    #[test]
    fn folder_entry_never_fetched() {
        let (_temp, store) = temp_store();
        let client = StaticClient::new(200, b"unused");
        let scope = ScopeContext::account("acc").unwrap();
        let entry = CatalogEntry::new("test-folder", "folder", "/folder").unwrap();

        let result = process_entry(&client, &session(), &store, &scope, &entry, &CancelToken::new());

        assert_eq!(result, FetchResult::Skipped(SkipReason::NoExtension));
        assert!(client.urls.lock().unwrap().is_empty());
        assert!(!store.root().as_std_path().exists());
    }

    #[test]
    fn cancelled_fetch_leaves_no_file() {
        let (_temp, store) = temp_store();
        let client = StaticClient::new(200, b"content");
        let scope = ScopeContext::account("acc").unwrap();
        let entry = CatalogEntry::new("id", "a.yaml", "/a.yaml").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = process_entry(&client, &session(), &store, &scope, &entry, &cancel);

        assert_matches!(
            result,
            FetchResult::Failed(DownloadError::Network {
                reason: NetworkReason::Cancelled,
                ..
            })
        );
        assert!(!store.destination_for(&scope, "/a.yaml").as_std_path().exists());
    }

    #[test]
    fn api_error_leaves_no_file() {
        let (_temp, store) = temp_store();
        let client = StaticClient::new(
            401,
            br#"{"status":"ERROR","message":"Unauthorized","correlationId":"test-123"}"#,
        );
        let scope = ScopeContext::account("acc").unwrap();
        let entry = CatalogEntry::new("test-file", "test-file.yaml", "/test-file.yaml").unwrap();
        let destination = store.destination_for(&scope, entry.remote_path());

        let result = download(&client, &session(), &scope, &entry, &destination, &CancelToken::new());

        assert_eq!(
            result,
            FetchResult::Failed(DownloadError::Api {
                status: 401,
                message: "Unauthorized".to_string(),
                correlation_id: Some("test-123".to_string()),
            })
        );
        assert!(!destination.as_std_path().exists());
    }

    #[test]
    fn write_failure_is_filesystem_error() {
        let (_temp, store) = temp_store();
        let client = StaticClient::new(200, b"content");
        let scope = ScopeContext::account("acc").unwrap();
        // a regular file where the `manifests` directory should go
        std::fs::create_dir_all(store.scope_dir(&scope).as_std_path()).unwrap();
        std::fs::write(store.scope_dir(&scope).join("manifests").as_std_path(), b"x").unwrap();
        let entry = CatalogEntry::new("id", "app.yaml", "/manifests/app.yaml").unwrap();

        let result = process_entry(&client, &session(), &store, &scope, &entry, &CancelToken::new());

        assert_matches!(result, FetchResult::Failed(DownloadError::Filesystem { .. }));
    }

    #[test]
    fn scope_named_like_root_fails_without_fetch() {
        let (_temp, store) = temp_store();
        let client = StaticClient::new(200, b"content");
        let scope = ScopeContext::organization("acc", "filestore").unwrap();
        let entry = CatalogEntry::new("id", "app.yaml", "/manifests/app.yaml").unwrap();

        let result = process_entry(&client, &session(), &store, &scope, &entry, &CancelToken::new());

        assert_matches!(result, FetchResult::Failed(DownloadError::Filesystem { .. }));
        assert!(client.urls.lock().unwrap().is_empty());
        assert!(!store.root().as_std_path().exists());
    }
}
