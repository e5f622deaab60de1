use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use url::Url;

use crate::cancel::CancelToken;
use crate::domain::{CatalogEntry, ScopeContext};
use crate::error::{MirrorError, NetworkReason};

pub const DEFAULT_BASE_URL: &str = "https://app.harness.io/gateway";
pub const API_KEY_HEADER: &str = "x-api-key";

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below HTTP: nothing usable came back.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub reason: NetworkReason,
    pub message: String,
}

impl TransportError {
    pub fn new(reason: NetworkReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(NetworkReason::Cancelled, "request cancelled")
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            NetworkReason::Timeout
        } else if err.is_connect() {
            NetworkReason::Connect
        } else {
            NetworkReason::Other
        };
        Self::new(reason, err.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        let reason = match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => NetworkReason::Timeout,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted => NetworkReason::Connect,
            _ => NetworkReason::Other,
        };
        Self::new(reason, err.to_string())
    }
}

/// The one capability the downloader needs from the API.
///
/// Implementations return `Ok` for any HTTP status; only transport failures are
/// errors. A cancelled token must surface as `NetworkReason::Cancelled`.
pub trait RemoteClient: Send + Sync {
    fn fetch(
        &self,
        url: &Url,
        auth_token: &str,
        cancel: &CancelToken,
    ) -> Result<RemoteResponse, TransportError>;
}

/// Endpoint and credentials for one migration run.
#[derive(Clone)]
pub struct Session {
    base_url: Url,
    api_key: String,
}

impl Session {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, MirrorError> {
        let base_url = parse_base_url(base_url)?;
        Ok(Self {
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// `{base}/ng/api/file-store/files/{identifier}/download?accountIdentifier=..`
    pub fn download_url(&self, scope: &ScopeContext, entry: &CatalogEntry) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "ng",
                "api",
                "file-store",
                "files",
                entry.identifier(),
                "download",
            ]);
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("accountIdentifier", scope.account_id());
            if let Some(org) = scope.organization_id() {
                query.append_pair("orgIdentifier", org);
            }
            if let Some(project) = scope.project_id() {
                query.append_pair("projectIdentifier", project);
            }
        }
        url
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

pub fn parse_base_url(value: &str) -> Result<Url, MirrorError> {
    let url = Url::parse(value)
        .map_err(|err| MirrorError::ConfigInvalid(format!("base_url `{value}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(MirrorError::ConfigInvalid(format!(
            "base_url `{value}` must be an http(s) URL"
        )));
    }
    Ok(url)
}

#[derive(Clone)]
pub struct HttpRemoteClient {
    client: Client,
}

impl HttpRemoteClient {
    pub fn new(timeout: Duration) -> Result<Self, MirrorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("filestore-mirror/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MirrorError::HttpSetup(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| MirrorError::HttpSetup(err.to_string()))?;
        Ok(Self { client })
    }
}

impl RemoteClient for HttpRemoteClient {
    fn fetch(
        &self,
        url: &Url,
        auth_token: &str,
        cancel: &CancelToken,
    ) -> Result<RemoteResponse, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::cancelled());
        }
        let token = HeaderValue::from_str(auth_token)
            .map_err(|err| TransportError::new(NetworkReason::Other, err.to_string()))?;
        let mut response = self
            .client
            .get(url.clone())
            .header(API_KEY_HEADER, token)
            .send()?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut body = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if cancel.is_cancelled() {
                return Err(TransportError::cancelled());
            }
            let read = response.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
        }

        Ok(RemoteResponse {
            status,
            content_type,
            body,
        })
    }
}
