use std::fmt;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MirrorError {
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("invalid catalog entry: {0}")]
    InvalidEntry(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    ConfigInvalid(String),

    #[error("failed to read catalog file at {0}")]
    CatalogRead(PathBuf),

    #[error("failed to parse catalog: {0}")]
    CatalogParse(String),

    #[error("API key not set in environment variable {0}")]
    #[diagnostic(help("export the token, or point `api_key_env` at the variable holding it"))]
    MissingApiKey(String),

    #[error("HTTP client setup failed: {0}")]
    HttpSetup(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// Coarse failure class used by batch drivers to pick a remediation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Api,
    Filesystem,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Api => write!(f, "api"),
            ErrorKind::Filesystem => write!(f, "filesystem"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkReason {
    Connect,
    Timeout,
    Cancelled,
    Other,
}

impl fmt::Display for NetworkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkReason::Connect => write!(f, "connect"),
            NetworkReason::Timeout => write!(f, "timeout"),
            NetworkReason::Cancelled => write!(f, "cancelled"),
            NetworkReason::Other => write!(f, "transport"),
        }
    }
}

/// Classified failure of a single entry. Returned inside `FetchResult::Failed`,
/// never raised past the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("network error downloading file ({reason}): {message}")]
    Network {
        reason: NetworkReason,
        message: String,
    },

    #[error("API error downloading file: status {status}: {message}{}", correlation_suffix(.correlation_id))]
    Api {
        status: u16,
        message: String,
        correlation_id: Option<String>,
    },

    #[error("filesystem error writing {path}: {message}")]
    Filesystem { path: Utf8PathBuf, message: String },
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::Network { .. } => ErrorKind::Network,
            DownloadError::Api { .. } => ErrorKind::Api,
            DownloadError::Filesystem { .. } => ErrorKind::Filesystem,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            DownloadError::Api { correlation_id, .. } => correlation_id.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            DownloadError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn correlation_suffix(correlation_id: &Option<String>) -> String {
    match correlation_id {
        Some(id) => format!(" (correlation id {id})"),
        None => String::new(),
    }
}
