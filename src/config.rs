use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::MirrorError;
use crate::remote::{DEFAULT_BASE_URL, parse_base_url};
use crate::store::DEFAULT_ROOT_DIR;

pub const DEFAULT_CONFIG_FILE: &str = "filestore-mirror.json";
pub const DEFAULT_API_KEY_ENV: &str = "FILESTORE_API_KEY";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub root_dir: Option<String>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub abort_on_filesystem_error: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: Url,
    pub root_dir: Utf8PathBuf,
    pub workers: usize,
    pub timeout: Duration,
    pub api_key_env: String,
    pub abort_on_filesystem_error: bool,
}

impl ResolvedConfig {
    pub fn api_key(&self) -> Result<String, MirrorError> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| MirrorError::MissingApiKey(self.api_key_env.clone()))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `filestore-mirror.json` when present. Without either,
    /// every setting takes its default.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, MirrorError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MirrorError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| MirrorError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, MirrorError> {
        let base_url = parse_base_url(config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;

        let root_dir = config
            .root_dir
            .unwrap_or_else(|| DEFAULT_ROOT_DIR.to_string());
        if root_dir.trim().is_empty() {
            return Err(MirrorError::ConfigInvalid("root_dir is empty".to_string()));
        }

        let workers = config.workers.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(MirrorError::ConfigInvalid(
                "workers must be at least 1".to_string(),
            ));
        }

        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(MirrorError::ConfigInvalid(
                "timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            base_url,
            root_dir: Utf8PathBuf::from(root_dir),
            workers,
            timeout: Duration::from_secs(timeout_secs),
            api_key_env: config
                .api_key_env
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            abort_on_filesystem_error: config.abort_on_filesystem_error.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_apply() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.base_url.as_str(), "https://app.harness.io/gateway");
        assert_eq!(resolved.root_dir.as_str(), "./filestore");
        assert_eq!(resolved.workers, 4);
        assert_eq!(resolved.timeout, Duration::from_secs(60));
        assert_eq!(resolved.api_key_env, "FILESTORE_API_KEY");
        assert!(!resolved.abort_on_filesystem_error);
    }

    #[test]
    fn zero_workers_rejected() {
        let config = Config {
            workers: Some(0),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, MirrorError::ConfigInvalid(_));
    }
}
