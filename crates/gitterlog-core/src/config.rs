//! Runtime configuration.
//!
//! Loaded from a TOML file; every key has a default so a missing file
//! yields a working local setup (local search backend, `./gitter-archive`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the message API.
    pub api_url: String,

    /// Base URL of the search backend.
    pub search_url: String,

    /// Name of the search index documents are submitted to.
    pub index_name: String,

    /// Root directory holding the per-room archive tree.
    pub archive_dir: PathBuf,

    /// Messages requested per page, bounded by the remote maximum.
    pub page_size: usize,

    /// Documents submitted to the backend per batch, bounded by its maximum.
    pub batch_size: usize,

    /// Submit newly seen messages to the search backend.
    pub index: bool,

    /// Commit and push the archive root after a successful run.
    pub backup: bool,

    /// File holding the API bearer token; `GITTER_TOKEN` overrides it.
    pub token_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "https://api.gitter.im/v1".to_string(),
            search_url: "http://localhost:9200".to_string(),
            index_name: "gitter-index".to_string(),
            archive_dir: PathBuf::from("gitter-archive"),
            page_size: 5000,
            batch_size: 100,
            index: true,
            backup: false,
            token_path: PathBuf::from("token"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Resolve the API token from `GITTER_TOKEN` or the token file.
    pub fn resolve_token(&self) -> Result<String> {
        if let Ok(token) = std::env::var("GITTER_TOKEN") {
            let token = token.trim();
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
        let raw = fs::read_to_string(&self.token_path).with_context(|| {
            format!(
                "GITTER_TOKEN is not set and the token file {} could not be read",
                self.token_path.display()
            )
        })?;
        let token = raw.trim();
        if token.is_empty() {
            bail!("token file {} is empty", self.token_path.display());
        }
        Ok(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/gitterlog.toml")).unwrap();
        assert_eq!(config.page_size, 5000);
        assert_eq!(config.batch_size, 100);
        assert!(config.index);
        assert!(!config.backup);
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitterlog.toml");
        fs::write(&path, "archive_dir = \"/srv/archives\"\nbackup = true\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.archive_dir, PathBuf::from("/srv/archives"));
        assert!(config.backup);
        assert_eq!(config.index_name, "gitter-index");
        assert_eq!(config.page_size, 5000);
    }

    #[test]
    fn test_token_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        fs::write(&path, "s3cr3t\n").unwrap();

        let config = Config {
            token_path: path,
            ..Config::default()
        };
        assert_eq!(config.resolve_token().unwrap(), "s3cr3t");
    }
}
