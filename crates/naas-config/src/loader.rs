//! YAML document loading
//!
//! A file name is used as given when it exists, otherwise it is looked up in
//! the config directory.

use log::debug;
use naas_core::ConfigError;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable overriding the config directory
pub const CONFIG_PATH_ENV: &str = "NAAS_CONFIG_PATH";

pub const DEFAULT_CONFIG_DIR: &str = "./configs";

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    search_dir: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::from_env(None)
    }
}

impl ConfigLoader {
    pub fn new(search_dir: impl Into<PathBuf>) -> Self {
        Self {
            search_dir: search_dir.into(),
        }
    }

    /// Explicit directory first, then `NAAS_CONFIG_PATH`, then `./configs`
    pub fn from_env(dir: Option<PathBuf>) -> Self {
        let search_dir = dir
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));
        Self::new(search_dir)
    }

    pub fn search_dir(&self) -> &Path {
        &self.search_dir
    }

    pub fn resolve(&self, file: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
        let file = file.as_ref();
        if file.is_file() {
            return Ok(file.to_path_buf());
        }

        let candidate = self.search_dir.join(file);
        if candidate.is_file() {
            return Ok(candidate);
        }

        Err(ConfigError::NotFound {
            path: file.display().to_string(),
        })
    }

    /// Read and deserialize a YAML document
    pub fn load<T: DeserializeOwned>(&self, file: impl AsRef<Path>) -> Result<T, ConfigError> {
        let path = self.resolve(file)?;
        debug!("Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        parse_yaml(&content, &path)
    }
}

pub(crate) fn parse_yaml<T: DeserializeOwned>(content: &str, path: &Path) -> Result<T, ConfigError> {
    // An empty file is an empty document, not a syntax error
    let content = if content.trim().is_empty() { "{}" } else { content };

    serde_yaml::from_str(content).map_err(|e| ConfigError::Yaml {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
