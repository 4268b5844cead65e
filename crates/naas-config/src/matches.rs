//! Matches file written by service matching and read when accepting
//! invitations

use log::{debug, info};
use naas_core::ConfigError;
use naas_types::ServiceMatch;
use std::path::{Path, PathBuf};

/// Directory next to the match config where responses are kept
pub const MATCHES_OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchesFile {
    pub entries: Vec<ServiceMatch>,
}

impl MatchesFile {
    /// `output/<stem>_responses_latest.json` beside the match config
    pub fn default_path(config: &Path) -> PathBuf {
        let stem = config
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data_exchange_matches".to_string());
        config
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(MATCHES_OUTPUT_DIR)
            .join(format!("{}_responses_latest.json", stem))
    }

    /// A missing file is an empty list
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("Matches file {} does not exist yet", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let entries = serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
            field: path.display().to_string(),
            value: e.to_string(),
        })?;
        Ok(Self { entries })
    }

    pub fn find(&self, service: &str, customer: &str) -> Option<&ServiceMatch> {
        self.entries.iter().find(|m| m.is_for(service, customer))
    }

    /// Replace the entry for the same service and customer, or append
    pub fn upsert(&mut self, record: ServiceMatch) {
        match self
            .entries
            .iter_mut()
            .find(|m| m.is_for(&record.service_name, &record.customer_name))
        {
            Some(existing) => *existing = record,
            None => self.entries.push(record),
        }
    }

    /// Write as pretty JSON, creating the parent directory
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Read {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(&self.entries).map_err(|e| ConfigError::InvalidValue {
            field: path.display().to_string(),
            value: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        info!("Saved {} match record(s) to {}", self.entries.len(), path.display());
        Ok(())
    }
}
