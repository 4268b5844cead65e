//! NaaS Config
//!
//! Loading of desired-state YAML documents, client settings, secrets and the
//! data exchange matches file.

pub mod device_list;
pub mod documents;
pub mod loader;
pub mod matches;
pub mod secrets;
pub mod settings;

#[cfg(test)]
mod tests;

pub use device_list::DeviceList;
pub use documents::*;
pub use loader::{ConfigLoader, CONFIG_PATH_ENV, DEFAULT_CONFIG_DIR};
pub use matches::{MatchesFile, MATCHES_OUTPUT_DIR};
pub use secrets::SecretsDocument;
pub use settings::ClientSettings;
