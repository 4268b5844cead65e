//! Portal client settings
//!
//! Layered with the `config` crate: an optional settings file, then `NAAS_*`
//! environment variables. Command line flags are applied last by the caller.

use naas_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_PREFIX: &str = "NAAS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn settings_error(e: config::ConfigError) -> ConfigError {
    ConfigError::Settings {
        message: e.to_string(),
    }
}

impl ClientSettings {
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS)
            .map_err(settings_error)?;

        if let Some(path) = file {
            if !path.is_file() {
                return Err(ConfigError::NotFound {
                    path: path.display().to_string(),
                });
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .map_err(settings_error)?;

        settings.try_deserialize().map_err(settings_error)
    }

    /// Apply command line values over file and environment
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        if host.is_some() {
            self.host = host;
        }
        if username.is_some() {
            self.username = username;
        }
        if password.is_some() {
            self.password = password;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("host", &self.host),
            ("username", &self.username),
            ("password", &self.password),
        ];
        for (field, value) in required {
            if value.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Host with a scheme and without a trailing slash
    pub fn base_url(&self) -> Result<String, ConfigError> {
        let host = self
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: "host".to_string(),
            })?;

        let host = host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            Ok(host.to_string())
        } else {
            Ok(format!("https://{}", host))
        }
    }
}
