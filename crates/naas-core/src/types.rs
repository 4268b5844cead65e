//! Shared enums for reconcile operations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Whether write calls are issued or only reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    #[default]
    Apply,
    Check,
}

impl ApplyMode {
    pub fn is_check(&self) -> bool {
        matches!(self, ApplyMode::Check)
    }
}

/// Which interfaces an interface operation touches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceScope {
    #[default]
    All,
    Lan,
    Wan,
}

impl InterfaceScope {
    pub fn includes_lan(&self) -> bool {
        matches!(self, InterfaceScope::All | InterfaceScope::Lan)
    }

    pub fn includes_wan(&self) -> bool {
        matches!(self, InterfaceScope::All | InterfaceScope::Wan)
    }
}

impl FromStr for InterfaceScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(InterfaceScope::All),
            "lan" => Ok(InterfaceScope::Lan),
            "wan" => Ok(InterfaceScope::Wan),
            _ => Err(ConfigError::InvalidValue {
                field: "scope".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for InterfaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceScope::All => write!(f, "all"),
            InterfaceScope::Lan => write!(f, "lan"),
            InterfaceScope::Wan => write!(f, "wan"),
        }
    }
}

/// Direction of a reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Configure,
    Deconfigure,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Configure => write!(f, "configure"),
            Operation::Deconfigure => write!(f, "deconfigure"),
        }
    }
}

/// Declarative target state, mapped onto configure/deconfigure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    Present,
    Absent,
}

impl DesiredState {
    pub fn operation(&self) -> Operation {
        match self {
            DesiredState::Present => Operation::Configure,
            DesiredState::Absent => Operation::Deconfigure,
        }
    }
}

impl FromStr for DesiredState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "present" => Ok(DesiredState::Present),
            "absent" => Ok(DesiredState::Absent),
            _ => Err(ConfigError::InvalidValue {
                field: "state".to_string(),
                value: s.to_string(),
            }),
        }
    }
}
