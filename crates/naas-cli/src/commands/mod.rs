//! Command implementations
//!
//! Every command loads its YAML documents through the shared
//! [`CommandContext`] and hands them to one reconcile manager.

pub mod device;
pub mod exchange;
pub mod global;
pub mod interfaces;
pub mod sites;
pub mod vpn;

pub use device::{BgpCommand, LagCommand, NtpCommand, StaticRoutesCommand, VrrpCommand};
pub use exchange::{DataExchangeCommand, DataExchangeInfoCommand};
pub use global::GlobalCommand;
pub use interfaces::InterfacesCommand;
pub use sites::SitesCommand;
pub use vpn::VpnCommand;

use anyhow::{Context, Result};
use naas_client::PortalApi;
use naas_config::{ConfigLoader, SecretsDocument};
use naas_core::{ApplyMode, ConfigError, DesiredState, Operation};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Portal, document loader and run mode shared by all commands
pub struct CommandContext<'a> {
    pub portal: &'a dyn PortalApi,
    pub loader: ConfigLoader,
    pub mode: ApplyMode,
    pub secrets: Option<PathBuf>,
}

impl<'a> CommandContext<'a> {
    pub fn new(portal: &'a dyn PortalApi, loader: ConfigLoader, mode: ApplyMode) -> Self {
        Self {
            portal,
            loader,
            mode,
            secrets: None,
        }
    }

    pub fn with_secrets(mut self, secrets: Option<PathBuf>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn load<T: DeserializeOwned>(&self, file: &Path) -> Result<T> {
        self.loader
            .load(file)
            .with_context(|| format!("Failed to load {}", file.display()))
    }

    /// Secrets file if one was given, otherwise an empty document
    pub fn secrets(&self) -> Result<SecretsDocument> {
        match &self.secrets {
            Some(path) => self.load(path),
            None => Ok(SecretsDocument::default()),
        }
    }
}

/// `present`/`absent` as aliases for configure/deconfigure
fn desired_state(s: &str) -> Option<Operation> {
    s.parse::<DesiredState>().ok().map(|state| state.operation())
}

fn invalid_action(s: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: "action".to_string(),
        value: s.to_string(),
    }
}

/// `configure`, `deconfigure`, `present` or `absent`
pub fn parse_operation(s: &str) -> std::result::Result<Operation, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "configure" => Ok(Operation::Configure),
        "deconfigure" => Ok(Operation::Deconfigure),
        other => desired_state(other).ok_or_else(|| invalid_action(s)),
    }
}

/// `create`/`delete` plus the `present`/`absent` shortcuts
pub fn parse_vpn_operation(s: &str) -> std::result::Result<Operation, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "create" => Ok(Operation::Configure),
        "delete" => Ok(Operation::Deconfigure),
        other => desired_state(other).ok_or_else(|| invalid_action(s)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitesAction {
    Configure,
    Deconfigure,
    ConfigureSites,
    DeconfigureSites,
    Attach,
    Detach,
}

impl SitesAction {
    pub fn label(&self) -> &'static str {
        match self {
            SitesAction::Configure => "configure",
            SitesAction::Deconfigure => "deconfigure",
            SitesAction::ConfigureSites => "configure-sites",
            SitesAction::DeconfigureSites => "deconfigure-sites",
            SitesAction::Attach => "attach",
            SitesAction::Detach => "detach",
        }
    }
}

impl FromStr for SitesAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "configure-sites" => Ok(SitesAction::ConfigureSites),
            "deconfigure-sites" => Ok(SitesAction::DeconfigureSites),
            "attach" => Ok(SitesAction::Attach),
            "detach" => Ok(SitesAction::Detach),
            other => match parse_operation(other)? {
                Operation::Configure => Ok(SitesAction::Configure),
                Operation::Deconfigure => Ok(SitesAction::Deconfigure),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagAction {
    Configure,
    Deconfigure,
    AddMembers,
    RemoveMembers,
    UpdateLacp,
    DeleteSubinterfaces,
}

impl LagAction {
    pub fn label(&self) -> &'static str {
        match self {
            LagAction::Configure => "configure",
            LagAction::Deconfigure => "deconfigure",
            LagAction::AddMembers => "add-members",
            LagAction::RemoveMembers => "remove-members",
            LagAction::UpdateLacp => "update-lacp",
            LagAction::DeleteSubinterfaces => "delete-subinterfaces",
        }
    }
}

impl FromStr for LagAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add-members" => Ok(LagAction::AddMembers),
            "remove-members" => Ok(LagAction::RemoveMembers),
            "update-lacp" => Ok(LagAction::UpdateLacp),
            "delete-subinterfaces" => Ok(LagAction::DeleteSubinterfaces),
            other => match parse_operation(other)? {
                Operation::Configure => Ok(LagAction::Configure),
                Operation::Deconfigure => Ok(LagAction::Deconfigure),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrrpAction {
    Configure,
    Deconfigure,
    Enable,
}

impl VrrpAction {
    pub fn label(&self) -> &'static str {
        match self {
            VrrpAction::Configure => "configure",
            VrrpAction::Deconfigure => "deconfigure",
            VrrpAction::Enable => "enable",
        }
    }
}

impl FromStr for VrrpAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enable" => Ok(VrrpAction::Enable),
            other => match parse_operation(other)? {
                Operation::Configure => Ok(VrrpAction::Configure),
                Operation::Deconfigure => Ok(VrrpAction::Deconfigure),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeAction {
    CreateServices,
    DeleteServices,
    CreateCustomers,
    DeleteCustomers,
    MatchServices,
    AcceptInvitation,
}

impl ExchangeAction {
    pub fn label(&self) -> &'static str {
        match self {
            ExchangeAction::CreateServices => "create-services",
            ExchangeAction::DeleteServices => "delete-services",
            ExchangeAction::CreateCustomers => "create-customers",
            ExchangeAction::DeleteCustomers => "delete-customers",
            ExchangeAction::MatchServices => "match-services",
            ExchangeAction::AcceptInvitation => "accept-invitation",
        }
    }
}

/// Underscores are accepted; `present`/`absent` mean create/delete services
impl FromStr for ExchangeAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "create-services" => Ok(ExchangeAction::CreateServices),
            "delete-services" => Ok(ExchangeAction::DeleteServices),
            "create-customers" => Ok(ExchangeAction::CreateCustomers),
            "delete-customers" => Ok(ExchangeAction::DeleteCustomers),
            "match-services" | "match-service-to-customers" => Ok(ExchangeAction::MatchServices),
            "accept-invitation" => Ok(ExchangeAction::AcceptInvitation),
            other => match desired_state(other).ok_or_else(|| invalid_action(s))? {
                Operation::Configure => Ok(ExchangeAction::CreateServices),
                Operation::Deconfigure => Ok(ExchangeAction::DeleteServices),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeQuery {
    ServicesSummary,
    CustomersSummary,
    ServiceHealth,
}

impl ExchangeQuery {
    pub fn label(&self) -> &'static str {
        match self {
            ExchangeQuery::ServicesSummary => "services-summary",
            ExchangeQuery::CustomersSummary => "customers-summary",
            ExchangeQuery::ServiceHealth => "service-health",
        }
    }
}

impl FromStr for ExchangeQuery {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "services-summary" => Ok(ExchangeQuery::ServicesSummary),
            "customers-summary" => Ok(ExchangeQuery::CustomersSummary),
            "service-health" => Ok(ExchangeQuery::ServiceHealth),
            _ => Err(ConfigError::InvalidValue {
                field: "query".to_string(),
                value: s.to_string(),
            }),
        }
    }
}
