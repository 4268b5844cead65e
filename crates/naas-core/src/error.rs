//! Error types for NaaS reconciliation

use thiserror::Error;

/// Main error type for reconcile operations
#[derive(Debug, Error)]
pub enum NaasError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("YAML error in {path}: {message}")]
    Yaml { path: String, message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Section '{section}' must be {expected}")]
    SectionType { section: String, expected: String },

    #[error("Settings error: {message}")]
    Settings { message: String },
}

/// Semantic problems in the desired state
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    #[error("Invalid VLAN {vlan} on {interface}")]
    InvalidVlan { interface: String, vlan: i64 },

    #[error("Route {prefix}: invalid next hop, {reason}")]
    InvalidNextHop { prefix: String, reason: String },

    #[error("Missing {kind} for '{name}' in secrets file")]
    MissingSecret { kind: String, name: String },

    #[error("BGP neighbor {address}: {reason}")]
    InvalidNeighbor { address: String, reason: String },

    #[error("{object}: {reason}")]
    Invalid { object: String, reason: String },
}

/// Portal API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {message}")]
    Transport { message: String },

    #[error("API request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },
}

const NOT_FOUND_PHRASES: &[&str] = &["not found", "not exist"];

const IN_USE_PHRASES: &[&str] = &[
    "in use",
    "is attached",
    "still attached",
    "referenced",
    "cannot delete",
    "configured on",
    "numattached",
    "numpolic",
];

const ALREADY_EXISTS_PHRASES: &[&str] = &["already exists", "already created", "already attached"];

const ALREADY_DETACHED_PHRASES: &[&str] = &["already detached", "not attached"];

impl ApiError {
    fn mentions(&self, phrases: &[&str]) -> bool {
        let message = self.to_string().to_lowercase();
        phrases.iter().any(|phrase| message.contains(phrase))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. }) || self.mentions(NOT_FOUND_PHRASES)
    }

    /// The object exists but something still references it
    pub fn is_in_use(&self) -> bool {
        self.mentions(IN_USE_PHRASES)
    }

    pub fn is_already_exists(&self) -> bool {
        self.mentions(ALREADY_EXISTS_PHRASES)
    }

    pub fn is_already_detached(&self) -> bool {
        self.mentions(ALREADY_DETACHED_PHRASES) || self.is_not_found()
    }
}

/// Reconcile workflow errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(
        "Device '{device}' is not found in the current enterprise: {enterprise}. Please check device name."
    )]
    DeviceNotFound { device: String, enterprise: String },

    #[error("Site '{site}' not found: {context}")]
    SiteNotFound { site: String, context: String },

    #[error("Interface '{interface}' not found on device '{device}'")]
    InterfaceNotFound { device: String, interface: String },

    #[error(
        "VRRP {family} configuration does not exist on {interface} for device '{device}'. Please configure VRRP first before enabling it."
    )]
    VrrpNotConfigured {
        family: String,
        interface: String,
        device: String,
    },

    #[error("{kind} '{name}' not found")]
    ObjectNotFound { kind: String, name: String },

    #[error("Unexpected response shape: {message}")]
    UnexpectedShape { message: String },

    #[error("{operation} failed: {source}")]
    Operation {
        operation: String,
        #[source]
        source: ApiError,
    },
}

impl ReconcileError {
    pub fn operation(operation: impl Into<String>, source: ApiError) -> Self {
        ReconcileError::Operation {
            operation: operation.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(message: &str) -> ApiError {
        ApiError::Status {
            status: 400,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_in_use_classification() {
        assert!(status("Prefix set is referenced by policy bgp-out").is_in_use());
        assert!(status("numAttachedDevices must be 0").is_in_use());
        assert!(!status("invalid payload").is_in_use());
    }

    #[test]
    fn test_attach_state_is_not_in_use() {
        assert!(status("Syslog server is attached to site branch-1").is_in_use());
        assert!(status("LAN segment still attached to interfaces").is_in_use());
        assert!(!status("SNMP server not attached").is_in_use());
        assert!(!status("SNMP server already attached to site").is_in_use());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(status("Object does not exist").is_not_found());
        assert!(ApiError::Status {
            status: 404,
            message: String::new()
        }
        .is_not_found());
        assert!(!status("already exists").is_not_found());
    }

    #[test]
    fn test_attach_detach_classification() {
        assert!(status("SNMP server already attached to site").is_already_exists());
        assert!(status("Syslog server not attached").is_already_detached());
        assert!(!status("permission denied").is_already_detached());
    }

    #[test]
    fn test_device_not_found_message() {
        let err = ReconcileError::DeviceNotFound {
            device: "edge-1".to_string(),
            enterprise: "Acme".to_string(),
        };
        assert!(err.to_string().contains("edge-1"));
        assert!(err.to_string().contains("Acme"));
    }
}
