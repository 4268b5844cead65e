//! NaaS Core
//!
//! Error taxonomy, shared enums and the reconcile report used by every
//! manager.

pub mod error;
pub mod report;
pub mod types;

pub use error::{ApiError, ConfigError, NaasError, ReconcileError, ValidationError};
pub use report::{ItemAction, ItemOutcome, ReconcileReport};
pub use types::*;

/// Result type for reconcile operations
pub type Result<T> = std::result::Result<T, NaasError>;

/// Result type for portal calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;
