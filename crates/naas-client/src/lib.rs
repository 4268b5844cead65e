//! NaaS Client
//!
//! The [`PortalApi`] trait every manager talks to, and its HTTP
//! implementation.

pub mod api;
pub mod http;

pub use api::PortalApi;
pub use http::HttpPortal;
