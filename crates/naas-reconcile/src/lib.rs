//! NaaS Reconcile
//!
//! Per-resource managers that read observed state from the portal, diff it
//! against the desired YAML documents and push only what differs.

pub mod bgp;
pub mod data_exchange;
pub mod executor;
pub mod global;
pub mod interface;
pub mod lag;
pub mod ntp;
pub mod site;
pub mod static_routes;
pub mod vpn;
pub mod vrrp;


pub use bgp::BgpManager;
pub use data_exchange::{DataExchangeManager, MatchRun};
pub use executor::{resolve_device, DevicePush};
pub use global::{GlobalConfigManager, GlobalSection};
pub use interface::InterfaceManager;
pub use lag::LagManager;
pub use ntp::NtpManager;
pub use site::SiteManager;
pub use static_routes::StaticRoutesManager;
pub use vpn::SiteToSiteVpnManager;
pub use vrrp::VrrpManager;
