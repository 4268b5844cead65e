//! NaaS shared types
//!
//! Serde models of the state the portal reports back: device details,
//! global object summaries, LAN segments, site lists, sites and data
//! exchange services. Every model is tolerant of missing fields and of the
//! several spellings the API uses.

pub mod device;
pub mod exchange;
pub mod global;
pub mod routes;
pub mod site;

pub use device::{
    CircuitState, DeviceInfo, DeviceState, EdgeState, InterfaceState, IpFamilyState, LacpState,
    LagMember, LagState, NameRef, NtpState, SegmentSet, SegmentState, SubinterfaceState,
    VrrpGroupState,
};
pub use exchange::{CustomerHealth, ExchangeCustomer, ExchangeService, ServiceMatch};
pub use global::{
    EnterpriseInfo, GlobalObjectKind, GlobalObjectSummary, LanSegment, SiteListDetails,
    SiteListSummary,
};
pub use routes::{
    BgpNeighborSet, BgpNeighborState, KeyedRoute, NextHopView, RouteRecord, RouteView, StaticRouteSet,
};
pub use site::{DeviceSummary, SiteSummary};

use serde::{Deserialize, Deserializer};

/// Deserialize `null` as the type's default value.
///
/// The portal returns `null` instead of `[]` for empty collections.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
