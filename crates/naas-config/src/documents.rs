//! Typed desired-state documents
//!
//! Each document mirrors one YAML file. Sections are optional so a manager can
//! tell an absent section apart from an empty one. Attribute bags that are
//! forwarded to the portal untouched are kept as JSON maps in `extra`.

use crate::device_list::DeviceList;
use indexmap::IndexMap;
use naas_core::ValidationError;
use naas_types::GlobalObjectKind;
use serde::Deserialize;
use serde_json::{Map, Value};

pub type Attributes = Map<String, Value>;

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SitesDocument {
    pub sites: Option<Vec<SiteConfig>>,
    pub site_attachments: Option<Vec<IndexMap<String, SiteAttachment>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: Option<String>,
    pub location: Option<Value>,
}

/// Global objects to attach to or detach from one site
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiteAttachment {
    #[serde(alias = "snmp_servers")]
    pub snmps: Vec<String>,
    pub syslog_servers: Vec<ObjectRef>,
    pub ipfix_exporters: Vec<ObjectRef>,
}

impl SiteAttachment {
    pub fn is_empty(&self) -> bool {
        self.snmps.is_empty() && self.syslog_servers.is_empty() && self.ipfix_exporters.is_empty()
    }
}

/// A global object reference, optionally pinned to a source interface
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ObjectRef {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        interface: Option<String>,
    },
}

impl ObjectRef {
    pub fn name(&self) -> &str {
        match self {
            ObjectRef::Name(name) => name,
            ObjectRef::Detailed { name, .. } => name,
        }
    }

    pub fn interface(&self) -> Option<&str> {
        match self {
            ObjectRef::Name(_) => None,
            ObjectRef::Detailed { interface, .. } => interface.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Global objects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GlobalDocument {
    pub global_prefix_sets: Option<Vec<GlobalObjectConfig>>,
    pub routing_policies: Option<Vec<GlobalObjectConfig>>,
    pub snmps: Option<Vec<GlobalObjectConfig>>,
    pub syslog_servers: Option<Vec<GlobalObjectConfig>>,
    pub ntps: Option<Vec<GlobalObjectConfig>>,
    pub ipfix_exporters: Option<Vec<GlobalObjectConfig>>,
    pub vpn_profiles: Option<Vec<GlobalObjectConfig>>,
    pub lan_segments: Option<Vec<LanSegmentConfig>>,
    pub site_lists: Option<Vec<SiteListConfig>>,
}

impl GlobalDocument {
    pub fn section(&self, kind: GlobalObjectKind) -> Option<&[GlobalObjectConfig]> {
        let section = match kind {
            GlobalObjectKind::PrefixSet => &self.global_prefix_sets,
            GlobalObjectKind::RoutingPolicy => &self.routing_policies,
            GlobalObjectKind::Snmp => &self.snmps,
            GlobalObjectKind::Syslog => &self.syslog_servers,
            GlobalObjectKind::Ntp => &self.ntps,
            GlobalObjectKind::Ipfix => &self.ipfix_exporters,
            GlobalObjectKind::VpnProfile => &self.vpn_profiles,
        };
        section.as_deref()
    }
}

/// A named global object; everything besides the name is sent as `config`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalObjectConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl GlobalObjectConfig {
    pub fn require_name(&self, section: &str) -> Result<&str, ValidationError> {
        self.name.as_deref().ok_or_else(|| ValidationError::Invalid {
            object: section.to_string(),
            reason: "entry is missing 'name'".to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LanSegmentConfig {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiteListConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sites: Vec<String>,
}

// ---------------------------------------------------------------------------
// Interfaces and circuits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InterfacesDocument {
    pub interfaces: Option<DeviceList<InterfaceConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceConfig {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub lan: Option<String>,
    #[serde(default)]
    pub circuit: Option<String>,
    #[serde(default, alias = "sub_interfaces")]
    pub subinterfaces: Vec<SubinterfaceConfig>,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl InterfaceConfig {
    pub fn is_lan(&self) -> bool {
        self.lan.is_some()
    }

    pub fn is_wan(&self) -> bool {
        self.circuit.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubinterfaceConfig {
    pub vlan: i64,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub lan: Option<String>,
    #[serde(default)]
    pub circuit: Option<String>,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl SubinterfaceConfig {
    pub fn is_lan(&self) -> bool {
        self.lan.is_some()
    }

    pub fn is_wan(&self) -> bool {
        self.circuit.is_some()
    }

    /// VLAN id checked against 1..=4094
    pub fn vlan_id(&self, interface: &str) -> Result<u16, ValidationError> {
        vlan_id(interface, self.vlan)
    }
}

pub fn vlan_id(interface: &str, vlan: i64) -> Result<u16, ValidationError> {
    match u16::try_from(vlan) {
        Ok(id) if (1..=4094).contains(&id) => Ok(id),
        _ => Err(ValidationError::InvalidVlan {
            interface: interface.to_string(),
            vlan,
        }),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CircuitsDocument {
    pub circuits: Option<DeviceList<CircuitConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CircuitConfig {
    #[serde(alias = "name")]
    pub circuit: String,
    #[serde(default, alias = "staticRoutes")]
    pub static_routes: Option<IndexMap<String, Value>>,
    #[serde(flatten)]
    pub extra: Attributes,
}

// ---------------------------------------------------------------------------
// LAG
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LagDocument {
    #[serde(rename = "lagInterfaces", alias = "lag_interfaces")]
    pub lag_interfaces: Option<DeviceList<LagConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LagConfig {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default, alias = "lag_members")]
    pub lag_members: Vec<String>,
    #[serde(default, alias = "lacp_mode")]
    pub lacp_mode: Option<String>,
    #[serde(default, alias = "lacp_timer")]
    pub lacp_timer: Option<String>,
    #[serde(default, alias = "sub_interfaces")]
    pub subinterfaces: Vec<LagSubinterfaceConfig>,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LagSubinterfaceConfig {
    pub vlan: i64,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(flatten)]
    pub extra: Attributes,
}

// ---------------------------------------------------------------------------
// VRRP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VrrpDocument {
    pub vrrp_config: Option<DeviceList<VrrpInterfaceConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VrrpInterfaceConfig {
    pub name: String,
    #[serde(default)]
    pub vlan: Option<i64>,
    #[serde(default, alias = "vrrpIpv4")]
    pub vrrp_ipv4: Option<Attributes>,
    #[serde(default, alias = "vrrpIpv6")]
    pub vrrp_ipv6: Option<Attributes>,
}

impl VrrpInterfaceConfig {
    pub fn has_vrrp(&self) -> bool {
        self.vrrp_ipv4.is_some() || self.vrrp_ipv6.is_some()
    }

    pub fn vlan_id(&self) -> Result<Option<u16>, ValidationError> {
        self.vlan.map(|vlan| vlan_id(&self.name, vlan)).transpose()
    }
}

// ---------------------------------------------------------------------------
// Static routes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaticRoutesDocument {
    #[serde(rename = "staticRoutes", alias = "static_routes")]
    pub static_routes: Option<DeviceList<SegmentRoutesConfig>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SegmentRoutesConfig {
    #[serde(alias = "lanSegments")]
    pub segments: Vec<SegmentRoutes>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentRoutes {
    #[serde(rename = "lanSegment", alias = "name", alias = "lan_segment")]
    pub lan_segment: String,
    #[serde(default, rename = "staticRoutes", alias = "static_routes")]
    pub static_routes: RouteList,
}

/// Routes as a list, or keyed by prefix where `null` removes the route
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RouteList {
    List(Vec<RouteConfig>),
    Keyed(IndexMap<String, Option<RouteConfig>>),
}

impl Default for RouteList {
    fn default() -> Self {
        RouteList::List(Vec::new())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteConfig {
    #[serde(alias = "prefix", alias = "destination_prefix")]
    pub destination_prefix: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "administrative_distance")]
    pub administrative_distance: Option<Value>,
    #[serde(alias = "next_hops")]
    pub next_hops: Vec<NextHopConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NextHopConfig {
    pub third_party_ipsec_tunnel: Option<String>,
    pub circuit: Option<String>,
    pub interface: Option<String>,
    pub next_hop_address: Option<String>,
}

// ---------------------------------------------------------------------------
// NTP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NtpDocument {
    #[serde(rename = "ntpGlobalObject", alias = "ntp_global_object")]
    pub ntp_global_object: Option<DeviceList<NtpDeviceConfig>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NtpDeviceConfig {
    pub ntps: Option<NtpObjects>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NtpObjects {
    List(Vec<NtpObjectRef>),
    Keyed(IndexMap<String, Option<NtpDomains>>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NtpObjectRef {
    Name(String),
    Object {
        name: String,
        #[serde(default)]
        domains: Option<Vec<String>>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NtpDomains {
    pub domains: Option<Vec<String>>,
}

impl NtpObjects {
    /// `(name, domains)` pairs in file order
    pub fn entries(&self) -> Vec<(String, Option<Vec<String>>)> {
        match self {
            NtpObjects::List(items) => items
                .iter()
                .map(|item| match item {
                    NtpObjectRef::Name(name) => (name.clone(), None),
                    NtpObjectRef::Object { name, domains } => (name.clone(), domains.clone()),
                })
                .collect(),
            NtpObjects::Keyed(items) => items
                .iter()
                .map(|(name, cfg)| (name.clone(), cfg.as_ref().and_then(|c| c.domains.clone())))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Site-to-site VPN
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiteToSiteVpnDocument {
    #[serde(rename = "siteToSiteVpn", alias = "site_to_site_vpn")]
    pub site_to_site_vpn: Option<DeviceList<Attributes>>,
}

// ---------------------------------------------------------------------------
// BGP peering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BgpDocument {
    #[serde(rename = "bgpPeering", alias = "bgp_peering")]
    pub bgp_peering: Option<DeviceList<BgpDeviceConfig>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BgpDeviceConfig {
    #[serde(alias = "lanSegments")]
    pub segments: Vec<BgpSegmentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BgpSegmentConfig {
    #[serde(rename = "lanSegment", alias = "name", alias = "lan_segment")]
    pub lan_segment: String,
    #[serde(default)]
    pub neighbors: Vec<BgpNeighborConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BgpNeighborConfig {
    pub address: String,
    #[serde(alias = "remote_as")]
    pub remote_as: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "hold_timer")]
    pub hold_timer: Option<u32>,
    #[serde(default, alias = "keepalive_timer")]
    pub keepalive_timer: Option<u32>,
    #[serde(default, alias = "md5_password")]
    pub md5_password: Option<String>,
    #[serde(default, alias = "address_families")]
    pub address_families: Option<Value>,
}

// ---------------------------------------------------------------------------
// Data exchange
// ---------------------------------------------------------------------------

/// Services, customers, matches and invitation acceptances
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataExchangeDocument {
    pub data_exchange_services: Option<Vec<ExchangeServiceConfig>>,
    pub data_exchange_customers: Option<Vec<ExchangeCustomerConfig>>,
    pub data_exchange_matches: Option<Vec<ExchangeMatchConfig>>,
    pub data_exchange_acceptances: Option<Vec<ExchangeAcceptanceConfig>>,
}

/// A service offered to customers; other keys are sent as given
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeServiceConfig {
    #[serde(alias = "serviceName", alias = "service_name")]
    pub name: String,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeCustomerConfig {
    #[serde(alias = "customerName", alias = "customer_name")]
    pub name: String,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeMatchConfig {
    #[serde(alias = "serviceName")]
    pub service_name: String,
    #[serde(alias = "customerName")]
    pub customer_name: String,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeAcceptanceConfig {
    #[serde(alias = "serviceName")]
    pub service_name: String,
    #[serde(alias = "customerName")]
    pub customer_name: String,
    #[serde(default)]
    pub gateways: Vec<ExchangeGatewayConfig>,
    #[serde(flatten)]
    pub extra: Attributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeGatewayConfig {
    pub region: String,
    #[serde(flatten)]
    pub extra: Attributes,
}

/// Gateways an acceptance needs in every region it uses
pub const MIN_GATEWAYS_PER_REGION: usize = 2;

impl ExchangeAcceptanceConfig {
    /// At least [`MIN_GATEWAYS_PER_REGION`] gateways in each region
    pub fn validate(&self) -> Result<(), ValidationError> {
        let object = format!("{}/{}", self.service_name, self.customer_name);
        if self.gateways.is_empty() {
            return Err(ValidationError::Invalid {
                object,
                reason: "no gateways defined".to_string(),
            });
        }

        let mut per_region: IndexMap<&str, usize> = IndexMap::new();
        for gateway in &self.gateways {
            *per_region.entry(gateway.region.as_str()).or_default() += 1;
        }
        match per_region
            .iter()
            .find(|(_, count)| **count < MIN_GATEWAYS_PER_REGION)
        {
            Some((region, count)) => Err(ValidationError::Invalid {
                object,
                reason: format!(
                    "region '{}' has {} gateway(s), at least {} required",
                    region, count, MIN_GATEWAYS_PER_REGION
                ),
            }),
            None => Ok(()),
        }
    }

    /// Gateways as JSON objects with their region
    pub fn gateway_payloads(&self) -> Vec<Value> {
        self.gateways
            .iter()
            .map(|gateway| {
                let mut body = gateway.extra.clone();
                body.insert("region".to_string(), Value::String(gateway.region.clone()));
                Value::Object(body)
            })
            .collect()
    }
}
