//! Device state as returned by `GET /v1/devices/{id}`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::null_default;
use crate::routes::{BgpNeighborSet, StaticRouteSet};

/// Reference to a named object, either `"name"` or `{ "name": ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameRef {
    Name(String),
    Object { name: String },
}

impl NameRef {
    pub fn name(&self) -> &str {
        match self {
            NameRef::Name(name) => name,
            NameRef::Object { name } => name,
        }
    }
}

/// Envelope of the device details response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub device: DeviceState,
}

/// Effective configuration of an edge or gateway device
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceState {
    pub id: i64,
    pub hostname: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub interfaces: Vec<InterfaceState>,
    #[serde(deserialize_with = "null_default")]
    pub circuits: Vec<CircuitState>,
    pub ntp: Option<NtpState>,
    #[serde(alias = "ipsec_tunnels", deserialize_with = "null_default")]
    pub ipsec_tunnels: Vec<Map<String, Value>>,
    #[serde(alias = "lanSegments")]
    pub segments: Option<SegmentSet>,
    pub edge: Option<EdgeState>,
}

/// Nested `edge` section some device responses carry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeState {
    pub segments: Option<SegmentSet>,
}

impl DeviceState {
    pub fn interface(&self, name: &str) -> Option<&InterfaceState> {
        self.interfaces.iter().find(|iface| iface.name == name)
    }

    /// True if the interface exists, or with `vlan` set, if that subinterface exists
    pub fn has_interface(&self, name: &str, vlan: Option<u16>) -> bool {
        match (self.interface(name), vlan) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(iface), Some(vlan)) => iface.subinterface(vlan).is_some(),
        }
    }

    pub fn circuit(&self, name: &str) -> Option<&CircuitState> {
        self.circuits.iter().find(|c| c.name == name)
    }

    /// Static route prefixes currently present on a circuit
    pub fn circuit_route_prefixes(&self, name: &str) -> BTreeSet<String> {
        self.circuit(name)
            .and_then(|c| c.static_routes.as_ref())
            .map(StaticRouteSet::prefixes)
            .unwrap_or_default()
    }

    /// Look up a LAN segment by name, preferring the nested `edge` section
    pub fn segment(&self, name: &str) -> Option<&SegmentState> {
        self.edge
            .as_ref()
            .and_then(|edge| edge.segments.as_ref())
            .and_then(|set| set.find(name))
            .or_else(|| self.segments.as_ref().and_then(|set| set.find(name)))
    }

    /// Site-to-site VPNs (IPsec tunnels) keyed by name
    pub fn site_to_site_vpns(&self) -> BTreeMap<String, Value> {
        self.ipsec_tunnels
            .iter()
            .filter_map(|tunnel| {
                let name = tunnel.get("name")?.as_str()?.to_string();
                Some((name, Value::Object(tunnel.clone())))
            })
            .collect()
    }

    /// Interface ids for the given interface names, in device order
    pub fn interface_ids<S: AsRef<str>>(&self, names: &[S]) -> Vec<i64> {
        self.interfaces
            .iter()
            .filter(|iface| names.iter().any(|n| n.as_ref() == iface.name))
            .map(|iface| iface.id)
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterfaceState {
    pub id: i64,
    pub name: String,
    pub alias: Option<String>,
    #[serde(alias = "lanSegment", alias = "lan_segment")]
    pub lan: Option<NameRef>,
    #[serde(alias = "wanCircuit", alias = "wan_circuit")]
    pub circuit: Option<NameRef>,
    pub ipv4: Option<IpFamilyState>,
    pub ipv6: Option<IpFamilyState>,
    #[serde(deserialize_with = "null_default")]
    pub subinterfaces: Vec<SubinterfaceState>,
    #[serde(alias = "lag_interface")]
    pub lag_interface: Option<LagState>,
}

impl InterfaceState {
    pub fn subinterface(&self, vlan: u16) -> Option<&SubinterfaceState> {
        self.subinterfaces.iter().find(|s| s.vlan == Some(vlan))
    }

    pub fn lan_name(&self) -> Option<&str> {
        self.lan.as_ref().map(NameRef::name)
    }

    pub fn circuit_name(&self) -> Option<&str> {
        self.circuit.as_ref().map(NameRef::name)
    }

    pub fn is_lag(&self) -> bool {
        self.lag_interface.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubinterfaceState {
    pub id: Option<i64>,
    pub vlan: Option<u16>,
    pub alias: Option<String>,
    #[serde(alias = "lanSegment")]
    pub lan: Option<NameRef>,
    pub circuit: Option<NameRef>,
    pub ipv4: Option<IpFamilyState>,
    pub ipv6: Option<IpFamilyState>,
}

/// Per address family settings; only the VRRP group matters here
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IpFamilyState {
    #[serde(alias = "vrrp_group")]
    pub vrrp_group: Option<VrrpGroupState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VrrpGroupState {
    pub enabled: Option<bool>,
    #[serde(alias = "virtual_router_id")]
    pub virtual_router_id: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LagState {
    #[serde(deserialize_with = "null_default")]
    pub members: Vec<LagMember>,
    #[serde(alias = "lacp_config")]
    pub lacp_config: Option<LacpState>,
}

impl LagState {
    pub fn member_ids(&self) -> BTreeSet<i64> {
        self.members.iter().filter_map(LagMember::id).collect()
    }
}

/// A LAG member is reported either as a bare interface id or as an object
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LagMember {
    Id(i64),
    Object {
        #[serde(default)]
        id: Option<i64>,
        #[serde(default, rename = "interfaceId", alias = "interface_id")]
        interface_id: Option<i64>,
    },
}

impl LagMember {
    pub fn id(&self) -> Option<i64> {
        match self {
            LagMember::Id(id) => Some(*id),
            LagMember::Object { id, interface_id } => id.or(*interface_id),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LacpState {
    pub mode: Option<String>,
    pub timer: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CircuitState {
    pub name: String,
    #[serde(alias = "static_routes")]
    pub static_routes: Option<StaticRouteSet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NtpState {
    pub id: Option<i64>,
    pub name: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmentState {
    #[serde(alias = "lanSegment", alias = "lan_segment", alias = "segment")]
    pub name: Option<String>,
    #[serde(alias = "static_routes")]
    pub static_routes: Option<StaticRouteSet>,
    #[serde(alias = "bgp_neighbors")]
    pub bgp_neighbors: Option<BgpNeighborSet>,
}

/// Segments come back either as a list or keyed by segment name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentSet {
    List(Vec<SegmentState>),
    Keyed(BTreeMap<String, SegmentState>),
}

impl SegmentSet {
    pub fn find(&self, name: &str) -> Option<&SegmentState> {
        match self {
            SegmentSet::List(items) => items.iter().find(|s| s.name.as_deref() == Some(name)),
            SegmentSet::Keyed(map) => map
                .get(name)
                .or_else(|| map.values().find(|s| s.name.as_deref() == Some(name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_info_tolerates_nulls_and_aliases() {
        let info: DeviceInfo = serde_json::from_value(json!({
            "device": {
                "id": 42,
                "interfaces": [
                    {
                        "id": 7,
                        "name": "GigabitEthernet5/0/0",
                        "lanSegment": {"name": "lan-a"},
                        "subinterfaces": [{"vlan": 18, "alias": "v18"}]
                    },
                    {
                        "id": 8,
                        "name": "GigabitEthernet6/0/0",
                        "circuit": "wan-1",
                        "subinterfaces": null
                    }
                ],
                "circuits": null,
                "ipsecTunnels": [{"name": "vpn-1", "ikeVersion": 2}]
            }
        }))
        .unwrap();

        let device = info.device;
        assert_eq!(device.id, 42);
        assert!(device.has_interface("GigabitEthernet5/0/0", Some(18)));
        assert!(!device.has_interface("GigabitEthernet5/0/0", Some(19)));
        assert_eq!(
            device.interface("GigabitEthernet5/0/0").unwrap().lan_name(),
            Some("lan-a")
        );
        assert_eq!(
            device.interface("GigabitEthernet6/0/0").unwrap().circuit_name(),
            Some("wan-1")
        );
        assert!(device.circuits.is_empty());
        assert!(device.site_to_site_vpns().contains_key("vpn-1"));
    }

    #[test]
    fn test_lag_members_mixed_shapes() {
        let lag: LagState = serde_json::from_value(json!({
            "members": [3, {"id": 4}, {"interfaceId": 5}],
            "lacpConfig": {"mode": "ACTIVE", "timer": "FAST"}
        }))
        .unwrap();

        assert_eq!(lag.member_ids().into_iter().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(lag.lacp_config.unwrap().mode.as_deref(), Some("ACTIVE"));
    }

    #[test]
    fn test_segment_lookup_prefers_edge() {
        let device: DeviceState = serde_json::from_value(json!({
            "edge": {"segments": {"corp": {"staticRoutes": {}}}},
            "segments": [{"name": "guest"}]
        }))
        .unwrap();

        assert!(device.segment("corp").is_some());
        assert!(device.segment("guest").is_some());
        assert!(device.segment("lab").is_none());
    }
}
