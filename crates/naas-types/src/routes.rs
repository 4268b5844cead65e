//! Static routes and BGP neighbors under circuits and LAN segments
//!
//! The portal reports both in two shapes: a list of records, or a map keyed
//! by prefix (or neighbor address) mirroring the config payload. [`RouteView`]
//! folds either shape into one comparable form.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::null_default;

/// A static route as reported in list form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteRecord {
    #[serde(alias = "destinationPrefix", alias = "destination_prefix")]
    pub prefix: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "administrative_distance")]
    pub administrative_distance: Option<Value>,
    #[serde(alias = "next_hops", deserialize_with = "null_default")]
    pub next_hops: Vec<Value>,
}

/// Keyed entry: `{ "route": {...} | null }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyedRoute {
    pub route: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StaticRouteSet {
    List(Vec<RouteRecord>),
    Keyed(BTreeMap<String, KeyedRoute>),
}

impl StaticRouteSet {
    /// Prefixes with a live route
    pub fn prefixes(&self) -> BTreeSet<String> {
        match self {
            StaticRouteSet::List(records) => {
                records.iter().filter_map(|r| r.prefix.clone()).collect()
            }
            StaticRouteSet::Keyed(map) => map
                .iter()
                .filter(|(_, entry)| entry.route.as_ref().is_some_and(|r| !r.is_null()))
                .map(|(prefix, _)| prefix.clone())
                .collect(),
        }
    }

    /// Route objects keyed by prefix, in payload shape
    pub fn to_keyed(&self) -> BTreeMap<String, Option<Value>> {
        match self {
            StaticRouteSet::Keyed(map) => map
                .iter()
                .map(|(prefix, entry)| {
                    (prefix.clone(), entry.route.clone().filter(|r| !r.is_null()))
                })
                .collect(),
            StaticRouteSet::List(records) => records
                .iter()
                .filter_map(|record| {
                    let prefix = record.prefix.clone()?;
                    let mut route = json!({ "destinationPrefix": prefix });
                    if let Some(description) = &record.description {
                        route["description"] = json!(description);
                    }
                    if let Some(distance) = &record.administrative_distance {
                        route["administrativeDistance"] = distance.clone();
                    }
                    route["nextHops"] = Value::Array(record.next_hops.clone());
                    Some((prefix, Some(route)))
                })
                .collect(),
        }
    }
}

/// Next hop reduced to outgoing interface and address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct NextHopView {
    pub outgoing_interface: Option<String>,
    pub next_hop_address: Option<String>,
}

/// Normalized route used for comparisons.
///
/// Unknown keys are ignored, the administrative distance is kept as a
/// string and next hops are sorted so their order does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteView {
    pub destination_prefix: Option<String>,
    pub description: Option<String>,
    pub administrative_distance: Option<String>,
    pub next_hops: Vec<NextHopView>,
}

fn first_str(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
        .map(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RouteView {
    pub fn from_value(route: &Value) -> Option<Self> {
        let obj = route.as_object()?;

        let destination_prefix =
            first_str(obj, &["destinationPrefix", "destination_prefix", "prefix"]);

        let distance = obj
            .get("administrativeDistance")
            .or_else(|| obj.get("administrative_distance"))
            .and_then(|ad| match ad {
                Value::Object(inner) => inner.get("distance").filter(|d| !d.is_null()),
                Value::Null => None,
                other => Some(other),
            })
            .map(scalar_to_string);

        let hops = obj
            .get("nextHops")
            .or_else(|| obj.get("next_hops"))
            .and_then(Value::as_array);

        let mut next_hops: Vec<NextHopView> = hops
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .map(|hop| NextHopView {
                outgoing_interface: first_str(
                    hop,
                    &[
                        "outgoingInterface",
                        "thirdPartyIpsecTunnel",
                        "third_party_ipsec_tunnel",
                        "circuit",
                        "interface",
                    ],
                ),
                next_hop_address: first_str(hop, &["nextHopAddress", "next_hop_address"]),
            })
            .filter(|hop| hop.outgoing_interface.is_some() || hop.next_hop_address.is_some())
            .collect();
        next_hops.sort();

        Some(Self {
            destination_prefix,
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            administrative_distance: distance,
            next_hops,
        })
    }
}

/// BGP neighbor as reported under a LAN segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BgpNeighborState {
    #[serde(alias = "neighborAddress", alias = "neighbor_address")]
    pub address: Option<String>,
    #[serde(alias = "remote_as")]
    pub remote_as: Option<u32>,
    pub description: Option<String>,
    #[serde(alias = "hold_timer")]
    pub hold_timer: Option<u32>,
    #[serde(alias = "keepalive_timer")]
    pub keepalive_timer: Option<u32>,
    #[serde(alias = "address_families")]
    pub address_families: Option<Value>,
    /// Only present when the portal echoes the password back
    #[serde(alias = "md5_password")]
    pub md5_password: Option<Value>,
}

impl BgpNeighborState {
    /// Echoed password, bare or wrapped as `{md5Password}`
    pub fn md5(&self) -> Option<&str> {
        let value = self.md5_password.as_ref()?;
        value
            .get("md5Password")
            .unwrap_or(value)
            .as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BgpNeighborSet {
    List(Vec<BgpNeighborState>),
    Keyed(BTreeMap<String, Value>),
}

impl BgpNeighborSet {
    /// Live neighbors keyed by address
    pub fn neighbors(&self) -> BTreeMap<String, BgpNeighborState> {
        match self {
            BgpNeighborSet::List(items) => items
                .iter()
                .filter_map(|n| Some((n.address.clone()?, n.clone())))
                .collect(),
            BgpNeighborSet::Keyed(map) => map
                .iter()
                .filter_map(|(address, entry)| {
                    let body = entry.get("neighbor").unwrap_or(entry);
                    if body.is_null() {
                        return None;
                    }
                    let mut neighbor: BgpNeighborState =
                        serde_json::from_value(body.clone()).ok()?;
                    neighbor.address.get_or_insert_with(|| address.clone());
                    Some((address.clone(), neighbor))
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_view_ignores_hop_order_and_distance_type() {
        let desired = json!({
            "destinationPrefix": "10.1.0.0/16",
            "administrativeDistance": {"distance": 10},
            "nextHops": [
                {"circuit": "wan-1"},
                {"interface": "GigabitEthernet5/0/0", "nextHopAddress": "192.0.2.1"}
            ]
        });
        let existing = json!({
            "destinationPrefix": "10.1.0.0/16",
            "administrativeDistance": "10",
            "someServerField": true,
            "nextHops": [
                {"outgoingInterface": "GigabitEthernet5/0/0", "nextHopAddress": "192.0.2.1"},
                {"outgoingInterface": "wan-1"}
            ]
        });

        assert_eq!(RouteView::from_value(&desired), RouteView::from_value(&existing));
    }

    #[test]
    fn test_route_view_detects_distance_change() {
        let a = json!({"destinationPrefix": "10.0.0.0/8", "administrativeDistance": 5});
        let b = json!({"destinationPrefix": "10.0.0.0/8", "administrativeDistance": 6});
        assert_ne!(RouteView::from_value(&a), RouteView::from_value(&b));
    }

    #[test]
    fn test_static_route_set_shapes() {
        let list: StaticRouteSet = serde_json::from_value(json!([
            {"prefix": "10.0.0.0/8", "administrativeDistance": 1, "nextHops": null}
        ]))
        .unwrap();
        assert!(list.prefixes().contains("10.0.0.0/8"));
        let keyed_from_list = list.to_keyed();
        assert!(keyed_from_list["10.0.0.0/8"].is_some());

        let keyed: StaticRouteSet = serde_json::from_value(json!({
            "10.0.0.0/8": {"route": {"destinationPrefix": "10.0.0.0/8"}},
            "10.9.0.0/16": {"route": null}
        }))
        .unwrap();
        let prefixes = keyed.prefixes();
        assert_eq!(prefixes.len(), 1);
        assert!(prefixes.contains("10.0.0.0/8"));
    }

    #[test]
    fn test_bgp_neighbor_set_keyed() {
        let set: BgpNeighborSet = serde_json::from_value(json!({
            "192.0.2.10": {"neighbor": {"remoteAs": 65010, "holdTimer": 90}},
            "192.0.2.11": {"neighbor": null}
        }))
        .unwrap();

        let neighbors = set.neighbors();
        assert_eq!(neighbors.len(), 1);
        let neighbor = &neighbors["192.0.2.10"];
        assert_eq!(neighbor.remote_as, Some(65010));
        assert_eq!(neighbor.address.as_deref(), Some("192.0.2.10"));
        assert_eq!(neighbor.md5(), None);
    }

    #[test]
    fn test_bgp_neighbor_echoed_md5() {
        let wrapped: BgpNeighborState =
            serde_json::from_value(json!({"remoteAs": 1, "md5Password": {"md5Password": "pw"}})).unwrap();
        assert_eq!(wrapped.md5(), Some("pw"));

        let bare: BgpNeighborState =
            serde_json::from_value(json!({"remoteAs": 1, "md5Password": "pw"})).unwrap();
        assert_eq!(bare.md5(), Some("pw"));
    }
}
