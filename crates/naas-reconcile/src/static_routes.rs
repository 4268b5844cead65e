//! Static routes under LAN segments
//!
//! Routes live at `edge.segments.<segment>.staticRoutes.<prefix>.route`.
//! A device is pushed only when at least one listed prefix differs from what
//! the device reports; the full desired payload for that device is sent.

use ipnet::IpNet;
use log::info;
use naas_client::PortalApi;
use naas_config::{NextHopConfig, RouteConfig, RouteList, SegmentRoutes, StaticRoutesDocument};
use naas_core::{ApplyMode, ItemAction, ItemOutcome, Operation, ReconcileReport, Result, ValidationError};
use naas_types::{DeviceState, RouteView};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::executor::{edge_payload, resolve_device, DevicePush};

/// Check a prefix parses as an IPv4 or IPv6 network
pub fn validate_prefix(prefix: &str) -> std::result::Result<(), ValidationError> {
    prefix
        .parse::<IpNet>()
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidPrefix {
            prefix: prefix.to_string(),
            reason: e.to_string(),
        })
}

fn build_next_hop(prefix: &str, hop: &NextHopConfig) -> std::result::Result<Value, ValidationError> {
    if let Some(tunnel) = &hop.third_party_ipsec_tunnel {
        return Ok(json!({ "thirdPartyIpsecTunnel": tunnel }));
    }
    if let Some(circuit) = &hop.circuit {
        return Ok(json!({ "circuit": circuit }));
    }
    if let Some(interface) = &hop.interface {
        let mut next_hop = json!({ "interface": interface });
        if let Some(address) = &hop.next_hop_address {
            next_hop["nextHopAddress"] = json!(address);
        }
        return Ok(next_hop);
    }
    if let Some(address) = &hop.next_hop_address {
        return Ok(json!({ "nextHopAddress": address }));
    }
    Err(ValidationError::InvalidNextHop {
        prefix: prefix.to_string(),
        reason: "expected one of thirdPartyIpsecTunnel, circuit, interface, nextHopAddress".to_string(),
    })
}

fn administrative_distance(prefix: &str, value: &Value) -> std::result::Result<Value, ValidationError> {
    match value {
        Value::Object(inner) => match inner.get("distance") {
            Some(distance) if !distance.is_null() => Ok(json!({ "distance": distance })),
            _ => Err(ValidationError::Invalid {
                object: format!("Route {}", prefix),
                reason: "'administrativeDistance' missing 'distance'".to_string(),
            }),
        },
        other => Ok(json!({ "distance": other })),
    }
}

/// API route object for one configured route
pub fn build_route(prefix: &str, route: &RouteConfig) -> std::result::Result<Value, ValidationError> {
    let mut body = Map::new();
    body.insert("destinationPrefix".to_string(), json!(prefix));
    if let Some(description) = &route.description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(distance) = &route.administrative_distance {
        body.insert("administrativeDistance".to_string(), administrative_distance(prefix, distance)?);
    }
    let next_hops = route
        .next_hops
        .iter()
        .map(|hop| build_next_hop(prefix, hop))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    body.insert("nextHops".to_string(), Value::Array(next_hops));
    Ok(Value::Object(body))
}

/// Desired routes for one segment keyed by prefix; `None` removes the route
fn desired_routes(
    segment: &SegmentRoutes,
    operation: Operation,
) -> std::result::Result<BTreeMap<String, Option<Value>>, ValidationError> {
    let entries: Vec<(String, Option<&RouteConfig>)> = match &segment.static_routes {
        RouteList::List(routes) => routes
            .iter()
            .map(|route| match &route.destination_prefix {
                Some(prefix) if !prefix.is_empty() => Ok((prefix.clone(), Some(route))),
                _ => Err(ValidationError::Invalid {
                    object: format!("Segment {}", segment.lan_segment),
                    reason: "static route missing 'destinationPrefix'".to_string(),
                }),
            })
            .collect::<std::result::Result<_, _>>()?,
        RouteList::Keyed(routes) => routes
            .iter()
            .map(|(prefix, route)| (prefix.clone(), route.as_ref()))
            .collect(),
    };

    let mut desired = BTreeMap::new();
    for (prefix, route) in entries {
        validate_prefix(&prefix)?;
        let route = match (operation, route) {
            (Operation::Deconfigure, _) | (Operation::Configure, None) => None,
            (Operation::Configure, Some(route)) => Some(build_route(&prefix, route)?),
        };
        desired.insert(prefix, route);
    }
    Ok(desired)
}

fn existing_routes(state: &DeviceState, segment: &str) -> BTreeMap<String, Option<Value>> {
    state
        .segment(segment)
        .and_then(|s| s.static_routes.as_ref())
        .map(|routes| routes.to_keyed())
        .unwrap_or_default()
}

pub struct StaticRoutesManager<'a> {
    portal: &'a dyn PortalApi,
    mode: ApplyMode,
}

impl<'a> StaticRoutesManager<'a> {
    pub fn new(portal: &'a dyn PortalApi, mode: ApplyMode) -> Self {
        Self { portal, mode }
    }

    pub async fn configure(&self, doc: &StaticRoutesDocument) -> Result<ReconcileReport> {
        self.apply(doc, Operation::Configure).await
    }

    /// Remove the listed prefixes; absent prefixes are left alone
    pub async fn deconfigure(&self, doc: &StaticRoutesDocument) -> Result<ReconcileReport> {
        self.apply(doc, Operation::Deconfigure).await
    }

    async fn apply(&self, doc: &StaticRoutesDocument, operation: Operation) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(devices) = &doc.static_routes else {
            info!("[static-routes] No 'staticRoutes' section found");
            report.set_message("No staticRoutes configuration found");
            return Ok(report);
        };

        let mut push = DevicePush::new(self.portal, self.mode);
        for (device, configs) in devices.iter() {
            let device_id = resolve_device(self.portal, device).await?;
            let state = self.portal.device_info(device_id).await?;

            let mut segments = Map::new();
            let mut differs = false;
            for segment in configs.iter().flat_map(|c| c.segments.iter()) {
                let desired = desired_routes(segment, operation)?;
                let existing = existing_routes(&state, &segment.lan_segment);

                let mut routes = Map::new();
                for (prefix, route) in desired {
                    let current = existing.get(&prefix).cloned().flatten();
                    let action = match (&route, &current) {
                        (None, None) => None,
                        (None, Some(_)) => Some(ItemAction::Deleted),
                        (Some(_), None) => Some(ItemAction::Created),
                        (Some(desired), Some(current)) => {
                            if RouteView::from_value(desired) == RouteView::from_value(current) {
                                None
                            } else {
                                Some(ItemAction::Updated)
                            }
                        }
                    };

                    let outcome = ItemOutcome::new(device, format!("{}/{}", segment.lan_segment, prefix), ItemAction::Skipped);
                    match action {
                        Some(action) => {
                            differs = true;
                            report.item(ItemOutcome { action, ..outcome });
                        }
                        None if route.is_none() => report.item(outcome.reason("Route already absent")),
                        None => report.item(outcome.reason("Route already matches")),
                    }
                    routes.insert(prefix, json!({ "route": route }));
                }
                segments.insert(segment.lan_segment.clone(), json!({ "staticRoutes": routes }));
            }

            if differs {
                push.queue(device, device_id, edge_payload("segments", segments));
            } else {
                info!("[static-routes] No changes needed for {} (ID: {}), skipping", device, device_id);
                report.skipped_device(device);
            }
        }

        push.execute(&mut report, &format!("static routes {}", operation)).await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naas_core::NaasError;
    use naas_test::FakePortal;

    const ROUTES: &str = r#"
staticRoutes:
  - edge-1:
      segments:
        - lanSegment: lan-a
          staticRoutes:
            - destinationPrefix: 10.1.0.0/16
              administrativeDistance: 10
              nextHops:
                - circuit: c-inet
                - interface: GigabitEthernet5/0/0
                  nextHopAddress: 192.0.2.1
            - destinationPrefix: 10.2.0.0/16
              nextHops:
                - nextHopAddress: 192.0.2.2
"#;

    fn doc() -> StaticRoutesDocument {
        serde_yaml::from_str(ROUTES).unwrap()
    }

    fn portal(existing: Value) -> FakePortal {
        FakePortal::new().with_device_json(json!({
            "id": 41,
            "hostname": "edge-1",
            "edge": {"segments": {"lan-a": {"staticRoutes": existing}}}
        }))
    }

    #[test]
    fn test_next_hop_kinds() {
        let tunnel = NextHopConfig {
            third_party_ipsec_tunnel: Some("t1".into()),
            next_hop_address: Some("192.0.2.1".into()),
            ..Default::default()
        };
        assert_eq!(build_next_hop("p", &tunnel).unwrap(), json!({"thirdPartyIpsecTunnel": "t1"}));

        let interface = NextHopConfig {
            interface: Some("GigabitEthernet5/0/0".into()),
            next_hop_address: Some("192.0.2.1".into()),
            ..Default::default()
        };
        assert_eq!(
            build_next_hop("p", &interface).unwrap(),
            json!({"interface": "GigabitEthernet5/0/0", "nextHopAddress": "192.0.2.1"})
        );

        let err = build_next_hop("10.0.0.0/8", &NextHopConfig::default()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidNextHop { .. }));
    }

    #[test]
    fn test_distance_forms() {
        let route = RouteConfig {
            administrative_distance: Some(json!({"distance": 5})),
            ..Default::default()
        };
        let built = build_route("10.0.0.0/8", &route).unwrap();
        assert_eq!(built["administrativeDistance"], json!({"distance": 5}));

        let bad = RouteConfig {
            administrative_distance: Some(json!({})),
            ..Default::default()
        };
        assert!(build_route("10.0.0.0/8", &bad).is_err());
    }

    #[test]
    fn test_prefix_validation() {
        assert!(validate_prefix("10.0.0.0/8").is_ok());
        assert!(validate_prefix("2001:db8::/32").is_ok());
        assert!(validate_prefix("10.0.0.0/33").is_err());
        assert!(validate_prefix("not-a-prefix").is_err());
    }

    #[tokio::test]
    async fn test_configure_pushes_when_different() {
        let portal = portal(json!({
            "10.1.0.0/16": {"route": {
                "destinationPrefix": "10.1.0.0/16",
                "administrativeDistance": {"distance": 10},
                "nextHops": [
                    {"outgoingInterface": "GigabitEthernet5/0/0", "nextHopAddress": "192.0.2.1"},
                    {"outgoingInterface": "c-inet"}
                ]
            }}
        }));
        let manager = StaticRoutesManager::new(&portal, ApplyMode::Apply);
        let report = manager.configure(&doc()).await.unwrap();
        assert!(report.changed);

        let actions: Vec<_> = report.items.iter().map(|i| (i.object.as_str(), i.action)).collect();
        assert_eq!(
            actions,
            vec![
                ("lan-a/10.1.0.0/16", ItemAction::Skipped),
                ("lan-a/10.2.0.0/16", ItemAction::Created)
            ]
        );

        let routes = &portal.device_payloads(41)[0]["edge"]["segments"]["lan-a"]["staticRoutes"];
        assert_eq!(routes["10.1.0.0/16"]["route"]["administrativeDistance"]["distance"], 10);
        assert_eq!(
            routes["10.2.0.0/16"]["route"]["nextHops"],
            json!([{"nextHopAddress": "192.0.2.2"}])
        );
    }

    #[tokio::test]
    async fn test_configure_matching_device_is_skipped() {
        let portal = portal(json!([
            {"prefix": "10.1.0.0/16", "administrativeDistance": 10, "nextHops": [
                {"circuit": "c-inet"},
                {"interface": "GigabitEthernet5/0/0", "nextHopAddress": "192.0.2.1"}
            ]},
            {"prefix": "10.2.0.0/16", "nextHops": [{"nextHopAddress": "192.0.2.2"}]}
        ]));
        let manager = StaticRoutesManager::new(&portal, ApplyMode::Apply);
        let report = manager.configure(&doc()).await.unwrap();
        assert!(!report.changed);
        assert_eq!(report.skipped_devices, vec!["edge-1"]);
        assert!(portal.writes().is_empty());
    }

    #[tokio::test]
    async fn test_deconfigure_absent_is_noop() {
        let portal = portal(json!({"10.9.0.0/16": {"route": {"destinationPrefix": "10.9.0.0/16"}}}));
        let manager = StaticRoutesManager::new(&portal, ApplyMode::Apply);
        let report = manager.deconfigure(&doc()).await.unwrap();
        assert!(!report.changed);
        assert!(report
            .items
            .iter()
            .all(|i| i.reason.as_deref() == Some("Route already absent")));
    }

    #[tokio::test]
    async fn test_deconfigure_nulls_present_routes() {
        let portal = portal(json!([{"prefix": "10.2.0.0/16"}]));
        let manager = StaticRoutesManager::new(&portal, ApplyMode::Apply);
        let report = manager.deconfigure(&doc()).await.unwrap();
        assert!(report.changed);

        let routes = &portal.device_payloads(41)[0]["edge"]["segments"]["lan-a"]["staticRoutes"];
        assert!(routes["10.2.0.0/16"]["route"].is_null());
        assert!(routes["10.1.0.0/16"]["route"].is_null());
    }

    #[tokio::test]
    async fn test_invalid_prefix_fails_before_push() {
        let doc: StaticRoutesDocument = serde_yaml::from_str(
            "staticRoutes:\n  - edge-1:\n      segments:\n        - lanSegment: lan-a\n          staticRoutes:\n            - destinationPrefix: 10.0.0.300/8\n",
        )
        .unwrap();
        let portal = portal(json!([]));
        let manager = StaticRoutesManager::new(&portal, ApplyMode::Apply);
        let err = manager.configure(&doc).await.unwrap_err();
        assert!(matches!(err, NaasError::Validation(ValidationError::InvalidPrefix { .. })));
        assert!(portal.writes().is_empty());
    }
}
