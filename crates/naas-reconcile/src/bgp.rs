//! BGP neighbors under LAN segments, keyed by neighbor address
//!
//! Addresses are matched in canonical form, so `2001:DB8:0::1` finds a peer
//! the device reports as `2001:db8::1`. The MD5 password only takes part in
//! the comparison when the device echoes it back; otherwise a changed
//! password alone is not pushed, the same as VPN secrets.

use log::info;
use naas_client::PortalApi;
use naas_config::{BgpDocument, BgpNeighborConfig, SecretsDocument};
use naas_core::{ApplyMode, ItemAction, ItemOutcome, Operation, ReconcileReport, Result, ValidationError};
use naas_types::BgpNeighborState;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::executor::{edge_payload, resolve_device, DevicePush};

const MAX_AS: i64 = 4_294_967_295;

/// Address must be an IP; remote AS within the 32-bit ASN range
pub fn validate_neighbor(neighbor: &BgpNeighborConfig) -> std::result::Result<(IpAddr, u32), ValidationError> {
    let address = neighbor
        .address
        .parse::<IpAddr>()
        .map_err(|e| ValidationError::InvalidNeighbor {
            address: neighbor.address.clone(),
            reason: e.to_string(),
        })?;
    if !(1..=MAX_AS).contains(&neighbor.remote_as) {
        return Err(ValidationError::InvalidNeighbor {
            address: neighbor.address.clone(),
            reason: format!("remoteAs {} out of range 1..={}", neighbor.remote_as, MAX_AS),
        });
    }
    let remote_as = u32::try_from(neighbor.remote_as).map_err(|e| ValidationError::InvalidNeighbor {
        address: neighbor.address.clone(),
        reason: e.to_string(),
    })?;
    Ok((address, remote_as))
}

/// Canonical spelling of an address; unparsable keys are kept as reported
fn canonical_address(address: &str) -> String {
    address
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|_| address.to_string())
}

/// Device neighbors by canonical address, with the key the device uses
fn by_canonical_address(neighbors: BTreeMap<String, BgpNeighborState>) -> BTreeMap<String, (String, BgpNeighborState)> {
    neighbors
        .into_iter()
        .map(|(key, state)| (canonical_address(&key), (key, state)))
        .collect()
}

/// Secrets entry under the address as written, then the canonical form, then inline
fn md5_for<'d>(neighbor: &'d BgpNeighborConfig, address: &str, secrets: &'d SecretsDocument) -> Option<&'d str> {
    secrets
        .md5_password(&neighbor.address)
        .or_else(|| secrets.md5_password(address))
        .or(neighbor.md5_password.as_deref())
}

fn neighbor_body(neighbor: &BgpNeighborConfig, remote_as: u32, md5: Option<&str>) -> Value {
    let mut body = Map::new();
    body.insert("remoteAs".to_string(), json!(remote_as));
    if let Some(description) = &neighbor.description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(hold) = neighbor.hold_timer {
        body.insert("holdTimer".to_string(), json!(hold));
    }
    if let Some(keepalive) = neighbor.keepalive_timer {
        body.insert("keepaliveTimer".to_string(), json!(keepalive));
    }
    if let Some(password) = md5 {
        body.insert("md5Password".to_string(), json!({ "md5Password": password }));
    }
    if let Some(families) = &neighbor.address_families {
        body.insert("addressFamilies".to_string(), families.clone());
    }
    Value::Object(body)
}

/// Differences in the settings the desired neighbor sets
fn neighbor_differs(
    desired: &BgpNeighborConfig,
    remote_as: u32,
    md5: Option<&str>,
    existing: &BgpNeighborState,
) -> bool {
    let md5_differs = match (md5, existing.md5()) {
        (Some(wanted), Some(echoed)) => wanted != echoed,
        _ => false,
    };
    md5_differs
        || existing.remote_as != Some(remote_as)
        || (desired.description.is_some() && existing.description != desired.description)
        || (desired.hold_timer.is_some() && existing.hold_timer != desired.hold_timer)
        || (desired.keepalive_timer.is_some() && existing.keepalive_timer != desired.keepalive_timer)
        || (desired.address_families.is_some() && existing.address_families != desired.address_families)
}

pub struct BgpManager<'a> {
    portal: &'a dyn PortalApi,
    mode: ApplyMode,
}

impl<'a> BgpManager<'a> {
    pub fn new(portal: &'a dyn PortalApi, mode: ApplyMode) -> Self {
        Self { portal, mode }
    }

    pub async fn configure(&self, doc: &BgpDocument, secrets: &SecretsDocument) -> Result<ReconcileReport> {
        self.apply(doc, secrets, Operation::Configure).await
    }

    pub async fn deconfigure(&self, doc: &BgpDocument) -> Result<ReconcileReport> {
        self.apply(doc, &SecretsDocument::default(), Operation::Deconfigure)
            .await
    }

    async fn apply(
        &self,
        doc: &BgpDocument,
        secrets: &SecretsDocument,
        operation: Operation,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(devices) = &doc.bgp_peering else {
            report.set_message("No bgpPeering configuration found");
            return Ok(report);
        };

        let mut push = DevicePush::new(self.portal, self.mode);
        for (device, configs) in devices.iter() {
            let device_id = resolve_device(self.portal, device).await?;
            let state = self.portal.device_info(device_id).await?;

            let mut segments = Map::new();
            for segment in configs.iter().flat_map(|c| c.segments.iter()) {
                let existing = state
                    .segment(&segment.lan_segment)
                    .and_then(|s| s.bgp_neighbors.as_ref())
                    .map(|set| by_canonical_address(set.neighbors()))
                    .unwrap_or_default();

                let mut neighbors = Map::new();
                for neighbor in &segment.neighbors {
                    let (ip, remote_as) = validate_neighbor(neighbor)?;
                    let address = ip.to_string();
                    let object = format!("{}/{}", segment.lan_segment, address);
                    let (key, current) = match existing.get(&address) {
                        Some((key, state)) => (key.clone(), Some(state)),
                        None => (address.clone(), None),
                    };
                    let md5 = md5_for(neighbor, &address, secrets);

                    let (action, body) = match operation {
                        Operation::Deconfigure => match current {
                            Some(_) => (ItemAction::Deleted, Value::Null),
                            None => {
                                report.item(
                                    ItemOutcome::new(device, object, ItemAction::Skipped)
                                        .reason("Neighbor not present"),
                                );
                                continue;
                            }
                        },
                        Operation::Configure => {
                            let action = match current {
                                None => ItemAction::Created,
                                Some(current) if neighbor_differs(neighbor, remote_as, md5, current) => {
                                    ItemAction::Updated
                                }
                                Some(_) => {
                                    report.item(
                                        ItemOutcome::new(device, object, ItemAction::Skipped)
                                            .reason("Neighbor already matches"),
                                    );
                                    continue;
                                }
                            };
                            (action, neighbor_body(neighbor, remote_as, md5))
                        }
                    };

                    info!("BGP neighbor {} on {}: {:?}", object, device, action);
                    report.item(ItemOutcome::new(device, object, action));
                    neighbors.insert(key, json!({ "neighbor": body }));
                }

                if !neighbors.is_empty() {
                    segments.insert(segment.lan_segment.clone(), json!({ "bgpNeighbors": neighbors }));
                }
            }

            if segments.is_empty() {
                report.skipped_device(device);
            } else {
                push.queue(device, device_id, edge_payload("segments", segments));
            }
        }

        push.execute(&mut report, &format!("BGP {}", operation)).await?;
        Ok(report)
    }
}
