//! Site-to-site VPNs (device IPsec tunnels)
//!
//! Preshared keys and BGP MD5 passwords never come from the VPN file; they
//! are injected from the secrets document by VPN name. Comparisons drop both
//! secrets and only check the keys the desired config sets.

use log::{debug, info, warn};
use naas_client::PortalApi;
use naas_config::{Attributes, SecretsDocument, SiteToSiteVpnDocument};
use naas_core::{ApplyMode, ItemAction, ItemOutcome, ReconcileReport, Result, ValidationError};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::executor::{edge_payload, resolve_device, DevicePush};

const MISSING_NAME: &str = "Missing 'name' field";

/// Report entry for a config without a name, labelled by its position
fn unnamed(device: &str, index: usize) -> ItemOutcome {
    ItemOutcome::new(device, format!("entry {}", index + 1), ItemAction::Skipped).reason(MISSING_NAME)
}

const SECRET_KEYS: [&str; 2] = ["presharedKey", "md5Password"];
const POLICY_FILTERS: [(&str, &str); 2] = [("inboundPolicy", "inboundFilter"), ("outboundPolicy", "outboundFilter")];

fn policy_object(value: &Value) -> Value {
    match value {
        Value::String(policy) => json!({ "policy": policy }),
        Value::Object(obj) if obj.contains_key("policy") => value.clone(),
        Value::Object(obj) => json!({ "policy": obj.get("policy").cloned().unwrap_or(Value::Null) }),
        _ => json!({ "policy": null }),
    }
}

/// Policies as `{policy}` objects, mirrored into the matching filter keys
fn normalize_family(family: &mut Map<String, Value>) {
    for (policy_key, filter_key) in POLICY_FILTERS {
        if let Some(policy) = family.get(policy_key) {
            let policy = policy_object(policy);
            let mirrored = json!({ "policy": policy.get("policy").cloned().unwrap_or(Value::Null) });
            family.insert(policy_key.to_string(), policy);
            family.insert(filter_key.to_string(), mirrored);
        }
    }
}

/// Wrap each address family in `family` and normalise its policies
fn normalize_address_families(families: &mut Map<String, Value>) {
    for value in families.values_mut() {
        let Value::Object(entry) = value else {
            continue;
        };
        if let Some(Value::Object(family)) = entry.get_mut("family") {
            normalize_family(family);
            continue;
        }
        let mut family = std::mem::take(entry);
        normalize_family(&mut family);
        *value = json!({ "family": family });
    }
}

/// Tunnel body as pushed: secrets injected, BGP settings normalised
pub fn build_vpn(config: &Attributes, name: &str, secrets: &SecretsDocument) -> std::result::Result<Value, ValidationError> {
    let mut vpn = config.clone();
    vpn.entry("name").or_insert_with(|| json!(name));
    vpn.insert("presharedKey".to_string(), json!(secrets.preshared_key(name)?));

    let bgp = vpn
        .get_mut("routing")
        .and_then(Value::as_object_mut)
        .and_then(|routing| routing.get_mut("bgp"))
        .and_then(Value::as_object_mut);
    if let Some(bgp) = bgp {
        let md5 = match secrets.md5_password(name).map(str::trim) {
            Some(password) if !password.is_empty() => json!({ "md5Password": password }),
            _ => Value::Null,
        };
        bgp.insert("md5Password".to_string(), md5);
        if let Some(Value::Object(families)) = bgp.get_mut("addressFamilies") {
            normalize_address_families(families);
        }
    }
    Ok(Value::Object(vpn))
}

fn drop_secrets(value: &Value) -> Value {
    match value {
        Value::Object(obj) => Value::Object(
            obj.iter()
                .filter(|(key, _)| !SECRET_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), drop_secrets(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(drop_secrets).collect()),
        other => other.clone(),
    }
}

/// Desired form: `routing.bgp`/`routing.static` lifted to the top level
fn desired_for_compare(vpn: &Value) -> Value {
    let mut out = match vpn {
        Value::Object(obj) => obj.clone(),
        other => return drop_secrets(other),
    };
    if let Some(Value::Object(routing)) = out.remove("routing") {
        for key in ["bgp", "static"] {
            if let Some(section) = routing.get(key) {
                out.entry(key).or_insert_with(|| section.clone());
            }
        }
    }
    drop_secrets(&Value::Object(out))
}

/// Device form: address family list keyed by `addressFamily` and normalised
fn existing_for_compare(tunnel: &Value) -> Value {
    let mut out = drop_secrets(tunnel);
    let Some(bgp) = out.get_mut("bgp").and_then(Value::as_object_mut) else {
        return out;
    };
    if let Some(Value::Array(list)) = bgp.get("addressFamilies") {
        let mut keyed = Map::new();
        for item in list {
            let key = item
                .get("addressFamily")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| keyed.len().to_string());
            keyed.insert(key, item.clone());
        }
        bgp.insert("addressFamilies".to_string(), Value::Object(keyed));
    }
    if let Some(Value::Object(families)) = bgp.get_mut("addressFamilies") {
        for value in families.values_mut() {
            let Value::Object(entry) = value else {
                continue;
            };
            if !entry.contains_key("family") {
                let family = std::mem::take(entry);
                *value = json!({ "family": family });
            }
            if let Some(Value::Object(family)) = value.get_mut("family") {
                for (policy_key, filter_key) in POLICY_FILTERS {
                    if let Some(Value::String(policy)) = family.get(policy_key) {
                        let policy = json!({ "policy": policy });
                        family.insert(policy_key.to_string(), policy);
                    }
                    let policy = family.get(policy_key).cloned();
                    let filter = family.get(filter_key).cloned();
                    match (policy, filter) {
                        (Some(policy), None) if policy.is_object() => {
                            family.insert(filter_key.to_string(), json!({ "policy": policy["policy"] }));
                        }
                        (None, Some(filter)) if filter.is_object() => {
                            family.insert(policy_key.to_string(), json!({ "policy": filter["policy"] }));
                        }
                        _ => {}
                    }
                }
            }
        }
    }
    out
}

/// Every key set in `desired` matches `existing`; extra existing keys are ignored
pub fn subset_equal(desired: &Value, existing: &Value) -> bool {
    match (desired, existing) {
        (Value::Null, existing) => existing.is_null(),
        (Value::Object(desired), Value::Object(existing)) => desired
            .iter()
            .all(|(key, value)| existing.get(key).is_some_and(|other| subset_equal(value, other))),
        (Value::Object(_), _) => false,
        (desired, existing) => desired == existing,
    }
}

pub struct SiteToSiteVpnManager<'a> {
    portal: &'a dyn PortalApi,
    mode: ApplyMode,
}

impl<'a> SiteToSiteVpnManager<'a> {
    pub fn new(portal: &'a dyn PortalApi, mode: ApplyMode) -> Self {
        Self { portal, mode }
    }

    /// Create or update VPNs; devices whose tunnels already match are skipped
    pub async fn create(&self, doc: &SiteToSiteVpnDocument, secrets: &SecretsDocument) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(devices) = &doc.site_to_site_vpn else {
            warn!("No siteToSiteVpn configuration found");
            report.set_message("No siteToSiteVpn configuration found");
            return Ok(report);
        };

        let mut push = DevicePush::new(self.portal, self.mode);
        for (device, configs) in devices.iter() {
            let device_id = resolve_device(self.portal, device).await?;
            info!("[create] Processing device: {} (ID: {})", device, device_id);

            let mut intended: BTreeMap<String, Value> = BTreeMap::new();
            let mut tunnels = Map::new();
            for (index, config) in configs.iter().enumerate() {
                let Some(name) = config.get("name").and_then(Value::as_str) else {
                    warn!("Skipping VPN config on {} - missing 'name' field", device);
                    report.item(unnamed(device, index));
                    continue;
                };
                let vpn = build_vpn(config, name, secrets)?;
                intended.insert(name.to_string(), desired_for_compare(&vpn));
                tunnels.insert(name.to_string(), json!({ "siteToSiteVpn": vpn }));
            }
            if tunnels.is_empty() {
                report.skipped_device(device);
                continue;
            }

            let existing = self.portal.device_info(device_id).await?.site_to_site_vpns();
            let mut differs = false;
            for (name, desired) in &intended {
                let action = match existing.get(name) {
                    None => Some(ItemAction::Created),
                    Some(tunnel) if !subset_equal(desired, &existing_for_compare(tunnel)) => {
                        debug!("VPN '{}' on {} differs from device", name, device);
                        Some(ItemAction::Updated)
                    }
                    Some(_) => None,
                };
                match action {
                    Some(action) => {
                        differs = true;
                        report.item(ItemOutcome::new(device, name, action));
                    }
                    None => report.item(
                        ItemOutcome::new(device, name, ItemAction::Skipped).reason("VPN already matches"),
                    ),
                }
            }

            if differs {
                push.queue(device, device_id, edge_payload("siteToSiteVpn", tunnels));
            } else {
                info!("Site-to-Site VPN for device {} unchanged, nothing to push", device);
                report.skipped_device(device);
            }
        }

        push.execute(&mut report, "site-to-site VPN creation").await?;
        Ok(report)
    }

    /// Delete the listed VPNs that exist on each device
    pub async fn delete(&self, doc: &SiteToSiteVpnDocument) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(devices) = &doc.site_to_site_vpn else {
            warn!("No siteToSiteVpn configuration found");
            report.set_message("No siteToSiteVpn configuration found");
            return Ok(report);
        };

        let mut push = DevicePush::new(self.portal, self.mode);
        for (device, configs) in devices.iter() {
            let device_id = resolve_device(self.portal, device).await?;
            let existing = self.portal.device_info(device_id).await?.site_to_site_vpns();

            let mut deletes = Map::new();
            for (index, config) in configs.iter().enumerate() {
                let Some(name) = config.get("name").and_then(Value::as_str) else {
                    warn!("Skipping VPN delete on {} - missing 'name' field", device);
                    report.item(unnamed(device, index));
                    continue;
                };
                if existing.contains_key(name) {
                    deletes.insert(name.to_string(), json!({ "siteToSiteVpn": null }));
                    report.item(ItemOutcome::new(device, name, ItemAction::Deleted));
                } else {
                    info!("Site-to-Site VPN '{}' not present on {}, skipping delete", name, device);
                    report.item(
                        ItemOutcome::new(device, name, ItemAction::Skipped).reason("VPN not present"),
                    );
                }
            }

            if deletes.is_empty() {
                report.skipped_device(device);
            } else {
                push.queue(device, device_id, edge_payload("siteToSiteVpn", deletes));
            }
        }

        push.execute(&mut report, "site-to-site VPN deletion").await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naas_core::NaasError;
    use naas_test::FakePortal;

    const VPNS: &str = r#"
siteToSiteVpn:
  - edge-1:
      - name: vpn-aws
        ikeInitiator: true
        routing:
          bgp:
            remoteAs: 64512
            addressFamilies:
              ipv4:
                inboundPolicy: pol-in
                outboundPolicy: {policy: pol-out}
"#;

    fn doc() -> SiteToSiteVpnDocument {
        serde_yaml::from_str(VPNS).unwrap()
    }

    fn secrets() -> SecretsDocument {
        serde_yaml::from_str(
            "vault_site_to_site_vpn_keys:\n  vpn-aws: s3cret\nvault_bgp_md5_passwords:\n  vpn-aws: ' md5pw '\n",
        )
        .unwrap()
    }

    fn existing_tunnel() -> Value {
        json!({
            "name": "vpn-aws",
            "ikeInitiator": true,
            "presharedKey": "masked",
            "tunnelId": 9,
            "bgp": {
                "remoteAs": 64512,
                "md5Password": "masked",
                "addressFamilies": [
                    {"addressFamily": "ipv4", "inboundPolicy": "pol-in", "outboundFilter": {"policy": "pol-out"}}
                ]
            }
        })
    }

    #[test]
    fn test_build_vpn_injects_secrets_and_normalizes() {
        let config = &doc().site_to_site_vpn.unwrap().get("edge-1").unwrap()[0].clone();
        let vpn = build_vpn(config, "vpn-aws", &secrets()).unwrap();
        assert_eq!(vpn["presharedKey"], "s3cret");
        let bgp = &vpn["routing"]["bgp"];
        assert_eq!(bgp["md5Password"], json!({"md5Password": "md5pw"}));
        let family = &bgp["addressFamilies"]["ipv4"]["family"];
        assert_eq!(family["inboundPolicy"], json!({"policy": "pol-in"}));
        assert_eq!(family["inboundFilter"], json!({"policy": "pol-in"}));
        assert_eq!(family["outboundFilter"], json!({"policy": "pol-out"}));
    }

    #[test]
    fn test_missing_preshared_key() {
        let config = &doc().site_to_site_vpn.unwrap().get("edge-1").unwrap()[0].clone();
        let err = build_vpn(config, "vpn-aws", &SecretsDocument::default()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingSecret { .. }));
    }

    #[test]
    fn test_subset_equal() {
        assert!(subset_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!subset_equal(&json!({"a": 1, "c": 3}), &json!({"a": 1})));
        assert!(!subset_equal(&json!({"a": [1, 2]}), &json!({"a": [2, 1]})));
        assert!(subset_equal(&json!({"a": null}), &json!({"a": null})));
    }

    #[tokio::test]
    async fn test_create_skips_matching_device() {
        let portal = FakePortal::new().with_device_json(json!({
            "id": 61, "hostname": "edge-1", "ipsecTunnels": [existing_tunnel()]
        }));
        let manager = SiteToSiteVpnManager::new(&portal, ApplyMode::Apply);
        let report = manager.create(&doc(), &secrets()).await.unwrap();
        assert!(!report.changed);
        assert_eq!(report.skipped_devices, vec!["edge-1"]);
        assert!(portal.writes().is_empty());
    }

    #[tokio::test]
    async fn test_create_pushes_new_vpn() {
        let portal = FakePortal::new().with_device_json(json!({"id": 61, "hostname": "edge-1"}));
        let manager = SiteToSiteVpnManager::new(&portal, ApplyMode::Apply);
        let report = manager.create(&doc(), &secrets()).await.unwrap();
        assert!(report.changed);
        assert_eq!(report.items[0].action, ItemAction::Created);

        let vpn = &portal.device_payloads(61)[0]["edge"]["siteToSiteVpn"]["vpn-aws"]["siteToSiteVpn"];
        assert_eq!(vpn["presharedKey"], "s3cret");
        assert_eq!(vpn["name"], "vpn-aws");
    }

    #[tokio::test]
    async fn test_create_without_secret_fails() {
        let portal = FakePortal::new().with_device_json(json!({"id": 61, "hostname": "edge-1"}));
        let manager = SiteToSiteVpnManager::new(&portal, ApplyMode::Apply);
        let err = manager.create(&doc(), &SecretsDocument::default()).await.unwrap_err();
        assert!(matches!(err, NaasError::Validation(ValidationError::MissingSecret { .. })));
        assert!(portal.writes().is_empty());
    }

    #[tokio::test]
    async fn test_delete_only_present() {
        let doc: SiteToSiteVpnDocument =
            serde_yaml::from_str("siteToSiteVpn:\n  - edge-1:\n      - name: vpn-aws\n      - name: vpn-gone\n").unwrap();
        let portal = FakePortal::new().with_device_json(json!({
            "id": 61, "hostname": "edge-1", "ipsecTunnels": [existing_tunnel()]
        }));
        let manager = SiteToSiteVpnManager::new(&portal, ApplyMode::Apply);
        let report = manager.delete(&doc).await.unwrap();
        assert!(report.changed);

        let vpns = &portal.device_payloads(61)[0]["edge"]["siteToSiteVpn"];
        assert!(vpns["vpn-aws"]["siteToSiteVpn"].is_null());
        assert!(vpns.get("vpn-gone").is_none());
    }

    #[tokio::test]
    async fn test_unnamed_entry_reported_as_skipped() {
        let doc: SiteToSiteVpnDocument = serde_yaml::from_str(
            "siteToSiteVpn:\n  - edge-1:\n      - remoteAddress: 198.51.100.7\n      - name: vpn-aws\n",
        )
        .unwrap();
        let portal = FakePortal::new().with_device_json(json!({"id": 61, "hostname": "edge-1"}));
        let manager = SiteToSiteVpnManager::new(&portal, ApplyMode::Check);

        let report = manager.create(&doc, &secrets()).await.unwrap();
        assert_eq!(report.items[0].object, "entry 1");
        assert_eq!(report.items[0].action, ItemAction::Skipped);
        assert_eq!(report.items[0].reason.as_deref(), Some(MISSING_NAME));
        assert_eq!(report.items[1].action, ItemAction::Created);

        let json = report.to_json().unwrap();
        assert!(json.contains("Missing 'name' field"));

        let report = manager.delete(&doc).await.unwrap();
        assert_eq!(report.items[0].reason.as_deref(), Some(MISSING_NAME));
        assert_eq!(report.skipped_devices, vec!["edge-1"]);
    }
}
