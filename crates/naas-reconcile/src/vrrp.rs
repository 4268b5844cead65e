//! VRRP groups on interfaces and VLAN subinterfaces

use log::{info, warn};
use naas_client::PortalApi;
use naas_config::{Attributes, VrrpDocument, VrrpInterfaceConfig};
use naas_core::{ApplyMode, ItemAction, ItemOutcome, ReconcileError, ReconcileReport, Result};
use naas_types::{DeviceState, IpFamilyState, VrrpGroupState};
use serde_json::{json, Map, Value};

use crate::executor::{edge_payload, merge_json, resolve_device, DevicePush};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    const BOTH: [Family; 2] = [Family::Ipv4, Family::Ipv6];

    fn key(&self) -> &'static str {
        match self {
            Family::Ipv4 => "ipv4",
            Family::Ipv6 => "ipv6",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Family::Ipv4 => "IPv4",
            Family::Ipv6 => "IPv6",
        }
    }

    fn desired<'c>(&self, config: &'c VrrpInterfaceConfig) -> Option<&'c Attributes> {
        match self {
            Family::Ipv4 => config.vrrp_ipv4.as_ref(),
            Family::Ipv6 => config.vrrp_ipv6.as_ref(),
        }
    }
}

/// Existing VRRP group for one family on an interface or subinterface
fn existing_group(
    state: &DeviceState,
    interface: &str,
    vlan: Option<u16>,
    family: Family,
) -> Option<VrrpGroupState> {
    let iface = state.interface(interface)?;
    let (ipv4, ipv6): (&Option<IpFamilyState>, &Option<IpFamilyState>) = match vlan {
        Some(vlan) => {
            let sub = iface.subinterface(vlan)?;
            (&sub.ipv4, &sub.ipv6)
        }
        None => (&iface.ipv4, &iface.ipv6),
    };
    let family_state = match family {
        Family::Ipv4 => ipv4,
        Family::Ipv6 => ipv6,
    };
    family_state.as_ref()?.vrrp_group.clone()
}

fn is_enabled(group: &Option<VrrpGroupState>) -> bool {
    group.as_ref().and_then(|g| g.enabled) == Some(true)
}

fn target_label(interface: &str, vlan: Option<u16>) -> String {
    match vlan {
        Some(vlan) => format!("{}.{}", interface, vlan),
        None => interface.to_string(),
    }
}

/// `{name: {interface: ...}}`, nesting through `subinterfaces` for a VLAN
fn interface_entry(interface: &str, vlan: Option<u16>, families: Map<String, Value>) -> Map<String, Value> {
    let body = match vlan {
        Some(vlan) => {
            let mut sub = families;
            sub.insert("vlan".to_string(), json!(vlan));
            let mut subs = Map::new();
            subs.insert(vlan.to_string(), json!({ "interface": sub }));
            json!({ "subinterfaces": subs })
        }
        None => Value::Object(families),
    };
    let mut entry = Map::new();
    entry.insert(interface.to_string(), json!({ "interface": body }));
    entry
}

pub struct VrrpManager<'a> {
    portal: &'a dyn PortalApi,
    mode: ApplyMode,
}

impl<'a> VrrpManager<'a> {
    pub fn new(portal: &'a dyn PortalApi, mode: ApplyMode) -> Self {
        Self { portal, mode }
    }

    /// Push VRRP groups for every entry that carries one, enabled
    pub async fn configure(&self, doc: &VrrpDocument) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(devices) = &doc.vrrp_config else {
            report.set_message("No VRRP configuration found");
            return Ok(report);
        };

        let mut push = DevicePush::new(self.portal, self.mode);
        for (device, configs) in devices.iter() {
            let device_id = resolve_device(self.portal, device).await?;
            info!("[configure] Processing device: {} (ID: {})", device, device_id);

            let mut interfaces = Value::Object(Map::new());
            for config in configs {
                let vlan = config.vlan_id()?;
                if !config.has_vrrp() {
                    info!("Skipping interface '{}' - no VRRP configuration", config.name);
                    report.item(
                        ItemOutcome::new(device, &config.name, ItemAction::Skipped)
                            .vlan(vlan)
                            .reason("No VRRP config specified"),
                    );
                    continue;
                }

                let mut families = Map::new();
                for family in Family::BOTH {
                    if let Some(desired) = family.desired(config) {
                        let mut group = desired.clone();
                        group.insert("enabled".to_string(), json!(true));
                        families.insert(family.key().to_string(), json!({ "vrrpGroup": group }));
                    }
                }
                merge_json(&mut interfaces, Value::Object(interface_entry(&config.name, vlan, families)));
                report.item(ItemOutcome::new(device, &config.name, ItemAction::Configured).vlan(vlan));
            }

            match interfaces {
                Value::Object(map) if !map.is_empty() => {
                    push.queue(device, device_id, edge_payload("interfaces", map));
                }
                _ => report.skipped_device(device),
            }
        }

        push.execute(&mut report, "VRRP configuration").await?;
        Ok(report)
    }

    /// Disable groups that are currently enabled
    pub async fn deconfigure(&self, doc: &VrrpDocument) -> Result<ReconcileReport> {
        self.toggle(doc, false).await
    }

    /// Re-enable groups that exist but are disabled
    pub async fn enable(&self, doc: &VrrpDocument) -> Result<ReconcileReport> {
        self.toggle(doc, true).await
    }

    async fn toggle(&self, doc: &VrrpDocument, enable: bool) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(devices) = &doc.vrrp_config else {
            report.set_message("No VRRP configuration found");
            return Ok(report);
        };
        let verb = if enable { "enable" } else { "disable" };

        let mut push = DevicePush::new(self.portal, self.mode);
        for (device, configs) in devices.iter() {
            let device_id = resolve_device(self.portal, device).await?;
            let state = self.portal.device_info(device_id).await?;

            let mut interfaces = Value::Object(Map::new());
            for config in configs {
                let vlan = config.vlan_id()?;
                let label = target_label(&config.name, vlan);
                if !config.has_vrrp() {
                    warn!("No VRRP configuration specified for {}, skipping", label);
                    report.item(
                        ItemOutcome::new(device, &config.name, ItemAction::Skipped)
                            .vlan(vlan)
                            .reason("No VRRP config specified"),
                    );
                    continue;
                }

                let mut families = Map::new();
                for family in Family::BOTH {
                    if family.desired(config).is_none() {
                        continue;
                    }
                    let existing = existing_group(&state, &config.name, vlan, family);
                    if enable && existing.is_none() {
                        return Err(ReconcileError::VrrpNotConfigured {
                            family: family.label().to_string(),
                            interface: label,
                            device: device.to_string(),
                        }
                        .into());
                    }
                    if is_enabled(&existing) != enable {
                        info!("{} VRRP on {} will {}", family.label(), label, verb);
                        families.insert(
                            family.key().to_string(),
                            json!({ "vrrpGroup": { "enabled": enable } }),
                        );
                    }
                }

                if families.is_empty() {
                    let reason = if enable {
                        "VRRP already enabled"
                    } else {
                        "VRRP already disabled or not configured"
                    };
                    report.item(
                        ItemOutcome::new(device, &config.name, ItemAction::Skipped)
                            .vlan(vlan)
                            .reason(reason),
                    );
                    continue;
                }
                merge_json(&mut interfaces, Value::Object(interface_entry(&config.name, vlan, families)));
                report.item(ItemOutcome::new(device, &config.name, ItemAction::Updated).vlan(vlan));
            }

            match interfaces {
                Value::Object(map) if !map.is_empty() => {
                    push.queue(device, device_id, edge_payload("interfaces", map));
                }
                _ => report.skipped_device(device),
            }
        }

        push.execute(&mut report, &format!("VRRP {}", verb)).await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naas_core::NaasError;
    use naas_test::FakePortal;

    const VRRP: &str = r#"
vrrp_config:
  - edge-1:
      - name: GigabitEthernet5/0/0
        vrrp_ipv4:
          virtualRouterId: 10
          virtualIp: 10.0.0.1
          priority: 110
      - name: GigabitEthernet5/0/0
        vlan: 18
        vrrp_ipv4:
          virtualRouterId: 18
        vrrp_ipv6:
          virtualRouterId: 18
      - name: GigabitEthernet6/0/0
"#;

    fn doc() -> VrrpDocument {
        serde_yaml::from_str(VRRP).unwrap()
    }

    fn portal(main_enabled: bool, sub_v4_enabled: bool) -> FakePortal {
        FakePortal::new().with_device_json(json!({
            "id": 31,
            "hostname": "edge-1",
            "interfaces": [
                {
                    "id": 1,
                    "name": "GigabitEthernet5/0/0",
                    "ipv4": {"vrrpGroup": {"enabled": main_enabled, "virtualRouterId": 10}},
                    "subinterfaces": [{
                        "vlan": 18,
                        "ipv4": {"vrrpGroup": {"enabled": sub_v4_enabled, "virtualRouterId": 18}},
                        "ipv6": {"vrrpGroup": {"enabled": false, "virtualRouterId": 18}}
                    }]
                },
                {"id": 2, "name": "GigabitEthernet6/0/0"}
            ]
        }))
    }

    #[tokio::test]
    async fn test_configure_nests_subinterfaces() {
        let portal = portal(false, false);
        let manager = VrrpManager::new(&portal, ApplyMode::Apply);
        let report = manager.configure(&doc()).await.unwrap();
        assert!(report.changed);

        let iface = &portal.device_payloads(31)[0]["edge"]["interfaces"]["GigabitEthernet5/0/0"]["interface"];
        let group = &iface["ipv4"]["vrrpGroup"];
        assert_eq!(group["virtualRouterId"], 10);
        assert_eq!(group["enabled"], true);

        let sub = &iface["subinterfaces"]["18"]["interface"];
        assert_eq!(sub["ipv6"]["vrrpGroup"]["enabled"], true);
        assert_eq!(sub["vlan"], 18);

        let skipped = report.items.iter().find(|i| i.action == ItemAction::Skipped).unwrap();
        assert_eq!(skipped.object, "GigabitEthernet6/0/0");
    }

    #[tokio::test]
    async fn test_deconfigure_only_enabled_families() {
        let portal = portal(true, true);
        let manager = VrrpManager::new(&portal, ApplyMode::Apply);
        manager.deconfigure(&doc()).await.unwrap();

        let iface = &portal.device_payloads(31)[0]["edge"]["interfaces"]["GigabitEthernet5/0/0"]["interface"];
        assert_eq!(iface["ipv4"]["vrrpGroup"], json!({"enabled": false}));
        let sub = &iface["subinterfaces"]["18"]["interface"];
        assert_eq!(sub["ipv4"]["vrrpGroup"]["enabled"], false);
        assert!(sub.get("ipv6").is_none());
    }

    #[tokio::test]
    async fn test_deconfigure_already_disabled_is_noop() {
        let portal = portal(false, false);
        let manager = VrrpManager::new(&portal, ApplyMode::Apply);
        let report = manager.deconfigure(&doc()).await.unwrap();
        assert!(!report.changed);
        assert!(portal.writes().is_empty());
        assert_eq!(report.skipped_devices, vec!["edge-1"]);
    }

    #[tokio::test]
    async fn test_enable_skips_already_enabled() {
        let portal = portal(true, false);
        let manager = VrrpManager::new(&portal, ApplyMode::Apply);
        let report = manager.enable(&doc()).await.unwrap();

        let iface = &portal.device_payloads(31)[0]["edge"]["interfaces"]["GigabitEthernet5/0/0"]["interface"];
        assert!(iface.get("ipv4").is_none());
        let sub = &iface["subinterfaces"]["18"]["interface"];
        assert_eq!(sub["ipv4"]["vrrpGroup"]["enabled"], true);
        assert_eq!(sub["ipv6"]["vrrpGroup"]["enabled"], true);

        let reasons: Vec<_> = report.items.iter().filter_map(|i| i.reason.as_deref()).collect();
        assert_eq!(reasons, vec!["VRRP already enabled", "No VRRP config specified"]);
    }

    #[tokio::test]
    async fn test_enable_requires_existing_group() {
        let doc: VrrpDocument = serde_yaml::from_str(
            "vrrp_config:\n  - edge-1:\n      - name: GigabitEthernet6/0/0\n        vrrp_ipv6:\n          virtualRouterId: 6\n",
        )
        .unwrap();
        let portal = portal(true, true);
        let manager = VrrpManager::new(&portal, ApplyMode::Apply);
        let err = manager.enable(&doc).await.unwrap_err();
        assert!(matches!(
            err,
            NaasError::Reconcile(ReconcileError::VrrpNotConfigured { .. })
        ));
        assert!(err.to_string().contains("VRRP IPv6 configuration does not exist on GigabitEthernet6/0/0"));
    }
}
