//! Ethernet interfaces, subinterfaces and WAN circuits
//!
//! Circuits are only pushed when an in-scope interface references them.
//! Deconfiguring returns interfaces to the enterprise default LAN; WAN
//! circuits lose their static routes in a separate push first, since the
//! portal refuses to detach a circuit that still carries routes.

use log::info;
use naas_client::PortalApi;
use naas_config::{CircuitConfig, CircuitsDocument, InterfaceConfig, InterfacesDocument, SubinterfaceConfig};
use naas_core::{
    ApplyMode, InterfaceScope, ItemAction, ItemOutcome, ReconcileReport, Result,
};
use naas_types::DeviceState;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

use crate::executor::{resolve_device, DevicePush};

const EMPTY_CIRCUITS: &[CircuitConfig] = &[];

struct DeviceConfigs<'d> {
    interfaces: &'d [InterfaceConfig],
    circuits: &'d [CircuitConfig],
}

/// Devices from the interfaces file, then devices only named in the circuits file
fn device_configs<'d>(
    interfaces: &'d InterfacesDocument,
    circuits: Option<&'d CircuitsDocument>,
) -> Vec<(&'d str, DeviceConfigs<'d>)> {
    let circuit_list = circuits.and_then(|doc| doc.circuits.as_ref());
    let circuits_for = |device: &str| {
        circuit_list
            .and_then(|list| list.get(device))
            .unwrap_or(EMPTY_CIRCUITS)
    };

    let mut devices = Vec::new();
    if let Some(list) = &interfaces.interfaces {
        for (device, entries) in list.iter() {
            devices.push((
                device,
                DeviceConfigs {
                    interfaces: entries,
                    circuits: circuits_for(device),
                },
            ));
        }
    }
    if let Some(list) = circuit_list {
        for (device, entries) in list.iter() {
            if !devices.iter().any(|(name, _)| *name == device) {
                devices.push((
                    device,
                    DeviceConfigs {
                        interfaces: &[],
                        circuits: entries,
                    },
                ));
            }
        }
    }
    devices
}

fn main_in_scope(iface: &InterfaceConfig, scope: InterfaceScope) -> bool {
    (scope.includes_lan() && iface.is_lan()) || (scope.includes_wan() && iface.is_wan())
}

fn subinterfaces_in_scope(iface: &InterfaceConfig, scope: InterfaceScope) -> Vec<&SubinterfaceConfig> {
    iface
        .subinterfaces
        .iter()
        .filter(|sub| (scope.includes_lan() && sub.is_lan()) || (scope.includes_wan() && sub.is_wan()))
        .collect()
}

/// Circuits named by in-scope interfaces and subinterfaces
fn referenced_circuits(interfaces: &[InterfaceConfig], scope: InterfaceScope) -> BTreeSet<String> {
    let mut referenced = BTreeSet::new();
    for iface in interfaces {
        if main_in_scope(iface, scope) {
            if let Some(circuit) = &iface.circuit {
                referenced.insert(circuit.clone());
            }
        }
        for sub in subinterfaces_in_scope(iface, scope) {
            if let Some(circuit) = &sub.circuit {
                referenced.insert(circuit.clone());
            }
        }
    }
    referenced
}

fn interface_body(
    alias: &Option<String>,
    lan: &Option<String>,
    circuit: &Option<String>,
    extra: &Map<String, Value>,
) -> Map<String, Value> {
    let mut body = extra.clone();
    if let Some(alias) = alias {
        body.insert("alias".to_string(), json!(alias));
    }
    if let Some(lan) = lan {
        body.insert("lan".to_string(), json!(lan));
    }
    if let Some(circuit) = circuit {
        body.insert("circuit".to_string(), json!(circuit));
    }
    body
}

fn circuit_body(circuit: &CircuitConfig) -> Value {
    let mut body = circuit.extra.clone();
    if let Some(routes) = &circuit.static_routes {
        let routes: Map<String, Value> = routes
            .iter()
            .map(|(prefix, route)| {
                let mut route = match route {
                    Value::Object(map) => map.clone(),
                    _ => Map::new(),
                };
                route
                    .entry("destinationPrefix")
                    .or_insert_with(|| json!(prefix));
                (prefix.clone(), json!({ "route": route }))
            })
            .collect();
        body.insert("staticRoutes".to_string(), Value::Object(routes));
    }
    json!({ "circuit": body })
}

fn edge(interfaces: Map<String, Value>, circuits: Map<String, Value>) -> Option<Value> {
    let mut edge = Map::new();
    if !interfaces.is_empty() {
        edge.insert("interfaces".to_string(), Value::Object(interfaces));
    }
    if !circuits.is_empty() {
        edge.insert("circuits".to_string(), Value::Object(circuits));
    }
    if edge.is_empty() {
        None
    } else {
        Some(json!({ "edge": edge }))
    }
}

pub struct InterfaceManager<'a> {
    portal: &'a dyn PortalApi,
    mode: ApplyMode,
}

impl<'a> InterfaceManager<'a> {
    pub fn new(portal: &'a dyn PortalApi, mode: ApplyMode) -> Self {
        Self { portal, mode }
    }

    /// Push interfaces in `scope` and the circuits they reference
    pub async fn configure(
        &self,
        interfaces: &InterfacesDocument,
        circuits: Option<&CircuitsDocument>,
        scope: InterfaceScope,
        circuits_only: bool,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        if interfaces.interfaces.is_none() {
            report.set_message("No interfaces configuration found");
            return Ok(report);
        }

        let mut push = DevicePush::new(self.portal, self.mode);
        for (device, configs) in device_configs(interfaces, circuits) {
            let device_id = resolve_device(self.portal, device).await?;
            let referenced = referenced_circuits(configs.interfaces, scope);
            info!("[configure] Processing device: {} (ID: {})", device, device_id);
            info!("Referenced circuits: {:?}", referenced);

            let mut circuit_payload = Map::new();
            for circuit in configs.circuits {
                if referenced.contains(&circuit.circuit) {
                    circuit_payload.insert(circuit.circuit.clone(), circuit_body(circuit));
                    report.item(ItemOutcome::new(device, &circuit.circuit, ItemAction::Configured));
                } else {
                    info!("Skipping circuit '{}' - not referenced in interface configs", circuit.circuit);
                    report.item(
                        ItemOutcome::new(device, &circuit.circuit, ItemAction::Skipped)
                            .reason("Circuit not referenced by any interface"),
                    );
                }
            }

            let mut interface_payload = Map::new();
            if !circuits_only {
                for iface in configs.interfaces {
                    let main = main_in_scope(iface, scope);
                    let subs = subinterfaces_in_scope(iface, scope);
                    if !main && subs.is_empty() {
                        info!("Skipping interface '{}' - no configuration found", iface.name);
                        report.item(
                            ItemOutcome::new(device, &iface.name, ItemAction::Skipped)
                                .reason(format!("No {} configuration", scope)),
                        );
                        continue;
                    }

                    let mut body = if main {
                        interface_body(&iface.alias, &iface.lan, &iface.circuit, &iface.extra)
                    } else {
                        Map::new()
                    };

                    if !subs.is_empty() {
                        let mut sub_payload = Map::new();
                        for sub in &subs {
                            let vlan = sub.vlan_id(&iface.name)?;
                            let mut sub_body = interface_body(&sub.alias, &sub.lan, &sub.circuit, &sub.extra);
                            sub_body.insert("vlan".to_string(), json!(vlan));
                            sub_payload.insert(vlan.to_string(), json!({ "interface": sub_body }));
                            report.item(
                                ItemOutcome::new(device, &iface.name, ItemAction::Configured).vlan(Some(vlan)),
                            );
                        }
                        body.insert("subinterfaces".to_string(), Value::Object(sub_payload));
                    }

                    if main {
                        report.item(ItemOutcome::new(device, &iface.name, ItemAction::Configured));
                    }
                    interface_payload.insert(iface.name.clone(), json!({ "interface": body }));
                }
            }

            match edge(interface_payload, circuit_payload) {
                Some(payload) => push.queue(device, device_id, payload),
                None => {
                    info!("Device {}: nothing to configure", device);
                    report.skipped_device(device);
                }
            }
        }

        let what = if circuits_only { "circuits" } else { "interfaces and circuits" };
        push.execute(&mut report, what).await?;
        Ok(report)
    }

    /// Reset interfaces to the default LAN and remove circuit static routes
    pub async fn deconfigure(
        &self,
        interfaces: &InterfacesDocument,
        circuits: Option<&CircuitsDocument>,
        scope: InterfaceScope,
        circuits_only: bool,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        if interfaces.interfaces.is_none() {
            report.set_message("No interfaces configuration found");
            return Ok(report);
        }

        if circuits_only {
            return self.deconfigure_circuit_routes(interfaces, circuits, scope).await;
        }

        if scope.includes_wan() {
            let stage = self.deconfigure_circuit_routes(interfaces, circuits, scope).await?;
            report.merge(stage);
        }
        let stage = self.deconfigure_interfaces(interfaces, circuits, scope).await?;
        report.merge(stage);
        Ok(report)
    }

    /// Delete static routes that exist on referenced circuits
    async fn deconfigure_circuit_routes(
        &self,
        interfaces: &InterfacesDocument,
        circuits: Option<&CircuitsDocument>,
        scope: InterfaceScope,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let mut push = DevicePush::new(self.portal, self.mode);

        for (device, configs) in device_configs(interfaces, circuits) {
            if configs.circuits.is_empty() {
                continue;
            }
            let device_id = resolve_device(self.portal, device).await?;
            let state = self.portal.device_info(device_id).await?;
            let referenced = referenced_circuits(configs.interfaces, scope);

            let mut circuit_payload = Map::new();
            for circuit in configs.circuits {
                let name = &circuit.circuit;
                if !referenced.contains(name) {
                    info!("Skipping circuit '{}' - not referenced in interface configs", name);
                    continue;
                }

                let prefixes = circuit_prefixes_to_delete(&state, circuit);
                let existing = state.circuit_route_prefixes(name);
                if existing.is_empty() {
                    info!("Circuit '{}' has no staticRoutes on {}, skipping", name, device);
                    report.item(
                        ItemOutcome::new(device, name, ItemAction::Skipped).reason("Circuit has no staticRoutes"),
                    );
                    continue;
                }
                if prefixes.is_empty() {
                    report.item(
                        ItemOutcome::new(device, name, ItemAction::Skipped).reason("StaticRoutes already removed"),
                    );
                    continue;
                }

                info!(
                    "To deconfigure {} staticRoutes on circuit '{}' for device: {}",
                    prefixes.len(),
                    name,
                    device
                );
                let routes: Map<String, Value> = prefixes
                    .iter()
                    .map(|prefix| (prefix.clone(), json!({ "route": null })))
                    .collect();
                circuit_payload.insert(name.clone(), json!({ "circuit": { "staticRoutes": routes } }));
                report.item(
                    ItemOutcome::new(device, name, ItemAction::Deleted)
                        .reason(format!("Removed staticRoutes: {}", prefixes.join(", "))),
                );
            }

            match edge(Map::new(), circuit_payload) {
                Some(payload) => push.queue(device, device_id, payload),
                None => report.skipped_device(device),
            }
        }

        push.execute(&mut report, "circuit static route removal").await?;
        Ok(report)
    }

    async fn deconfigure_interfaces(
        &self,
        interfaces: &InterfacesDocument,
        circuits: Option<&CircuitsDocument>,
        scope: InterfaceScope,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let default_lan = self.portal.enterprise().await?.default_lan();
        let mut push = DevicePush::new(self.portal, self.mode);

        for (device, configs) in device_configs(interfaces, circuits) {
            if configs.interfaces.is_empty() {
                continue;
            }
            let device_id = resolve_device(self.portal, device).await?;
            let state = self.portal.device_info(device_id).await?;
            info!("[deconfigure] Processing device: {} (ID: {})", device, device_id);

            let mut interface_payload = Map::new();
            for iface in configs.interfaces {
                let parent_requested = main_in_scope(iface, scope);
                let subs = subinterfaces_in_scope(iface, scope);
                if !parent_requested && subs.is_empty() {
                    continue;
                }

                let current = state.interface(&iface.name);
                let needs_reset = match current {
                    Some(current) if parent_requested => {
                        current.lan_name() != Some(default_lan.as_str()) || current.circuit_name().is_some()
                    }
                    _ => false,
                };

                if parent_requested {
                    match current {
                        None => {
                            info!("Interface '{}' does not exist on {}, skipping", iface.name, device);
                            report.item(
                                ItemOutcome::new(device, &iface.name, ItemAction::Skipped)
                                    .reason("Interface does not exist"),
                            );
                        }
                        Some(_) if !needs_reset => {
                            report.item(
                                ItemOutcome::new(device, &iface.name, ItemAction::Skipped)
                                    .reason("Interface already at default LAN"),
                            );
                        }
                        Some(_) => {}
                    }
                }

                let mut sub_payload = Map::new();
                for sub in subs {
                    let vlan = sub.vlan_id(&iface.name)?;
                    if state.has_interface(&iface.name, Some(vlan)) {
                        sub_payload.insert(vlan.to_string(), json!({ "interface": null }));
                        report.item(ItemOutcome::new(device, &iface.name, ItemAction::Deleted).vlan(Some(vlan)));
                    } else {
                        info!("Subinterface '{}.{}' does not exist on {}, skipping", iface.name, vlan, device);
                        report.item(
                            ItemOutcome::new(device, &iface.name, ItemAction::Skipped)
                                .vlan(Some(vlan))
                                .reason("Subinterface does not exist"),
                        );
                    }
                }

                if !needs_reset && sub_payload.is_empty() {
                    continue;
                }

                let mut body = Map::new();
                if needs_reset {
                    info!("Interface '{}' on {} will reset to {}", iface.name, device, default_lan);
                    body.insert("lan".to_string(), json!(default_lan));
                    body.insert("circuit".to_string(), Value::Null);
                    report.item(
                        ItemOutcome::new(device, &iface.name, ItemAction::Updated)
                            .reason(format!("Reset to {}", default_lan)),
                    );
                }
                if !sub_payload.is_empty() {
                    body.insert("subinterfaces".to_string(), Value::Object(sub_payload));
                }
                interface_payload.insert(iface.name.clone(), json!({ "interface": body }));
            }

            match edge(interface_payload, Map::new()) {
                Some(payload) => push.queue(device, device_id, payload),
                None => {
                    info!("Device {}: All interfaces already deconfigured or not configured", device);
                    report.skipped_device(device);
                }
            }
        }

        push.execute(&mut report, "interface deconfiguration").await?;
        Ok(report)
    }
}

/// Existing prefixes, narrowed to the requested ones when the circuit lists any
fn circuit_prefixes_to_delete(state: &DeviceState, circuit: &CircuitConfig) -> Vec<String> {
    let existing = state.circuit_route_prefixes(&circuit.circuit);
    match &circuit.static_routes {
        Some(requested) if !requested.is_empty() => existing
            .into_iter()
            .filter(|prefix| requested.contains_key(prefix))
            .collect(),
        _ => existing.into_iter().collect(),
    }
}
