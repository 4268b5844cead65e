//! LAG interfaces
//!
//! Existing LAGs are interfaces carrying a `lagInterface` section. Their
//! subinterfaces show up nested, or as sibling interfaces named `LAG1.101`.

use log::{info, warn};
use naas_client::PortalApi;
use naas_config::{vlan_id, LagConfig, LagDocument};
use naas_core::{ApplyMode, ItemAction, ItemOutcome, ReconcileReport, Result};
use naas_types::{DeviceState, LacpState};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::executor::{edge_payload, resolve_device, DevicePush};

/// Sibling subinterface name, `<parent>.<vlan>`
fn sibling_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+)\.(\d+)$").expect("static LAG subinterface pattern"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LagAction {
    Configure,
    AddMembers,
    RemoveMembers,
    UpdateLacp,
    DeleteSubinterfaces,
}

impl LagAction {
    fn label(&self) -> &'static str {
        match self {
            LagAction::Configure => "LAG configuration",
            LagAction::AddMembers => "LAG member addition",
            LagAction::RemoveMembers => "LAG member removal",
            LagAction::UpdateLacp => "LACP update",
            LagAction::DeleteSubinterfaces => "LAG subinterface deletion",
        }
    }
}

#[derive(Debug, Default)]
struct ExistingLag {
    alias: Option<String>,
    member_ids: BTreeSet<i64>,
    lacp: Option<LacpState>,
    /// vlan -> alias
    subinterfaces: BTreeMap<u16, Option<String>>,
}

fn existing_lags(state: &DeviceState) -> BTreeMap<String, ExistingLag> {
    let mut lags = BTreeMap::new();
    for iface in &state.interfaces {
        let Some(lag) = &iface.lag_interface else {
            continue;
        };
        let subinterfaces = iface
            .subinterfaces
            .iter()
            .filter_map(|sub| Some((sub.vlan?, sub.alias.clone())))
            .collect();
        lags.insert(
            iface.name.clone(),
            ExistingLag {
                alias: iface.alias.clone(),
                member_ids: lag.member_ids(),
                lacp: lag.lacp_config.clone(),
                subinterfaces,
            },
        );
    }

    for iface in &state.interfaces {
        let Some(captures) = sibling_pattern().captures(&iface.name) else {
            continue;
        };
        let Ok(vlan) = captures[2].parse::<u16>() else {
            continue;
        };
        if let Some(parent) = lags.get_mut(&captures[1]) {
            parent
                .subinterfaces
                .entry(vlan)
                .or_insert_with(|| iface.alias.clone());
        }
    }
    lags
}

fn same_ignoring_case(desired: Option<&str>, existing: Option<&str>) -> bool {
    match (desired, existing) {
        (None, _) => true,
        (Some(desired), Some(existing)) => desired.eq_ignore_ascii_case(existing),
        (Some(_), None) => false,
    }
}

fn lacp_body(config: &LagConfig) -> Option<Value> {
    let mut lacp = Map::new();
    if let Some(mode) = &config.lacp_mode {
        lacp.insert("mode".to_string(), json!(mode));
    }
    if let Some(timer) = &config.lacp_timer {
        lacp.insert("timer".to_string(), json!(timer));
    }
    if lacp.is_empty() {
        None
    } else {
        Some(Value::Object(lacp))
    }
}

pub struct LagManager<'a> {
    portal: &'a dyn PortalApi,
    mode: ApplyMode,
}

impl<'a> LagManager<'a> {
    pub fn new(portal: &'a dyn PortalApi, mode: ApplyMode) -> Self {
        Self { portal, mode }
    }

    /// Create new LAGs or update existing ones
    pub async fn configure(&self, doc: &LagDocument) -> Result<ReconcileReport> {
        self.apply(doc, LagAction::Configure).await
    }

    /// Add members that are not yet part of the LAG
    pub async fn add_members(&self, doc: &LagDocument) -> Result<ReconcileReport> {
        self.apply(doc, LagAction::AddMembers).await
    }

    /// Remove members that are still part of the LAG
    pub async fn remove_members(&self, doc: &LagDocument) -> Result<ReconcileReport> {
        self.apply(doc, LagAction::RemoveMembers).await
    }

    pub async fn update_lacp(&self, doc: &LagDocument) -> Result<ReconcileReport> {
        self.apply(doc, LagAction::UpdateLacp).await
    }

    /// Delete the listed subinterfaces that exist under each LAG
    pub async fn delete_subinterfaces(&self, doc: &LagDocument) -> Result<ReconcileReport> {
        self.apply(doc, LagAction::DeleteSubinterfaces).await
    }

    async fn apply(&self, doc: &LagDocument, action: LagAction) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(devices) = &doc.lag_interfaces else {
            warn!("No LAG interfaces configuration found");
            report.set_message("No LAG interfaces configuration found");
            return Ok(report);
        };

        let mut push = DevicePush::new(self.portal, self.mode);
        for (device, configs) in devices.iter() {
            info!("Processing device: {} ({} LAG config(s))", device, configs.len());
            let device_id = resolve_device(self.portal, device).await?;
            let state = self.portal.device_info(device_id).await?;
            let existing = existing_lags(&state);

            let mut lags = Map::new();
            for config in configs {
                let current = existing.get(&config.name);
                let body = match action {
                    LagAction::Configure => Some(configure_body(config, current, &state)?),
                    LagAction::AddMembers | LagAction::RemoveMembers => {
                        member_body(device, config, current, &state, action, &mut report)
                    }
                    LagAction::UpdateLacp => lacp_update_body(device, config, current, &mut report),
                    LagAction::DeleteSubinterfaces => {
                        subinterface_delete_body(device, config, current, &mut report)?
                    }
                };
                let Some(body) = body else {
                    continue;
                };

                let outcome = match (action, current) {
                    (LagAction::Configure, None) => ItemAction::Created,
                    _ => ItemAction::Updated,
                };
                info!("{} for LAG '{}' on device {}", action.label(), config.name, device);
                report.item(ItemOutcome::new(device, &config.name, outcome));
                lags.insert(config.name.clone(), json!({ "interface": body }));
            }

            if lags.is_empty() {
                report.skipped_device(device);
            } else {
                push.queue(device, device_id, edge_payload("lagInterfaces", lags));
            }
        }

        push.execute(&mut report, action.label()).await?;
        Ok(report)
    }

    /// Remove every subinterface, then the LAG itself
    pub async fn deconfigure(&self, doc: &LagDocument) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(devices) = &doc.lag_interfaces else {
            report.set_message("No LAG interfaces configuration found");
            return Ok(report);
        };

        let mut subinterface_push = DevicePush::new(self.portal, self.mode);
        let mut lag_push = DevicePush::new(self.portal, self.mode);
        for (device, configs) in devices.iter() {
            let device_id = resolve_device(self.portal, device).await?;
            let state = self.portal.device_info(device_id).await?;
            let existing = existing_lags(&state);

            let mut subinterface_deletes = Map::new();
            let mut lag_deletes = Map::new();
            for config in configs {
                let Some(current) = existing.get(&config.name) else {
                    info!("LAG '{}' does not exist on device '{}', skipping", config.name, device);
                    report.item(
                        ItemOutcome::new(device, &config.name, ItemAction::Skipped).reason("LAG does not exist"),
                    );
                    continue;
                };

                if !current.subinterfaces.is_empty() {
                    let subs: Map<String, Value> = current
                        .subinterfaces
                        .keys()
                        .map(|vlan| (vlan.to_string(), json!({ "interface": null })))
                        .collect();
                    subinterface_deletes.insert(
                        config.name.clone(),
                        json!({ "interface": { "subinterfaces": subs } }),
                    );
                }
                lag_deletes.insert(config.name.clone(), json!({ "interface": null }));
                report.item(ItemOutcome::new(device, &config.name, ItemAction::Deleted));
            }

            if lag_deletes.is_empty() {
                report.skipped_device(device);
                continue;
            }
            if !subinterface_deletes.is_empty() {
                subinterface_push.queue(device, device_id, edge_payload("lagInterfaces", subinterface_deletes));
            }
            lag_push.queue(device, device_id, edge_payload("interfaces", lag_deletes));
        }

        subinterface_push
            .execute(&mut report, "LAG subinterface deletion")
            .await?;
        lag_push.execute(&mut report, "LAG deletion").await?;
        Ok(report)
    }
}

fn configure_body(
    config: &LagConfig,
    current: Option<&ExistingLag>,
    state: &DeviceState,
) -> Result<Value> {
    let mut body = config.extra.clone();

    let alias_in_use = current.is_some_and(|lag| lag.alias.is_some() && lag.alias == config.alias);
    match &config.alias {
        Some(_) if alias_in_use => {
            info!("Dropping unchanged alias from LAG '{}'", config.name);
        }
        Some(alias) => {
            body.insert("alias".to_string(), json!(alias));
        }
        None => {}
    }

    let member_ids = state.interface_ids(&config.lag_members);
    if !member_ids.is_empty() {
        body.insert("lagMembers".to_string(), json!(member_ids));
    }
    if let Some(lacp) = lacp_body(config) {
        body.insert("lacpConfig".to_string(), lacp);
    }

    if !config.subinterfaces.is_empty() {
        let mut subs = Map::new();
        for sub in &config.subinterfaces {
            let vlan = vlan_id(&config.name, sub.vlan)?;
            let mut sub_body = sub.extra.clone();
            sub_body.insert("vlan".to_string(), json!(vlan));
            let existing_alias = current.and_then(|lag| lag.subinterfaces.get(&vlan)).cloned().flatten();
            if let Some(alias) = &sub.alias {
                if existing_alias.as_deref() == Some(alias.as_str()) {
                    info!("Dropping unchanged alias from {}.{}", config.name, vlan);
                } else {
                    sub_body.insert("alias".to_string(), json!(alias));
                }
            }
            subs.insert(vlan.to_string(), json!({ "interface": sub_body }));
        }
        body.insert("subinterfaces".to_string(), Value::Object(subs));
    }
    Ok(Value::Object(body))
}

fn member_body(
    device: &str,
    config: &LagConfig,
    current: Option<&ExistingLag>,
    state: &DeviceState,
    action: LagAction,
    report: &mut ReconcileReport,
) -> Option<Value> {
    if config.lag_members.is_empty() {
        warn!("No 'lagMembers' specified for LAG '{}' on device '{}'", config.name, device);
        report.item(ItemOutcome::new(device, &config.name, ItemAction::Skipped).reason("No lagMembers specified"));
        return None;
    }
    let Some(current) = current else {
        report.item(ItemOutcome::new(device, &config.name, ItemAction::Skipped).reason("LAG does not exist"));
        return None;
    };

    let requested = state.interface_ids(&config.lag_members);
    let (ids, op, reason): (Vec<i64>, &str, &str) = match action {
        LagAction::AddMembers => (
            requested.into_iter().filter(|id| !current.member_ids.contains(id)).collect(),
            "Add",
            "All members already added",
        ),
        _ => (
            requested.into_iter().filter(|id| current.member_ids.contains(id)).collect(),
            "Remove",
            "All members already removed",
        ),
    };
    if ids.is_empty() {
        info!("{} to LAG '{}' on device '{}', skipping", reason, config.name, device);
        report.item(ItemOutcome::new(device, &config.name, ItemAction::Skipped).reason(reason));
        return None;
    }

    let ops: Map<String, Value> = ids.iter().map(|id| (id.to_string(), json!(op))).collect();
    Some(json!({ "memberOps": ops }))
}

fn lacp_update_body(
    device: &str,
    config: &LagConfig,
    current: Option<&ExistingLag>,
    report: &mut ReconcileReport,
) -> Option<Value> {
    let Some(lacp) = lacp_body(config) else {
        warn!("No lacpMode/lacpTimer specified for LAG '{}' on device '{}'", config.name, device);
        report.item(ItemOutcome::new(device, &config.name, ItemAction::Skipped).reason("No LACP settings specified"));
        return None;
    };

    if let Some(current) = current {
        let existing = current.lacp.clone().unwrap_or_default();
        if same_ignoring_case(config.lacp_mode.as_deref(), existing.mode.as_deref())
            && same_ignoring_case(config.lacp_timer.as_deref(), existing.timer.as_deref())
        {
            report.item(
                ItemOutcome::new(device, &config.name, ItemAction::Skipped).reason("LACP settings already match"),
            );
            return None;
        }
    }
    Some(json!({ "lacpConfig": lacp }))
}

fn subinterface_delete_body(
    device: &str,
    config: &LagConfig,
    current: Option<&ExistingLag>,
    report: &mut ReconcileReport,
) -> Result<Option<Value>> {
    let Some(current) = current else {
        report.item(ItemOutcome::new(device, &config.name, ItemAction::Skipped).reason("LAG does not exist"));
        return Ok(None);
    };
    if config.subinterfaces.is_empty() {
        report.item(
            ItemOutcome::new(device, &config.name, ItemAction::Skipped).reason("No subinterfaces specified"),
        );
        return Ok(None);
    }

    let mut subs = Map::new();
    for sub in &config.subinterfaces {
        let vlan = vlan_id(&config.name, sub.vlan)?;
        if current.subinterfaces.contains_key(&vlan) {
            subs.insert(vlan.to_string(), json!({ "interface": null }));
        } else {
            report.item(
                ItemOutcome::new(device, &config.name, ItemAction::Skipped)
                    .vlan(Some(vlan))
                    .reason("Subinterface does not exist"),
            );
        }
    }
    if subs.is_empty() {
        return Ok(None);
    }
    Ok(Some(json!({ "subinterfaces": subs })))
}
