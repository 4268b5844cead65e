//! Device-level NTP objects under `edge.ntpGlobalObject`
//!
//! Devices report their effective NTP object as a single `ntp` record, so
//! comparison is by name with domains as a sorted, trimmed list.

use log::info;
use naas_client::PortalApi;
use naas_config::NtpDocument;
use naas_core::{ApplyMode, ItemAction, ItemOutcome, Operation, ReconcileReport, Result, ValidationError};
use naas_types::DeviceState;
use serde_json::{json, Map};

use crate::executor::{edge_payload, resolve_device, DevicePush};

/// Trimmed, non-empty, sorted
pub fn normalize_domains(domains: &[String]) -> Vec<String> {
    let mut out: Vec<String> = domains
        .iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();
    out.sort();
    out
}

fn existing_domains<'s>(state: &'s DeviceState, name: &str) -> Option<&'s [String]> {
    state
        .ntp
        .as_ref()
        .filter(|ntp| ntp.name.as_deref() == Some(name))
        .map(|ntp| ntp.domains.as_slice())
}

pub struct NtpManager<'a> {
    portal: &'a dyn PortalApi,
    mode: ApplyMode,
}

impl<'a> NtpManager<'a> {
    pub fn new(portal: &'a dyn PortalApi, mode: ApplyMode) -> Self {
        Self { portal, mode }
    }

    pub async fn configure(&self, doc: &NtpDocument) -> Result<ReconcileReport> {
        self.apply(doc, Operation::Configure).await
    }

    pub async fn deconfigure(&self, doc: &NtpDocument) -> Result<ReconcileReport> {
        self.apply(doc, Operation::Deconfigure).await
    }

    async fn apply(&self, doc: &NtpDocument, operation: Operation) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(devices) = &doc.ntp_global_object else {
            info!("[ntp] No 'ntpGlobalObject' section found");
            report.set_message("No ntpGlobalObject configuration found");
            return Ok(report);
        };

        let mut push = DevicePush::new(self.portal, self.mode);
        for (device, configs) in devices.iter() {
            let device_id = resolve_device(self.portal, device).await?;
            let state = self.portal.device_info(device_id).await?;

            let mut objects = Map::new();
            let mut differs = false;
            let entries = configs
                .iter()
                .filter_map(|c| c.ntps.as_ref())
                .flat_map(|ntps| ntps.entries());
            for (name, domains) in entries {
                if name.trim().is_empty() {
                    return Err(ValidationError::Invalid {
                        object: format!("NTP object on {}", device),
                        reason: "missing 'name'".to_string(),
                    }
                    .into());
                }
                let current = existing_domains(&state, &name).map(normalize_domains);

                let (config, action) = match operation {
                    Operation::Deconfigure => {
                        let action = current.is_some().then_some(ItemAction::Deleted);
                        (json!(null), action)
                    }
                    Operation::Configure => {
                        let desired = normalize_domains(domains.as_deref().unwrap_or_default());
                        let action = match &current {
                            None => Some(ItemAction::Created),
                            Some(current) if *current != desired => Some(ItemAction::Updated),
                            Some(_) => None,
                        };
                        (json!({ "name": name, "domains": desired }), action)
                    }
                };

                let outcome = ItemOutcome::new(device, &name, ItemAction::Skipped);
                match action {
                    Some(action) => {
                        differs = true;
                        report.item(ItemOutcome { action, ..outcome });
                    }
                    None if operation == Operation::Deconfigure => {
                        report.item(outcome.reason("NTP object not present"))
                    }
                    None => report.item(outcome.reason("NTP object already matches")),
                }
                objects.insert(name, json!({ "config": config }));
            }

            if differs {
                push.queue(device, device_id, edge_payload("ntpGlobalObject", objects));
            } else {
                info!("[ntp] No changes needed for {} (ID: {}), skipping", device, device_id);
                report.skipped_device(device);
            }
        }

        push.execute(&mut report, &format!("NTP {}", operation)).await?;
        Ok(report)
    }
}
