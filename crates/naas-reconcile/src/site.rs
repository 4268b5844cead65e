//! Sites and site-level attachment of global objects

use log::{info, warn};
use naas_client::PortalApi;
use naas_config::{ObjectRef, SiteAttachment, SitesDocument};
use naas_core::{
    ApplyMode, ItemAction, ItemOutcome, ReconcileError, ReconcileReport, Result, ValidationError,
};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachAction {
    Attach,
    Detach,
}

impl AttachAction {
    fn op(&self) -> &'static str {
        match self {
            AttachAction::Attach => "Attach",
            AttachAction::Detach => "Detach",
        }
    }
}

fn object_ops(objects: &[ObjectRef], op: &str) -> Map<String, Value> {
    objects
        .iter()
        .map(|object| {
            let mut entry = Map::new();
            entry.insert("operation".to_string(), json!(op));
            if let Some(interface) = object.interface() {
                entry.insert("interface".to_string(), json!({ "interface": interface }));
            }
            (object.name().to_string(), Value::Object(entry))
        })
        .collect()
}

/// `{site: {name, snmpOps, syslogServerOpsV2, ipfixExporterOpsV2}}`
fn attachment_payload(site: &str, attachment: &SiteAttachment, action: AttachAction) -> Value {
    let op = action.op();
    let mut body = Map::new();
    body.insert("name".to_string(), json!(site));

    if !attachment.snmps.is_empty() {
        let ops: Map<String, Value> = attachment
            .snmps
            .iter()
            .map(|name| (name.clone(), json!(op)))
            .collect();
        body.insert("snmpOps".to_string(), Value::Object(ops));
    }
    if !attachment.syslog_servers.is_empty() {
        body.insert(
            "syslogServerOpsV2".to_string(),
            Value::Object(object_ops(&attachment.syslog_servers, op)),
        );
    }
    if !attachment.ipfix_exporters.is_empty() {
        body.insert(
            "ipfixExporterOpsV2".to_string(),
            Value::Object(object_ops(&attachment.ipfix_exporters, op)),
        );
    }

    json!({ "site": body })
}

fn site_name<'d>(name: &'d Option<String>) -> Result<&'d str> {
    name.as_deref().ok_or_else(|| {
        ValidationError::Invalid {
            object: "sites".to_string(),
            reason: "site entry is missing 'name'".to_string(),
        }
        .into()
    })
}

/// Creates, deletes and attaches objects to sites
pub struct SiteManager<'a> {
    portal: &'a dyn PortalApi,
    mode: ApplyMode,
}

impl<'a> SiteManager<'a> {
    pub fn new(portal: &'a dyn PortalApi, mode: ApplyMode) -> Self {
        Self { portal, mode }
    }

    /// Create sites that do not exist yet
    pub async fn configure_sites(&self, doc: &SitesDocument) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(sites) = &doc.sites else {
            report.set_message("No sites defined");
            return Ok(report);
        };

        for site in sites {
            let name = site_name(&site.name)?;
            if self.portal.site_id(name).await?.is_some() {
                info!("Site '{}' already exists, skipping", name);
                report.skipped(name);
                continue;
            }

            let payload = json!({
                "site": {
                    "name": name,
                    "location": site.location.clone().unwrap_or_else(|| json!({})),
                }
            });

            if self.mode.is_check() {
                info!("Check mode: would create site '{}'", name);
                report.created(name);
                continue;
            }

            match self.portal.create_site(&payload).await {
                Ok(()) => {
                    info!("Created site '{}'", name);
                    report.created(name);
                }
                Err(e) if e.is_already_exists() => {
                    info!("Site '{}' already exists, skipping", name);
                    report.skipped(name);
                }
                Err(e) => {
                    return Err(ReconcileError::operation(format!("create site '{}'", name), e).into())
                }
            }
        }

        info!(
            "Configure completed: created={:?}, skipped={:?}",
            report.created, report.skipped
        );
        Ok(report)
    }

    /// Delete sites that exist
    pub async fn deconfigure_sites(&self, doc: &SitesDocument) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(sites) = &doc.sites else {
            report.set_message("No sites defined");
            return Ok(report);
        };

        for site in sites {
            let name = site_name(&site.name)?;
            let Some(site_id) = self.portal.site_id(name).await? else {
                info!("Site '{}' does not exist, skipping", name);
                report.skipped(name);
                continue;
            };

            if self.mode.is_check() {
                info!("Check mode: would delete site '{}'", name);
                report.deleted(name);
                continue;
            }

            match self.portal.delete_site(site_id).await {
                Ok(()) => {
                    info!("Deleted site '{}'", name);
                    report.deleted(name);
                }
                Err(e) if e.is_not_found() => report.skipped(name),
                Err(e) => {
                    return Err(ReconcileError::operation(format!("delete site '{}'", name), e).into())
                }
            }
        }

        info!(
            "Deconfigure completed: deleted={:?}, skipped={:?}",
            report.deleted, report.skipped
        );
        Ok(report)
    }

    pub async fn attach_objects(&self, doc: &SitesDocument) -> Result<ReconcileReport> {
        self.site_objects(doc, AttachAction::Attach).await
    }

    pub async fn detach_objects(&self, doc: &SitesDocument) -> Result<ReconcileReport> {
        self.site_objects(doc, AttachAction::Detach).await
    }

    async fn site_objects(&self, doc: &SitesDocument, action: AttachAction) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(attachments) = &doc.site_attachments else {
            report.set_message("No site attachments defined");
            return Ok(report);
        };

        for entry in attachments {
            for (site, attachment) in entry {
                if attachment.is_empty() {
                    info!("No global objects listed for site '{}', skipping", site);
                    report.skipped(site.as_str());
                    report.item(
                        ItemOutcome::new(site.as_str(), "site_attachments", ItemAction::Skipped)
                            .reason("No global objects listed"),
                    );
                    continue;
                }

                let site_id = match self.portal.site_id(site).await? {
                    Some(id) => id,
                    None if action == AttachAction::Detach => {
                        info!("Site '{}' does not exist, nothing to detach", site);
                        report.skipped(site.as_str());
                        continue;
                    }
                    None => {
                        return Err(ReconcileError::SiteNotFound {
                            site: site.clone(),
                            context: "cannot attach global objects".to_string(),
                        }
                        .into())
                    }
                };

                let payload = attachment_payload(site, attachment, action);
                if self.mode.is_check() {
                    info!("Check mode: would {} objects on site '{}'", action.op(), site);
                    report.updated(site.as_str());
                    continue;
                }

                match self.portal.post_site_config(site_id, &payload).await {
                    Ok(()) => {
                        info!("{} objects on site '{}' completed", action.op(), site);
                        report.updated(site.as_str());
                    }
                    Err(e) if action == AttachAction::Attach && e.is_already_exists() => {
                        warn!("Objects already attached to site '{}': {}", site, e);
                        report.skipped(site.as_str());
                    }
                    Err(e) if action == AttachAction::Detach && e.is_already_detached() => {
                        warn!("Objects already detached from site '{}': {}", site, e);
                        report.skipped(site.as_str());
                    }
                    Err(e) => {
                        return Err(ReconcileError::operation(
                            format!("{} objects on site '{}'", action.op(), site),
                            e,
                        )
                        .into())
                    }
                }
            }
        }

        Ok(report)
    }

    /// Create sites, then attach their global objects
    pub async fn configure(&self, doc: &SitesDocument) -> Result<ReconcileReport> {
        let sites = self.configure_sites(doc).await?;
        let attachments = self.attach_objects(doc).await?;
        Ok(ReconcileReport::new()
            .with_detail("sites", sites)
            .with_detail("attachments", attachments))
    }

    /// Detach global objects, then delete the sites
    pub async fn deconfigure(&self, doc: &SitesDocument) -> Result<ReconcileReport> {
        let attachments = self.detach_objects(doc).await?;
        let sites = self.deconfigure_sites(doc).await?;
        Ok(ReconcileReport::new()
            .with_detail("attachments", attachments)
            .with_detail("sites", sites))
    }
}
