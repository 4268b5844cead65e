//! Enterprise-wide objects: prefix sets, routing policies, SNMP, syslog,
//! NTP, IPFIX, VPN profiles, LAN segments and site lists
//!
//! Objects managed through the global config endpoint are created with one
//! `PATCH` per section and deleted one at a time with `config: null`. Objects
//! still referenced are reported in `failed_objects` rather than aborting the
//! run.

use log::{info, warn};
use naas_client::PortalApi;
use naas_config::{GlobalDocument, GlobalObjectConfig, LanSegmentConfig, SiteListConfig};
use naas_core::{ApplyMode, ReconcileError, ReconcileReport, Result, ValidationError};
use naas_types::GlobalObjectKind;
use serde_json::{json, Map, Value};
use std::fmt;

/// One section of the global document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalSection {
    Objects(GlobalObjectKind),
    LanSegments,
    SiteLists,
}

impl GlobalSection {
    pub const ALL: [GlobalSection; 9] = [
        GlobalSection::Objects(GlobalObjectKind::PrefixSet),
        GlobalSection::Objects(GlobalObjectKind::RoutingPolicy),
        GlobalSection::Objects(GlobalObjectKind::Snmp),
        GlobalSection::Objects(GlobalObjectKind::Syslog),
        GlobalSection::Objects(GlobalObjectKind::Ntp),
        GlobalSection::Objects(GlobalObjectKind::Ipfix),
        GlobalSection::Objects(GlobalObjectKind::VpnProfile),
        GlobalSection::LanSegments,
        GlobalSection::SiteLists,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            GlobalSection::Objects(kind) => kind.label(),
            GlobalSection::LanSegments => "lan_segments",
            GlobalSection::SiteLists => "site_lists",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "lan_segments" => Some(GlobalSection::LanSegments),
            "site_lists" => Some(GlobalSection::SiteLists),
            other => GlobalObjectKind::from_label(other).map(GlobalSection::Objects),
        }
    }

    fn is_present(&self, doc: &GlobalDocument) -> bool {
        match self {
            GlobalSection::Objects(kind) => doc.section(*kind).is_some(),
            GlobalSection::LanSegments => doc.lan_segments.is_some(),
            GlobalSection::SiteLists => doc.site_lists.is_some(),
        }
    }
}

impl fmt::Display for GlobalSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn required_name<'d>(name: &'d Option<String>, section: &str) -> Result<&'d str> {
    name.as_deref().ok_or_else(|| {
        ValidationError::Invalid {
            object: section.to_string(),
            reason: "entry is missing 'name'".to_string(),
        }
        .into()
    })
}

fn section_payload(kind: GlobalObjectKind, objects: Map<String, Value>) -> Value {
    let mut root = Map::new();
    root.insert(kind.api_section().to_string(), Value::Object(objects));
    Value::Object(root)
}

pub struct GlobalConfigManager<'a> {
    portal: &'a dyn PortalApi,
    mode: ApplyMode,
}

impl<'a> GlobalConfigManager<'a> {
    pub fn new(portal: &'a dyn PortalApi, mode: ApplyMode) -> Self {
        Self { portal, mode }
    }

    /// Configure every present section (or only `only`), in dependency order
    pub async fn configure(
        &self,
        doc: &GlobalDocument,
        only: Option<GlobalSection>,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        for section in GlobalSection::ALL {
            if only.map_or(false, |o| o != section) || !section.is_present(doc) {
                continue;
            }
            let child = match section {
                GlobalSection::Objects(kind) => {
                    self.configure_objects(kind, doc.section(kind).unwrap_or_default())
                        .await?
                }
                GlobalSection::LanSegments => {
                    self.configure_lan_segments(doc.lan_segments.as_deref().unwrap_or_default())
                        .await?
                }
                GlobalSection::SiteLists => {
                    self.configure_site_lists(doc.site_lists.as_deref().unwrap_or_default())
                        .await?
                }
            };
            report.add_detail(section.label(), child);
        }
        if report.details.is_empty() {
            report.set_message("No global configuration sections found");
        }
        Ok(report)
    }

    pub async fn deconfigure(
        &self,
        doc: &GlobalDocument,
        only: Option<GlobalSection>,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        for section in GlobalSection::ALL {
            if only.map_or(false, |o| o != section) || !section.is_present(doc) {
                continue;
            }
            let child = match section {
                GlobalSection::Objects(kind) => {
                    self.deconfigure_objects(kind, doc.section(kind).unwrap_or_default())
                        .await?
                }
                GlobalSection::LanSegments => {
                    self.deconfigure_lan_segments(doc.lan_segments.as_deref().unwrap_or_default())
                        .await?
                }
                GlobalSection::SiteLists => {
                    self.deconfigure_site_lists(doc.site_lists.as_deref().unwrap_or_default())
                        .await?
                }
            };
            report.add_detail(section.label(), child);
        }
        if report.details.is_empty() {
            report.set_message("No global configuration sections found");
        }
        Ok(report)
    }

    /// One `PATCH` carrying every object of the section
    pub async fn configure_objects(
        &self,
        kind: GlobalObjectKind,
        objects: &[GlobalObjectConfig],
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        if objects.is_empty() {
            report.set_message(format!("No {} objects defined", kind.display_name()));
            return Ok(report);
        }

        let mut section = Map::new();
        for object in objects {
            let name = object.require_name(kind.section())?;
            let mut config = object.attributes.clone();
            config.insert("name".to_string(), json!(name));
            section.insert(name.to_string(), json!({ "config": config }));
        }

        let names: Vec<String> = section.keys().cloned().collect();
        info!("Configuring {} objects: {:?}", kind.display_name(), names);

        if !self.mode.is_check() {
            self.portal
                .patch_global_config(&section_payload(kind, section))
                .await
                .map_err(|e| ReconcileError::operation(format!("configure {}", kind), e))?;
        }

        for name in names {
            report.updated(name);
        }
        Ok(report)
    }

    async fn summaries(&self, kind: GlobalObjectKind) -> Result<Vec<naas_types::GlobalObjectSummary>> {
        let summaries = if kind == GlobalObjectKind::VpnProfile {
            self.portal.ipsec_profiles().await?
        } else {
            self.portal.global_summaries(kind).await?
        };
        Ok(summaries)
    }

    /// Delete unused objects; referenced ones land in `failed_objects`
    pub async fn deconfigure_objects(
        &self,
        kind: GlobalObjectKind,
        objects: &[GlobalObjectConfig],
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let names = objects
            .iter()
            .map(|o| o.require_name(kind.section()).map(str::to_string))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if names.is_empty() {
            report.set_message(format!("No {} objects defined", kind.display_name()));
            return Ok(report);
        }

        info!("Attempting to deconfigure {} objects: {:?}", kind.display_name(), names);
        let summaries = self.summaries(kind).await?;

        let mut to_delete = Vec::new();
        for name in &names {
            match summaries.iter().find(|s| &s.name == name) {
                None => {
                    info!("{} '{}' does not exist, skipping", kind.display_name(), name);
                    report.skipped(name.as_str());
                }
                Some(summary) if summary.in_use(kind) => {
                    warn!(
                        "{} '{}' is still in use (devices={}, sites={}, policies={}, count={})",
                        kind.display_name(),
                        name,
                        summary.num_attached_devices,
                        summary.num_attached_sites,
                        summary.num_policies,
                        summary.count
                    );
                    report.failed_object(name.as_str());
                }
                Some(_) => to_delete.push(name.clone()),
            }
        }

        for name in to_delete {
            if self.mode.is_check() {
                report.deleted(name);
                continue;
            }

            let mut section = Map::new();
            section.insert(name.clone(), json!({ "config": null }));
            match self.portal.patch_global_config(&section_payload(kind, section)).await {
                Ok(()) => {
                    info!("Deleted {} '{}'", kind.display_name(), name);
                    report.deleted(name);
                }
                Err(e) if kind == GlobalObjectKind::VpnProfile => {
                    warn!("Failed to delete VPN profile '{}': {}", name, e);
                    report.failed_object(name);
                }
                Err(e) if e.is_in_use() => {
                    warn!("{} '{}' is in use: {}", kind.display_name(), name, e);
                    report.failed_object(name);
                }
                Err(e) if e.is_not_found() => report.skipped(name),
                Err(e) => {
                    return Err(ReconcileError::operation(
                        format!("delete {} '{}'", kind.display_name(), name),
                        e,
                    )
                    .into())
                }
            }
        }

        info!(
            "Deconfigure completed: deleted={:?}, skipped={:?}, failed={:?}",
            report.deleted, report.skipped, report.failed_objects
        );
        Ok(report)
    }

    pub async fn configure_lan_segments(&self, segments: &[LanSegmentConfig]) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let existing = self.portal.lan_segments().await?;

        for segment in segments {
            let name = required_name(&segment.name, "lan_segments")?;
            if existing.iter().any(|s| s.name == name) {
                info!("LAN segment '{}' already exists, skipping", name);
                report.skipped(name);
                continue;
            }

            if !self.mode.is_check() {
                self.portal
                    .create_lan_segment(&json!({
                        "name": name,
                        "description": segment.description.as_deref().unwrap_or_default(),
                    }))
                    .await
                    .map_err(|e| {
                        ReconcileError::operation(format!("create LAN segment '{}'", name), e)
                    })?;
            }
            info!("Created LAN segment '{}'", name);
            report.created(name);
        }

        info!(
            "Configure completed: created={:?}, skipped={:?}",
            report.created, report.skipped
        );
        Ok(report)
    }

    pub async fn deconfigure_lan_segments(
        &self,
        segments: &[LanSegmentConfig],
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let existing = self.portal.lan_segments().await?;

        for segment in segments {
            let name = required_name(&segment.name, "lan_segments")?;
            let Some(current) = existing.iter().find(|s| s.name == name) else {
                report.skipped(name);
                continue;
            };

            if current.is_referenced() {
                warn!(
                    "LAN segment '{}' is still referenced (site lists={}, edges={}, interfaces={})",
                    name,
                    current.site_list_references,
                    current.edge_references,
                    current.associated_interfaces
                );
                report.failed_object(name);
                continue;
            }

            if self.mode.is_check() {
                report.deleted(name);
                continue;
            }

            match self.portal.delete_lan_segment(current.id).await {
                Ok(true) => {
                    info!("Deleted LAN segment '{}'", name);
                    report.deleted(name);
                }
                Ok(false) => {
                    warn!("Portal refused to delete LAN segment '{}'", name);
                    report.failed_object(name);
                }
                Err(e) if e.is_in_use() => report.failed_object(name),
                Err(e) if e.is_not_found() => report.skipped(name),
                Err(e) => {
                    return Err(
                        ReconcileError::operation(format!("delete LAN segment '{}'", name), e).into(),
                    )
                }
            }
        }

        info!(
            "Deconfigure completed: deleted={:?}, skipped={:?}, failed={:?}",
            report.deleted, report.skipped, report.failed_objects
        );
        Ok(report)
    }

    pub async fn configure_site_lists(&self, lists: &[SiteListConfig]) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();

        for list in lists {
            let name = required_name(&list.name, "site_lists")?;
            if self.portal.site_list_id(name).await?.is_some() {
                info!("Site list '{}' already exists, skipping", name);
                report.skipped(name);
                continue;
            }

            let mut site_ids = Vec::with_capacity(list.sites.len());
            for site in &list.sites {
                let id = self.portal.site_id(site).await?.ok_or_else(|| {
                    ReconcileError::SiteNotFound {
                        site: site.clone(),
                        context: format!(
                            "for site list '{}'. Please ensure all sites exist before creating site lists.",
                            name
                        ),
                    }
                })?;
                site_ids.push(id);
            }

            if site_ids.is_empty() {
                warn!("Site list '{}' has no sites, skipping", name);
                report.skipped(name);
                continue;
            }

            let payload = json!({
                "name": name,
                "description": list.description.clone().unwrap_or_default(),
                "sites": site_ids,
            });

            if !self.mode.is_check() {
                self.portal.create_site_list(&payload).await.map_err(|e| {
                    ReconcileError::operation(format!("create site list '{}'", name), e)
                })?;
            }
            info!("Created site list '{}'", name);
            report.created(name);
        }

        info!(
            "Configure completed: created={:?}, skipped={:?}",
            report.created, report.skipped
        );
        Ok(report)
    }

    pub async fn deconfigure_site_lists(&self, lists: &[SiteListConfig]) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();

        for list in lists {
            let name = required_name(&list.name, "site_lists")?;
            let Some(id) = self.portal.site_list_id(name).await? else {
                report.skipped(name);
                continue;
            };

            let details = self.portal.site_list(id).await?;
            if details.is_referenced() {
                warn!(
                    "Site list '{}' is still referenced (site lists={}, edges={}, policies={})",
                    name,
                    details.site_list_references,
                    details.edge_references,
                    details.policy_references
                );
                report.failed_object(name);
                continue;
            }

            if self.mode.is_check() {
                report.deleted(name);
                continue;
            }

            match self.portal.delete_site_list(id).await {
                Ok(()) => {
                    info!("Deleted site list '{}'", name);
                    report.deleted(name);
                }
                Err(e) if e.is_in_use() => report.failed_object(name),
                Err(e) if e.is_not_found() => report.skipped(name),
                Err(e) => {
                    return Err(
                        ReconcileError::operation(format!("delete site list '{}'", name), e).into(),
                    )
                }
            }
        }

        info!(
            "Deconfigure completed: deleted={:?}, skipped={:?}, failed={:?}",
            report.deleted, report.skipped, report.failed_objects
        );
        Ok(report)
    }
}
