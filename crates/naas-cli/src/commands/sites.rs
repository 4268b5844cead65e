//! Sites and site-level object attachments

use super::{CommandContext, SitesAction};
use anyhow::{Context, Result};
use log::info;
use naas_config::SitesDocument;
use naas_core::ReconcileReport;
use naas_reconcile::SiteManager;
use std::path::Path;

pub struct SitesCommand<'c> {
    context: &'c CommandContext<'c>,
}

impl<'c> SitesCommand<'c> {
    pub fn new(context: &'c CommandContext<'c>) -> Self {
        Self { context }
    }

    pub async fn execute(&self, action: SitesAction, file: &Path) -> Result<ReconcileReport> {
        let doc: SitesDocument = self.context.load(file)?;
        let manager = SiteManager::new(self.context.portal, self.context.mode);
        info!("Running sites {} from {}", action.label(), file.display());

        let report = match action {
            SitesAction::Configure => manager.configure(&doc).await,
            SitesAction::Deconfigure => manager.deconfigure(&doc).await,
            SitesAction::ConfigureSites => manager.configure_sites(&doc).await,
            SitesAction::DeconfigureSites => manager.deconfigure_sites(&doc).await,
            SitesAction::Attach => manager.attach_objects(&doc).await,
            SitesAction::Detach => manager.detach_objects(&doc).await,
        };
        report.with_context(|| format!("sites {} failed", action.label()))
    }
}
