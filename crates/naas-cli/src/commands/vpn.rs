//! Site-to-site VPNs; preshared keys come from the secrets file only

use super::CommandContext;
use anyhow::{Context, Result};
use naas_config::SiteToSiteVpnDocument;
use naas_core::{Operation, ReconcileReport};
use naas_reconcile::SiteToSiteVpnManager;
use std::path::Path;

pub struct VpnCommand<'c> {
    context: &'c CommandContext<'c>,
}

impl<'c> VpnCommand<'c> {
    pub fn new(context: &'c CommandContext<'c>) -> Self {
        Self { context }
    }

    pub async fn execute(&self, operation: Operation, file: &Path) -> Result<ReconcileReport> {
        let doc: SiteToSiteVpnDocument = self.context.load(file)?;
        let manager = SiteToSiteVpnManager::new(self.context.portal, self.context.mode);

        match operation {
            Operation::Configure => {
                let secrets = self.context.secrets()?;
                manager
                    .create(&doc, &secrets)
                    .await
                    .context("vpn create failed")
            }
            Operation::Deconfigure => manager.delete(&doc).await.context("vpn delete failed"),
        }
    }
}
