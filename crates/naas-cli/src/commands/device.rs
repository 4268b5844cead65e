//! Device-level resources: LAG, VRRP, static routes, NTP and BGP

use super::{CommandContext, LagAction, VrrpAction};
use anyhow::{Context, Result};
use naas_config::{BgpDocument, LagDocument, NtpDocument, StaticRoutesDocument, VrrpDocument};
use naas_core::{Operation, ReconcileReport};
use naas_reconcile::{BgpManager, LagManager, NtpManager, StaticRoutesManager, VrrpManager};
use std::path::Path;

pub struct LagCommand<'c> {
    context: &'c CommandContext<'c>,
}

impl<'c> LagCommand<'c> {
    pub fn new(context: &'c CommandContext<'c>) -> Self {
        Self { context }
    }

    pub async fn execute(&self, action: LagAction, file: &Path) -> Result<ReconcileReport> {
        let doc: LagDocument = self.context.load(file)?;
        let manager = LagManager::new(self.context.portal, self.context.mode);

        let report = match action {
            LagAction::Configure => manager.configure(&doc).await,
            LagAction::Deconfigure => manager.deconfigure(&doc).await,
            LagAction::AddMembers => manager.add_members(&doc).await,
            LagAction::RemoveMembers => manager.remove_members(&doc).await,
            LagAction::UpdateLacp => manager.update_lacp(&doc).await,
            LagAction::DeleteSubinterfaces => manager.delete_subinterfaces(&doc).await,
        };
        report.with_context(|| format!("lag {} failed", action.label()))
    }
}

pub struct VrrpCommand<'c> {
    context: &'c CommandContext<'c>,
}

impl<'c> VrrpCommand<'c> {
    pub fn new(context: &'c CommandContext<'c>) -> Self {
        Self { context }
    }

    pub async fn execute(&self, action: VrrpAction, file: &Path) -> Result<ReconcileReport> {
        let doc: VrrpDocument = self.context.load(file)?;
        let manager = VrrpManager::new(self.context.portal, self.context.mode);

        let report = match action {
            VrrpAction::Configure => manager.configure(&doc).await,
            VrrpAction::Deconfigure => manager.deconfigure(&doc).await,
            VrrpAction::Enable => manager.enable(&doc).await,
        };
        report.with_context(|| format!("vrrp {} failed", action.label()))
    }
}

pub struct StaticRoutesCommand<'c> {
    context: &'c CommandContext<'c>,
}

impl<'c> StaticRoutesCommand<'c> {
    pub fn new(context: &'c CommandContext<'c>) -> Self {
        Self { context }
    }

    pub async fn execute(&self, operation: Operation, file: &Path) -> Result<ReconcileReport> {
        let doc: StaticRoutesDocument = self.context.load(file)?;
        let manager = StaticRoutesManager::new(self.context.portal, self.context.mode);

        let report = match operation {
            Operation::Configure => manager.configure(&doc).await,
            Operation::Deconfigure => manager.deconfigure(&doc).await,
        };
        report.with_context(|| format!("static routes {} failed", operation))
    }
}

pub struct NtpCommand<'c> {
    context: &'c CommandContext<'c>,
}

impl<'c> NtpCommand<'c> {
    pub fn new(context: &'c CommandContext<'c>) -> Self {
        Self { context }
    }

    pub async fn execute(&self, operation: Operation, file: &Path) -> Result<ReconcileReport> {
        let doc: NtpDocument = self.context.load(file)?;
        let manager = NtpManager::new(self.context.portal, self.context.mode);

        let report = match operation {
            Operation::Configure => manager.configure(&doc).await,
            Operation::Deconfigure => manager.deconfigure(&doc).await,
        };
        report.with_context(|| format!("ntp {} failed", operation))
    }
}

pub struct BgpCommand<'c> {
    context: &'c CommandContext<'c>,
}

impl<'c> BgpCommand<'c> {
    pub fn new(context: &'c CommandContext<'c>) -> Self {
        Self { context }
    }

    pub async fn execute(&self, operation: Operation, file: &Path) -> Result<ReconcileReport> {
        let doc: BgpDocument = self.context.load(file)?;
        let manager = BgpManager::new(self.context.portal, self.context.mode);

        let report = match operation {
            Operation::Configure => {
                let secrets = self.context.secrets()?;
                manager.configure(&doc, &secrets).await
            }
            Operation::Deconfigure => manager.deconfigure(&doc).await,
        };
        report.with_context(|| format!("bgp {} failed", operation))
    }
}
