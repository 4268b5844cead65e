//! Enterprise-wide objects

use super::CommandContext;
use anyhow::{anyhow, Context, Result};
use naas_config::GlobalDocument;
use naas_core::{Operation, ReconcileReport};
use naas_reconcile::{GlobalConfigManager, GlobalSection};
use std::path::Path;

pub struct GlobalCommand<'c> {
    context: &'c CommandContext<'c>,
}

/// Section name as used under `--only`
pub fn parse_section(label: &str) -> Result<GlobalSection> {
    GlobalSection::from_label(label).ok_or_else(|| {
        let known: Vec<_> = GlobalSection::ALL.iter().map(|s| s.label()).collect();
        anyhow!("Unknown global section '{}', expected one of: {}", label, known.join(", "))
    })
}

impl<'c> GlobalCommand<'c> {
    pub fn new(context: &'c CommandContext<'c>) -> Self {
        Self { context }
    }

    pub async fn execute(
        &self,
        operation: Operation,
        file: &Path,
        only: Option<&str>,
    ) -> Result<ReconcileReport> {
        let only = only.map(parse_section).transpose()?;
        let doc: GlobalDocument = self.context.load(file)?;
        let manager = GlobalConfigManager::new(self.context.portal, self.context.mode);

        let report = match operation {
            Operation::Configure => manager.configure(&doc, only).await,
            Operation::Deconfigure => manager.deconfigure(&doc, only).await,
        };
        report.with_context(|| format!("global {} failed", operation))
    }
}
