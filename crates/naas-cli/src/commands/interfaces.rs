//! Interfaces, subinterfaces and WAN circuits

use super::CommandContext;
use anyhow::{bail, Context, Result};
use naas_config::{CircuitsDocument, InterfacesDocument};
use naas_core::{InterfaceScope, Operation, ReconcileReport};
use naas_reconcile::InterfaceManager;
use std::path::Path;

pub struct InterfacesCommand<'c> {
    context: &'c CommandContext<'c>,
}

impl<'c> InterfacesCommand<'c> {
    pub fn new(context: &'c CommandContext<'c>) -> Self {
        Self { context }
    }

    pub async fn execute(
        &self,
        operation: Operation,
        interfaces: &Path,
        circuits: Option<&Path>,
        scope: InterfaceScope,
        circuits_only: bool,
    ) -> Result<ReconcileReport> {
        if circuits_only && circuits.is_none() {
            bail!("--circuits-only requires a circuits file (--circuits)");
        }

        let interfaces_doc: InterfacesDocument = self.context.load(interfaces)?;
        let circuits_doc: Option<CircuitsDocument> =
            circuits.map(|path| self.context.load(path)).transpose()?;

        let manager = InterfaceManager::new(self.context.portal, self.context.mode);
        let report = match operation {
            Operation::Configure => {
                manager
                    .configure(&interfaces_doc, circuits_doc.as_ref(), scope, circuits_only)
                    .await
            }
            Operation::Deconfigure => {
                manager
                    .deconfigure(&interfaces_doc, circuits_doc.as_ref(), scope, circuits_only)
                    .await
            }
        };
        report.with_context(|| format!("interfaces {} ({} scope) failed", operation, scope))
    }
}
