//! Data exchange services, customers, matches and invitations

use super::{CommandContext, ExchangeAction, ExchangeQuery};
use crate::output::QueryTable;
use anyhow::{bail, Context, Result};
use naas_config::{DataExchangeDocument, MatchesFile};
use naas_core::ReconcileReport;
use naas_reconcile::DataExchangeManager;
use std::path::{Path, PathBuf};

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

pub struct DataExchangeCommand<'c> {
    context: &'c CommandContext<'c>,
}

impl<'c> DataExchangeCommand<'c> {
    pub fn new(context: &'c CommandContext<'c>) -> Self {
        Self { context }
    }

    /// Where match responses go: `--matches-file` or `output/` beside the config
    fn matches_output(&self, file: &Path, matches_file: Option<&Path>) -> Result<PathBuf> {
        match matches_file {
            Some(path) => Ok(path.to_path_buf()),
            None => {
                let config = self.context.loader.resolve(file)?;
                Ok(MatchesFile::default_path(&config))
            }
        }
    }

    pub async fn execute(
        &self,
        action: ExchangeAction,
        file: &Path,
        matches_file: Option<&Path>,
    ) -> Result<ReconcileReport> {
        let doc: DataExchangeDocument = self.context.load(file)?;
        let manager = DataExchangeManager::new(self.context.portal, self.context.mode);

        let report = match action {
            ExchangeAction::CreateServices => manager.create_services(&doc).await,
            ExchangeAction::DeleteServices => manager.delete_services(&doc).await,
            ExchangeAction::CreateCustomers => manager.create_customers(&doc).await,
            ExchangeAction::DeleteCustomers => manager.delete_customers(&doc).await,
            ExchangeAction::MatchServices => {
                let run = manager
                    .match_service_to_customers(&doc)
                    .await
                    .context("data-exchange match-services failed")?;
                let mut report = run.report;
                if !self.context.mode.is_check() && !run.matches.is_empty() {
                    let path = self.matches_output(file, matches_file)?;
                    let mut store = MatchesFile::load(&path)?;
                    for record in run.matches {
                        store.upsert(record);
                    }
                    store
                        .save(&path)
                        .with_context(|| format!("Failed to save matches to {}", path.display()))?;
                    report.set_message(format!("Match responses saved to {}", path.display()));
                }
                return Ok(report);
            }
            ExchangeAction::AcceptInvitation => {
                let known = match matches_file {
                    Some(path) => {
                        let path = self.context.loader.resolve(path)?;
                        MatchesFile::load(&path)?.entries
                    }
                    None => Vec::new(),
                };
                manager.accept_invitation(&doc, &known).await
            }
        };
        report.with_context(|| format!("data-exchange {} failed", action.label()))
    }
}

pub struct DataExchangeInfoCommand<'c> {
    context: &'c CommandContext<'c>,
}

impl<'c> DataExchangeInfoCommand<'c> {
    pub fn new(context: &'c CommandContext<'c>) -> Self {
        Self { context }
    }

    pub async fn execute(&self, query: ExchangeQuery, service: Option<&str>, provider: bool) -> Result<QueryTable> {
        let manager = DataExchangeManager::new(self.context.portal, self.context.mode);

        match query {
            ExchangeQuery::ServicesSummary => {
                let services = manager.services_summary().await?;
                Ok(QueryTable {
                    title: "Data Exchange Services Summary".to_string(),
                    headers: vec!["Service Name", "Service ID", "Status", "Role", "Matched Customers"],
                    rows: services
                        .iter()
                        .map(|s| {
                            vec![
                                s.name.clone(),
                                s.id.to_string(),
                                opt(&s.status),
                                opt(&s.role),
                                s.matched_customers.to_string(),
                            ]
                        })
                        .collect(),
                    data: serde_json::json!({ "services": services }),
                })
            }
            ExchangeQuery::CustomersSummary => {
                let customers = manager.customers_summary().await?;
                Ok(QueryTable {
                    title: "Data Exchange Customers Summary".to_string(),
                    headers: vec!["Customer Name", "Customer ID", "Type", "Status", "Matched Services"],
                    rows: customers
                        .iter()
                        .map(|c| {
                            vec![
                                c.name.clone(),
                                c.id.to_string(),
                                opt(&c.customer_type),
                                opt(&c.status),
                                c.matched_services.to_string(),
                            ]
                        })
                        .collect(),
                    data: serde_json::json!({ "customers": customers }),
                })
            }
            ExchangeQuery::ServiceHealth => {
                let Some(service) = service else {
                    bail!("service-health requires --service");
                };
                let health = manager
                    .service_health(service, provider)
                    .await
                    .with_context(|| format!("Failed to get health of service '{}'", service))?;
                let view = if provider { "provider" } else { "consumer" };
                Ok(QueryTable {
                    title: format!("Service Health for '{}' ({} view)", service, view),
                    headers: vec!["Customer", "Overall", "Producer Prefixes", "Customer Prefixes"],
                    rows: health
                        .iter()
                        .map(|h| {
                            vec![
                                h.customer_name.clone(),
                                opt(&h.overall_health),
                                opt(&h.producer_prefix_health),
                                opt(&h.customer_prefix_health),
                            ]
                        })
                        .collect(),
                    data: serde_json::json!({ "service": service, "provider": provider, "health": health }),
                })
            }
        }
    }
}
