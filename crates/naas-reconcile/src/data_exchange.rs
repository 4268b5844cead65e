//! Data exchange services, customers, matches and invitation acceptance
//!
//! Services and customers are created when their name is unknown and deleted
//! when it exists. Customers must go before the services they are matched
//! to; a service still matched lands in `failed_objects`. Names of LAN
//! segments and sites in a payload are replaced by their ids.

use log::{info, warn};
use naas_client::PortalApi;
use naas_config::{
    Attributes, DataExchangeDocument, ExchangeAcceptanceConfig, ExchangeMatchConfig,
};
use naas_core::{ApiError, ApplyMode, ReconcileError, ReconcileReport, Result};
use naas_types::{CustomerHealth, ExchangeCustomer, ExchangeService, ServiceMatch};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeKind {
    Service,
    Customer,
}

impl ExchangeKind {
    fn label(&self) -> &'static str {
        match self {
            ExchangeKind::Service => "Data Exchange service",
            ExchangeKind::Customer => "Data Exchange customer",
        }
    }
}

/// Result of matching services to customers
#[derive(Debug, Clone, Default)]
pub struct MatchRun {
    pub report: ReconcileReport,
    /// Matches created or found, for the matches file
    pub matches: Vec<ServiceMatch>,
}

fn match_label(service: &str, customer: &str) -> String {
    format!("{}/{}", service, customer)
}

pub struct DataExchangeManager<'a> {
    portal: &'a dyn PortalApi,
    mode: ApplyMode,
}

impl<'a> DataExchangeManager<'a> {
    pub fn new(portal: &'a dyn PortalApi, mode: ApplyMode) -> Self {
        Self { portal, mode }
    }

    /// Name and id of every existing object of `kind`
    async fn existing(&self, kind: ExchangeKind) -> Result<Vec<(String, i64)>> {
        Ok(match kind {
            ExchangeKind::Service => self
                .portal
                .exchange_services()
                .await?
                .into_iter()
                .map(|s| (s.name, s.id))
                .collect(),
            ExchangeKind::Customer => self
                .portal
                .exchange_customers()
                .await?
                .into_iter()
                .map(|c| (c.name, c.id))
                .collect(),
        })
    }

    async fn create_object(&self, kind: ExchangeKind, payload: &Value) -> std::result::Result<(), ApiError> {
        match kind {
            ExchangeKind::Service => self.portal.create_exchange_service(payload).await,
            ExchangeKind::Customer => self.portal.create_exchange_customer(payload).await,
        }
    }

    async fn delete_object(&self, kind: ExchangeKind, id: i64) -> std::result::Result<(), ApiError> {
        match kind {
            ExchangeKind::Service => self.portal.delete_exchange_service(id).await,
            ExchangeKind::Customer => self.portal.delete_exchange_customer(id).await,
        }
    }

    /// `lanSegment` becomes `lanSegmentId`, `sites` names become `siteIds`
    async fn resolve_names(&self, owner: &str, mut body: Attributes) -> Result<Attributes> {
        if let Some(segment) = body.get("lanSegment").and_then(Value::as_str).map(str::to_string) {
            let id = self
                .portal
                .lan_segments()
                .await?
                .into_iter()
                .find(|s| s.name == segment)
                .map(|s| s.id)
                .ok_or_else(|| ReconcileError::ObjectNotFound {
                    kind: "LAN segment".to_string(),
                    name: segment.clone(),
                })?;
            body.remove("lanSegment");
            body.insert("lanSegmentId".to_string(), json!(id));
        }

        if let Some(Value::Array(sites)) = body.get("sites").cloned() {
            let mut ids = Vec::with_capacity(sites.len());
            for site in sites.iter().filter_map(Value::as_str) {
                let id = self.portal.site_id(site).await?.ok_or_else(|| ReconcileError::SiteNotFound {
                    site: site.to_string(),
                    context: format!("referenced by '{}'", owner),
                })?;
                ids.push(id);
            }
            body.remove("sites");
            body.insert("siteIds".to_string(), json!(ids));
        }

        Ok(body)
    }

    async fn create_all(&self, kind: ExchangeKind, entries: &[(&str, &Attributes)]) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let existing = self.existing(kind).await?;

        for (name, extra) in entries {
            if existing.iter().any(|(known, _)| known.as_str() == *name) {
                info!("{} '{}' already exists, skipping", kind.label(), name);
                report.skipped(*name);
                continue;
            }

            let mut body = self.resolve_names(name, (*extra).clone()).await?;
            body.insert("name".to_string(), json!(name));
            let payload = Value::Object(body);

            if self.mode.is_check() {
                info!("Check mode: would create {} '{}'", kind.label(), name);
                report.created(*name);
                continue;
            }

            match self.create_object(kind, &payload).await {
                Ok(()) => {
                    info!("Created {} '{}'", kind.label(), name);
                    report.created(*name);
                }
                Err(e) if e.is_already_exists() => report.skipped(*name),
                Err(e) => {
                    return Err(ReconcileError::operation(format!("create {} '{}'", kind.label(), name), e).into())
                }
            }
        }

        info!(
            "Create completed: created={:?}, skipped={:?}",
            report.created, report.skipped
        );
        Ok(report)
    }

    async fn delete_all(&self, kind: ExchangeKind, names: &[&str]) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let existing = self.existing(kind).await?;

        for name in names {
            let Some((_, id)) = existing.iter().find(|(known, _)| known.as_str() == *name) else {
                info!("{} '{}' does not exist, skipping", kind.label(), name);
                report.skipped(*name);
                continue;
            };

            if self.mode.is_check() {
                info!("Check mode: would delete {} '{}'", kind.label(), name);
                report.deleted(*name);
                continue;
            }

            match self.delete_object(kind, *id).await {
                Ok(()) => {
                    info!("Deleted {} '{}'", kind.label(), name);
                    report.deleted(*name);
                }
                Err(e) if e.is_in_use() => {
                    warn!("{} '{}' is in use: {}", kind.label(), name, e);
                    report.failed_object(*name);
                }
                Err(e) if e.is_not_found() => report.skipped(*name),
                Err(e) => {
                    return Err(ReconcileError::operation(format!("delete {} '{}'", kind.label(), name), e).into())
                }
            }
        }

        info!(
            "Delete completed: deleted={:?}, skipped={:?}, failed={:?}",
            report.deleted, report.skipped, report.failed_objects
        );
        Ok(report)
    }

    pub async fn create_services(&self, doc: &DataExchangeDocument) -> Result<ReconcileReport> {
        let Some(services) = &doc.data_exchange_services else {
            return Ok(empty("No data_exchange_services defined"));
        };
        let entries: Vec<_> = services.iter().map(|s| (s.name.as_str(), &s.extra)).collect();
        self.create_all(ExchangeKind::Service, &entries).await
    }

    pub async fn delete_services(&self, doc: &DataExchangeDocument) -> Result<ReconcileReport> {
        let Some(services) = &doc.data_exchange_services else {
            return Ok(empty("No data_exchange_services defined"));
        };
        let names: Vec<_> = services.iter().map(|s| s.name.as_str()).collect();
        self.delete_all(ExchangeKind::Service, &names).await
    }

    pub async fn create_customers(&self, doc: &DataExchangeDocument) -> Result<ReconcileReport> {
        let Some(customers) = &doc.data_exchange_customers else {
            return Ok(empty("No data_exchange_customers defined"));
        };
        let entries: Vec<_> = customers.iter().map(|c| (c.name.as_str(), &c.extra)).collect();
        self.create_all(ExchangeKind::Customer, &entries).await
    }

    pub async fn delete_customers(&self, doc: &DataExchangeDocument) -> Result<ReconcileReport> {
        let Some(customers) = &doc.data_exchange_customers else {
            return Ok(empty("No data_exchange_customers defined"));
        };
        let names: Vec<_> = customers.iter().map(|c| c.name.as_str()).collect();
        self.delete_all(ExchangeKind::Customer, &names).await
    }

    fn id_of(&self, kind: ExchangeKind, existing: &[(String, i64)], name: &str) -> Result<i64> {
        existing
            .iter()
            .find(|(known, _)| known.as_str() == name)
            .map(|(_, id)| *id)
            .ok_or_else(|| {
                ReconcileError::ObjectNotFound {
                    kind: kind.label().to_string(),
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Match each service to its customer unless the match already exists
    pub async fn match_service_to_customers(&self, doc: &DataExchangeDocument) -> Result<MatchRun> {
        let mut run = MatchRun::default();
        let Some(entries) = &doc.data_exchange_matches else {
            run.report.set_message("No data_exchange_matches defined");
            return Ok(run);
        };

        let services = self.existing(ExchangeKind::Service).await?;
        let customers = self.existing(ExchangeKind::Customer).await?;

        for entry in entries {
            let label = match_label(&entry.service_name, &entry.customer_name);
            let service_id = self.id_of(ExchangeKind::Service, &services, &entry.service_name)?;
            let customer_id = self.id_of(ExchangeKind::Customer, &customers, &entry.customer_name)?;

            let current = self
                .portal
                .service_matches(service_id)
                .await?
                .into_iter()
                .find(|m| m.customer_id == Some(customer_id) || m.customer_name == entry.customer_name);
            if let Some(mut current) = current {
                info!("Match {} already exists, skipping", label);
                fill_names(&mut current, entry);
                run.report.skipped(label);
                run.matches.push(current);
                continue;
            }

            if self.mode.is_check() {
                info!("Check mode: would match {}", label);
                run.report.created(label);
                continue;
            }

            let mut body = entry.extra.clone();
            body.insert("customerId".to_string(), json!(customer_id));
            match self.portal.match_service(service_id, &Value::Object(body)).await {
                Ok(mut created) => {
                    info!("Matched {} (match id {:?})", label, created.match_id);
                    created.service_id.get_or_insert(service_id);
                    created.customer_id.get_or_insert(customer_id);
                    fill_names(&mut created, entry);
                    run.report.created(label);
                    run.matches.push(created);
                }
                Err(e) => return Err(ReconcileError::operation(format!("match {}", label), e).into()),
            }
        }

        Ok(run)
    }

    /// Match for an acceptance: ids from the matches file first, then the API
    async fn resolve_match(&self, acceptance: &ExchangeAcceptanceConfig, known: &[ServiceMatch]) -> Result<ServiceMatch> {
        let service = acceptance.service_name.as_str();
        let customer = acceptance.customer_name.as_str();
        let recorded = known.iter().find(|m| m.is_for(service, customer));

        if let Some(record) = recorded.filter(|m| m.match_id.is_some() && m.service_id.is_some()) {
            return Ok(record.clone());
        }

        let service_id = match recorded.and_then(|m| m.service_id) {
            Some(id) => id,
            None => {
                let services = self.existing(ExchangeKind::Service).await?;
                self.id_of(ExchangeKind::Service, &services, service)?
            }
        };

        self.portal
            .service_matches(service_id)
            .await?
            .into_iter()
            .find(|m| m.customer_name == customer && m.match_id.is_some())
            .ok_or_else(|| {
                ReconcileError::ObjectNotFound {
                    kind: "Data Exchange match".to_string(),
                    name: match_label(service, customer),
                }
                .into()
            })
    }

    /// Accept invitations; `known` is the content of the matches file
    pub async fn accept_invitation(&self, doc: &DataExchangeDocument, known: &[ServiceMatch]) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        let Some(acceptances) = &doc.data_exchange_acceptances else {
            report.set_message("No data_exchange_acceptances defined");
            return Ok(report);
        };

        for acceptance in acceptances {
            acceptance.validate()?;
        }

        for acceptance in acceptances {
            let label = match_label(&acceptance.service_name, &acceptance.customer_name);
            let record = self.resolve_match(acceptance, known).await?;
            if record.is_accepted() {
                info!("Invitation {} already accepted, skipping", label);
                report.skipped(label);
                continue;
            }

            let mut body = self.resolve_names(&label, acceptance.extra.clone()).await?;
            body.insert("gateways".to_string(), Value::Array(acceptance.gateway_payloads()));
            let Some(match_id) = record.match_id else {
                return Err(ReconcileError::ObjectNotFound {
                    kind: "Data Exchange match".to_string(),
                    name: label,
                }
                .into());
            };

            if self.mode.is_check() {
                info!("Check mode: would accept invitation {} (match id {})", label, match_id);
                report.updated(label);
                continue;
            }

            self.portal
                .accept_invitation(match_id, &Value::Object(body))
                .await
                .map_err(|e| ReconcileError::operation(format!("accept invitation {}", label), e))?;
            info!("Accepted invitation {} (match id {})", label, match_id);
            report.updated(label);
        }

        Ok(report)
    }

    pub async fn services_summary(&self) -> Result<Vec<ExchangeService>> {
        let services = self.portal.exchange_services().await?;
        info!("Found {} Data Exchange service(s)", services.len());
        Ok(services)
    }

    pub async fn customers_summary(&self) -> Result<Vec<ExchangeCustomer>> {
        let customers = self.portal.exchange_customers().await?;
        info!("Found {} Data Exchange customer(s)", customers.len());
        Ok(customers)
    }

    pub async fn service_health(&self, service: &str, provider: bool) -> Result<Vec<CustomerHealth>> {
        let services = self.existing(ExchangeKind::Service).await?;
        let id = self.id_of(ExchangeKind::Service, &services, service)?;
        Ok(self.portal.service_health(id, provider).await?)
    }
}

fn empty(message: &str) -> ReconcileReport {
    let mut report = ReconcileReport::new();
    report.set_message(message);
    report
}

fn fill_names(record: &mut ServiceMatch, entry: &ExchangeMatchConfig) {
    if record.service_name.is_empty() {
        record.service_name = entry.service_name.clone();
    }
    if record.customer_name.is_empty() {
        record.customer_name = entry.customer_name.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naas_core::{NaasError, ValidationError};
    use naas_test::FakePortal;
    use naas_types::LanSegment;

    const SERVICES: &str = r#"
data_exchange_services:
  - name: de-service-1
    lanSegment: lan-a
    sites: [branch-1]
    servicePrefixes: [10.10.0.0/24]
  - name: de-service-2
data_exchange_customers:
  - name: partner-a
    type: NON_GRAPHIANT
  - name: partner-b
data_exchange_matches:
  - service_name: de-service-1
    customer_name: partner-a
    servicePrefixes: [10.10.0.0/24]
"#;

    fn doc(yaml: &str) -> DataExchangeDocument {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn portal() -> FakePortal {
        FakePortal::new()
            .with_lan_segment(LanSegment {
                id: 31,
                name: "lan-a".to_string(),
                ..Default::default()
            })
            .with_site(41, "branch-1")
    }

    #[tokio::test]
    async fn test_create_services_resolves_names_and_skips_existing() {
        let portal = portal().with_exchange_service(9, "de-service-2");
        let manager = DataExchangeManager::new(&portal, ApplyMode::Apply);

        let report = manager.create_services(&doc(SERVICES)).await.unwrap();
        assert_eq!(report.created, vec!["de-service-1"]);
        assert_eq!(report.skipped, vec!["de-service-2"]);

        let payload = &portal.writes_for("create_exchange_service")[0].payload;
        assert_eq!(payload["name"], "de-service-1");
        assert_eq!(payload["lanSegmentId"], 31);
        assert_eq!(payload["siteIds"], json!([41]));
        assert!(payload.get("lanSegment").is_none());

        let again = manager.create_services(&doc(SERVICES)).await.unwrap();
        assert!(!again.changed);
        assert_eq!(again.skipped, vec!["de-service-1", "de-service-2"]);
    }

    #[tokio::test]
    async fn test_unknown_lan_segment_fails_before_create() {
        let portal = FakePortal::new();
        let manager = DataExchangeManager::new(&portal, ApplyMode::Apply);
        let err = manager
            .create_services(&doc("data_exchange_services:\n  - name: s1\n    lanSegment: lan-x\n"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NaasError::Reconcile(ReconcileError::ObjectNotFound { ref name, .. }) if name == "lan-x"
        ));
        assert!(portal.writes().is_empty());
    }

    #[tokio::test]
    async fn test_delete_order_customers_then_services() {
        let portal = portal()
            .with_exchange_service(9, "de-service-1")
            .with_exchange_customer(12, "partner-a")
            .with_service_match(ServiceMatch {
                match_id: Some(70),
                service_id: Some(9),
                customer_id: Some(12),
                ..Default::default()
            });
        let manager = DataExchangeManager::new(&portal, ApplyMode::Apply);

        let early = manager.delete_services(&doc(SERVICES)).await.unwrap();
        assert!(early.failed);
        assert_eq!(early.failed_objects, vec!["de-service-1"]);
        assert_eq!(early.skipped, vec!["de-service-2"]);

        let customers = manager.delete_customers(&doc(SERVICES)).await.unwrap();
        assert_eq!(customers.deleted, vec!["partner-a"]);
        assert_eq!(customers.skipped, vec!["partner-b"]);

        let services = manager.delete_services(&doc(SERVICES)).await.unwrap();
        assert_eq!(services.deleted, vec!["de-service-1"]);
        assert!(portal.exchange_service_names().is_empty());
    }

    #[tokio::test]
    async fn test_match_is_idempotent() {
        let portal = portal()
            .with_exchange_service(9, "de-service-1")
            .with_exchange_customer(12, "partner-a");
        let manager = DataExchangeManager::new(&portal, ApplyMode::Apply);

        let run = manager.match_service_to_customers(&doc(SERVICES)).await.unwrap();
        assert_eq!(run.report.created, vec!["de-service-1/partner-a"]);
        assert_eq!(run.matches[0].customer_id, Some(12));
        assert!(run.matches[0].match_id.is_some());
        let body = &portal.writes_for("match_service")[0];
        assert_eq!(body.target, Some(9));
        assert_eq!(body.payload["customerId"], 12);

        let again = manager.match_service_to_customers(&doc(SERVICES)).await.unwrap();
        assert!(!again.report.changed);
        assert_eq!(again.report.skipped, vec!["de-service-1/partner-a"]);
        assert_eq!(again.matches, run.matches);
    }

    #[tokio::test]
    async fn test_match_unknown_customer_fails() {
        let portal = portal().with_exchange_service(9, "de-service-1");
        let manager = DataExchangeManager::new(&portal, ApplyMode::Apply);
        let err = manager
            .match_service_to_customers(&doc(SERVICES))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("partner-a"));
    }

    const ACCEPT: &str = r#"
data_exchange_acceptances:
  - service_name: de-service-1
    customer_name: partner-a
    lanSegment: lan-a
    gateways:
      - {region: us-east, tunnel: 1}
      - {region: us-east, tunnel: 2}
"#;

    fn pending_match() -> ServiceMatch {
        ServiceMatch {
            match_id: Some(70),
            service_id: Some(9),
            customer_id: Some(12),
            service_name: "de-service-1".to_string(),
            customer_name: "partner-a".to_string(),
            status: Some("Pending".to_string()),
        }
    }

    #[tokio::test]
    async fn test_accept_uses_matches_file_ids() {
        let portal = portal()
            .with_exchange_service(9, "de-service-1")
            .with_service_match(pending_match());
        let manager = DataExchangeManager::new(&portal, ApplyMode::Apply);

        let report = manager.accept_invitation(&doc(ACCEPT), &[pending_match()]).await.unwrap();
        assert_eq!(report.updated, vec!["de-service-1/partner-a"]);

        let write = &portal.writes_for("accept_invitation")[0];
        assert_eq!(write.target, Some(70));
        assert_eq!(write.payload["lanSegmentId"], 31);
        assert_eq!(write.payload["gateways"][1]["tunnel"], 2);
    }

    #[tokio::test]
    async fn test_accept_falls_back_to_api_and_skips_accepted() {
        let mut accepted = pending_match();
        accepted.status = Some("Accepted".to_string());
        let portal = portal()
            .with_exchange_service(9, "de-service-1")
            .with_service_match(accepted);
        let manager = DataExchangeManager::new(&portal, ApplyMode::Apply);

        let report = manager.accept_invitation(&doc(ACCEPT), &[]).await.unwrap();
        assert!(!report.changed);
        assert_eq!(report.skipped, vec!["de-service-1/partner-a"]);
        assert!(portal.writes().is_empty());
    }

    #[tokio::test]
    async fn test_accept_check_mode_and_gateway_validation() {
        let portal = portal()
            .with_exchange_service(9, "de-service-1")
            .with_service_match(pending_match());
        let manager = DataExchangeManager::new(&portal, ApplyMode::Check);
        let report = manager.accept_invitation(&doc(ACCEPT), &[]).await.unwrap();
        assert_eq!(report.updated, vec!["de-service-1/partner-a"]);
        assert!(portal.writes().is_empty());

        let single = "data_exchange_acceptances:\n  - service_name: de-service-1\n    customer_name: partner-a\n    gateways:\n      - {region: us-east}\n";
        let err = manager.accept_invitation(&doc(single), &[]).await.unwrap_err();
        assert!(matches!(err, NaasError::Validation(ValidationError::Invalid { .. })));
    }

    #[tokio::test]
    async fn test_service_health_by_name() {
        let portal = FakePortal::new()
            .with_exchange_service(9, "de-service-1")
            .with_service_health(
                9,
                vec![CustomerHealth {
                    customer_name: "partner-a".to_string(),
                    overall_health: Some("Healthy".to_string()),
                    ..Default::default()
                }],
            );
        let manager = DataExchangeManager::new(&portal, ApplyMode::Apply);

        let health = manager.service_health("de-service-1", true).await.unwrap();
        assert_eq!(health[0].overall_health.as_deref(), Some("Healthy"));
        assert!(manager.service_health("de-service-9", false).await.is_err());
    }
}
