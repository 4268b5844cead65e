//! In-memory portal

use async_trait::async_trait;
use log::debug;
use naas_client::PortalApi;
use naas_core::{ApiError, ApiResult};
use naas_types::{
    CustomerHealth, DeviceState, EnterpriseInfo, ExchangeCustomer, ExchangeService,
    GlobalObjectKind, GlobalObjectSummary, LanSegment, ServiceMatch, SiteListDetails, SiteSummary,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// One write call as the fake received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub operation: String,
    pub target: Option<i64>,
    pub payload: Value,
}

#[derive(Debug, Clone)]
struct Failure {
    operation: String,
    target: Option<String>,
    status: u16,
    message: String,
}

#[derive(Default)]
struct FakeState {
    enterprise: EnterpriseInfo,
    devices: BTreeMap<String, DeviceState>,
    summaries: HashMap<GlobalObjectKind, Vec<GlobalObjectSummary>>,
    lan_segments: Vec<LanSegment>,
    refused_lan_deletes: HashSet<String>,
    site_lists: Vec<SiteListDetails>,
    sites: Vec<SiteSummary>,
    exchange_services: Vec<ExchangeService>,
    exchange_customers: Vec<ExchangeCustomer>,
    service_matches: Vec<ServiceMatch>,
    service_health: HashMap<i64, Vec<CustomerHealth>>,
    next_id: i64,
    writes: Vec<RecordedWrite>,
    failures: Vec<Failure>,
}

/// Portal double for manager tests
pub struct FakePortal {
    state: Mutex<FakeState>,
}

impl Default for FakePortal {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePortal {
    /// Enterprise 1001 ("Acme") with nothing configured
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                enterprise: EnterpriseInfo {
                    enterprise_id: 1001,
                    company_name: "Acme".to_string(),
                },
                next_id: 100,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_enterprise(self, enterprise_id: i64, company_name: &str) -> Self {
        self.state().enterprise = EnterpriseInfo {
            enterprise_id,
            company_name: company_name.to_string(),
        };
        self
    }

    /// Register a device; its `hostname` is the lookup key
    pub fn with_device(self, device: DeviceState) -> Self {
        let hostname = device.hostname.clone().unwrap_or_default();
        self.state().devices.insert(hostname, device);
        self
    }

    /// Register a device from a JSON document shaped like the portal response
    pub fn with_device_json(self, device: Value) -> Self {
        match serde_json::from_value::<DeviceState>(device) {
            Ok(device) => self.with_device(device),
            Err(e) => panic!("invalid device fixture: {}", e),
        }
    }

    pub fn with_summary(self, kind: GlobalObjectKind, summary: GlobalObjectSummary) -> Self {
        self.state().summaries.entry(kind).or_default().push(summary);
        self
    }

    /// Unused global object with the given name
    pub fn with_object(self, kind: GlobalObjectKind, name: &str) -> Self {
        self.with_summary(
            kind,
            GlobalObjectSummary {
                name: name.to_string(),
                ..Default::default()
            },
        )
    }

    pub fn with_lan_segment(self, segment: LanSegment) -> Self {
        self.state().lan_segments.push(segment);
        self
    }

    /// Deleting this segment answers `false` instead of removing it
    pub fn refuse_lan_delete(self, name: &str) -> Self {
        self.state().refused_lan_deletes.insert(name.to_string());
        self
    }

    pub fn with_site(self, id: i64, name: &str) -> Self {
        self.state().sites.push(SiteSummary {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn with_site_list(self, details: SiteListDetails) -> Self {
        self.state().site_lists.push(details);
        self
    }

    pub fn with_exchange_service(self, id: i64, name: &str) -> Self {
        self.state().exchange_services.push(ExchangeService {
            id,
            name: name.to_string(),
            ..Default::default()
        });
        self
    }

    pub fn with_exchange_customer(self, id: i64, name: &str) -> Self {
        self.state().exchange_customers.push(ExchangeCustomer {
            id,
            name: name.to_string(),
            ..Default::default()
        });
        self
    }

    /// Existing match; a service with matches refuses deletion
    pub fn with_service_match(self, record: ServiceMatch) -> Self {
        self.state().service_matches.push(record);
        self
    }

    pub fn with_service_health(self, service_id: i64, health: Vec<CustomerHealth>) -> Self {
        self.state().service_health.insert(service_id, health);
        self
    }

    /// Make `operation` fail with `status`/`message`; `target` narrows it to
    /// one object id or name
    pub fn fail_on(self, operation: &str, target: Option<&str>, status: u16, message: &str) -> Self {
        self.state().failures.push(Failure {
            operation: operation.to_string(),
            target: target.map(str::to_string),
            status,
            message: message.to_string(),
        });
        self
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state().writes.clone()
    }

    pub fn writes_for(&self, operation: &str) -> Vec<RecordedWrite> {
        self.state()
            .writes
            .iter()
            .filter(|w| w.operation == operation)
            .cloned()
            .collect()
    }

    /// Payloads pushed to one device, in order
    pub fn device_payloads(&self, device_id: i64) -> Vec<Value> {
        self.state()
            .writes
            .iter()
            .filter(|w| w.operation == "put_device_config" && w.target == Some(device_id))
            .map(|w| w.payload.clone())
            .collect()
    }

    pub fn site_names(&self) -> Vec<String> {
        self.state().sites.iter().map(|s| s.name.clone()).collect()
    }

    pub fn lan_segment_names(&self) -> Vec<String> {
        self.state()
            .lan_segments
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn site_list_names(&self) -> Vec<String> {
        self.state()
            .site_lists
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn object_names(&self, kind: GlobalObjectKind) -> Vec<String> {
        self.state()
            .summaries
            .get(&kind)
            .map(|list| list.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn exchange_service_names(&self) -> Vec<String> {
        self.state()
            .exchange_services
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn exchange_customer_names(&self) -> Vec<String> {
        self.state()
            .exchange_customers
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn service_match_records(&self) -> Vec<ServiceMatch> {
        self.state().service_matches.clone()
    }

    fn check_failure(&self, operation: &str, target: Option<&str>) -> ApiResult<()> {
        let state = self.state();
        let failure = state.failures.iter().find(|f| {
            f.operation == operation
                && match (&f.target, target) {
                    (None, _) => true,
                    (Some(expected), Some(actual)) => expected == actual,
                    (Some(_), None) => false,
                }
        });

        match failure {
            Some(f) => Err(ApiError::Status {
                status: f.status,
                message: f.message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn record(&self, operation: &str, target: Option<i64>, payload: Value) {
        debug!("fake portal write: {} {:?}", operation, target);
        self.state().writes.push(RecordedWrite {
            operation: operation.to_string(),
            target,
            payload,
        });
    }

    fn allocate_id(&self) -> i64 {
        let mut state = self.state();
        state.next_id += 1;
        state.next_id
    }

    /// Keep summaries in step with `{section: {name: {config: ...}}}` patches
    fn apply_global_patch(&self, payload: &Value) {
        let mut state = self.state();
        for kind in GlobalObjectKind::ALL {
            let Some(section) = payload.get(kind.api_section()).and_then(Value::as_object) else {
                continue;
            };
            let list = state.summaries.entry(kind).or_default();
            for (name, entry) in section {
                let removed = entry.get("config").map_or(false, Value::is_null);
                list.retain(|s| &s.name != name);
                if !removed {
                    list.push(GlobalObjectSummary {
                        name: name.clone(),
                        ..Default::default()
                    });
                }
            }
        }
    }
}

fn payload_name(payload: &Value) -> String {
    payload
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn not_found(what: &str, id: i64) -> ApiError {
    ApiError::Status {
        status: 404,
        message: format!("{} {} not found", what, id),
    }
}

#[async_trait]
impl PortalApi for FakePortal {
    async fn enterprise(&self) -> ApiResult<EnterpriseInfo> {
        self.check_failure("enterprise", None)?;
        Ok(self.state().enterprise.clone())
    }

    async fn device_id(&self, name: &str) -> ApiResult<Option<i64>> {
        self.check_failure("device_id", Some(name))?;
        Ok(self.state().devices.get(name).map(|d| d.id))
    }

    async fn device_info(&self, device_id: i64) -> ApiResult<DeviceState> {
        self.check_failure("device_info", Some(&device_id.to_string()))?;
        self.state()
            .devices
            .values()
            .find(|d| d.id == device_id)
            .cloned()
            .ok_or_else(|| not_found("Device", device_id))
    }

    async fn put_device_config(&self, device_id: i64, payload: &Value) -> ApiResult<()> {
        self.check_failure("put_device_config", Some(&device_id.to_string()))?;
        self.record("put_device_config", Some(device_id), payload.clone());
        Ok(())
    }

    async fn patch_global_config(&self, payload: &Value) -> ApiResult<()> {
        let names: Vec<String> = payload
            .as_object()
            .into_iter()
            .flat_map(|sections| sections.values())
            .filter_map(Value::as_object)
            .flat_map(|objects| objects.keys().cloned())
            .collect();
        for name in &names {
            self.check_failure("patch_global_config", Some(name))?;
        }
        self.check_failure("patch_global_config", None)?;

        self.record("patch_global_config", None, payload.clone());
        self.apply_global_patch(payload);
        Ok(())
    }

    async fn global_summaries(&self, kind: GlobalObjectKind) -> ApiResult<Vec<GlobalObjectSummary>> {
        self.check_failure("global_summaries", Some(kind.label()))?;
        Ok(self.state().summaries.get(&kind).cloned().unwrap_or_default())
    }

    async fn ipsec_profiles(&self) -> ApiResult<Vec<GlobalObjectSummary>> {
        self.global_summaries(GlobalObjectKind::VpnProfile).await
    }

    async fn lan_segments(&self) -> ApiResult<Vec<LanSegment>> {
        self.check_failure("lan_segments", None)?;
        Ok(self.state().lan_segments.clone())
    }

    async fn create_lan_segment(&self, payload: &Value) -> ApiResult<()> {
        let name = payload
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.check_failure("create_lan_segment", Some(&name))?;
        let id = self.allocate_id();
        self.record("create_lan_segment", Some(id), payload.clone());
        let description = payload
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        self.state().lan_segments.push(LanSegment {
            id,
            name,
            description,
            ..Default::default()
        });
        Ok(())
    }

    async fn delete_lan_segment(&self, id: i64) -> ApiResult<bool> {
        self.check_failure("delete_lan_segment", Some(&id.to_string()))?;
        let mut state = self.state();
        let Some(index) = state.lan_segments.iter().position(|s| s.id == id) else {
            return Err(not_found("LAN segment", id));
        };
        if state.refused_lan_deletes.contains(&state.lan_segments[index].name) {
            return Ok(false);
        }
        state.lan_segments.remove(index);
        drop(state);
        self.record("delete_lan_segment", Some(id), Value::Null);
        Ok(true)
    }

    async fn site_list_id(&self, name: &str) -> ApiResult<Option<i64>> {
        self.check_failure("site_list_id", Some(name))?;
        Ok(self
            .state()
            .site_lists
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.id))
    }

    async fn site_list(&self, id: i64) -> ApiResult<SiteListDetails> {
        self.check_failure("site_list", Some(&id.to_string()))?;
        self.state()
            .site_lists
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| not_found("Site list", id))
    }

    async fn create_site_list(&self, payload: &Value) -> ApiResult<()> {
        let name = payload
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.check_failure("create_site_list", Some(&name))?;
        let id = self.allocate_id();
        self.record("create_site_list", Some(id), payload.clone());
        self.state().site_lists.push(SiteListDetails {
            id,
            name,
            ..Default::default()
        });
        Ok(())
    }

    async fn delete_site_list(&self, id: i64) -> ApiResult<()> {
        self.check_failure("delete_site_list", Some(&id.to_string()))?;
        let mut state = self.state();
        let before = state.site_lists.len();
        state.site_lists.retain(|l| l.id != id);
        if state.site_lists.len() == before {
            return Err(not_found("Site list", id));
        }
        drop(state);
        self.record("delete_site_list", Some(id), Value::Null);
        Ok(())
    }

    async fn site_id(&self, name: &str) -> ApiResult<Option<i64>> {
        self.check_failure("site_id", Some(name))?;
        Ok(self
            .state()
            .sites
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.id))
    }

    async fn create_site(&self, payload: &Value) -> ApiResult<()> {
        let name = payload
            .pointer("/site/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.check_failure("create_site", Some(&name))?;
        let id = self.allocate_id();
        self.record("create_site", Some(id), payload.clone());
        self.state().sites.push(SiteSummary { id, name });
        Ok(())
    }

    async fn delete_site(&self, id: i64) -> ApiResult<()> {
        self.check_failure("delete_site", Some(&id.to_string()))?;
        let mut state = self.state();
        let before = state.sites.len();
        state.sites.retain(|s| s.id != id);
        if state.sites.len() == before {
            return Err(not_found("Site", id));
        }
        drop(state);
        self.record("delete_site", Some(id), Value::Null);
        Ok(())
    }

    async fn post_site_config(&self, site_id: i64, payload: &Value) -> ApiResult<()> {
        self.check_failure("post_site_config", Some(&site_id.to_string()))?;
        self.record("post_site_config", Some(site_id), payload.clone());
        Ok(())
    }

    async fn exchange_services(&self) -> ApiResult<Vec<ExchangeService>> {
        self.check_failure("exchange_services", None)?;
        Ok(self.state().exchange_services.clone())
    }

    async fn create_exchange_service(&self, payload: &Value) -> ApiResult<()> {
        let name = payload_name(payload);
        self.check_failure("create_exchange_service", Some(&name))?;
        let id = self.allocate_id();
        self.record("create_exchange_service", Some(id), payload.clone());
        self.state().exchange_services.push(ExchangeService {
            id,
            name,
            ..Default::default()
        });
        Ok(())
    }

    async fn delete_exchange_service(&self, id: i64) -> ApiResult<()> {
        self.check_failure("delete_exchange_service", Some(&id.to_string()))?;
        let mut state = self.state();
        if state.service_matches.iter().any(|m| m.service_id == Some(id)) {
            return Err(ApiError::Status {
                status: 409,
                message: format!("Service {} is in use by matched customers", id),
            });
        }
        let before = state.exchange_services.len();
        state.exchange_services.retain(|s| s.id != id);
        if state.exchange_services.len() == before {
            return Err(not_found("Service", id));
        }
        drop(state);
        self.record("delete_exchange_service", Some(id), Value::Null);
        Ok(())
    }

    async fn exchange_customers(&self) -> ApiResult<Vec<ExchangeCustomer>> {
        self.check_failure("exchange_customers", None)?;
        Ok(self.state().exchange_customers.clone())
    }

    async fn create_exchange_customer(&self, payload: &Value) -> ApiResult<()> {
        let name = payload_name(payload);
        self.check_failure("create_exchange_customer", Some(&name))?;
        let id = self.allocate_id();
        self.record("create_exchange_customer", Some(id), payload.clone());
        self.state().exchange_customers.push(ExchangeCustomer {
            id,
            name,
            ..Default::default()
        });
        Ok(())
    }

    async fn delete_exchange_customer(&self, id: i64) -> ApiResult<()> {
        self.check_failure("delete_exchange_customer", Some(&id.to_string()))?;
        let mut state = self.state();
        let before = state.exchange_customers.len();
        state.exchange_customers.retain(|c| c.id != id);
        if state.exchange_customers.len() == before {
            return Err(not_found("Customer", id));
        }
        state.service_matches.retain(|m| m.customer_id != Some(id));
        drop(state);
        self.record("delete_exchange_customer", Some(id), Value::Null);
        Ok(())
    }

    async fn service_matches(&self, service_id: i64) -> ApiResult<Vec<ServiceMatch>> {
        self.check_failure("service_matches", Some(&service_id.to_string()))?;
        Ok(self
            .state()
            .service_matches
            .iter()
            .filter(|m| m.service_id == Some(service_id))
            .cloned()
            .collect())
    }

    async fn match_service(&self, service_id: i64, payload: &Value) -> ApiResult<ServiceMatch> {
        self.check_failure("match_service", Some(&service_id.to_string()))?;
        let customer_id = payload.get("customerId").and_then(Value::as_i64);
        let match_id = self.allocate_id();
        let mut state = self.state();
        let service_name = state
            .exchange_services
            .iter()
            .find(|s| s.id == service_id)
            .map(|s| s.name.clone())
            .ok_or_else(|| not_found("Service", service_id))?;
        let customer_name = state
            .exchange_customers
            .iter()
            .find(|c| Some(c.id) == customer_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let record = ServiceMatch {
            match_id: Some(match_id),
            service_id: Some(service_id),
            customer_id,
            service_name,
            customer_name,
            status: Some("Pending".to_string()),
        };
        state.service_matches.push(record.clone());
        drop(state);
        self.record("match_service", Some(service_id), payload.clone());
        Ok(record)
    }

    async fn accept_invitation(&self, match_id: i64, payload: &Value) -> ApiResult<()> {
        self.check_failure("accept_invitation", Some(&match_id.to_string()))?;
        let mut state = self.state();
        let record = state
            .service_matches
            .iter_mut()
            .find(|m| m.match_id == Some(match_id))
            .ok_or_else(|| not_found("Match", match_id))?;
        record.status = Some("Accepted".to_string());
        drop(state);
        self.record("accept_invitation", Some(match_id), payload.clone());
        Ok(())
    }

    async fn service_health(&self, service_id: i64, provider: bool) -> ApiResult<Vec<CustomerHealth>> {
        self.check_failure("service_health", Some(&service_id.to_string()))?;
        debug!("fake service health for {} (provider: {})", service_id, provider);
        Ok(self
            .state()
            .service_health
            .get(&service_id)
            .cloned()
            .unwrap_or_default())
    }
}
