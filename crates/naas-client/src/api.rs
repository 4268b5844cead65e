//! Portal API abstraction

use async_trait::async_trait;
use naas_core::ApiResult;
use naas_types::{
    CustomerHealth, DeviceState, EnterpriseInfo, ExchangeCustomer, ExchangeService,
    GlobalObjectKind, GlobalObjectSummary, LanSegment, ServiceMatch, SiteListDetails,
};
use serde_json::Value;

/// Reads and writes against the NaaS portal
///
/// Lookups by name return `Ok(None)` when nothing matches; an error always
/// means the call itself failed.
#[async_trait]
pub trait PortalApi: Send + Sync {
    async fn enterprise(&self) -> ApiResult<EnterpriseInfo>;

    async fn device_id(&self, name: &str) -> ApiResult<Option<i64>>;

    async fn device_info(&self, device_id: i64) -> ApiResult<DeviceState>;

    async fn put_device_config(&self, device_id: i64, payload: &Value) -> ApiResult<()>;

    async fn patch_global_config(&self, payload: &Value) -> ApiResult<()>;

    async fn global_summaries(&self, kind: GlobalObjectKind) -> ApiResult<Vec<GlobalObjectSummary>>;

    /// VPN (IPsec) profiles with their usage `count`
    async fn ipsec_profiles(&self) -> ApiResult<Vec<GlobalObjectSummary>>;

    async fn lan_segments(&self) -> ApiResult<Vec<LanSegment>>;

    /// `{ name, description }`
    async fn create_lan_segment(&self, payload: &Value) -> ApiResult<()>;

    /// `false` when the portal refused the delete without an error status
    async fn delete_lan_segment(&self, id: i64) -> ApiResult<bool>;

    async fn site_list_id(&self, name: &str) -> ApiResult<Option<i64>>;

    async fn site_list(&self, id: i64) -> ApiResult<SiteListDetails>;

    async fn create_site_list(&self, payload: &Value) -> ApiResult<()>;

    async fn delete_site_list(&self, id: i64) -> ApiResult<()>;

    async fn site_id(&self, name: &str) -> ApiResult<Option<i64>>;

    async fn create_site(&self, payload: &Value) -> ApiResult<()>;

    async fn delete_site(&self, id: i64) -> ApiResult<()>;

    /// Attach or detach global objects on a site
    async fn post_site_config(&self, site_id: i64, payload: &Value) -> ApiResult<()>;

    async fn exchange_services(&self) -> ApiResult<Vec<ExchangeService>>;

    async fn create_exchange_service(&self, payload: &Value) -> ApiResult<()>;

    async fn delete_exchange_service(&self, id: i64) -> ApiResult<()>;

    async fn exchange_customers(&self) -> ApiResult<Vec<ExchangeCustomer>>;

    async fn create_exchange_customer(&self, payload: &Value) -> ApiResult<()>;

    async fn delete_exchange_customer(&self, id: i64) -> ApiResult<()>;

    /// Matches of one service, as seen by the caller
    async fn service_matches(&self, service_id: i64) -> ApiResult<Vec<ServiceMatch>>;

    /// Match a service to the customer named in `payload` (`customerId`)
    async fn match_service(&self, service_id: i64, payload: &Value) -> ApiResult<ServiceMatch>;

    async fn accept_invitation(&self, match_id: i64, payload: &Value) -> ApiResult<()>;

    /// Per-customer health; `provider` selects the producer's view
    async fn service_health(&self, service_id: i64, provider: bool) -> ApiResult<Vec<CustomerHealth>>;
}
