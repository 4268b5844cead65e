//! HTTP implementation of [`PortalApi`]

use async_trait::async_trait;
use log::{debug, info};
use naas_config::ClientSettings;
use naas_core::{ApiError, ApiResult, ConfigError};
use naas_types::{
    CustomerHealth, DeviceInfo, DeviceState, DeviceSummary, EnterpriseInfo, ExchangeCustomer,
    ExchangeService, GlobalObjectKind, GlobalObjectSummary, LanSegment, ServiceMatch,
    SiteListDetails, SiteListSummary, SiteSummary,
};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::api::PortalApi;

const EXCHANGE_PATH: &str = "/v1/b2b-peering";

/// List endpoints answer either with a bare array or a keyed envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped(Envelope<T>),
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(
        alias = "entries",
        alias = "summaries",
        alias = "sites",
        alias = "edgesSummary",
        alias = "ipsecProfiles",
        alias = "lanSegments",
        alias = "siteLists",
        alias = "services",
        alias = "customers",
        alias = "matches",
        alias = "health"
    )]
    items: Vec<T>,
}

impl<T> Listing<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Listing::Bare(items) => items,
            Listing::Wrapped(envelope) => envelope.items,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "accessToken", alias = "access_token")]
    token: String,
}

/// Portal client authenticated with a bearer token
pub struct HttpPortal {
    client: Client,
    base_url: String,
    token: String,
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transport {
        message: e.to_string(),
    }
}

/// Prefer the `message`/`error` field of a JSON error body
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "detail"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }
    if body.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        body.trim().to_string()
    }
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = error_message(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Authentication { message },
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

fn decode_body<T: DeserializeOwned>(path: &str, body: &str) -> ApiResult<T> {
    let value = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(body).map_err(|e| ApiError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })?
    };

    serde_json::from_value(value).map_err(|e| ApiError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

impl HttpPortal {
    /// Log in with username/password and keep the returned token
    pub async fn connect(settings: &ClientSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let base_url = settings.base_url()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Settings {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        let mut portal = Self {
            client,
            base_url,
            token: String::new(),
        };

        let credentials = json!({
            "username": settings.username,
            "password": settings.password,
        });

        let login: LoginResponse = portal
            .api_request(Method::POST, "/v1/auth/login", Some(&credentials))
            .await
            .map_err(|e| ConfigError::Settings {
                message: format!("Login to {} failed: {}", portal.base_url, e),
            })?;

        info!("Authenticated against {}", portal.base_url);
        portal.token = login.token;
        Ok(portal)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make authenticated API request
    async fn api_request<T>(&self, method: Method, path: &str, body: Option<&Value>) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .header("Content-Type", "application/json");

        if !self.token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.token));
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        decode_body(path, &text)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.api_request(Method::GET, path, None).await
    }

    async fn list<T: DeserializeOwned>(&self, path: &str) -> ApiResult<Vec<T>> {
        let listing: Listing<T> = self.get(path).await?;
        Ok(listing.into_items())
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> ApiResult<()> {
        let _: Value = self.api_request(method, path, body).await?;
        Ok(())
    }
}

#[async_trait]
impl PortalApi for HttpPortal {
    async fn enterprise(&self) -> ApiResult<EnterpriseInfo> {
        self.get("/v1/enterprises/current").await
    }

    async fn device_id(&self, name: &str) -> ApiResult<Option<i64>> {
        let devices: Vec<DeviceSummary> = self.list("/v1/edges-summary").await?;
        Ok(devices
            .into_iter()
            .find(|device| device.hostname == name)
            .map(|device| device.device_id))
    }

    async fn device_info(&self, device_id: i64) -> ApiResult<DeviceState> {
        let info: DeviceInfo = self.get(&format!("/v1/devices/{}", device_id)).await?;
        Ok(info.device)
    }

    async fn put_device_config(&self, device_id: i64, payload: &Value) -> ApiResult<()> {
        self.send(
            Method::PUT,
            &format!("/v1/devices/{}/config", device_id),
            Some(payload),
        )
        .await
    }

    async fn patch_global_config(&self, payload: &Value) -> ApiResult<()> {
        self.send(Method::PATCH, "/v1/global/config", Some(payload))
            .await
    }

    async fn global_summaries(&self, kind: GlobalObjectKind) -> ApiResult<Vec<GlobalObjectSummary>> {
        if kind == GlobalObjectKind::VpnProfile {
            return self.ipsec_profiles().await;
        }
        self.list(&format!("/v1/global/{}/summaries", kind.api_path()))
            .await
    }

    async fn ipsec_profiles(&self) -> ApiResult<Vec<GlobalObjectSummary>> {
        self.list("/v1/global/ipsec-profile").await
    }

    async fn lan_segments(&self) -> ApiResult<Vec<LanSegment>> {
        self.list("/v1/global/lan-segments").await
    }

    async fn create_lan_segment(&self, payload: &Value) -> ApiResult<()> {
        self.send(Method::POST, "/v1/global/lan-segments", Some(payload))
            .await
    }

    async fn delete_lan_segment(&self, id: i64) -> ApiResult<bool> {
        let response: Value = self
            .api_request(
                Method::DELETE,
                &format!("/v1/global/lan-segments/{}", id),
                None,
            )
            .await?;
        Ok(response
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true))
    }

    async fn site_list_id(&self, name: &str) -> ApiResult<Option<i64>> {
        let lists: Vec<SiteListSummary> = self.list("/v1/global/site-lists").await?;
        Ok(lists
            .into_iter()
            .find(|list| list.name == name)
            .map(|list| list.id))
    }

    async fn site_list(&self, id: i64) -> ApiResult<SiteListDetails> {
        self.get(&format!("/v1/global/site-lists/{}", id)).await
    }

    async fn create_site_list(&self, payload: &Value) -> ApiResult<()> {
        self.send(Method::POST, "/v1/global/site-lists", Some(payload))
            .await
    }

    async fn delete_site_list(&self, id: i64) -> ApiResult<()> {
        self.send(
            Method::DELETE,
            &format!("/v1/global/site-lists/{}", id),
            None,
        )
        .await
    }

    async fn site_id(&self, name: &str) -> ApiResult<Option<i64>> {
        let path = format!("/v1/sites?name={}", urlencoding::encode(name));
        let sites: Vec<SiteSummary> = self.list(&path).await?;
        Ok(sites
            .into_iter()
            .find(|site| site.name == name)
            .map(|site| site.id))
    }

    async fn create_site(&self, payload: &Value) -> ApiResult<()> {
        self.send(Method::POST, "/v1/sites", Some(payload)).await
    }

    async fn delete_site(&self, id: i64) -> ApiResult<()> {
        self.send(Method::DELETE, &format!("/v1/sites/{}", id), None)
            .await
    }

    async fn post_site_config(&self, site_id: i64, payload: &Value) -> ApiResult<()> {
        self.send(Method::POST, &format!("/v1/sites/{}", site_id), Some(payload))
            .await
    }

    async fn exchange_services(&self) -> ApiResult<Vec<ExchangeService>> {
        self.list(&format!("{}/services", EXCHANGE_PATH)).await
    }

    async fn create_exchange_service(&self, payload: &Value) -> ApiResult<()> {
        self.send(Method::POST, &format!("{}/services", EXCHANGE_PATH), Some(payload))
            .await
    }

    async fn delete_exchange_service(&self, id: i64) -> ApiResult<()> {
        self.send(Method::DELETE, &format!("{}/services/{}", EXCHANGE_PATH, id), None)
            .await
    }

    async fn exchange_customers(&self) -> ApiResult<Vec<ExchangeCustomer>> {
        self.list(&format!("{}/customers", EXCHANGE_PATH)).await
    }

    async fn create_exchange_customer(&self, payload: &Value) -> ApiResult<()> {
        self.send(Method::POST, &format!("{}/customers", EXCHANGE_PATH), Some(payload))
            .await
    }

    async fn delete_exchange_customer(&self, id: i64) -> ApiResult<()> {
        self.send(Method::DELETE, &format!("{}/customers/{}", EXCHANGE_PATH, id), None)
            .await
    }

    async fn service_matches(&self, service_id: i64) -> ApiResult<Vec<ServiceMatch>> {
        self.list(&format!("{}/services/{}/matches", EXCHANGE_PATH, service_id))
            .await
    }

    async fn match_service(&self, service_id: i64, payload: &Value) -> ApiResult<ServiceMatch> {
        self.api_request(
            Method::POST,
            &format!("{}/services/{}/matches", EXCHANGE_PATH, service_id),
            Some(payload),
        )
        .await
    }

    async fn accept_invitation(&self, match_id: i64, payload: &Value) -> ApiResult<()> {
        self.send(
            Method::POST,
            &format!("{}/matches/{}/accept", EXCHANGE_PATH, match_id),
            Some(payload),
        )
        .await
    }

    async fn service_health(&self, service_id: i64, provider: bool) -> ApiResult<Vec<CustomerHealth>> {
        self.list(&format!(
            "{}/services/{}/health?provider={}",
            EXCHANGE_PATH, service_id, provider
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_field() {
        assert_eq!(
            error_message(r#"{"message": "Prefix set is referenced by policy"}"#),
            "Prefix set is referenced by policy"
        );
        assert_eq!(error_message("plain failure\n"), "plain failure");
        assert_eq!(error_message(""), "Unknown error");
    }

    #[test]
    fn test_status_error_classification() {
        let err = status_error(StatusCode::NOT_FOUND, r#"{"error": "site missing"}"#);
        assert!(err.is_not_found());

        let err = status_error(StatusCode::UNAUTHORIZED, "expired token");
        assert!(matches!(err, ApiError::Authentication { .. }));

        let err = status_error(StatusCode::BAD_REQUEST, r#"{"message":"NTP in use"}"#);
        assert!(err.is_in_use());
    }

    #[test]
    fn test_decode_empty_body_as_unit() {
        let unit: () = decode_body("/v1/sites/1", "").unwrap();
        assert_eq!(unit, ());

        let value: Value = decode_body("/v1/sites/1", "  ").unwrap();
        assert!(value.is_null());

        let err = decode_body::<EnterpriseInfo>("/v1/enterprises/current", "{not json").unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[test]
    fn test_listing_accepts_bare_and_wrapped() {
        let bare: Listing<SiteSummary> =
            serde_json::from_str(r#"[{"id": 1, "name": "branch-1"}]"#).unwrap();
        assert_eq!(bare.into_items()[0].id, 1);

        let wrapped: Listing<DeviceSummary> =
            serde_json::from_str(r#"{"edgesSummary": [{"deviceId": 7, "hostname": "edge-1"}]}"#)
                .unwrap();
        let devices = wrapped.into_items();
        assert_eq!(devices[0].device_id, 7);
        assert_eq!(devices[0].hostname, "edge-1");
    }

    #[test]
    fn test_exchange_listings() {
        let services: Listing<ExchangeService> = serde_json::from_str(
            r#"{"services": [{"serviceId": 12, "serviceName": "de-service-1", "role": "Both"}]}"#,
        )
        .unwrap();
        let services = services.into_items();
        assert_eq!(services[0].id, 12);
        assert_eq!(services[0].role.as_deref(), Some("Both"));

        let matches: Listing<ServiceMatch> = serde_json::from_str(
            r#"{"matches": [{"matchId": 7, "customerName": "partner-a", "status": "Pending"}]}"#,
        )
        .unwrap();
        assert_eq!(matches.into_items()[0].match_id, Some(7));
    }

    #[tokio::test]
    async fn test_connect_requires_credentials() {
        let settings = ClientSettings {
            host: Some("portal.example.com".to_string()),
            timeout_secs: 5,
            ..Default::default()
        };
        let err = HttpPortal::connect(&settings).await.err().unwrap();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }
}
