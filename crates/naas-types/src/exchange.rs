//! Data exchange (B2B peering) services, customers and matches

use serde::{Deserialize, Serialize};

/// Entry of the data exchange services summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeService {
    #[serde(alias = "serviceId", alias = "service_id")]
    pub id: i64,
    #[serde(alias = "serviceName", alias = "service_name")]
    pub name: String,
    pub status: Option<String>,
    pub role: Option<String>,
    #[serde(
        alias = "matchedCustomers",
        alias = "matchedCustomersCount",
        alias = "matched_customers_count"
    )]
    pub matched_customers: u32,
}

/// Entry of the data exchange customers summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeCustomer {
    #[serde(alias = "customerId", alias = "customer_id")]
    pub id: i64,
    #[serde(alias = "customerName", alias = "customer_name")]
    pub name: String,
    #[serde(rename = "type", alias = "customerType", alias = "customer_type")]
    pub customer_type: Option<String>,
    pub status: Option<String>,
    #[serde(
        alias = "matchedServices",
        alias = "matchedServicesCount",
        alias = "matched_services_count"
    )]
    pub matched_services: u32,
}

/// A service matched to a customer
///
/// Serialized with snake_case keys; this is also the record kept in the
/// matches file between matching and accepting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceMatch {
    #[serde(alias = "matchId", alias = "id")]
    pub match_id: Option<i64>,
    #[serde(alias = "serviceId")]
    pub service_id: Option<i64>,
    #[serde(alias = "customerId")]
    pub customer_id: Option<i64>,
    #[serde(alias = "serviceName")]
    pub service_name: String,
    #[serde(alias = "customerName")]
    pub customer_name: String,
    pub status: Option<String>,
}

impl ServiceMatch {
    pub fn is_for(&self, service: &str, customer: &str) -> bool {
        self.service_name == service && self.customer_name == customer
    }

    pub fn is_accepted(&self) -> bool {
        self.status
            .as_deref()
            .map_or(false, |s| s.eq_ignore_ascii_case("accepted") || s.eq_ignore_ascii_case("active"))
    }
}

/// Health of one matched customer of a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerHealth {
    #[serde(alias = "customerName")]
    pub customer_name: String,
    #[serde(alias = "overallHealth", alias = "health")]
    pub overall_health: Option<String>,
    #[serde(alias = "producerPrefixHealth")]
    pub producer_prefix_health: Option<String>,
    #[serde(alias = "customerPrefixHealth")]
    pub customer_prefix_health: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_summary_spellings() {
        let service: ExchangeService = serde_json::from_value(json!({
            "serviceId": 12,
            "serviceName": "de-service-1",
            "status": "Active",
            "matchedCustomersCount": 2
        }))
        .unwrap();
        assert_eq!(service.id, 12);
        assert_eq!(service.name, "de-service-1");
        assert_eq!(service.matched_customers, 2);
        assert!(service.role.is_none());
    }

    #[test]
    fn test_match_record_is_snake_case() {
        let record: ServiceMatch = serde_json::from_value(json!({
            "matchId": 7, "serviceId": 12, "customerId": 3,
            "serviceName": "de-service-1", "customerName": "partner-a",
            "status": "Pending"
        }))
        .unwrap();
        assert!(record.is_for("de-service-1", "partner-a"));
        assert!(!record.is_accepted());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["match_id"], 7);
        assert_eq!(value["customer_name"], "partner-a");
    }
}
