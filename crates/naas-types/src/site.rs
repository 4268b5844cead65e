//! Sites and device summaries

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSummary {
    pub id: i64,
    pub name: String,
}

/// Entry of `GET /v1/edges-summary`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceSummary {
    #[serde(alias = "id", alias = "device_id")]
    pub device_id: i64,
    #[serde(alias = "name")]
    pub hostname: String,
}
