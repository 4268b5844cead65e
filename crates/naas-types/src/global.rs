//! Global (enterprise-wide) objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Global object families managed through `PATCH /v1/global/config`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalObjectKind {
    PrefixSet,
    RoutingPolicy,
    Snmp,
    Syslog,
    Ntp,
    Ipfix,
    VpnProfile,
}

impl GlobalObjectKind {
    /// Every kind, in deconfigure order
    pub const ALL: [GlobalObjectKind; 7] = [
        GlobalObjectKind::PrefixSet,
        GlobalObjectKind::RoutingPolicy,
        GlobalObjectKind::Snmp,
        GlobalObjectKind::Syslog,
        GlobalObjectKind::Ntp,
        GlobalObjectKind::Ipfix,
        GlobalObjectKind::VpnProfile,
    ];

    /// Section key in the YAML document
    pub fn section(&self) -> &'static str {
        match self {
            GlobalObjectKind::PrefixSet => "global_prefix_sets",
            GlobalObjectKind::RoutingPolicy => "routing_policies",
            GlobalObjectKind::Snmp => "snmps",
            GlobalObjectKind::Syslog => "syslog_servers",
            GlobalObjectKind::Ntp => "ntps",
            GlobalObjectKind::Ipfix => "ipfix_exporters",
            GlobalObjectKind::VpnProfile => "vpn_profiles",
        }
    }

    /// Section key in the global config payload
    pub fn api_section(&self) -> &'static str {
        match self {
            GlobalObjectKind::PrefixSet => "prefixSets",
            GlobalObjectKind::RoutingPolicy => "routingPolicies",
            GlobalObjectKind::Snmp => "snmps",
            GlobalObjectKind::Syslog => "syslogServers",
            GlobalObjectKind::Ntp => "ntps",
            GlobalObjectKind::Ipfix => "ipfixExporters",
            GlobalObjectKind::VpnProfile => "vpnProfiles",
        }
    }

    /// Path segment used by the summaries endpoint
    pub fn api_path(&self) -> &'static str {
        match self {
            GlobalObjectKind::PrefixSet => "prefix-sets",
            GlobalObjectKind::RoutingPolicy => "routing-policies",
            GlobalObjectKind::Snmp => "snmps",
            GlobalObjectKind::Syslog => "syslog-servers",
            GlobalObjectKind::Ntp => "ntps",
            GlobalObjectKind::Ipfix => "ipfix-exporters",
            GlobalObjectKind::VpnProfile => "ipsec-profile",
        }
    }

    /// Key of this kind in a `details` report
    pub fn label(&self) -> &'static str {
        match self {
            GlobalObjectKind::PrefixSet => "prefix_sets",
            other => other.section(),
        }
    }

    /// Human readable name used in log lines
    pub fn display_name(&self) -> &'static str {
        match self {
            GlobalObjectKind::PrefixSet => "prefix set",
            GlobalObjectKind::RoutingPolicy => "BGP filter",
            GlobalObjectKind::Snmp => "SNMP object",
            GlobalObjectKind::Syslog => "syslog object",
            GlobalObjectKind::Ntp => "NTP object",
            GlobalObjectKind::Ipfix => "IPFIX object",
            GlobalObjectKind::VpnProfile => "VPN profile",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == label || kind.section() == label)
    }
}

impl fmt::Display for GlobalObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary of a global object with its usage counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalObjectSummary {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "num_attached_devices")]
    pub num_attached_devices: u32,
    #[serde(alias = "num_attached_sites")]
    pub num_attached_sites: u32,
    #[serde(alias = "num_policies")]
    pub num_policies: u32,
    pub count: u32,
}

impl GlobalObjectSummary {
    /// Whether the object cannot be deleted in its current state
    pub fn in_use(&self, kind: GlobalObjectKind) -> bool {
        match kind {
            GlobalObjectKind::VpnProfile => self.count > 0,
            GlobalObjectKind::PrefixSet => {
                self.num_attached_devices > 0 || self.num_attached_sites > 0 || self.num_policies > 0
            }
            _ => self.num_attached_devices > 0 || self.num_attached_sites > 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LanSegment {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(alias = "site_list_references")]
    pub site_list_references: u32,
    #[serde(alias = "edge_references")]
    pub edge_references: u32,
    #[serde(alias = "associated_interfaces")]
    pub associated_interfaces: u32,
}

impl LanSegment {
    pub fn is_referenced(&self) -> bool {
        self.site_list_references > 0 || self.edge_references > 0 || self.associated_interfaces > 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteListSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteListDetails {
    pub id: i64,
    pub name: String,
    #[serde(alias = "site_list_references")]
    pub site_list_references: u32,
    #[serde(alias = "edge_references")]
    pub edge_references: u32,
    #[serde(alias = "policy_references")]
    pub policy_references: u32,
}

impl SiteListDetails {
    pub fn is_referenced(&self) -> bool {
        self.site_list_references > 0 || self.edge_references > 0 || self.policy_references > 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnterpriseInfo {
    #[serde(alias = "enterprise_id", alias = "id")]
    pub enterprise_id: i64,
    #[serde(alias = "company_name")]
    pub company_name: String,
}

impl EnterpriseInfo {
    /// Name of the segment interfaces fall back to when deconfigured
    pub fn default_lan(&self) -> String {
        format!("default-{}", self.enterprise_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_in_use_per_kind() {
        let summary: GlobalObjectSummary =
            serde_json::from_value(json!({"Name": "pfx-1", "numPolicies": 2})).unwrap();
        assert_eq!(summary.name, "pfx-1");
        assert!(summary.in_use(GlobalObjectKind::PrefixSet));
        assert!(!summary.in_use(GlobalObjectKind::RoutingPolicy));
        assert!(!summary.in_use(GlobalObjectKind::VpnProfile));

        let profile = GlobalObjectSummary {
            name: "ike-1".to_string(),
            count: 1,
            ..Default::default()
        };
        assert!(profile.in_use(GlobalObjectKind::VpnProfile));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(GlobalObjectKind::PrefixSet.label(), "prefix_sets");
        assert_eq!(GlobalObjectKind::Syslog.label(), "syslog_servers");
        assert_eq!(
            GlobalObjectKind::from_label("global_prefix_sets"),
            Some(GlobalObjectKind::PrefixSet)
        );
        assert_eq!(GlobalObjectKind::from_label("ntps"), Some(GlobalObjectKind::Ntp));
        assert_eq!(GlobalObjectKind::from_label("bogus"), None);
    }

    #[test]
    fn test_default_lan_name() {
        let enterprise = EnterpriseInfo {
            enterprise_id: 10001,
            company_name: "Acme".to_string(),
        };
        assert_eq!(enterprise.default_lan(), "default-10001");
    }
}
