//! Tests for document loading

use crate::*;
use naas_core::{ConfigError, ValidationError};
use naas_types::GlobalObjectKind;
use std::io::Write;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn test_resolve_falls_back_to_search_dir() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "sites.yaml", "sites:\n  - name: branch-1\n");

    let loader = ConfigLoader::new(dir.path());
    let resolved = loader.resolve("sites.yaml").unwrap();
    assert_eq!(resolved, dir.path().join("sites.yaml"));

    let doc: SitesDocument = loader.load("sites.yaml").unwrap();
    let sites = doc.sites.unwrap();
    assert_eq!(sites[0].name.as_deref(), Some("branch-1"));
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let loader = ConfigLoader::new(dir.path());
    let err = loader.load::<SitesDocument>("nope.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));
}

#[test]
fn test_yaml_syntax_error() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "bad.yaml", "sites: [\n  - name: x\n");
    let loader = ConfigLoader::new(dir.path());
    let err = loader.load::<SitesDocument>("bad.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Yaml { .. }));
}

#[test]
fn test_empty_file_is_empty_document() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "empty.yaml", "\n");
    let loader = ConfigLoader::new(dir.path());
    let doc: GlobalDocument = loader.load("empty.yaml").unwrap();
    assert!(doc.section(GlobalObjectKind::Snmp).is_none());
}

#[test]
fn test_device_entries_are_merged_in_order() {
    let yaml = r#"
interfaces:
  - edge-1:
      - name: GigabitEthernet5/0/0
        lan: lan-a
  - edge-2:
      - name: GigabitEthernet6/0/0
        circuit: c-inet
  - edge-1:
      - name: GigabitEthernet7/0/0
        sub_interfaces:
          - vlan: 18
            lan: lan-b
"#;
    let doc: InterfacesDocument = serde_yaml::from_str(yaml).unwrap();
    let interfaces = doc.interfaces.unwrap();

    assert_eq!(interfaces.device_names().collect::<Vec<_>>(), vec!["edge-1", "edge-2"]);
    let edge1 = interfaces.get("edge-1").unwrap();
    assert_eq!(edge1.len(), 2);
    assert!(edge1[0].is_lan());
    assert_eq!(edge1[1].subinterfaces[0].vlan_id(&edge1[1].name).unwrap(), 18);
}

#[test]
fn test_interface_extra_attributes_pass_through() {
    let yaml = r#"
interfaces:
  - edge-1:
      - name: GigabitEthernet5/0/0
        lan: lan-a
        ipv4:
          address: 10.0.0.1/24
        mtu: 1500
"#;
    let doc: InterfacesDocument = serde_yaml::from_str(yaml).unwrap();
    let interfaces = doc.interfaces.unwrap();
    let iface = &interfaces.get("edge-1").unwrap()[0];
    assert_eq!(iface.extra["mtu"], 1500);
    assert_eq!(iface.extra["ipv4"]["address"], "10.0.0.1/24");
    assert!(!iface.extra.contains_key("lan"));
}

#[test]
fn test_vlan_range_validation() {
    let err = vlan_id("GigabitEthernet5/0/0", 4095).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidVlan { vlan: 4095, .. }));
    assert!(vlan_id("GigabitEthernet5/0/0", 0).is_err());
    assert_eq!(vlan_id("GigabitEthernet5/0/0", 4094).unwrap(), 4094);
}

#[test]
fn test_global_document_sections() {
    let yaml = r#"
snmps:
  - name: snmp-1
    engineId: abc
site_lists:
  - name: list-1
    sites: [branch-1, branch-2]
"#;
    let doc: GlobalDocument = serde_yaml::from_str(yaml).unwrap();
    let snmps = doc.section(GlobalObjectKind::Snmp).unwrap();
    assert_eq!(snmps[0].require_name("snmps").unwrap(), "snmp-1");
    assert_eq!(snmps[0].attributes["engineId"], "abc");
    assert!(doc.section(GlobalObjectKind::PrefixSet).is_none());
    assert_eq!(doc.site_lists.unwrap()[0].sites.len(), 2);
}

#[test]
fn test_site_attachment_object_refs() {
    let yaml = r#"
site_attachments:
  - branch-1:
      snmp_servers: [snmp-1]
      syslog_servers:
        - syslog-1
        - name: syslog-2
          interface: loopback0
"#;
    let doc: SitesDocument = serde_yaml::from_str(yaml).unwrap();
    let attachments = doc.site_attachments.unwrap();
    let branch = &attachments[0]["branch-1"];
    assert_eq!(branch.snmps, vec!["snmp-1"]);
    assert_eq!(branch.syslog_servers[0].name(), "syslog-1");
    assert_eq!(branch.syslog_servers[1].interface(), Some("loopback0"));
    assert!(branch.ipfix_exporters.is_empty());
}

#[test]
fn test_static_routes_list_and_keyed_forms() {
    let yaml = r#"
staticRoutes:
  - edge-1:
      segments:
        - lanSegment: lan-a
          staticRoutes:
            - destinationPrefix: 10.1.0.0/16
              nextHops:
                - nextHopAddress: 192.0.2.1
  - edge-2:
      lanSegments:
        - name: lan-b
          staticRoutes:
            10.2.0.0/16:
              nextHops:
                - circuit: c-inet
            10.3.0.0/16: null
"#;
    let doc: StaticRoutesDocument = serde_yaml::from_str(yaml).unwrap();
    let routes = doc.static_routes.unwrap();

    let edge1 = &routes.get("edge-1").unwrap()[0];
    match &edge1.segments[0].static_routes {
        RouteList::List(list) => {
            assert_eq!(list[0].destination_prefix.as_deref(), Some("10.1.0.0/16"));
            assert_eq!(list[0].next_hops[0].next_hop_address.as_deref(), Some("192.0.2.1"));
        }
        other => panic!("expected list form, got {:?}", other),
    }

    let edge2 = &routes.get("edge-2").unwrap()[0];
    assert_eq!(edge2.segments[0].lan_segment, "lan-b");
    match &edge2.segments[0].static_routes {
        RouteList::Keyed(map) => {
            assert!(map["10.3.0.0/16"].is_none());
            assert!(map["10.2.0.0/16"].is_some());
        }
        other => panic!("expected keyed form, got {:?}", other),
    }
}

#[test]
fn test_ntp_objects_forms() {
    let yaml = r#"
ntpGlobalObject:
  - edge-1:
      ntps:
        - ntp-a
        - name: ntp-b
          domains: [" pool.ntp.org", time.example.com]
  - edge-2:
      ntps:
        ntp-c:
          domains: [time.example.com]
"#;
    let doc: NtpDocument = serde_yaml::from_str(yaml).unwrap();
    let ntp = doc.ntp_global_object.unwrap();

    let entries = ntp.get("edge-1").unwrap()[0].ntps.as_ref().unwrap().entries();
    assert_eq!(entries[0], ("ntp-a".to_string(), None));
    assert_eq!(entries[1].1.as_ref().unwrap().len(), 2);

    let entries = ntp.get("edge-2").unwrap()[0].ntps.as_ref().unwrap().entries();
    assert_eq!(entries[0].0, "ntp-c");
}

#[test]
fn test_lag_and_vrrp_documents() {
    let yaml = r#"
lagInterfaces:
  - edge-1:
      - name: LAG1
        lagMembers: [GigabitEthernet1/0/0, GigabitEthernet2/0/0]
        lacpMode: Active
        subinterfaces:
          - vlan: 100
            alias: users
"#;
    let doc: LagDocument = serde_yaml::from_str(yaml).unwrap();
    let lags = doc.lag_interfaces.unwrap();
    let lag = &lags.get("edge-1").unwrap()[0];
    assert_eq!(lag.lag_members.len(), 2);
    assert_eq!(lag.lacp_mode.as_deref(), Some("Active"));
    assert_eq!(lag.subinterfaces[0].vlan, 100);

    let yaml = r#"
vrrp_config:
  - edge-1:
      - name: GigabitEthernet5/0/0
        vlan: 18
        vrrp_ipv4:
          virtualRouterId: 10
      - name: GigabitEthernet6/0/0
"#;
    let doc: VrrpDocument = serde_yaml::from_str(yaml).unwrap();
    let vrrp = doc.vrrp_config.unwrap();
    let entries = vrrp.get("edge-1").unwrap();
    assert!(entries[0].has_vrrp());
    assert_eq!(entries[0].vlan_id().unwrap(), Some(18));
    assert!(!entries[1].has_vrrp());
}

#[test]
fn test_vpn_single_mapping_per_device() {
    let yaml = r#"
siteToSiteVpn:
  - edge-1:
      name: vpn-1
      ipsecGatewayDetails:
        remoteIp: 203.0.113.1
"#;
    let doc: SiteToSiteVpnDocument = serde_yaml::from_str(yaml).unwrap();
    let vpns = doc.site_to_site_vpn.unwrap();
    let vpn = &vpns.get("edge-1").unwrap()[0];
    assert_eq!(vpn["name"], "vpn-1");
}

#[test]
fn test_bgp_document() {
    let yaml = r#"
bgpPeering:
  - edge-1:
      segments:
        - lanSegment: lan-a
          neighbors:
            - address: 192.0.2.10
              remoteAs: 65010
              holdTimer: 90
"#;
    let doc: BgpDocument = serde_yaml::from_str(yaml).unwrap();
    let bgp = doc.bgp_peering.unwrap();
    let segment = &bgp.get("edge-1").unwrap()[0].segments[0];
    assert_eq!(segment.lan_segment, "lan-a");
    assert_eq!(segment.neighbors[0].remote_as, 65010);
    assert_eq!(segment.neighbors[0].hold_timer, Some(90));
}

#[test]
fn test_secrets_document() {
    let yaml = r#"
vault_site_to_site_vpn_keys:
  vpn-1: s3cret
bgp_md5_passwords:
  vpn-1: md5pw
"#;
    let secrets: SecretsDocument = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(secrets.preshared_key("vpn-1").unwrap(), "s3cret");
    assert_eq!(secrets.md5_password("vpn-1"), Some("md5pw"));
    assert!(matches!(
        secrets.preshared_key("vpn-2"),
        Err(ValidationError::MissingSecret { .. })
    ));
    assert!(!format!("{:?}", secrets).contains("s3cret"));
}

#[test]
fn test_settings_from_file_and_overrides() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "host: portal.example.com\nusername: admin\ntimeout_secs: 45").unwrap();

    let settings = ClientSettings::load(Some(file.path()))
        .unwrap()
        .with_overrides(None, None, Some("pw".to_string()));

    assert_eq!(settings.username.as_deref(), Some("admin"));
    assert_eq!(settings.timeout_secs, 45);
    assert!(settings.validate().is_ok());
    assert_eq!(settings.base_url().unwrap(), "https://portal.example.com");
    assert!(!format!("{:?}", settings).contains("pw\""));
}

#[test]
fn test_settings_require_credentials() {
    let settings = ClientSettings {
        host: Some("https://portal.example.com/".to_string()),
        timeout_secs: 30,
        ..Default::default()
    };
    assert!(matches!(
        settings.validate(),
        Err(ConfigError::MissingField { field }) if field == "username"
    ));
    assert_eq!(settings.base_url().unwrap(), "https://portal.example.com");
}

#[test]
fn test_settings_file_missing() {
    let err = ClientSettings::load(Some(std::path::Path::new("/nonexistent/naas.yaml"))).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));
}

#[test]
fn test_data_exchange_document() {
    let doc: DataExchangeDocument = serde_yaml::from_str(
        r#"
data_exchange_services:
  - service_name: de-service-1
    lanSegment: lan-a
    servicePrefixes: [10.10.0.0/24]
data_exchange_matches:
  - service_name: de-service-1
    customer_name: partner-a
data_exchange_acceptances:
  - service_name: de-service-1
    customer_name: partner-a
    gateways:
      - {region: us-east, siteName: branch-1}
      - {region: us-east, siteName: branch-2}
      - {region: eu-west, siteName: branch-3}
"#,
    )
    .unwrap();

    let services = doc.data_exchange_services.unwrap();
    assert_eq!(services[0].name, "de-service-1");
    assert_eq!(services[0].extra["lanSegment"], "lan-a");
    assert!(doc.data_exchange_customers.is_none());
    assert_eq!(doc.data_exchange_matches.unwrap()[0].customer_name, "partner-a");

    let acceptance = &doc.data_exchange_acceptances.unwrap()[0];
    let err = acceptance.validate().unwrap_err();
    assert!(matches!(err, ValidationError::Invalid { .. }));
    assert!(err.to_string().contains("eu-west"));
    assert_eq!(acceptance.gateway_payloads()[0]["siteName"], "branch-1");
}

#[test]
fn test_matches_file_upsert_and_save() {
    let dir = TempDir::new().unwrap();
    let config = write_file(&dir, "matches.yaml", "data_exchange_matches: []\n");
    let path = MatchesFile::default_path(&config);
    assert_eq!(path, dir.path().join("output/matches_responses_latest.json"));

    let mut file = MatchesFile::load(&path).unwrap();
    assert!(file.entries.is_empty());

    let record = |match_id, status: &str| naas_types::ServiceMatch {
        match_id: Some(match_id),
        service_name: "de-service-1".to_string(),
        customer_name: "partner-a".to_string(),
        status: Some(status.to_string()),
        ..Default::default()
    };
    file.upsert(record(7, "Pending"));
    file.upsert(record(8, "Accepted"));
    assert_eq!(file.entries.len(), 1);
    file.save(&path).unwrap();

    let reloaded = MatchesFile::load(&path).unwrap();
    let entry = reloaded.find("de-service-1", "partner-a").unwrap();
    assert_eq!(entry.match_id, Some(8));
    assert!(entry.is_accepted());
}
