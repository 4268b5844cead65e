//! CLI command tests

#[cfg(test)]
mod tests {
    use crate::commands::*;
    use crate::{render, render_table, CommandContext, OutputFormat, QueryTable};
    use naas_config::{ConfigLoader, MatchesFile};
    use naas_core::{ApplyMode, InterfaceScope, Operation, ReconcileReport};
    use naas_test::FakePortal;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Config directory holding one YAML file
    fn config_dir(name: &str, content: &str) -> TempDir {
        let dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(dir.path().join(name), content).expect("Failed to write test file");
        dir
    }

    fn context<'a>(portal: &'a FakePortal, dir: &Path, mode: ApplyMode) -> CommandContext<'a> {
        CommandContext::new(portal, ConfigLoader::new(dir), mode)
    }

    #[test]
    fn test_operation_aliases() {
        assert_eq!(parse_operation("configure").unwrap(), Operation::Configure);
        assert_eq!(parse_operation("Present").unwrap(), Operation::Configure);
        assert_eq!(parse_operation("absent").unwrap(), Operation::Deconfigure);
        assert!(parse_operation("create").is_err());

        assert_eq!(parse_vpn_operation("create").unwrap(), Operation::Configure);
        assert_eq!(parse_vpn_operation("absent").unwrap(), Operation::Deconfigure);
        assert!(parse_vpn_operation("configure").is_err());
    }

    #[test]
    fn test_resource_actions() {
        assert_eq!("attach".parse::<SitesAction>().unwrap(), SitesAction::Attach);
        assert_eq!("present".parse::<SitesAction>().unwrap(), SitesAction::Configure);
        assert_eq!(
            "delete-subinterfaces".parse::<LagAction>().unwrap(),
            LagAction::DeleteSubinterfaces
        );
        assert_eq!("absent".parse::<LagAction>().unwrap(), LagAction::Deconfigure);
        assert_eq!("enable".parse::<VrrpAction>().unwrap(), VrrpAction::Enable);
        assert!("disable".parse::<VrrpAction>().is_err());
        assert_eq!(LagAction::UpdateLacp.label(), "update-lacp");
    }

    #[test]
    fn test_global_section_names() {
        assert!(global::parse_section("prefix_sets").is_ok());
        assert!(global::parse_section("site_lists").is_ok());
        let err = global::parse_section("widgets").unwrap_err().to_string();
        assert!(err.contains("widgets"));
        assert!(err.contains("lan_segments"));
    }

    #[test]
    fn test_render_json_envelope() {
        let mut report = ReconcileReport::new();
        report.created("branch-1");

        let output = render(&report, OutputFormat::Json, "sites configure", true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["command"], "sites configure");
        assert_eq!(value["check"], true);
        assert!(value["timestamp"].as_str().is_some());
        assert_eq!(value["result"]["created"][0], "branch-1");
        assert_eq!(value["result"]["changed"], true);
    }

    #[test]
    fn test_render_text() {
        let report = ReconcileReport::new();
        let output = render(&report, OutputFormat::Text, "ntp configure", true).unwrap();
        assert!(output.starts_with("ntp configure (check mode)"));
        assert!(output.contains("changed=false"));
    }

    #[tokio::test]
    async fn test_sites_command_resolves_config_dir() {
        let dir = config_dir("sites.yaml", "sites:\n  - name: branch-1\n");
        let portal = FakePortal::new();
        let context = context(&portal, dir.path(), ApplyMode::Apply);

        let report = SitesCommand::new(&context)
            .execute(SitesAction::ConfigureSites, Path::new("sites.yaml"))
            .await
            .unwrap();
        assert_eq!(report.created, vec!["branch-1"]);
        assert_eq!(portal.site_names(), vec!["branch-1"]);
    }

    #[tokio::test]
    async fn test_missing_file_names_path() {
        let dir = TempDir::new().unwrap();
        let portal = FakePortal::new();
        let context = context(&portal, dir.path(), ApplyMode::Apply);

        let err = NtpCommand::new(&context)
            .execute(Operation::Configure, Path::new("ntp.yaml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ntp.yaml"));
    }

    #[tokio::test]
    async fn test_circuits_only_requires_circuits_file() {
        let dir = config_dir("interfaces.yaml", "interfaces: []\n");
        let portal = FakePortal::new();
        let context = context(&portal, dir.path(), ApplyMode::Apply);

        let err = InterfacesCommand::new(&context)
            .execute(
                Operation::Deconfigure,
                Path::new("interfaces.yaml"),
                None,
                InterfaceScope::Wan,
                true,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--circuits"));
        assert!(portal.writes().is_empty());
    }

    #[tokio::test]
    async fn test_vpn_create_reads_secrets_file() {
        let dir = config_dir("vpn.yaml", "siteToSiteVpn: []\n");
        fs::write(dir.path().join("secrets.yaml"), "preshared_keys:\n  vpn-a: s3cret\n").unwrap();
        let portal = FakePortal::new();
        let context = context(&portal, dir.path(), ApplyMode::Check)
            .with_secrets(Some("secrets.yaml".into()));

        let secrets = context.secrets().unwrap();
        assert_eq!(secrets.preshared_key("vpn-a").unwrap(), "s3cret");

        let report = VpnCommand::new(&context)
            .execute(Operation::Configure, Path::new("vpn.yaml"))
            .await
            .unwrap();
        assert!(!report.changed);
        assert!(portal.writes().is_empty());
    }

    #[test]
    fn test_exchange_actions_and_queries() {
        assert_eq!(
            "match_service_to_customers".parse::<ExchangeAction>().unwrap(),
            ExchangeAction::MatchServices
        );
        assert_eq!(
            "accept_invitation".parse::<ExchangeAction>().unwrap(),
            ExchangeAction::AcceptInvitation
        );
        assert_eq!("absent".parse::<ExchangeAction>().unwrap(), ExchangeAction::DeleteServices);
        assert!("match".parse::<ExchangeAction>().is_err());
        assert_eq!(
            "services_summary".parse::<ExchangeQuery>().unwrap(),
            ExchangeQuery::ServicesSummary
        );
        assert_eq!(ExchangeQuery::ServiceHealth.label(), "service-health");
    }

    #[test]
    fn test_query_table_render() {
        let table = QueryTable {
            title: "Data Exchange Services Summary".to_string(),
            headers: vec!["Service Name", "Service ID"],
            rows: vec![vec!["de-service-1".to_string(), "12".to_string()]],
            data: serde_json::json!({ "services": [{ "name": "de-service-1" }] }),
        };
        let text = table.render_text();
        assert!(text.starts_with("Data Exchange Services Summary:"));
        assert!(text.contains("Service Name  Service ID"));
        assert!(text.contains("de-service-1  12"));

        let output = render_table(&table, OutputFormat::Json, "data-exchange-info services-summary").unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["result"]["services"][0]["name"], "de-service-1");
        assert_eq!(value["check"], false);

        let empty = QueryTable { rows: Vec::new(), ..table };
        assert!(empty.render_text().contains("No entries found."));
    }

    #[tokio::test]
    async fn test_match_command_writes_default_matches_file() {
        let dir = config_dir(
            "de_matches.yaml",
            "data_exchange_matches:\n  - service_name: de-service-1\n    customer_name: partner-a\n",
        );
        let portal = FakePortal::new()
            .with_exchange_service(12, "de-service-1")
            .with_exchange_customer(3, "partner-a");
        let context = context(&portal, dir.path(), ApplyMode::Apply);

        let report = DataExchangeCommand::new(&context)
            .execute(ExchangeAction::MatchServices, Path::new("de_matches.yaml"), None)
            .await
            .unwrap();
        assert_eq!(report.created, vec!["de-service-1/partner-a"]);

        let path = dir.path().join("output").join("de_matches_responses_latest.json");
        let stored = MatchesFile::load(&path).unwrap();
        let record = stored.find("de-service-1", "partner-a").unwrap();
        assert_eq!(record.service_id, Some(12));
        assert_eq!(record.customer_id, Some(3));
        assert!(record.match_id.is_some());
    }

    #[tokio::test]
    async fn test_match_command_check_mode_writes_nothing() {
        let dir = config_dir(
            "de_matches.yaml",
            "data_exchange_matches:\n  - service_name: de-service-1\n    customer_name: partner-a\n",
        );
        let portal = FakePortal::new()
            .with_exchange_service(12, "de-service-1")
            .with_exchange_customer(3, "partner-a");
        let context = context(&portal, dir.path(), ApplyMode::Check);

        let report = DataExchangeCommand::new(&context)
            .execute(ExchangeAction::MatchServices, Path::new("de_matches.yaml"), None)
            .await
            .unwrap();
        assert!(report.changed);
        assert!(portal.writes().is_empty());
        assert!(!dir.path().join("output").exists());
    }

    #[tokio::test]
    async fn test_service_health_requires_service() {
        let dir = TempDir::new().unwrap();
        let portal = FakePortal::new();
        let context = context(&portal, dir.path(), ApplyMode::Apply);

        let err = DataExchangeInfoCommand::new(&context)
            .execute(ExchangeQuery::ServiceHealth, None, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--service"));
    }
}
