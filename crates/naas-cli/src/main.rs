//! NaaS reconcile CLI (naasctl)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use naas_cli::commands::{
    parse_operation, parse_vpn_operation, BgpCommand, DataExchangeCommand,
    DataExchangeInfoCommand, ExchangeAction, ExchangeQuery, GlobalCommand, InterfacesCommand,
    LagAction, LagCommand, NtpCommand, SitesAction, SitesCommand, StaticRoutesCommand,
    VpnCommand, VrrpAction, VrrpCommand,
};
use naas_cli::{render, render_table, CommandContext, OutputFormat, QueryTable};
use naas_client::HttpPortal;
use naas_config::{ClientSettings, ConfigLoader};
use naas_core::{ApplyMode, InterfaceScope, Operation, ReconcileReport};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "naasctl")]
#[command(about = "Reconcile NaaS portal configuration from YAML files")]
#[command(version)]
#[command(long_about = "
Reconcile NaaS portal configuration from YAML files

Each resource reads its desired state from a YAML file, compares it with what
the portal reports and pushes only the differences. `present` and `absent`
are accepted wherever `configure` and `deconfigure` are.

Examples:
  naasctl sites configure sites.yaml
  naasctl global configure global.yaml --only prefix_sets
  naasctl interfaces configure --interfaces interfaces.yaml --circuits circuits.yaml
  naasctl interfaces deconfigure --interfaces interfaces.yaml --scope lan
  naasctl lag add-members lag.yaml
  naasctl vrrp enable vrrp.yaml
  naasctl --check static-routes configure routes.yaml
  naasctl --secrets secrets.yaml vpn create vpn.yaml
  naasctl --format json bgp absent bgp.yaml
  naasctl data-exchange match-services matches.yaml
  naasctl data-exchange accept-invitation acceptance.yaml --matches-file output/matches.json
  naasctl data-exchange-info service-health --service de-service-1 --provider
")]
struct Cli {
    /// Portal host, overrides settings file and NAAS_HOST
    #[arg(long, global = true)]
    host: Option<String>,

    /// Portal username, overrides settings file and NAAS_USERNAME
    #[arg(long, global = true)]
    username: Option<String>,

    /// Portal password, overrides settings file and NAAS_PASSWORD
    #[arg(long, global = true)]
    password: Option<String>,

    /// Client settings file (TOML, YAML or JSON)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Directory relative file names are resolved against
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// YAML file with VPN preshared keys and BGP MD5 passwords
    #[arg(long, global = true)]
    secrets: Option<PathBuf>,

    /// Report intended changes without writing anything
    #[arg(long, global = true)]
    check: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short = 'V', long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sites and their global object attachments
    Sites {
        /// configure, deconfigure, configure-sites, deconfigure-sites, attach, detach
        action: SitesAction,
        file: PathBuf,
    },

    /// Enterprise-wide objects, LAN segments and site lists
    Global {
        /// configure or deconfigure
        #[arg(value_parser = parse_operation)]
        action: Operation,
        file: PathBuf,

        /// Limit to one section, e.g. prefix_sets or lan_segments
        #[arg(long)]
        only: Option<String>,
    },

    /// Interfaces, subinterfaces and WAN circuits
    Interfaces {
        /// configure or deconfigure
        #[arg(value_parser = parse_operation)]
        action: Operation,

        #[arg(long)]
        interfaces: PathBuf,

        #[arg(long)]
        circuits: Option<PathBuf>,

        /// all, lan or wan
        #[arg(long, default_value = "all")]
        scope: InterfaceScope,

        /// Only touch circuit static routes
        #[arg(long)]
        circuits_only: bool,
    },

    /// Link aggregation groups
    Lag {
        /// configure, deconfigure, add-members, remove-members, update-lacp, delete-subinterfaces
        action: LagAction,
        file: PathBuf,
    },

    /// VRRP groups on interfaces and subinterfaces
    Vrrp {
        /// configure, deconfigure or enable
        action: VrrpAction,
        file: PathBuf,
    },

    /// LAN segment static routes
    StaticRoutes {
        #[arg(value_parser = parse_operation)]
        action: Operation,
        file: PathBuf,
    },

    /// Device NTP objects
    Ntp {
        #[arg(value_parser = parse_operation)]
        action: Operation,
        file: PathBuf,
    },

    /// Site-to-site VPNs
    Vpn {
        /// create or delete
        #[arg(value_parser = parse_vpn_operation)]
        action: Operation,
        file: PathBuf,
    },

    /// BGP neighbors
    Bgp {
        #[arg(value_parser = parse_operation)]
        action: Operation,
        file: PathBuf,
    },

    /// Data exchange services, customers, matches and invitations
    DataExchange {
        /// create-services, delete-services, create-customers, delete-customers,
        /// match-services, accept-invitation
        action: ExchangeAction,
        file: PathBuf,

        /// Match responses: written by match-services, read by accept-invitation
        #[arg(long)]
        matches_file: Option<PathBuf>,
    },

    /// Read-only data exchange summaries and service health
    DataExchangeInfo {
        /// services-summary, customers-summary or service-health
        query: ExchangeQuery,

        /// Service name for service-health
        #[arg(long)]
        service: Option<String>,

        /// Health from the service provider's side
        #[arg(long)]
        provider: bool,
    },
}

impl Commands {
    fn label(&self) -> String {
        match self {
            Commands::Sites { action, .. } => format!("sites {}", action.label()),
            Commands::Global { action, .. } => format!("global {}", action),
            Commands::Interfaces { action, .. } => format!("interfaces {}", action),
            Commands::Lag { action, .. } => format!("lag {}", action.label()),
            Commands::Vrrp { action, .. } => format!("vrrp {}", action.label()),
            Commands::StaticRoutes { action, .. } => format!("static-routes {}", action),
            Commands::Ntp { action, .. } => format!("ntp {}", action),
            Commands::Vpn { action, .. } => match action {
                Operation::Configure => "vpn create".to_string(),
                Operation::Deconfigure => "vpn delete".to_string(),
            },
            Commands::Bgp { action, .. } => format!("bgp {}", action),
            Commands::DataExchange { action, .. } => format!("data-exchange {}", action.label()),
            Commands::DataExchangeInfo { query, .. } => format!("data-exchange-info {}", query.label()),
        }
    }
}

enum Outcome {
    Report(ReconcileReport),
    Query(QueryTable),
}

async fn dispatch(context: &CommandContext<'_>, command: &Commands) -> Result<ReconcileReport> {
    match command {
        Commands::Sites { action, file } => SitesCommand::new(context).execute(*action, file).await,
        Commands::Global { action, file, only } => {
            GlobalCommand::new(context)
                .execute(*action, file, only.as_deref())
                .await
        }
        Commands::Interfaces {
            action,
            interfaces,
            circuits,
            scope,
            circuits_only,
        } => {
            InterfacesCommand::new(context)
                .execute(*action, interfaces, circuits.as_deref(), *scope, *circuits_only)
                .await
        }
        Commands::Lag { action, file } => LagCommand::new(context).execute(*action, file).await,
        Commands::Vrrp { action, file } => VrrpCommand::new(context).execute(*action, file).await,
        Commands::StaticRoutes { action, file } => {
            StaticRoutesCommand::new(context).execute(*action, file).await
        }
        Commands::Ntp { action, file } => NtpCommand::new(context).execute(*action, file).await,
        Commands::Vpn { action, file } => VpnCommand::new(context).execute(*action, file).await,
        Commands::Bgp { action, file } => BgpCommand::new(context).execute(*action, file).await,
        Commands::DataExchange {
            action,
            file,
            matches_file,
        } => {
            DataExchangeCommand::new(context)
                .execute(*action, file, matches_file.as_deref())
                .await
        }
        Commands::DataExchangeInfo { .. } => bail!("data-exchange-info produces a table, not a report"),
    }
}

async fn run(cli: &Cli) -> Result<Outcome> {
    let settings = ClientSettings::load(cli.settings.as_deref())
        .context("Failed to load client settings")?
        .with_overrides(cli.host.clone(), cli.username.clone(), cli.password.clone());

    let portal = HttpPortal::connect(&settings)
        .await
        .context("Failed to connect to the portal")?;

    let mode = if cli.check {
        ApplyMode::Check
    } else {
        ApplyMode::Apply
    };
    let context = CommandContext::new(&portal, ConfigLoader::from_env(cli.config_dir.clone()), mode)
        .with_secrets(cli.secrets.clone());

    if let Commands::DataExchangeInfo {
        query,
        service,
        provider,
    } = &cli.command
    {
        let table = DataExchangeInfoCommand::new(&context)
            .execute(*query, service.as_deref(), *provider)
            .await?;
        return Ok(Outcome::Query(table));
    }

    dispatch(&context, &cli.command).await.map(Outcome::Report)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let label = cli.command.label();
    match run(&cli).await {
        Ok(Outcome::Query(table)) => {
            match render_table(&table, cli.format, &label) {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    eprintln!("Error: failed to render result: {}", e);
                    std::process::exit(1);
                }
            }
            std::process::exit(0);
        }
        Ok(Outcome::Report(report)) => {
            if !cli.quiet || cli.format == OutputFormat::Json {
                match render(&report, cli.format, &label, cli.check) {
                    Ok(output) => println!("{}", output),
                    Err(e) => {
                        eprintln!("Error: failed to render report: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            if report.failed {
                log::error!("{} finished with failed objects", label);
                std::process::exit(1);
            }
            std::process::exit(0);
        }
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {}", e);

                // Print error chain if in verbose mode
                if cli.verbose || cli.debug {
                    for cause in e.chain().skip(1) {
                        eprintln!("  Caused by: {}", cause);
                    }
                }
            }
            std::process::exit(1);
        }
    }
}
