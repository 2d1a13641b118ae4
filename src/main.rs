//! cf-ddns - Cloudflare dynamic DNS updater.

use cf_ddns::config::Config;
use cf_ddns::detector;
use cf_ddns::providers::{CloudflareProvider, DnsProvider};
use cf_ddns::reconciler::{HostOutcome, Reconciler};
use cf_ddns::store::{FileStore, StateStore};
use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Process exit codes.
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Setup failed: configuration, IP resolution, zone lookup.
    Fatal = 1,
    /// The pass ran but at least one hostname failed.
    HostsFailed = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser)]
#[command(name = "cf-ddns")]
#[command(about = "Cloudflare DynDNS updater")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Commands,
}

/// Settings that override the config file.
#[derive(Args)]
struct Options {
    /// Cloudflare account email
    #[arg(long, global = true)]
    cf_email: Option<String>,

    /// Cloudflare global API key ("$VAR" reads the environment)
    #[arg(long, global = true)]
    cf_api_key: Option<String>,

    /// Cloudflare API token, instead of email and key
    #[arg(long, global = true)]
    cf_api_token: Option<String>,

    /// Cloudflare zone name
    #[arg(long, global = true)]
    cf_zone_name: Option<String>,

    /// Cloudflare zone ID (skips the zone lookup)
    #[arg(long, global = true)]
    cf_zone_id: Option<String>,

    /// Skip resolving external IP and use provided IP
    #[arg(long, global = true)]
    ip_address: Option<String>,

    /// Don't verify SSL certificates of the IP service
    #[arg(long, global = true)]
    no_verify: bool,

    /// "What is my IP" endpoint
    #[arg(long, global = true)]
    ip_service: Option<String>,

    /// File holding the last published IP
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true)]
    loglevel: Option<String>,
}

#[derive(Args)]
struct Hosts {
    /// Hostnames to update
    hostnames: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Point the hostnames at the current IP
    Update(Hosts),

    /// Show the current IP, stored IP and records without changing anything
    Status(Hosts),

    /// Validate configuration and credentials
    Validate(Hosts),
}

impl Options {
    fn apply(self, config: &mut Config) {
        let cf = &mut config.cloudflare;
        if self.cf_email.is_some() {
            cf.email = self.cf_email;
        }
        if self.cf_api_key.is_some() {
            cf.api_key = self.cf_api_key;
        }
        if self.cf_api_token.is_some() {
            cf.api_token = self.cf_api_token;
        }
        if self.cf_zone_name.is_some() {
            config.zone_name = self.cf_zone_name;
        }
        if self.cf_zone_id.is_some() {
            config.zone_id = self.cf_zone_id;
        }
        if self.ip_address.is_some() {
            config.ip_address = self.ip_address;
        }
        if self.no_verify {
            config.verify_tls = false;
        }
        if let Some(service) = self.ip_service {
            config.ip_service = service;
        }
        if self.state_file.is_some() {
            config.state_file = self.state_file;
        }
        if let Some(level) = self.loglevel {
            config.log_level = level;
        }
    }
}

fn get_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    // Default locations
    let candidates = [
        Config::default_path().ok(),
        Some(PathBuf::from("/etc/cf-ddns/config.toml")),
        Some(PathBuf::from("cf-ddns.toml")),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return candidate;
        }
    }

    Config::default_path().unwrap_or_else(|_| PathBuf::from("cf-ddns.toml"))
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::builder()
        .with_default_directive(config.log_level().into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = get_config_path(cli.config);

    let mut config = match Config::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {} ({})", e, config_path.display());
            return DdnsExitCode::Fatal.into();
        }
    };
    cli.options.apply(&mut config);

    init_logging(&config);
    tracing::debug!("Configuration from {}", config_path.display());

    let result = match cli.command {
        Commands::Update(hosts) => {
            with_hosts(&mut config, hosts);
            cmd_update(config).await
        }
        Commands::Status(hosts) => {
            with_hosts(&mut config, hosts);
            cmd_status(config).await.map(|()| true)
        }
        Commands::Validate(hosts) => {
            with_hosts(&mut config, hosts);
            cmd_validate(config).await.map(|()| true)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => DdnsExitCode::HostsFailed.into(),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            DdnsExitCode::Fatal.into()
        }
    }
}

fn with_hosts(config: &mut Config, hosts: Hosts) {
    if !hosts.hostnames.is_empty() {
        config.hostnames = hosts.hostnames;
    }
}

/// Returns `false` when some hostnames could not be reconciled.
async fn cmd_update(config: Config) -> anyhow::Result<bool> {
    config.validate()?;

    let target = config.target()?;
    let resolver = detector::from_config(&config)?;
    let store = FileStore::new(config.state_path());
    let provider = CloudflareProvider::new(config.credentials()?)?;

    let report = Reconciler::new(&target, resolver.as_ref(), &store, &provider)
        .run()
        .await?;

    println!(
        "[{}] Current IP: {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S"),
        report.ip
    );

    for (host, outcome) in &report.hosts {
        match outcome {
            HostOutcome::Created { record_id } => {
                println!("{}: created ({}) -> {}", host, record_id, report.ip)
            }
            HostOutcome::Updated { previous, .. } => {
                println!("{}: updated ({} -> {})", host, previous, report.ip)
            }
            HostOutcome::Unchanged => println!("{}: unchanged ({})", host, report.ip),
            HostOutcome::Failed(e) => println!("{}: FAILED - {}", host, e),
        }
    }

    let failed = report.failed();
    if !failed.is_empty() {
        tracing::error!(
            "{} of {} hostnames failed: {}",
            failed.len(),
            report.hosts.len(),
            failed.join(", ")
        );
        return Ok(false);
    }

    Ok(true)
}

async fn cmd_status(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let target = config.target()?;
    let resolver = detector::from_config(&config)?;
    let store = FileStore::new(config.state_path());
    let provider = CloudflareProvider::new(config.credentials()?)?;

    println!("cf-ddns Status");
    println!("==============\n");

    match resolver.resolve().await {
        Ok(ip) => println!("Current Public IP: {}", ip),
        Err(e) => println!("Failed to detect IP: {}", e),
    }

    match store.get().await {
        Ok(Some(ip)) => println!("Stored IP: {} ({})", ip, store.path().display()),
        Ok(None) => println!("Stored IP: (none) ({})", store.path().display()),
        Err(e) => println!("Stored IP: error - {}", e),
    }

    let zone_id = match &target.zone_id {
        Some(id) => id.clone(),
        None => provider.resolve_zone(&target.zone_name).await?,
    };

    println!("\nHostnames:");
    println!("----------");

    for hostname in &target.hostnames {
        println!("  {}", hostname);

        match tokio::net::lookup_host((hostname.as_str(), 0)).await {
            Ok(addrs) => {
                let v4: Vec<String> = addrs
                    .filter_map(|a| match a.ip() {
                        IpAddr::V4(ip) => Some(ip.to_string()),
                        IpAddr::V6(_) => None,
                    })
                    .collect();
                println!("    system DNS: {}", v4.join(", "));
            }
            Err(e) => println!("    system DNS: error - {}", e),
        }

        match provider.find_records(&zone_id, hostname).await {
            Ok(records) if records.is_empty() => {
                println!("    {}: (no record)", provider.name())
            }
            Ok(records) => {
                for r in records {
                    println!("    {}: {} {} ({})", provider.name(), r.kind, r.content, r.id);
                }
            }
            Err(e) => println!("    {}: error - {}", provider.name(), e),
        }
    }

    Ok(())
}

async fn cmd_validate(config: Config) -> anyhow::Result<()> {
    println!("Validating configuration...\n");

    config.validate()?;
    let target = config.target()?;
    let provider = CloudflareProvider::new(config.credentials()?)?;

    print!("  zone {}: ", target.zone_name);

    let result = match &target.zone_id {
        Some(id) => provider
            .find_records(id, &target.hostnames[0])
            .await
            .map(|_| id.clone()),
        None => provider.resolve_zone(&target.zone_name).await,
    };

    let zone_id = result.map_err(|e| {
        println!("FAILED - {}", e);
        e
    })?;
    println!("OK ({})", zone_id);

    println!("\nConfiguration is valid.");

    Ok(())
}
