// # ovhdnsd - OVH DNS reconciliation runner
//
// This binary is a THIN integration layer: it reads configuration, builds
// the collaborators and hands them to `ovhdns-core`. No DNS or retry logic
// lives here.
//
// ## Commands
//
// - `update` (default): discover the public IP and reconcile the zone
// - `plan`: show what `update` would change, without mutating anything
// - `show`: list the records of the managed subdomains
// - `health [URL...]`: poll health endpoints
// - `diagnose`: check local ports, then poll health endpoints
// - `token`: request a new OVH consumer key
//
// ## Configuration
//
// Keys are read from the process environment, then from the dotenv file
// given by `--env-file` / `OVHDNS_ENV_FILE`:
//
// ### Registrar
// - `OVH_APPLICATION_KEY`, `OVH_APPLICATION_SECRET`, `OVH_CONSUMER_KEY` (required)
// - `OVH_API_ENDPOINT`: `ovh-eu` (default), `ovh-ca`, ... or a base URL
//
// ### Records
// - `OVH_DNS_ZONE`, `OVH_DNS_SUBDOMAIN` (required, `@` for the zone apex)
// - `DYNDNS_ADDITIONAL_SUBDOMAINS`: comma-separated extra subdomains
// - `OVH_DISALLOWED_AAAA_TARGET`, `OVH_RECORD_TTL`
//
// ### Public IP
// - `IP_ADDRESS`: fixed address, skips the lookup
// - `IP_LOOKUP_URL`: lookup service (default `https://api.ipify.org`)
//
// ### Health
// - `HEALTH_URLS`, `HEALTH_MAX_RETRIES`, `HEALTH_DELAY_SECS`, `DIAGNOSTIC_PORTS`
//
// ## Logging
//
// Log lines go to stdout at `--log-level` / `OVHDNS_LOG_LEVEL`. With
// `--log-file` / `OVHDNS_LOG_FILE` they are also appended to that file,
// which suits runs started from cron.
//
// ## Example
//
// ```bash
// export OVH_DNS_ZONE=example.fr
// export OVH_DNS_SUBDOMAIN=www
// ovhdnsd --env-file /etc/ovhdns/credentials.env update
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ovhdns_core::config::{ConfigSource, DotenvSource, EnvSource, LayeredSource};
use ovhdns_core::mask::mask;
use ovhdns_core::traits::{IpSource, StaticIpSource, TokioSleeper};
use ovhdns_core::types::fqdn;
use ovhdns_core::{
    DnsConfig, HealthConfig, HealthPoller, HealthReport, IpSourceConfig, Plan, Reconciler,
    RegistrarConfig, RunReport,
};
use ovhdns_http::{HttpHealthProbe, HttpIpSource, port_available};
use ovhdns_provider_ovh::{OvhClient, default_access_rules};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Exit codes for the different outcomes
///
/// - 0: Success
/// - 1: Configuration error, raised before any network call
/// - 2: Runtime failure (registrar, policy violation, unhealthy service)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OvhdnsExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<OvhdnsExitCode> for ExitCode {
    fn from(code: OvhdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "ovhdnsd")]
#[command(about = "Keeps OVH DNS A records pointed at the public IP", long_about = None)]
#[command(version)]
struct Cli {
    /// Dotenv file read after the process environment
    #[arg(long, env = "OVHDNS_ENV_FILE", global = true)]
    env_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "OVHDNS_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// File log lines are appended to, in addition to stdout
    #[arg(long, env = "OVHDNS_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Point every managed subdomain at the public IP
    Update,

    /// Show the operations `update` would apply
    Plan,

    /// List the records of the managed subdomains
    Show,

    /// Poll health endpoints until they answer 200
    Health {
        /// URLs to poll (default: HEALTH_URLS)
        urls: Vec<String>,
    },

    /// Check local ports, then poll HEALTH_URLS
    Diagnose,

    /// Request a consumer key allowed to manage DNS zones
    Token {
        /// URL OVH redirects to once the key is validated
        #[arg(long)]
        redirection: Option<String>,
    },
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Directory and file name of a log file path, `None` when it names no file
fn log_file_parts(path: &Path) -> Option<(PathBuf, String)> {
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, file_name))
}

/// Install the stdout layer and, when asked, a non-rotating file layer
///
/// The returned guard flushes the file writer on drop and must outlive
/// every log call.
fn init_logging(level: Level, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (dir, file_name) = log_file_parts(path)
                .with_context(|| format!("Log file {} has no file name", path.display()))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(file_name)
                .build(&dir)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to set tracing subscriber")?;
    Ok(guard)
}

/// Process environment first, then the dotenv file if any
fn config_source(env_file: Option<&PathBuf>) -> Result<LayeredSource> {
    let mut source = LayeredSource::new().with_layer(EnvSource);
    if let Some(path) = env_file {
        let dotenv = DotenvSource::load(path)
            .with_context(|| format!("Failed to load env file {}", path.display()))?;
        source = source.with_layer(dotenv);
    }
    Ok(source)
}

fn exit_code_for(error: &anyhow::Error) -> OvhdnsExitCode {
    match error.downcast_ref::<ovhdns_core::Error>() {
        Some(e) if e.is_config() => OvhdnsExitCode::ConfigError,
        _ => OvhdnsExitCode::RuntimeError,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(log_level) = parse_level(&cli.log_level) else {
        eprintln!(
            "Configuration error: OVHDNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            cli.log_level
        );
        return OvhdnsExitCode::ConfigError.into();
    };

    let _log_guard = match init_logging(log_level, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return OvhdnsExitCode::ConfigError.into();
        }
    };

    let source = match config_source(cli.env_file.as_ref()) {
        Ok(source) => source,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return OvhdnsExitCode::ConfigError.into();
        }
    };

    // Every call is awaited in turn, one thread is enough
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return OvhdnsExitCode::RuntimeError.into();
        }
    };

    let command = cli.command.unwrap_or(Command::Update);
    let result = rt.block_on(run(command, &source, cli.json));

    match result {
        Ok(true) => OvhdnsExitCode::Success.into(),
        Ok(false) => OvhdnsExitCode::RuntimeError.into(),
        Err(e) => {
            let code = exit_code_for(&e);
            if code == OvhdnsExitCode::ConfigError {
                error!("Configuration error: {:#}", e);
            } else {
                error!("{:#}", e);
            }
            code.into()
        }
    }
}

/// Run one command, `Ok(false)` when it completed but did not succeed
async fn run(command: Command, source: &dyn ConfigSource, json: bool) -> Result<bool> {
    match command {
        Command::Update => update(source, json).await,
        Command::Plan => plan(source, json).await,
        Command::Show => show(source, json).await,
        Command::Health { urls } => health(source, urls, json).await,
        Command::Diagnose => diagnose(source, json).await,
        Command::Token { redirection } => token(source, redirection.as_deref()).await,
    }
}

async fn discover_ip(config: &IpSourceConfig) -> Result<std::net::Ipv4Addr> {
    let source: Box<dyn IpSource> = match config {
        IpSourceConfig::Static(ip) => Box::new(StaticIpSource::new(*ip)),
        IpSourceConfig::Http { url } => Box::new(HttpIpSource::new(url.clone())?),
    };
    let ip = source
        .current()
        .await
        .with_context(|| format!("Public IP lookup ({}) failed", source.source_name()))?;
    info!("Target IP: {} (from {})", mask(&ip.to_string()), source.source_name());
    Ok(ip)
}

fn reconciler(config: &DnsConfig) -> Result<Reconciler> {
    let client = OvhClient::new(&config.registrar)?;
    info!(
        "Managing {} subdomain(s) of {} via {}",
        config.sub_domains.len(),
        config.zone,
        client.base_url()
    );
    Ok(Reconciler::new(Box::new(client), config.policy.clone()))
}

async fn update(source: &dyn ConfigSource, json: bool) -> Result<bool> {
    let config = DnsConfig::from_source(source)?;
    let reconciler = reconciler(&config)?;
    let ip = discover_ip(&config.ip_source).await?;

    let report = reconciler.run(&config.zone, &config.desired_state(ip)).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_run_report(&report);
    }
    Ok(report.is_success())
}

async fn plan(source: &dyn ConfigSource, json: bool) -> Result<bool> {
    let config = DnsConfig::from_source(source)?;
    let reconciler = reconciler(&config)?;
    let ip = discover_ip(&config.ip_source).await?;

    let plan = reconciler
        .plan_for(&config.zone, &config.desired_state(ip))
        .await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan);
    }
    Ok(true)
}

async fn show(source: &dyn ConfigSource, json: bool) -> Result<bool> {
    let config = DnsConfig::from_source(source)?;
    let reconciler = reconciler(&config)?;

    let records = reconciler
        .fetch_current(&config.zone, &config.sub_domains)
        .await?;

    if json {
        let masked: Vec<serde_json::Value> = records
            .iter()
            .map(|record| {
                serde_json::json!({
                    "id": record.id,
                    "fieldType": record.field_type,
                    "subDomain": record.sub_domain,
                    "target": mask(&record.target),
                    "ttl": record.ttl,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&masked)?);
    } else if records.is_empty() {
        println!("No records for the managed subdomains of {}", config.zone);
    } else {
        for record in &records {
            println!(
                "{:<40} {:<6} #{:<12} {:<20} ttl {}",
                record.fqdn(&config.zone),
                record.field_type,
                record.id,
                mask(&record.target),
                record.ttl
            );
        }
    }
    Ok(true)
}

async fn poll_all(config: &HealthConfig, urls: &[String]) -> Result<Vec<HealthReport>> {
    let poller = HealthPoller::new(
        Box::new(HttpHealthProbe::new()?),
        Box::new(TokioSleeper),
        config.retry,
    );

    let mut reports = Vec::with_capacity(urls.len());
    for url in urls {
        let report = poller.poll(url).await;
        info!("Service {} health check: {}", url, report.healthy);
        reports.push(report);
    }
    Ok(reports)
}

fn print_health(reports: &[HealthReport]) {
    for report in reports {
        println!(
            "{:<9} {} ({} attempt(s))",
            if report.healthy { "healthy" } else { "UNHEALTHY" },
            report.url,
            report.attempts
        );
    }
}

async fn health(source: &dyn ConfigSource, urls: Vec<String>, json: bool) -> Result<bool> {
    let config = HealthConfig::from_source(source)?;
    let urls = if urls.is_empty() { config.urls.clone() } else { urls };
    if urls.is_empty() {
        return Err(ovhdns_core::Error::config(
            "no health URL given: pass URLs or set HEALTH_URLS",
        )
        .into());
    }

    let reports = poll_all(&config, &urls).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_health(&reports);
    }
    Ok(reports.iter().all(|report| report.healthy))
}

async fn diagnose(source: &dyn ConfigSource, json: bool) -> Result<bool> {
    let config = HealthConfig::from_source(source)?;

    let mut ports = Vec::with_capacity(config.diagnostic_ports.len());
    for &port in &config.diagnostic_ports {
        let available = port_available(port).await;
        info!("Port {} availability: {}", port, available);
        ports.push((port, available));
    }

    if config.urls.is_empty() {
        warn!("HEALTH_URLS is empty, skipping health checks");
    }
    let reports = poll_all(&config, &config.urls).await?;

    if json {
        let ports: Vec<serde_json::Value> = ports
            .iter()
            .map(|(port, available)| serde_json::json!({ "port": port, "available": available }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "ports": ports,
                "services": reports,
            }))?
        );
    } else {
        for (port, available) in &ports {
            println!(
                "port {:<5} {}",
                port,
                if *available { "available" } else { "in use" }
            );
        }
        print_health(&reports);
    }
    Ok(reports.iter().all(|report| report.healthy))
}

async fn token(source: &dyn ConfigSource, redirection: Option<&str>) -> Result<bool> {
    let config = RegistrarConfig::application_only(source)?;
    let client = OvhClient::new(&config)?;

    let credential = client
        .request_consumer_key(&default_access_rules(), redirection)
        .await
        .context("Consumer key request failed")?;

    println!("Consumer key:   {}", credential.consumer_key);
    println!("Validation URL: {}", credential.validation_url);
    println!("State:          {}", credential.state);
    println!();
    println!("Open the validation URL, then set OVH_CONSUMER_KEY to the key above.");
    Ok(true)
}

fn print_plan(plan: &Plan) {
    for verdict in &plan.verdicts {
        println!(
            "{:<10} {:<6} {:<30} #{:<12} {}",
            format!("{:?}", verdict.verdict).to_lowercase(),
            verdict.field_type,
            fqdn(&verdict.sub_domain, &plan.zone),
            verdict.record_id,
            mask(&verdict.target)
        );
    }

    if plan.is_empty() {
        println!("Zone {} is up to date", plan.zone);
        return;
    }

    let counts = plan.counts();
    println!(
        "Plan for {}: {} delete(s), {} update(s), {} create(s)",
        plan.zone, counts.deletes, counts.updates, counts.creates
    );
    for operation in &plan.operations {
        println!("  {}", operation);
    }
}

fn print_run_report(report: &RunReport) {
    if report.plan.is_empty() {
        println!("Zone {} is up to date", report.zone);
        return;
    }

    for applied in &report.apply.applied {
        println!("applied  {}", applied.operation);
    }
    if let Some(failure) = &report.apply.failure {
        println!("FAILED   {}", failure.error);
    }
    for skipped in &report.apply.skipped {
        println!("skipped  {}", skipped);
    }
    println!(
        "Zone {} {}",
        report.zone,
        if report.apply.refreshed {
            "refreshed"
        } else {
            "NOT refreshed"
        }
    );
}
