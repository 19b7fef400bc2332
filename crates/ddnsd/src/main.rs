// # ddnsd - Dynamic DNS Client
//
// Thin integration layer: all address selection and reconciliation logic
// lives in ddns-core. This binary:
// 1. Parses the command line
// 2. Loads and validates the YAML configuration
// 3. Initializes logging and the runtime
// 4. Registers update sinks and record sources
// 5. Runs one of the modes below
//
// ## Modes
//
// - default: one reconciliation pass (`-f` forces the update)
// - `-q/--query`: print local and published addresses, update nothing
// - `-n/--daemon`: change monitor + reconciliation loop until signalled
// - `--hash PASSWORD`: print a bcrypt hash and exit
//
// ## Example
//
// ```bash
// ddnsd -c /etc/ddns/ddns.yaml --query
// ddnsd -c /etc/ddns/ddns.yaml --daemon
// ```

use anyhow::{Context, Result};
use clap::Parser;
use ddns_core::{DdnsConfig, FamilyOutcome, ProviderRegistry, Reconciler};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error, including a failed one-shot pass
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep a DNS name pointed at this host's best addresses
#[derive(Debug, Parser)]
#[command(name = "ddnsd", version, about)]
struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        env = "DDNS_CONFIG",
        default_value = "/etc/ddns/ddns.yaml"
    )]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,

    /// Run as a daemon, reacting to address changes
    #[arg(short = 'n', long)]
    daemon: bool,

    /// Push addresses even when DNS already holds them
    #[arg(short, long)]
    force: bool,

    /// Print local and DNS addresses without updating
    #[arg(short, long, conflicts_with = "daemon")]
    query: bool,

    /// Print a bcrypt hash of PASSWORD and exit
    #[arg(long, value_name = "PASSWORD")]
    hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    OneShot { force: bool },
    Query,
    Daemon,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.query {
            Mode::Query
        } else if self.daemon {
            Mode::Daemon
        } else {
            Mode::OneShot { force: self.force }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(password) = &cli.hash {
        return match bcrypt::hash(password, bcrypt::DEFAULT_COST) {
            Ok(hashed) => {
                println!("{}", hashed);
                DdnsExitCode::CleanShutdown.into()
            }
            Err(e) => {
                eprintln!("Failed to hash password: {}", e);
                DdnsExitCode::RuntimeError.into()
            }
        };
    }

    let config = match DdnsConfig::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error ({}): {}", cli.config.display(), e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let mode = cli.mode();
    if let Err(e) = init_logging(&cli, &config, mode) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        let reconciler = match build_reconciler(config) {
            Ok(reconciler) => reconciler,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return DdnsExitCode::ConfigError;
            }
        };

        let result = match mode {
            Mode::Query => query(&reconciler).await,
            Mode::OneShot { force } => one_shot(&reconciler, force).await,
            Mode::Daemon => run_daemon(reconciler).await,
        };

        match result {
            Ok(()) => DdnsExitCode::CleanShutdown,
            Err(e) => {
                error!("{:#}", e);
                DdnsExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Max level from `--debug`, config `debug`, then `DDNS_LOG_LEVEL`
fn log_level(cli: &Cli, config: &DdnsConfig) -> Level {
    if cli.debug || config.debug {
        return Level::DEBUG;
    }

    match std::env::var("DDNS_LOG_LEVEL")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn init_logging(cli: &Cli, config: &DdnsConfig, mode: Mode) -> Result<()> {
    let level = log_level(cli, config);

    let (writer, ansi) = match &config.logfile {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open logfile {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(ansi);

    // journald stamps daemon output itself
    if mode == Mode::Daemon {
        tracing::subscriber::set_global_default(builder.without_time().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn registry() -> ProviderRegistry {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "http")]
    ddns_provider_http::register(&registry);

    #[cfg(feature = "nsupdate")]
    ddns_provider_nsupdate::register(&registry);

    registry
}

#[cfg(feature = "netlink")]
fn address_source() -> Result<Box<dyn ddns_core::AddressSource>> {
    Ok(Box::new(ddns_ip_netlink::NetlinkAddressSource::new()))
}

#[cfg(not(feature = "netlink"))]
fn address_source() -> Result<Box<dyn ddns_core::AddressSource>> {
    anyhow::bail!("ddnsd was built without an address source (enable the `netlink` feature)")
}

#[cfg(feature = "netlink")]
fn change_feed() -> Result<Box<dyn ddns_core::ChangeFeed>> {
    Ok(Box::new(ddns_ip_netlink::NetlinkChangeFeed::new()))
}

#[cfg(not(feature = "netlink"))]
fn change_feed() -> Result<Box<dyn ddns_core::ChangeFeed>> {
    anyhow::bail!("ddnsd was built without a change feed (enable the `netlink` feature)")
}

fn build_reconciler(config: DdnsConfig) -> Result<Reconciler> {
    let registry = registry();

    info!("Update sink: {}", config.update.type_name());
    let sink = registry
        .create_update_sink(&config.update)
        .context("cannot create update sink")?;

    let records = match &config.record_source {
        Some(source_config) => {
            info!("Record source: {}", source_config.type_name());
            Some(
                registry
                    .create_record_source(source_config)
                    .context("cannot create record source")?,
            )
        }
        None => None,
    };

    let mut reconciler = Reconciler::new(config, address_source()?, sink)?;
    if let Some(records) = records {
        reconciler = reconciler.with_record_source(records);
    }
    Ok(reconciler)
}

fn show<T: std::fmt::Display>(addr: Option<T>) -> String {
    addr.map_or_else(|| "-".to_string(), |a| a.to_string())
}

async fn query(reconciler: &Reconciler) -> Result<()> {
    let (state, record) = reconciler.inspect().await?;

    println!("hostname:   {}", reconciler.config().hostname);
    println!("local IPv4: {}", show(state.ipv4));
    println!("local IPv6: {}", show(state.ipv6));
    match record {
        Some(record) => {
            println!("DNS IPv4:   {}", show(record.ipv4));
            println!("DNS IPv6:   {}", show(record.ipv6));
        }
        None => println!("DNS:        no record source configured"),
    }
    Ok(())
}

async fn one_shot(reconciler: &Reconciler, force: bool) -> Result<()> {
    let outcome = reconciler.run_once(force).await?;

    for (family, result) in [("IPv4", &outcome.ipv4), ("IPv6", &outcome.ipv6)] {
        match result {
            FamilyOutcome::NoAddress => info!("{}: no usable address", family),
            FamilyOutcome::InSync(addr) => info!("{}: {} already published", family, addr),
            FamilyOutcome::Updated(addr) => info!("{}: updated to {}", family, addr),
            FamilyOutcome::Failed { address, reason } => {
                warn!("{}: update to {} failed: {}", family, address, reason)
            }
        }
    }

    if outcome.has_failures() {
        anyhow::bail!("one or more updates failed");
    }
    Ok(())
}

async fn run_daemon(reconciler: Reconciler) -> Result<()> {
    let shutdown = CancellationToken::new();
    let daemon = ddns_core::Daemon::new(reconciler, change_feed()?);

    let signals = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(name) => info!("Received {}, shutting down", name),
            Err(e) => error!("Signal handling failed: {}", e),
        }
        signals.cancel();
    });

    info!("Starting ddnsd daemon");
    daemon.run(shutdown).await?;
    info!("ddnsd stopped");
    Ok(())
}

/// Wait for SIGTERM, SIGINT or SIGHUP
///
/// Configuration is loaded once, so SIGHUP stops the daemon like the others
/// and the service manager restarts it with the new file.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to setup SIGHUP handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
        _ = sighup.recv() => "SIGHUP",
    })
}

/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
