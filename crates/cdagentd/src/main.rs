//! cdagentd - host metrics agent daemon.
//!
//! Samples CPU, network, disk and memory counters every interval and sends
//! them to a collectd server using the collectd binary network protocol.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use cdagent_core::collector::RealFs;
#[cfg(not(target_os = "linux"))]
use cdagent_core::collector::mock::MockFs;
use cdagent_core::protocol::decode_parts;
use cdagent_core::{
    Agent, AgentConfig, Exit, Lifecycle, LogDestination, LogLevel, Overrides, Scheduler, Sweep,
    Transport, UdpTransport,
};

/// collectd network protocol metrics agent.
#[derive(Parser)]
#[command(name = "cdagentd", about = "Host metrics agent for collectd", version)]
struct Args {
    /// collectd server to send datagrams to.
    #[arg(long)]
    host: Option<String>,

    /// collectd server UDP port [default: 25826].
    #[arg(short, long)]
    port: Option<u16>,

    /// Sweep interval in seconds [default: 60].
    #[arg(short, long)]
    interval: Option<u64>,

    /// Host name reported in every datagram [default: OS hostname].
    #[arg(long)]
    hostname: Option<String>,

    /// Log file, or "-" for stderr [default: -].
    #[arg(long, value_name = "PATH")]
    log_file: Option<String>,

    /// Minimum log level: debug, info, notice, warning or error [default: info].
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long)]
    proc_path: Option<String>,

    /// TOML config file. Command-line values take precedence.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run a single sweep and exit.
    #[arg(long)]
    once: bool,

    /// Log each datagram's parts instead of sending it.
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            interval: self.interval,
            hostname: self.hostname.clone(),
            log_file: self.log_file.clone(),
            log_level: self.log_level,
            proc_path: self.proc_path.clone(),
        }
    }
}

/// Writes decoded datagrams to the log instead of the network.
struct DryRunTransport;

impl Transport for DryRunTransport {
    fn send(&self, datagram: &[u8]) {
        match decode_parts(datagram) {
            Ok(parts) => info!("Datagram ({} bytes): {}", datagram.len(), describe(&parts)),
            Err(e) => warn!("Datagram ({} bytes) does not decode: {}", datagram.len(), e),
        }
    }
}

fn describe<T: std::fmt::Display>(parts: &[T]) -> String {
    parts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn init_logging(level: LogLevel, destination: &LogDestination) -> Result<()> {
    let level = level.as_tracing();
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("cdagentd={}", level).parse()?)
        .add_directive(format!("cdagent_core={}", level).parse()?);

    match destination {
        LogDestination::Console => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogDestination::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<AgentConfig> {
    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    config.apply(args.overrides());
    if args.dry_run {
        config.validate_sampling()?;
    } else {
        config.validate()?;
    }
    Ok(config)
}

fn build_agent(config: &AgentConfig, hostname: String, transport: Arc<dyn Transport>) -> Agent {
    let interval = i64::try_from(config.interval).unwrap_or(i64::MAX);

    #[cfg(target_os = "linux")]
    let fs = RealFs::new();
    #[cfg(not(target_os = "linux"))]
    let fs = {
        warn!("No /proc on this platform, reporting sample data");
        MockFs::typical_system()
    };

    Agent::standard(fs, &config.proc_path, hostname, interval, transport)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(config.log_level, &config.log_destination())?;

    let hostname = config.resolve_hostname()?;

    info!("cdagentd {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: host={}:{}, interval={}s, hostname={}, proc={}",
        config.host, config.port, config.interval, hostname, config.proc_path
    );

    let transport: Arc<dyn Transport> = if args.dry_run {
        info!("Dry run: datagrams are logged, not sent");
        Arc::new(DryRunTransport)
    } else {
        let udp = UdpTransport::connect(&config.host, config.port)
            .with_context(|| format!("cannot resolve {}:{}", config.host, config.port))?;
        info!("Sending to {}", udp.destination());
        Arc::new(udp)
    };

    let mut agent = build_agent(&config, hostname, transport);

    if args.once {
        agent.sweep(Utc::now().timestamp())?;
        return Ok(());
    }

    let scheduler = Arc::new(Scheduler::new(
        Duration::from_secs(config.interval),
        agent,
    ));

    let s = Arc::clone(&scheduler);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.stop();
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    scheduler.start()?;

    match scheduler.wait() {
        Exit::Stopped => {
            info!("Shutdown complete");
            Ok(())
        }
        Exit::Failed(reason) => bail!("sweep loop failed: {}", reason),
    }
}
