//! Switch Collector binary
//!
//! Polls the configured switches every minute and writes their interface
//! counters to InfluxDB.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use switch_collector::{
    AppContext, CollectorConfig, FieldValue, InfluxSink, MetricPoint, PollCycle, PollScheduler,
    SshExecutor, SshOptions, DEFAULT_CONFIG_PATH,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "switch_collector")]
#[command(about = "Switch interface counters → InfluxDB, every minute")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Polls network switches over SSH for per-port counters and writes them to InfluxDB")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "debug")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll every minute until stopped (default)
    Run(RunArgs),

    /// Poll each switch once, print the points and exit
    Once(OnceArgs),

    /// Validate the config file and exit
    Check,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Skip the startup delay before the first poll
    #[arg(long)]
    no_delay: bool,
}

#[derive(Args)]
struct OnceArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,

    /// Print the points without writing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let config = CollectorConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match &cli.command {
        Some(Commands::Run(args)) => run_command(config, args).await,
        Some(Commands::Once(args)) => once_command(config, args).await,
        Some(Commands::Check) => {
            check_command(&cli, &config);
            Ok(())
        }
        None => run_command(config, &RunArgs::default()).await,
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        LevelFilter::DEBUG
    } else if cli.quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::INFO
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn build_context(config: &CollectorConfig) -> anyhow::Result<(AppContext, InfluxSink)> {
    let sink = InfluxSink::new(&config.influxdb, config.poll.write_timeout())?;
    let executor = SshExecutor::new(SshOptions {
        connect_timeout: config.poll.connect_timeout(),
        command_timeout: config.poll.command_timeout(),
    });

    if config.interface_desc.is_empty() {
        warn!("InterfaceDesc is empty; every port will be rejected as unknown");
    }

    let ctx = AppContext::new(
        config.targets(),
        config.interface_desc.clone(),
        Arc::new(executor),
        Arc::new(sink.clone()),
    )
    .with_shutdown_grace(config.poll.shutdown_grace());

    Ok((ctx, sink))
}

async fn run_command(config: CollectorConfig, args: &RunArgs) -> anyhow::Result<()> {
    info!("Starting switch collector v{}", env!("CARGO_PKG_VERSION"));

    let (ctx, sink) = build_context(&config)?;
    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(shutdown.clone()));

    if !args.no_delay {
        let delay = config.poll.startup_delay();
        info!("Waiting {}s for the metrics store to come up", delay.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.cancelled() => return Ok(()),
        }
    }

    // The database is created on a best-effort basis; writes report their own failures.
    if let Err(e) = sink.ensure_database().await {
        warn!("Could not create database {}: {}", sink.database(), e);
    }

    for target in &ctx.targets {
        info!("Polling {} with {:?}", target, target.command);
    }

    PollScheduler::new(Arc::new(ctx)).run(shutdown).await;
    Ok(())
}

async fn once_command(config: CollectorConfig, args: &OnceArgs) -> anyhow::Result<()> {
    if args.format != "json" && args.format != "pretty" {
        anyhow::bail!("Unsupported format: {}. Use 'json' or 'pretty'", args.format);
    }

    let (ctx, _sink) = build_context(&config)?;
    let mut failures = 0;

    for target in &ctx.targets {
        let mut cycle = PollCycle::new(&ctx, target);
        let points = match cycle.collect().await {
            Ok(points) => points,
            Err(e) => {
                error!("{} ({}): {}", target.name, e.kind(), e);
                failures += 1;
                continue;
            }
        };

        match args.format.as_str() {
            "json" => println!("{}", serde_json::to_string_pretty(&points)?),
            _ => print_pretty_points(&target.name, &points),
        }

        if !args.dry_run {
            if let Err(e) = cycle.write(&points).await {
                error!("{} ({}): {}", target.name, e.kind(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} poll(s) failed", failures, ctx.targets.len());
    }
    Ok(())
}

fn check_command(cli: &Cli, config: &CollectorConfig) {
    println!("Configuration OK: {}", cli.config.display());
    println!();
    println!("InfluxDB:");
    println!("  URL: {}", config.influxdb.base_url());
    println!("  Database: {}", config.influxdb.database);
    println!();
    println!("Switches:");
    for target in config.targets() {
        println!("  {}", target);
        println!("    Key: {}", target.private_key_path.display());
        println!("    Command: {}", target.command);
    }
    println!();
    println!("Interface descriptions: {}", config.interface_desc.len());
    println!(
        "Timeouts: connect {}s, command {}s, write {}s",
        config.poll.connect_timeout_secs,
        config.poll.command_timeout_secs,
        config.poll.write_timeout_secs
    );
}

fn print_pretty_points(switch: &str, points: &[MetricPoint]) {
    let int = |point: &MetricPoint, field: &str| {
        point
            .field(field)
            .and_then(FieldValue::as_integer)
            .unwrap_or_default()
    };

    println!("{} ({} ports)", switch, points.len());
    println!("==========================================");
    for point in points {
        let index = match point.field("IfIndex") {
            Some(FieldValue::Text(index)) => index.as_str(),
            _ => "?",
        };
        println!(
            "  port {:>3} {:<20} {:<4} {:>6} Mb/s  RX {:>14} B  TX {:>14} B  err {}/{}",
            index,
            point.tag("ifDesc").unwrap_or_default(),
            if int(point, "IfAdminStatus") == 1 { "UP" } else { "DOWN" },
            int(point, "IfSpeed"),
            int(point, "IfInOctets"),
            int(point, "IfOutOctets"),
            int(point, "IfInErrors"),
            int(point, "IfOutErrors"),
        );
    }
    println!();
}

/// Resolve on SIGINT or SIGTERM.
async fn wait_for_shutdown(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Received shutdown signal");
    shutdown.cancel();
}
