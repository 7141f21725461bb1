use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use device_inventory::{expand_capabilities, Inventory, MockInventory, SmartThingsClient};
use influx_sink::{InfluxHttpWriter, MemoryWriter, PointWriter};
use telemetry_monitor::{load_config, Monitor, MonitorConfig, WriteOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "st-influx",
    version,
    about = "Poll SmartThings device readings into InfluxDB",
    disable_help_subcommand = true
)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(long, short, default_value = "st-influx.yaml", global = true)]
    config: PathBuf,

    /// Use the built-in demo inventory and an in-memory store
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll devices and write changed readings
    Monitor {
        /// Stop after this many polls instead of running forever
        #[arg(long)]
        cycles: Option<u64>,
        /// Print the loop counters (prometheus text) when done
        #[arg(long, action = ArgAction::SetTrue)]
        print_metrics: bool,
    },
    /// List devices with their components' capabilities
    List,
    /// Show health and status of all devices, or of one device
    Status {
        /// Device id
        device: Option<Uuid>,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    let config = load(&cli)?;

    match cli.command {
        Commands::Monitor {
            cycles,
            print_metrics,
        } => cmd_monitor(config, cli.mock, cycles, print_metrics),
        Commands::List => cmd_list(open_inventory(&config, cli.mock)?.as_ref()),
        Commands::Status { device } => {
            cmd_status(open_inventory(&config, cli.mock)?.as_ref(), &config, device)
        }
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load(cli: &Cli) -> Result<MonitorConfig> {
    if cli.mock && !cli.config.exists() {
        info!(
            "no config at {}, using defaults with the demo inventory",
            cli.config.display()
        );
        return Ok(MonitorConfig::default());
    }
    let config = load_config(&cli.config)?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_inventory(config: &MonitorConfig, mock: bool) -> Result<Box<dyn Inventory>> {
    if mock {
        return Ok(Box::new(MockInventory::demo(OffsetDateTime::now_utc())));
    }
    let token = config.require_token()?;
    let client = SmartThingsClient::new(token).context("initializing SmartThings client")?;
    Ok(Box::new(client))
}

fn cmd_monitor(
    config: MonitorConfig,
    mock: bool,
    cycles: Option<u64>,
    print_metrics: bool,
) -> Result<()> {
    if mock {
        let inventory = MockInventory::demo(OffsetDateTime::now_utc());
        let monitor = Monitor::new(config, inventory, MemoryWriter::new())?;
        return drive(monitor, cycles, print_metrics);
    }

    let token = config.require_token()?;
    let inventory = SmartThingsClient::new(token).context("initializing SmartThings client")?;
    let writer = InfluxHttpWriter::new(
        &config.influx.url,
        config.influx.username.clone(),
        config.influx.password.clone(),
    )
    .context("initializing InfluxDB client")?;
    writer
        .ping()
        .with_context(|| format!("InfluxDB at {} is not reachable", config.influx.url))?;
    let monitor = Monitor::new(config, inventory, writer)?;
    drive(monitor, cycles, print_metrics)
}

fn drive<I: Inventory, W: PointWriter>(
    mut monitor: Monitor<I, W>,
    cycles: Option<u64>,
    print_metrics: bool,
) -> Result<()> {
    let Some(n) = cycles else {
        monitor.run();
    };
    for (i, report) in monitor.run_cycles(n).iter().enumerate() {
        let written = match report.write {
            WriteOutcome::Written { points, .. } => points,
            _ => 0,
        };
        info!(
            "cycle {}: {} item(s), {} decision(s), {} ignored, {} dropped, {} written",
            i + 1,
            report.items,
            report.decisions.len(),
            report.ignored,
            report.dropped,
            written
        );
    }
    if print_metrics {
        print!("{}", monitor.metrics().encode_text());
    }
    Ok(())
}

fn cmd_list(inventory: &dyn Inventory) -> Result<()> {
    let devices = inventory.devices().context("listing devices")?;
    for (i, dev) in devices.iter().enumerate() {
        println!("{}: {}, {}, {}", i, dev.device_id, dev.name, dev.label);
        for comp in &dev.components {
            let prefix = if comp.is_main() {
                String::new()
            } else {
                format!("{}/", comp.id)
            };
            for cap in &comp.capabilities {
                println!("   | {}{} (v{})", prefix, cap.id, cap.version);
            }
        }
    }
    Ok(())
}

fn cmd_status(inventory: &dyn Inventory, config: &MonitorConfig, device: Option<Uuid>) -> Result<()> {
    let mut devices = inventory.devices().context("listing devices")?;
    if let Some(id) = device {
        devices.retain(|d| d.device_id == id);
        if devices.is_empty() {
            anyhow::bail!("device {id} not found");
        }
    }

    println!("Health:");
    for (i, dev) in devices.iter().enumerate() {
        let seen = dev
            .health
            .last_updated
            .map(|t| t.to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}: {} ({}): {} (last updated: {})",
            i,
            dev.display_name(),
            dev.name,
            dev.health.state,
            seen
        );
    }

    println!("Status of ({}):", config.metrics.join(", "));
    for item in expand_capabilities(devices, &config.metrics) {
        match inventory.device_status(&item) {
            Ok(status) => {
                for (key, reading) in status {
                    println!(
                        "   {} | {} | {}: {}{} at {}",
                        item.label(),
                        item.capability.id,
                        key,
                        reading.value,
                        reading.unit,
                        reading.timestamp
                    );
                }
            }
            Err(e) => warn!(
                "could not get status of {} {}: {}",
                item.label(),
                item.capability.id,
                e
            ),
        }
    }
    Ok(())
}
