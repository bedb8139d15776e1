//! ane-device CLI: list accelerator nodes and exercise open/close on them.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use ane_device::config::{AccessPolicy, Cli, Command, Config};
use ane_device::DeviceManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "ane_device=debug"
    } else {
        "ane_device=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("ane-device v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    if cli.exclusive {
        config.device.access_policy = AccessPolicy::Exclusive;
    }

    let manager = DeviceManager::new(config.device);

    match cli.command {
        Command::List { json } => list(&manager, json),
        Command::Probe { id } => probe(&manager, id),
        Command::Hold { id, secs } => hold(&manager, id, secs).await,
    }
}

fn list(manager: &DeviceManager, json: bool) -> anyhow::Result<()> {
    let devices = manager.devices()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!(
            "no accelerator nodes under {}",
            manager.config().device_dir.display()
        );
        return Ok(());
    }
    for dev in &devices {
        println!(
            "{:>4}  {:<24}  {}",
            dev.id.index(),
            dev.path.display(),
            dev.driver.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn probe(manager: &DeviceManager, id: u32) -> anyhow::Result<()> {
    let handle = manager
        .open(id)
        .with_context(|| format!("probe of device {id} failed"))?;
    info!(device = id, path = %handle.path().display(), "Opened");
    manager.close(handle)?;
    println!("device {id}: ok");
    Ok(())
}

async fn hold(manager: &DeviceManager, id: u32, secs: u64) -> anyhow::Result<()> {
    let handle = manager
        .open(id)
        .with_context(|| format!("could not open device {id}"))?;
    info!(device = id, path = %handle.path().display(), policy = ?manager.policy(), "Holding device");

    if secs == 0 {
        tokio::signal::ctrl_c().await?;
    } else {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            res = tokio::signal::ctrl_c() => res?,
        }
    }

    manager.close(handle)?;
    info!(device = id, "Released device");
    Ok(())
}
