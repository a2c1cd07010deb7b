//! Accumulator node entry point
//!
//! Starts every locality of the configured table in this process, connected
//! through an in-process channel network, hosts one accumulator on the last
//! peer and drives it from this process' own locality.

use accumulator::{accumulate, register_actions, Accumulator};
use anyhow::{Context, Result};
use clap::Parser;
use dispatch::{pump, ChannelNetwork, Locality};
use runtime_config::{LocalityEntry, RuntimeConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use types::LocalityId;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Values added to the accumulator, in order
    #[arg(long, value_delimiter = ',', default_values_t = vec![3.5, 2.0])]
    add: Vec<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => two_localities(),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting accumulator node");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let total = run(&config, &args.add).await?;
    println!("{}", total);
    Ok(())
}

/// Default deployment when no configuration file is given
fn two_localities() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.localities.push(LocalityEntry {
        id: config.locality.id + 1,
        address: "127.0.0.1:7911".to_string(),
    });
    config
}

async fn run(config: &RuntimeConfig, values: &[f64]) -> Result<f64> {
    let network = ChannelNetwork::with_max_payload(config.parcel.max_payload_bytes);

    let mut localities = Vec::with_capacity(config.localities.len());
    for entry in &config.localities {
        let mut own = config.clone();
        own.locality = entry.clone();

        let (transport, mailbox) = network.join(LocalityId::new(entry.id));
        let locality = Locality::from_config(&own, Arc::new(transport))
            .with_context(|| format!("Failed to start locality {}", entry.id))?;
        register_actions(&locality)?;
        tokio::spawn(pump(mailbox, locality.clone()));
        localities.push(locality);
    }

    let own_id = LocalityId::new(config.locality.id);
    let driver = localities
        .iter()
        .find(|l| l.id() == own_id)
        .context("own locality missing from the locality table")?;
    let host = localities
        .iter()
        .rev()
        .find(|l| l.id() != own_id)
        .unwrap_or(driver);

    let gid = host.create_component(Accumulator::default())?;
    if host.id() != driver.id() {
        driver.register_remote(gid, host.registry().resolve(gid)?)?;
    }
    info!(gid = %gid, host = %host.id(), driver = %driver.id(), "accumulator created");

    let total = accumulate(driver, gid, values).await;

    shutdown(&network, &localities);
    let total = total?;
    info!(total, "accumulation finished");
    Ok(total)
}

fn shutdown(network: &ChannelNetwork, localities: &[Locality]) {
    for locality in localities {
        locality.shutdown();
        network.leave(locality.id());
    }
}
