mod config;
mod error;
mod models;
mod registry;
mod service;
mod sync;
mod utils;

use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use config::BridgeConfig;
use registry::{AccessoryRegistry, CachedRegistry};
use service::WirelessTagClient;
use sync::{LocalId, PollSettings, Poller, Projector, Reconciler, SlaveDirectory};

const IDENTIFY_QUEUE: usize = 8;

/// Each non-empty stdin line is a tag serial to identify (beep).
async fn read_identify_requests(tx: mpsc::Sender<LocalId>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let serial = line.trim();
                if serial.is_empty() {
                    continue;
                }
                if tx.send(LocalId::derive(serial)).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Stopped reading identify requests: {}", e);
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match BridgeConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let registry = match CachedRegistry::open(&config.cache_file) {
        Ok(registry) => registry,
        Err(e) => {
            error!(
                "Failed to load accessory cache {}: {}",
                config.cache_file.display(),
                e
            );
            return Err(e.into());
        }
    };
    for device in registry.devices() {
        info!(
            "Cached accessory: {} (serial {}, {})",
            device.info.name, device.info.serial, device.info.model
        );
    }

    let slaves = SlaveDirectory::new();
    let projector = Projector::new(config.temperature_unit, slaves.clone());
    let mut engine = Reconciler::new(registry, config.ignore_names, projector);

    if !config.forget_tags.is_empty() {
        match engine.forget(&config.forget_tags) {
            Ok(removed) => info!("Removed {} accessories on request", removed),
            Err(e) => error!("Failed to remove accessories: {}", e),
        }
    }
    info!("{} accessories registered", engine.registry().len());

    let client = WirelessTagClient::new(config.base_url)?;
    let poller = Poller::new(
        Arc::new(client),
        config.credentials,
        engine,
        slaves,
        PollSettings {
            interval: config.query_frequency,
            reauthenticate: config.reauthenticate,
            beep_duration: config.beep_duration,
        },
    );

    let (identify_tx, identify_rx) = mpsc::channel(IDENTIFY_QUEUE);
    tokio::spawn(read_identify_requests(identify_tx));

    // Run the poller until Ctrl+C
    tokio::select! {
        _ = poller.run(identify_rx) => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Program terminated by user. Exiting gracefully."),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        },
    }

    Ok(())
}
