//! Connect to a hub and print every change it pushes
//!
//! Reads the connection from the environment:
//! - `HUBITAT_HOST`: hub address, e.g. `http://10.0.1.99`
//! - `HUBITAT_APP_ID`: Maker API app id
//! - `HUBITAT_TOKEN`: Maker API access token
//! - `HUBITAT_PORT`: optional fixed port for the event listener
//!
//! Run with: HUBITAT_LOG_MODE=development cargo run -p hubitat-sdk --example hub_monitor

use hubitat_sdk::logging::init_logging_from_env;
use hubitat_sdk::{Hub, HubConfig, HubError};

fn required(name: &str) -> Result<String, HubError> {
    std::env::var(name).map_err(|_| HubError::InvalidConfig(format!("{name} is not set")))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let mut config = HubConfig::new(
        required("HUBITAT_HOST")?,
        required("HUBITAT_APP_ID")?,
        required("HUBITAT_TOKEN")?,
    );
    if let Ok(port) = std::env::var("HUBITAT_PORT") {
        config = config.with_port(port.parse()?);
    }

    let hub = Hub::new(config)?;
    println!("Connecting to {}...", hub.host());
    hub.start().await?;

    let mut devices: Vec<_> = hub.devices().into_values().collect();
    devices.sort_by(|a, b| a.label().cmp(b.label()));
    println!("Found {} devices:", devices.len());
    for device in &devices {
        println!("  {device}");
        for attr in device.attributes().values() {
            match &attr.unit {
                Some(unit) => println!("    {} = {} {}", attr.name, attr.value, unit),
                None => println!("    {} = {}", attr.name, attr.value),
            }
        }

        let label = device.label().to_string();
        hub.add_device_listener(device.id().clone(), move |event| {
            println!("{label}: {} -> {}", event.attribute, event.value);
        });
    }

    match hub.mode_supported() {
        Some(true) => println!("Mode: {}", hub.mode().unwrap_or_default()),
        _ => println!("Modes not available"),
    }
    match hub.hsm_status() {
        Some(status) => println!("HSM: {status}"),
        None => println!("HSM not available"),
    }

    hub.add_mode_listener(|event| println!("Mode changed to {}", event.value));
    hub.add_hsm_listener(|event| println!("HSM changed to {}", event.value));

    println!("\nListening for events at {}", hub.event_url().unwrap_or_default());
    println!("Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    hub.stop().await;
    Ok(())
}
