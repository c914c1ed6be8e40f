use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use irecv_lib::list_bootloader_devices;

/// Lists attached Apple devices in recovery, DFU or WTF mode.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print the listing as JSON on stdout.
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(cli.verbose.tracing_level_filter().into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false).without_time())
        .init();

    let devices = list_bootloader_devices().context("Failed to list USB devices")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        info!("No device in a bootloader mode found.");
        return Ok(());
    }

    for (i, device) in devices.iter().enumerate() {
        info!(
            "Device #{}: mode {} (PID {:#06x}), Bus: {:03}, Address: {:03}",
            i + 1,
            device.mode,
            device.mode.product_id(),
            device.bus,
            device.address
        );
        info!("  Product: {}", device.product.as_deref().unwrap_or("<Not available>"));
        info!("  Serial: {}", device.serial.as_deref().unwrap_or("<Not available>"));
        if let Some(ecid) = device.identity.as_ref().and_then(|id| id.ecid) {
            info!("  ECID: {:#018x}", ecid);
        }
    }

    Ok(())
}
