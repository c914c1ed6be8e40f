use anyhow::{Context, Result, bail};
use clap::Parser;
use nusb::transfer::EndpointType;
use tracing::{info, warn};

use irecv_lib::ProductMode;
use irecv_lib::constants::APPLE_VID;

/// Dumps the configuration, interface and endpoint tree of a bootloader-mode device.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Product id to look for; defaults to any bootloader mode.
    #[arg(long, value_parser = parse_pid)]
    pid: Option<u16>,
}

fn parse_pid(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x");
    u16::from_str_radix(digits, 16).map_err(|e| format!("{s}: {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).without_time().init();
    let cli = Cli::parse();

    let Some(device_info) = nusb::list_devices()?.find(|d| {
        d.vendor_id() == APPLE_VID
            && match cli.pid {
                Some(pid) => d.product_id() == pid,
                None => ProductMode::KNOWN.contains(&ProductMode::from(d.product_id())),
            }
    }) else {
        bail!("No Apple device in a bootloader mode found");
    };

    info!(
        "Found {} device: VID: {:#06x}, PID: {:#06x}, Bus: {:03}, Address: {:03}",
        ProductMode::from(device_info.product_id()),
        device_info.vendor_id(),
        device_info.product_id(),
        device_info.bus_number(),
        device_info.device_address()
    );
    info!("  Product: {}", device_info.product_string().unwrap_or("<Not available>"));
    info!("  Serial: {}", device_info.serial_number().unwrap_or("<Not available>"));
    info!("  Speed: {:?}", device_info.speed());

    let device = device_info
        .open()
        .context("Failed to open device. Check permissions (udev rules on Linux).")?;

    let configs: Vec<_> = device.configurations().collect();
    info!("Configurations: {}", configs.len());
    match device.active_configuration() {
        Ok(active) => info!("Active configuration: {}", active.configuration_value()),
        Err(e) => warn!("No active configuration: {}", e),
    }

    for config in configs {
        info!(
            "Configuration {} (attributes {:#04x}, max power {} mA)",
            config.configuration_value(),
            config.attributes(),
            config.max_power() as u16 * 2
        );
        for group in config.interfaces() {
            for setting in group.alt_settings() {
                info!(
                    "  Interface {} alt {}: class {:#04x} subclass {:#04x} protocol {:#04x}",
                    setting.interface_number(),
                    setting.alternate_setting(),
                    setting.class(),
                    setting.subclass(),
                    setting.protocol()
                );
                for endpoint in setting.endpoints() {
                    let address = endpoint.address();
                    let direction = if address & 0x80 != 0 { "IN" } else { "OUT" };
                    let kind = match endpoint.transfer_type() {
                        EndpointType::Control => "Control",
                        EndpointType::Isochronous => "Isochronous",
                        EndpointType::Bulk => "Bulk",
                        EndpointType::Interrupt => "Interrupt",
                    };
                    info!(
                        "    Endpoint {:#04x} ({} {}), max packet {}",
                        address,
                        kind,
                        direction,
                        endpoint.max_packet_size()
                    );
                }
            }
        }
    }

    Ok(())
}
