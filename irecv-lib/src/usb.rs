use crate::constants::{APPLE_VID, CONTROL_INTERFACE};
use crate::error::TransportError;
use crate::identity::DeviceIdentity;
use crate::mode::ProductMode;
use crate::transport::{
    Connector, ControlSetup, EndpointInfo, EndpointKind, InterfaceInfo, Pipe, StringProperty, Transport,
};
use nusb::transfer::{Control, ControlType, EndpointType, Recipient, RequestBuffer};
use nusb::{Device, DeviceInfo, Interface};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Opens devices through `nusb`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UsbConnector;

impl Connector for UsbConnector {
    type Transport = UsbTransport;

    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Option<UsbTransport>, TransportError> {
        let Some(info) = nusb::list_devices()?.find(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
        else {
            return Ok(None);
        };

        info!(
            "Found device on bus {} addr {}",
            info.bus_number(),
            info.device_address()
        );

        let device = info.open()?;
        // Bulk reads are futures in nusb; a private runtime lets us bound them with a timer
        // while keeping the blocking interface.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        Ok(Some(UsbTransport {
            info,
            device: Some(device),
            interfaces: BTreeMap::new(),
            runtime,
        }))
    }
}

/// A device opened with `nusb`, plus the interfaces claimed on it.
pub struct UsbTransport {
    info: DeviceInfo,
    device: Option<Device>,
    interfaces: BTreeMap<u8, Interface>,
    runtime: Runtime,
}

impl UsbTransport {
    fn device(&self) -> Result<&Device, TransportError> {
        self.device.as_ref().ok_or(TransportError::Disconnected)
    }

    /// Interface used to submit control requests.
    fn control_interface(&self) -> Result<&Interface, TransportError> {
        self.interfaces
            .get(&CONTROL_INTERFACE)
            .or_else(|| self.interfaces.values().next())
            .ok_or(TransportError::NotClaimed(CONTROL_INTERFACE))
    }
}

fn to_control(setup: ControlSetup) -> Control {
    let control_type = match setup.kind() {
        1 => ControlType::Class,
        2 => ControlType::Vendor,
        _ => ControlType::Standard,
    };
    let recipient = match setup.recipient() {
        0 => Recipient::Device,
        1 => Recipient::Interface,
        2 => Recipient::Endpoint,
        _ => Recipient::Other,
    };
    Control {
        control_type,
        recipient,
        request: setup.request,
        value: setup.value,
        index: setup.index,
    }
}

fn endpoint_kind(transfer_type: EndpointType) -> EndpointKind {
    match transfer_type {
        EndpointType::Control => EndpointKind::Control,
        EndpointType::Isochronous => EndpointKind::Isochronous,
        EndpointType::Bulk => EndpointKind::Bulk,
        EndpointType::Interrupt => EndpointKind::Interrupt,
    }
}

impl Transport for UsbTransport {
    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError> {
        self.device()?.set_configuration(configuration)?;
        Ok(())
    }

    fn interfaces(&self) -> Result<Vec<InterfaceInfo>, TransportError> {
        let configuration = self
            .device()?
            .active_configuration()
            .map_err(|e| TransportError::Descriptor(e.to_string()))?;

        Ok(configuration
            .interfaces()
            .flat_map(|group| {
                group
                    .alt_settings()
                    .map(|setting| InterfaceInfo {
                        number: setting.interface_number(),
                        alternate: setting.alternate_setting(),
                        endpoints: setting
                            .endpoints()
                            .map(|ep| EndpointInfo {
                                address: ep.address(),
                                kind: endpoint_kind(ep.transfer_type()),
                            })
                            .collect(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect())
    }

    fn claim_interface(&mut self, number: u8, alternate: u8) -> Result<(), TransportError> {
        let interface = self.device()?.detach_and_claim_interface(number)?;
        if alternate != 0 {
            interface.set_alt_setting(alternate)?;
        }
        debug!(number, alternate, "Interface claimed");
        self.interfaces.insert(number, interface);
        Ok(())
    }

    fn release_interface(&mut self, number: u8) -> Result<(), TransportError> {
        // nusb releases the claim when the handle is dropped
        self.interfaces
            .remove(&number)
            .map(drop)
            .ok_or(TransportError::NotClaimed(number))
    }

    fn control_out(&mut self, setup: ControlSetup, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        let written = self
            .control_interface()?
            .control_out_blocking(to_control(setup), data, timeout)?;
        Ok(written)
    }

    fn control_in(&mut self, setup: ControlSetup, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let read = self
            .control_interface()?
            .control_in_blocking(to_control(setup), buf, timeout)?;
        Ok(read)
    }

    fn bulk_read(&mut self, pipe: Pipe, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let interface = self
            .interfaces
            .get(&pipe.interface)
            .ok_or(TransportError::NotClaimed(pipe.interface))?;
        let transfer = interface.bulk_in(pipe.endpoint, RequestBuffer::new(buf.len()));

        // Dropping the future on expiry cancels the transfer.
        let completion = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, transfer).await })
            .map_err(|_| TransportError::Timeout)?;
        let data = completion.into_result()?;

        let read = data.len().min(buf.len());
        buf[..read].copy_from_slice(&data[..read]);
        Ok(read)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.device()?.reset()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.interfaces.clear();
        self.device.take().map(drop).ok_or(TransportError::Disconnected)
    }

    fn string_property(&self, property: StringProperty) -> Option<String> {
        let value = match property {
            StringProperty::Manufacturer => self.info.manufacturer_string(),
            StringProperty::Product => self.info.product_string(),
            StringProperty::Serial => self.info.serial_number(),
        };
        value.map(str::to_owned)
    }
}

/// An attached Apple device in one of the bootloader modes.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceListing {
    pub mode: ProductMode,
    pub bus: u8,
    pub address: u8,
    pub product: Option<String>,
    pub serial: Option<String>,
    pub identity: Option<DeviceIdentity>,
}

/// Lists every attached device enumerating with the Apple vendor id and a known bootloader
/// product id.
pub fn list_bootloader_devices() -> Result<Vec<DeviceListing>, TransportError> {
    Ok(nusb::list_devices()?
        .filter(|d| d.vendor_id() == APPLE_VID)
        .filter_map(|d| {
            let mode = ProductMode::from(d.product_id());
            ProductMode::KNOWN.contains(&mode).then(|| DeviceListing {
                mode,
                bus: d.bus_number(),
                address: d.device_address(),
                product: d.product_string().map(str::to_owned),
                serial: d.serial_number().map(str::to_owned),
                identity: d.serial_number().map(DeviceIdentity::parse),
            })
        })
        .collect())
}
