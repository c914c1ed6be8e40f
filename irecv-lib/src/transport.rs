//! # Transport boundary
//!
//! The session and protocol code never talk to a USB stack directly. They drive a [`Transport`],
//! an opened device handle offering blocking control requests and bulk reads, obtained from a
//! [`Connector`] that performs discovery. The `usb` module implements both on top of `nusb`;
//! the integration tests substitute a recording mock.

use crate::error::TransportError;
use std::time::Duration;

/// bmRequestType / bRequest / wValue / wIndex of a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlSetup {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

impl ControlSetup {
    /// Vendor, device recipient, host-to-device: a NUL-terminated text command.
    pub const COMMAND: ControlSetup = ControlSetup::new(0x40, 0x00, 0);

    /// Class, interface recipient, device-to-host: the 6-byte status block.
    pub const STATUS: ControlSetup = ControlSetup::new(0xA1, 0x03, 0);

    pub const fn new(request_type: u8, request: u8, value: u16) -> Self {
        Self {
            request_type,
            request,
            value,
            index: 0,
        }
    }

    /// Class, interface recipient, host-to-device: one file packet, or the empty completion
    /// request when `value` is the packet count.
    pub const fn file_packet(sequence: u16) -> Self {
        Self::new(0x21, 0x01, sequence)
    }

    /// Whether the data stage flows from device to host.
    pub fn is_device_to_host(&self) -> bool {
        self.request_type & 0x80 != 0
    }

    /// Bits 5..6 of bmRequestType: 0 standard, 1 class, 2 vendor.
    pub fn kind(&self) -> u8 {
        (self.request_type >> 5) & 0x03
    }

    /// Bits 0..4 of bmRequestType: 0 device, 1 interface, 2 endpoint, 3 other.
    pub fn recipient(&self) -> u8 {
        self.request_type & 0x1f
    }
}

/// Transfer type of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    pub address: u8,
    pub kind: EndpointKind,
}

impl EndpointInfo {
    pub fn is_in(&self) -> bool {
        self.address & 0x80 != 0
    }
}

/// One alternate setting of one interface in the active configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub number: u8,
    pub alternate: u8,
    pub endpoints: Vec<EndpointInfo>,
}

impl InterfaceInfo {
    /// Address of the first bulk IN endpoint of this setting.
    pub fn bulk_in(&self) -> Option<u8> {
        self.endpoints
            .iter()
            .find(|ep| ep.kind == EndpointKind::Bulk && ep.is_in())
            .map(|ep| ep.address)
    }
}

/// Inbound pipe the device writes its console output to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipe {
    pub interface: u8,
    pub endpoint: u8,
}

/// Device metadata strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringProperty {
    Manufacturer,
    Product,
    Serial,
}

/// An opened device handle.
///
/// All calls block the current thread for at most the supplied timeout.
pub trait Transport {
    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError>;

    /// Alternate settings of the active configuration, in descriptor order.
    fn interfaces(&self) -> Result<Vec<InterfaceInfo>, TransportError>;

    fn claim_interface(&mut self, number: u8, alternate: u8) -> Result<(), TransportError>;

    fn release_interface(&mut self, number: u8) -> Result<(), TransportError>;

    /// Host-to-device control request. Returns the number of bytes written.
    fn control_out(&mut self, setup: ControlSetup, data: &[u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Device-to-host control request. Returns the number of bytes read into `buf`.
    fn control_in(&mut self, setup: ControlSetup, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Reads up to `buf.len()` bytes from a bulk IN pipe. Expiry of `timeout` is reported as
    /// [`TransportError::Timeout`].
    fn bulk_read(&mut self, pipe: Pipe, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    fn reset(&mut self) -> Result<(), TransportError>;

    /// Releases the device handle. Called at most once per transport.
    fn close(&mut self) -> Result<(), TransportError>;

    fn string_property(&self, property: StringProperty) -> Option<String>;
}

/// Finds and opens a device by vendor and product id.
pub trait Connector {
    type Transport: Transport;

    /// `Ok(None)` when no attached device matches.
    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Option<Self::Transport>, TransportError>;
}
