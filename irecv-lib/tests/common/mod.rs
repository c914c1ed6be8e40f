//! Common test utilities: a recording in-memory transport

// Not every test file uses every helper
#![allow(dead_code)]

use irecv_lib::error::TransportError;
use irecv_lib::transport::{
    Connector, ControlSetup, EndpointInfo, EndpointKind, InterfaceInfo, Pipe, StringProperty, Transport,
};
use irecv_lib::{DeviceSession, ProductMode, SessionConfig};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Serial string reported by the mock device
pub const RECOVERY_SERIAL: &str =
    "CPID:8930 CPRV:20 CPFM:03 SCEP:02 BDID:00 ECID:000001234A5B6C7D IBFL:00 SRTG:[iBoot-574.4]";

/// Everything the transport was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open { vendor_id: u16, product_id: u16 },
    SetConfiguration(u8),
    Claim { number: u8, alternate: u8 },
    Release(u8),
    ControlOut { setup: ControlSetup, data: Vec<u8> },
    ControlIn { setup: ControlSetup, len: usize },
    BulkRead { pipe: Pipe, len: usize, timeout: Duration },
    Reset,
    Close,
}

/// Transport primitives that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Open,
    SetConfiguration,
    Interfaces,
    Claim(u8),
    Release(u8),
    Reset,
    Close,
}

#[derive(Debug)]
pub struct MockState {
    pub present: bool,
    pub events: Vec<Event>,
    pub interfaces: Vec<InterfaceInfo>,
    pub failures: Vec<Failure>,
    /// Flags returned by successive status requests; an empty queue times out
    pub status_flags: VecDeque<u8>,
    /// Bytes the status request reports as read
    pub status_len: usize,
    /// Successful control-out requests before every further one fails
    pub control_out_budget: Option<usize>,
    /// Successive bulk reads; `None` or an empty queue times out
    pub bulk: VecDeque<Option<Vec<u8>>>,
    pub bulk_disconnected: bool,
    pub product: Option<String>,
    pub serial: Option<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            present: true,
            events: Vec::new(),
            interfaces: recovery_interfaces(),
            failures: Vec::new(),
            status_flags: VecDeque::new(),
            status_len: 6,
            control_out_budget: None,
            bulk: VecDeque::new(),
            bulk_disconnected: false,
            product: Some("Apple Mobile Device (Recovery Mode)".to_owned()),
            serial: Some(RECOVERY_SERIAL.to_owned()),
        }
    }
}

impl MockState {
    fn fails(&self, failure: Failure) -> bool {
        self.failures.contains(&failure)
    }
}

/// Interface layout of a device in recovery mode: the control interface, then interface 1
/// whose alternate setting 1 carries the bulk pipes.
pub fn recovery_interfaces() -> Vec<InterfaceInfo> {
    vec![
        InterfaceInfo {
            number: 0,
            alternate: 0,
            endpoints: vec![],
        },
        InterfaceInfo {
            number: 1,
            alternate: 0,
            endpoints: vec![],
        },
        InterfaceInfo {
            number: 1,
            alternate: 1,
            endpoints: vec![
                EndpointInfo {
                    address: 0x04,
                    kind: EndpointKind::Bulk,
                },
                EndpointInfo {
                    address: 0x81,
                    kind: EndpointKind::Bulk,
                },
            ],
        },
    ]
}

/// Interface layout of a device in DFU mode: only the control interface.
pub fn dfu_interfaces() -> Vec<InterfaceInfo> {
    vec![InterfaceInfo {
        number: 0,
        alternate: 0,
        endpoints: vec![],
    }]
}

pub type Shared = Rc<RefCell<MockState>>;

pub fn shared(state: MockState) -> Shared {
    Rc::new(RefCell::new(state))
}

pub struct MockConnector {
    pub state: Shared,
}

pub struct MockTransport {
    state: Shared,
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Option<MockTransport>, TransportError> {
        let mut state = self.state.borrow_mut();
        if !state.present {
            return Ok(None);
        }
        if state.fails(Failure::Open) {
            return Err(TransportError::Usb(std::io::Error::other("access denied")));
        }
        state.events.push(Event::Open { vendor_id, product_id });
        Ok(Some(MockTransport {
            state: self.state.clone(),
        }))
    }
}

impl Transport for MockTransport {
    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.fails(Failure::SetConfiguration) {
            return Err(TransportError::Disconnected);
        }
        state.events.push(Event::SetConfiguration(configuration));
        Ok(())
    }

    fn interfaces(&self) -> Result<Vec<InterfaceInfo>, TransportError> {
        let state = self.state.borrow();
        if state.fails(Failure::Interfaces) {
            return Err(TransportError::Descriptor("unreadable".into()));
        }
        Ok(state.interfaces.clone())
    }

    fn claim_interface(&mut self, number: u8, alternate: u8) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.fails(Failure::Claim(number)) {
            return Err(TransportError::Usb(std::io::Error::other("busy")));
        }
        state.events.push(Event::Claim { number, alternate });
        Ok(())
    }

    fn release_interface(&mut self, number: u8) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Release(number));
        if state.fails(Failure::Release(number)) {
            return Err(TransportError::NotClaimed(number));
        }
        Ok(())
    }

    fn control_out(&mut self, setup: ControlSetup, data: &[u8], _timeout: Duration) -> Result<usize, TransportError> {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::ControlOut {
            setup,
            data: data.to_vec(),
        });
        match state.control_out_budget {
            Some(0) => Err(TransportError::Disconnected),
            Some(ref mut left) => {
                *left -= 1;
                Ok(data.len())
            }
            None => Ok(data.len()),
        }
    }

    fn control_in(&mut self, setup: ControlSetup, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::ControlIn { setup, len: buf.len() });
        let flag = state.status_flags.pop_front().ok_or(TransportError::Timeout)?;
        let status = [0, 0, 0, 0, flag, 0];
        let len = state.status_len.min(buf.len());
        buf[..len].copy_from_slice(&status[..len]);
        Ok(len)
    }

    fn bulk_read(&mut self, pipe: Pipe, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::BulkRead {
            pipe,
            len: buf.len(),
            timeout,
        });
        if state.bulk_disconnected {
            return Err(TransportError::Disconnected);
        }
        match state.bulk.pop_front().flatten() {
            Some(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            None => Err(TransportError::Timeout),
        }
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Reset);
        if state.fails(Failure::Reset) {
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Close);
        if state.fails(Failure::Close) {
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }

    fn string_property(&self, property: StringProperty) -> Option<String> {
        let state = self.state.borrow();
        match property {
            StringProperty::Product => state.product.clone(),
            StringProperty::Serial => state.serial.clone(),
            StringProperty::Manufacturer => Some("Apple Inc.".to_owned()),
        }
    }
}

/// Opens a session in `mode` over the mock
pub fn open_in(state: &Shared, mode: ProductMode, config: SessionConfig) -> DeviceSession<MockTransport> {
    let connector = MockConnector { state: state.clone() };
    DeviceSession::open(&connector, mode, config).expect("Failed to open mock session")
}

/// Opens a recovery-mode session with the default configuration
pub fn open_recovery(state: &Shared) -> DeviceSession<MockTransport> {
    open_in(state, ProductMode::Recovery, SessionConfig::default())
}

/// Drops the events recorded while opening
pub fn clear_events(state: &Shared) {
    state.borrow_mut().events.clear();
}

pub fn events(state: &Shared) -> Vec<Event> {
    state.borrow().events.clone()
}

/// Control-out requests recorded so far
pub fn control_outs(state: &Shared) -> Vec<(ControlSetup, Vec<u8>)> {
    state
        .borrow()
        .events
        .iter()
        .filter_map(|e| match e {
            Event::ControlOut { setup, data } => Some((*setup, data.clone())),
            _ => None,
        })
        .collect()
}

pub fn count(state: &Shared, event: &Event) -> usize {
    state.borrow().events.iter().filter(|e| *e == event).count()
}
