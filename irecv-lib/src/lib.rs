//! Host-side client for Apple devices in a bootloader mode (recovery, DFU, WTF).
//!
//! A [`DeviceSession`] owns the USB connection. On top of it sit the command channel
//! ([`DeviceSession::send_command`]), the status poller ([`DeviceSession::poll_status`]),
//! the staged file transfer ([`DeviceSession::send_payload`]) and the response drainer
//! ([`DeviceSession::drain_response`]). [`Dispatcher`] routes operator input to them.
//!
//! ```no_run
//! use irecv_lib::{DeviceSession, ProductMode, SessionConfig};
//!
//! # fn main() -> Result<(), irecv_lib::IrecvError> {
//! let mut session = DeviceSession::open_usb(ProductMode::Recovery, SessionConfig::default())?;
//! session.send_command("bgcolor 255 12 255")?;
//! let response = session.drain_response(session.config().drain_timeout)?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod drain;
pub mod error;
pub mod identity;
pub mod mode;
pub mod outcome;
pub mod session;
pub mod status;
pub mod transfer;
pub mod transport;
pub mod usb;


pub use command::CommandOutcome;
pub use config::{CommandGate, SessionConfig};
pub use dispatch::{Directive, DirectiveError, Dispatcher, Flow};
pub use drain::Response;
pub use error::{ConfigStep, IrecvError, TransportError};
pub use identity::DeviceIdentity;
pub use mode::ProductMode;
pub use outcome::OperationStatus;
pub use session::DeviceSession;
pub use status::StatusResponse;
pub use transfer::{TransferPlan, TransferProgress};
pub use transport::{Connector, ControlSetup, Transport};
pub use usb::{DeviceListing, UsbConnector, UsbTransport, list_bootloader_devices};
