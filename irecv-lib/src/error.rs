use crate::mode::ProductMode;
use std::io;
use strum_macros::Display;
use thiserror::Error;

/// Failure of a single transport primitive.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),

    #[error("Timeout during USB operation")]
    Timeout,

    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Short write: expected {expected} bytes, sent {actual}")]
    ShortWrite { expected: usize, actual: usize },

    #[error("Interface {0} is not claimed")]
    NotClaimed(u8),

    #[error("Descriptor error: {0}")]
    Descriptor(String),

    #[error("Device disconnected")]
    Disconnected,
}

/// Configuration step that failed while opening a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConfigStep {
    #[strum(to_string = "open device")]
    Open,
    #[strum(to_string = "set configuration")]
    SetConfiguration,
    #[strum(to_string = "read interface descriptors")]
    ReadDescriptors,
    #[strum(to_string = "claim control interface")]
    ClaimControl,
    #[strum(to_string = "claim data interface")]
    ClaimData,
    #[strum(to_string = "find bulk IN pipe")]
    FindPipe,
}

/// The primary error type for the `irecv-lib` library.
#[derive(Error, Debug)]
pub enum IrecvError {
    #[error("No device found in {mode} mode. Is it connected?")]
    DeviceNotFound { mode: ProductMode },

    #[error("Failed to {step}: {source}")]
    DeviceConfig {
        step: ConfigStep,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Unexpected status: expected {expected}, got {actual}")]
    UnexpectedStatus { expected: u8, actual: u8 },

    #[error("Commands are not accepted in {mode} mode")]
    CommandRefused { mode: ProductMode },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Payload of {len} bytes needs more packets than a 16-bit sequence number allows")]
    PayloadTooLarge { len: usize },

    #[error("Session is closed")]
    SessionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl IrecvError {
    pub(crate) fn config(step: ConfigStep) -> impl FnOnce(TransportError) -> IrecvError {
        move |source| IrecvError::DeviceConfig { step, source }
    }
}
