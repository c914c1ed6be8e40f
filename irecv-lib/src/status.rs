use crate::constants::{STATUS_FLAG_OFFSET, STATUS_LENGTH};
use crate::error::{IrecvError, TransportError};
use crate::session::DeviceSession;
use crate::transport::{ControlSetup, Transport};
use tracing::warn;

/// The 6-byte status block returned by the status request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusResponse(pub [u8; STATUS_LENGTH]);

impl StatusResponse {
    /// The progress flag at offset 4, the only byte the protocol interprets.
    pub fn flag(&self) -> u8 {
        self.0[STATUS_FLAG_OFFSET]
    }
}

impl<T: Transport> DeviceSession<T> {
    /// Requests the status block and checks its flag against `expected`. Neither failure is
    /// retried.
    pub fn poll_status(&mut self, expected: u8) -> Result<StatusResponse, IrecvError> {
        let mut buf = [0u8; STATUS_LENGTH];
        let read = self.control_in(ControlSetup::STATUS, &mut buf)?;
        if read != STATUS_LENGTH {
            return Err(TransportError::ShortRead {
                expected: STATUS_LENGTH,
                actual: read,
            }
            .into());
        }

        let status = StatusResponse(buf);
        if status.flag() != expected {
            warn!("Status flag {} where {} was expected", status.flag(), expected);
            return Err(IrecvError::UnexpectedStatus {
                expected,
                actual: status.flag(),
            });
        }
        Ok(status)
    }
}
