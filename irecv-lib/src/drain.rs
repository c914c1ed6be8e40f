use crate::constants::PACKET_SIZE;
use crate::error::{IrecvError, TransportError};
use crate::session::DeviceSession;
use crate::transport::Transport;
use bytes::{Bytes, BytesMut};
use std::borrow::Cow;
use std::time::Duration;
use tracing::{debug, trace};

/// Console output read from the response pipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    data: Bytes,
}

impl Response {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The text up to the first NUL, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(self.data.len());
        String::from_utf8_lossy(&self.data[..end])
    }
}

impl<T: Transport> DeviceSession<T> {
    /// Reads whatever the device has written to its response pipe, waiting at most `timeout`.
    ///
    /// Silence is normal: an expired timeout, or a session without a response pipe, yields an
    /// empty response rather than an error.
    pub fn drain_response(&mut self, timeout: Duration) -> Result<Response, IrecvError> {
        if !self.is_open() {
            return Err(IrecvError::SessionClosed);
        }
        let Some(pipe) = self.pipe() else {
            return Ok(Response::default());
        };
        let transport = self.transport_mut()?;

        let mut buf = BytesMut::zeroed(PACKET_SIZE);
        match transport.bulk_read(pipe, &mut buf, timeout) {
            Ok(read) => {
                buf.truncate(read);
                debug!(len = read, bytes = hex::encode(&buf[..read.min(32)]), "Bulk in");
            }
            Err(TransportError::Timeout) => {
                trace!("No response within {:?}", timeout);
                buf.clear();
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Response::new(buf.freeze()))
    }
}
