//! # Staged file transfer
//!
//! A payload is sent as a run of file packets, each at most [`PACKET_SIZE`] bytes and tagged
//! with its 0-based sequence number in `wValue`. The device acknowledges every packet through
//! the status block (flag 5). After the last packet an empty request whose `wValue` is the
//! packet count marks the end of the file, and two more status polls (flags 6, then 7) close
//! the exchange.
//!
//! There is no checksum or negative acknowledgement, so the first unexpected status aborts the
//! whole transfer. Nothing is resumed.

use crate::constants::{PACKET_SIZE, STATUS_COMPLETION_FIRST, STATUS_COMPLETION_SECOND, STATUS_PACKET_ACCEPTED};
use crate::error::IrecvError;
use crate::session::DeviceSession;
use crate::transport::{ControlSetup, Transport};
use bytes::Bytes;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info, warn};

/// How a payload of a given length is cut into packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    len: usize,
}

/// One packet of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSpan {
    pub sequence: u16,
    pub range: Range<usize>,
}

impl PacketSpan {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

impl TransferPlan {
    /// Plans a payload of `len` bytes. Fails when the packet count does not fit the 16-bit
    /// sequence field used by the completion request.
    pub fn new(len: usize) -> Result<Self, IrecvError> {
        if len.div_ceil(PACKET_SIZE) > u16::MAX as usize {
            return Err(IrecvError::PayloadTooLarge { len });
        }
        Ok(Self { len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn packet_count(&self) -> usize {
        self.len.div_ceil(PACKET_SIZE)
    }

    /// Length of the final packet; 0 for an empty payload.
    pub fn last_packet_len(&self) -> usize {
        match self.len % PACKET_SIZE {
            0 if self.len > 0 => PACKET_SIZE,
            rest => rest,
        }
    }

    /// `wValue` of the empty request that ends the transfer.
    pub fn completion_value(&self) -> u16 {
        self.packet_count() as u16
    }

    pub fn packets(&self) -> impl Iterator<Item = PacketSpan> + use<> {
        let len = self.len;
        (0..self.packet_count()).map(move |i| {
            let start = i * PACKET_SIZE;
            PacketSpan {
                sequence: i as u16,
                range: start..(start + PACKET_SIZE).min(len),
            }
        })
    }
}

/// Progress after an acknowledged packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub packets_sent: usize,
    pub packet_count: usize,
    pub bytes_sent: usize,
    pub total_bytes: usize,
}

/// Reads a whole file into memory before a transfer.
pub fn stage_file(path: &Path) -> Result<Bytes, IrecvError> {
    let data = std::fs::read(path)?;
    info!("Staged {} bytes from {}", data.len(), path.display());
    Ok(Bytes::from(data))
}

impl<T: Transport> DeviceSession<T> {
    /// Sends `payload` with the staged file protocol.
    pub fn send_payload(&mut self, payload: Bytes) -> Result<TransferPlan, IrecvError> {
        self.send_payload_with_progress(payload, |_| {})
    }

    /// Sends `payload`, calling `progress` after every packet the device acknowledged.
    ///
    /// The payload is dropped when this returns, whatever the outcome.
    pub fn send_payload_with_progress<F>(&mut self, payload: Bytes, mut progress: F) -> Result<TransferPlan, IrecvError>
    where
        F: FnMut(TransferProgress),
    {
        if !self.is_open() {
            return Err(IrecvError::SessionClosed);
        }
        let plan = TransferPlan::new(payload.len())?;
        info!(
            "Sending {} bytes in {} packet(s)",
            plan.len(),
            plan.packet_count()
        );

        for span in plan.packets() {
            let sequence = span.sequence;
            let sent = self
                .control_out(ControlSetup::file_packet(sequence), &payload[span.range.clone()])
                .and_then(|()| self.poll_status(STATUS_PACKET_ACCEPTED));
            if let Err(e) = sent {
                warn!("Transfer aborted at packet {}/{}: {}", sequence, plan.packet_count(), e);
                return Err(e);
            }
            debug!(sequence, len = span.len(), "Packet acknowledged");

            progress(TransferProgress {
                packets_sent: sequence as usize + 1,
                packet_count: plan.packet_count(),
                bytes_sent: span.range.end,
                total_bytes: plan.len(),
            });
        }

        self.control_out(ControlSetup::file_packet(plan.completion_value()), &[])?;
        self.poll_status(STATUS_COMPLETION_FIRST)?;
        self.poll_status(STATUS_COMPLETION_SECOND)?;

        info!("Transfer complete.");
        Ok(plan)
    }
}
