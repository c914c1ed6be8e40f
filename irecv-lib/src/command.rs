use crate::constants::REBOOT_COMMAND;
use crate::error::IrecvError;
use crate::session::DeviceSession;
use crate::transport::{ControlSetup, Transport};
use tracing::{debug, info, warn};

/// Result of a successfully handled text command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The request went out; the session stays open.
    Sent,
    /// The device is rebooting and the session has been closed.
    Rebooting,
}

/// Builds the wire payload for a command: the text plus a terminating NUL.
pub fn command_payload(text: &str) -> Result<Vec<u8>, IrecvError> {
    if text.as_bytes().contains(&0) {
        return Err(IrecvError::InvalidCommand("command contains a NUL byte".into()));
    }
    if text.len() + 1 > u16::MAX as usize {
        return Err(IrecvError::InvalidCommand(format!(
            "command of {} bytes does not fit a control request",
            text.len()
        )));
    }

    let mut payload = Vec::with_capacity(text.len() + 1);
    payload.extend_from_slice(text.as_bytes());
    payload.push(0);
    Ok(payload)
}

impl<T: Transport> DeviceSession<T> {
    /// Sends one text command as a single control request, without waiting for a status.
    ///
    /// `reboot` always yields [`CommandOutcome::Rebooting`] and closes the session: the device
    /// drops off the bus while handling it, so a failed request is the expected outcome. Any
    /// other transport failure is returned and the session stays usable.
    pub fn send_command(&mut self, text: &str) -> Result<CommandOutcome, IrecvError> {
        if !self.is_open() {
            return Err(IrecvError::SessionClosed);
        }
        if !self.config().command_gate.allows(self.mode()) {
            warn!("Refusing to send {:?} in {} mode", text, self.mode());
            return Err(IrecvError::CommandRefused { mode: self.mode() });
        }
        let payload = command_payload(text)?;

        let result = self.control_out(ControlSetup::COMMAND, &payload);

        if text == REBOOT_COMMAND {
            if let Err(e) = result {
                debug!("Reboot request ended with {} as the device went away", e);
            }
            info!("Device is rebooting.");
            self.close();
            return Ok(CommandOutcome::Rebooting);
        }

        result?;
        debug!("Command {:?} sent", text);
        Ok(CommandOutcome::Sent)
    }
}
