use crate::command::CommandOutcome;
use crate::error::IrecvError;

/// Coarse result of an operation, for rendering and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum OperationStatus {
    Success,
    NotFound,
    TransportError,
    UnexpectedStatus,
    Rebooting,
    Refused,
    Invalid,
}

impl OperationStatus {
    pub fn of<T>(result: &Result<T, IrecvError>) -> Self
    where
        for<'a> &'a T: Into<OperationStatus>,
    {
        match result {
            Ok(value) => value.into(),
            Err(e) => e.into(),
        }
    }

    /// Process exit code. `Rebooting` counts as success.
    pub fn exit_code(self) -> i32 {
        match self {
            OperationStatus::Success | OperationStatus::Rebooting => 0,
            OperationStatus::NotFound => 2,
            OperationStatus::TransportError => 3,
            OperationStatus::UnexpectedStatus => 4,
            OperationStatus::Refused => 5,
            OperationStatus::Invalid => 64,
        }
    }
}

impl From<&IrecvError> for OperationStatus {
    fn from(error: &IrecvError) -> Self {
        match error {
            IrecvError::DeviceNotFound { .. } => OperationStatus::NotFound,
            IrecvError::DeviceConfig { .. } | IrecvError::Transport(_) | IrecvError::SessionClosed => {
                OperationStatus::TransportError
            }
            IrecvError::UnexpectedStatus { .. } => OperationStatus::UnexpectedStatus,
            IrecvError::CommandRefused { .. } => OperationStatus::Refused,
            IrecvError::InvalidCommand(_) | IrecvError::PayloadTooLarge { .. } | IrecvError::Io(_) => {
                OperationStatus::Invalid
            }
        }
    }
}

impl From<&CommandOutcome> for OperationStatus {
    fn from(outcome: &CommandOutcome) -> Self {
        match outcome {
            CommandOutcome::Sent => OperationStatus::Success,
            CommandOutcome::Rebooting => OperationStatus::Rebooting,
        }
    }
}

impl From<&()> for OperationStatus {
    fn from(_: &()) -> Self {
        OperationStatus::Success
    }
}
