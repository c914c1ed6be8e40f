use crate::constants::{DEFAULT_CONTROL_TIMEOUT, DEFAULT_DRAIN_TIMEOUT};
use crate::mode::ProductMode;
use std::time::Duration;

/// Which product modes accept text commands.
///
/// Bootloader builds disagree on this, so it is a policy chosen by the caller rather than a
/// property of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandGate {
    /// Send commands in every mode.
    Any,
    /// Refuse commands while the device is in the WTF stage.
    #[default]
    DenyWtf,
    /// Only send commands to a device in recovery mode.
    RecoveryOnly,
}

impl CommandGate {
    pub fn allows(self, mode: ProductMode) -> bool {
        match self {
            CommandGate::Any => true,
            CommandGate::DenyWtf => mode != ProductMode::Wtf,
            CommandGate::RecoveryOnly => mode == ProductMode::Recovery,
        }
    }
}

/// Settings threaded into a session and its dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Timeout for every control request.
    pub control_timeout: Duration,
    /// Initial timeout for draining the response pipe.
    pub drain_timeout: Duration,
    /// Product-mode gating for text commands.
    pub command_gate: CommandGate,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            command_gate: CommandGate::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_command_gate(mut self, gate: CommandGate) -> Self {
        self.command_gate = gate;
        self
    }
}
