// Protocol constants for Apple bootloader-mode devices

use std::time::Duration;

/// Apple USB vendor id
pub const APPLE_VID: u16 = 0x05AC;

/// Product id reported in recovery mode (iBoot)
pub const PID_RECOVERY: u16 = 0x1281;

/// Product id reported in DFU mode
pub const PID_DFU: u16 = 0x1222;

/// Product id reported by the WTF stage
pub const PID_WTF: u16 = 0x1227;

/// Configuration selected after opening the device
pub const CONFIGURATION: u8 = 1;

/// Interface carrying the default control pipe
pub const CONTROL_INTERFACE: u8 = 0;

/// Size of one file packet (and of the drain buffer)
pub const PACKET_SIZE: usize = 2048;

/// Size of the status response
pub const STATUS_LENGTH: usize = 6;

/// Offset of the checked byte inside the status response
pub const STATUS_FLAG_OFFSET: usize = 4;

/// Status flag expected after every file packet
pub const STATUS_PACKET_ACCEPTED: u8 = 5;

/// First status flag expected after the completion request
pub const STATUS_COMPLETION_FIRST: u8 = 6;

/// Second status flag expected after the completion request
pub const STATUS_COMPLETION_SECOND: u8 = 7;

/// Command that makes the device drop off the bus
pub const REBOOT_COMMAND: &str = "reboot";

/// Default timeout for control requests
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default timeout for draining the response pipe
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);
