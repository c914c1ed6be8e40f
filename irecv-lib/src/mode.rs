use num_enum::{FromPrimitive, IntoPrimitive};
use serde::Serialize;
use std::fmt;

/// Bootloader mode, identified by the USB product id the device enumerates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum ProductMode {
    Recovery = 0x1281,
    Dfu = 0x1222,
    Wtf = 0x1227,

    #[num_enum(catch_all)]
    Other(u16),
}

impl ProductMode {
    /// USB product id for this mode.
    pub fn product_id(self) -> u16 {
        self.into()
    }

    /// Modes a bootloader device can enumerate in.
    pub const KNOWN: [ProductMode; 3] = [ProductMode::Recovery, ProductMode::Dfu, ProductMode::Wtf];
}

impl fmt::Display for ProductMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductMode::Recovery => f.write_str("recovery"),
            ProductMode::Dfu => f.write_str("dfu"),
            ProductMode::Wtf => f.write_str("wtf"),
            ProductMode::Other(pid) => write!(f, "unknown ({pid:#06x})"),
        }
    }
}
