use crate::config::SessionConfig;
use crate::constants::{APPLE_VID, CONFIGURATION, CONTROL_INTERFACE};
use crate::error::{ConfigStep, IrecvError, TransportError};
use crate::identity::DeviceIdentity;
use crate::mode::ProductMode;
use crate::transport::{Connector, ControlSetup, Pipe, StringProperty, Transport};
use crate::usb::{UsbConnector, UsbTransport};
use tracing::{debug, info, warn};

/// An open connection to a device in a bootloader mode.
///
/// The session owns the transport and every interface claimed on it. Closing is idempotent
/// and also happens on drop, so resources are released exactly once on every path.
pub struct DeviceSession<T: Transport> {
    transport: Option<T>,
    mode: ProductMode,
    name: Option<String>,
    serial: Option<String>,
    pipe: Option<Pipe>,
    claimed: Vec<u8>,
    config: SessionConfig,
}

impl DeviceSession<UsbTransport> {
    /// Opens the first attached device in `mode` via `nusb`.
    pub fn open_usb(mode: ProductMode, config: SessionConfig) -> Result<Self, IrecvError> {
        Self::open(&UsbConnector, mode, config)
    }
}

impl<T: Transport> DeviceSession<T> {
    /// Finds a device in `mode`, selects configuration 1, claims the control interface and the
    /// first interface above it that exposes a bulk IN pipe.
    ///
    /// Devices in DFU or WTF mode only expose the control interface; for those a missing
    /// response pipe is not an error.
    pub fn open<C>(connector: &C, mode: ProductMode, config: SessionConfig) -> Result<Self, IrecvError>
    where
        C: Connector<Transport = T>,
    {
        info!("Searching for device in {} mode...", mode);
        let transport = connector
            .open(APPLE_VID, mode.product_id())
            .map_err(IrecvError::config(ConfigStep::Open))?
            .ok_or(IrecvError::DeviceNotFound { mode })?;

        let mut session = Self {
            name: transport.string_property(StringProperty::Product),
            serial: transport.string_property(StringProperty::Serial),
            transport: Some(transport),
            mode,
            pipe: None,
            claimed: Vec::new(),
            config,
        };

        // On failure `session` is dropped here, which releases whatever was acquired.
        session.configure()?;

        info!(
            name = session.name.as_deref().unwrap_or("<unknown>"),
            serial = session.serial.as_deref().unwrap_or("<unknown>"),
            "Session open"
        );
        Ok(session)
    }

    fn configure(&mut self) -> Result<(), IrecvError> {
        let transport = self.transport.as_mut().ok_or(IrecvError::SessionClosed)?;

        transport
            .set_configuration(CONFIGURATION)
            .map_err(IrecvError::config(ConfigStep::SetConfiguration))?;

        let interfaces = transport
            .interfaces()
            .map_err(IrecvError::config(ConfigStep::ReadDescriptors))?;

        transport
            .claim_interface(CONTROL_INTERFACE, 0)
            .map_err(IrecvError::config(ConfigStep::ClaimControl))?;
        self.claimed.push(CONTROL_INTERFACE);
        info!("Control interface claimed.");

        let candidate = interfaces
            .iter()
            .filter(|setting| setting.number > CONTROL_INTERFACE)
            .find_map(|setting| setting.bulk_in().map(|endpoint| (setting, endpoint)));

        match candidate {
            Some((setting, endpoint)) => {
                transport
                    .claim_interface(setting.number, setting.alternate)
                    .map_err(IrecvError::config(ConfigStep::ClaimData))?;
                self.claimed.push(setting.number);
                self.pipe = Some(Pipe {
                    interface: setting.number,
                    endpoint,
                });
                info!(
                    "Interface {} (alt {}) claimed, response pipe {:#04x}",
                    setting.number, setting.alternate, endpoint
                );
            }
            None if matches!(self.mode, ProductMode::Dfu | ProductMode::Wtf) => {
                debug!("No response pipe in {} mode", self.mode);
            }
            None => {
                return Err(IrecvError::DeviceConfig {
                    step: ConfigStep::FindPipe,
                    source: TransportError::Descriptor("no bulk IN endpoint above the control interface".into()),
                });
            }
        }

        Ok(())
    }

    /// Releases claimed interfaces, then the device handle. Safe to call any number of times.
    /// A failing release step is logged and the remaining steps still run.
    pub fn close(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            return;
        };
        info!("Closing connection...");

        for number in self.claimed.drain(..).rev() {
            if let Err(e) = transport.release_interface(number) {
                warn!("Failed to release interface {}: {}", number, e);
            }
        }
        if let Err(e) = transport.close() {
            warn!("Failed to close device: {}", e);
        }

        self.pipe = None;
        self.name = None;
        self.serial = None;
    }

    /// Issues a device reset and closes the session. The reset result is reported after the
    /// session has been released.
    pub fn reset(mut self) -> Result<(), IrecvError> {
        info!("Resetting device...");
        let result = self.transport_mut().and_then(|t| t.reset().map_err(IrecvError::from));
        self.close();
        result
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    pub fn mode(&self) -> ProductMode {
        self.mode
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Identity fields parsed from the serial string.
    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.serial.as_deref().map(DeviceIdentity::parse)
    }

    pub fn pipe(&self) -> Option<Pipe> {
        self.pipe
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn transport_mut(&mut self) -> Result<&mut T, IrecvError> {
        self.transport.as_mut().ok_or(IrecvError::SessionClosed)
    }

    /// Sends one host-to-device control request and checks that the whole payload went out.
    pub fn control_out(&mut self, setup: ControlSetup, data: &[u8]) -> Result<(), IrecvError> {
        let timeout = self.config.control_timeout;
        debug!(
            request_type = setup.request_type,
            request = setup.request,
            value = setup.value,
            len = data.len(),
            bytes = hex::encode(&data[..data.len().min(32)]),
            "Control out"
        );
        let written = self.transport_mut()?.control_out(setup, data, timeout)?;
        if written != data.len() {
            return Err(TransportError::ShortWrite {
                expected: data.len(),
                actual: written,
            }
            .into());
        }
        Ok(())
    }

    /// Sends one device-to-host control request. Returns the number of bytes read.
    pub fn control_in(&mut self, setup: ControlSetup, buf: &mut [u8]) -> Result<usize, IrecvError> {
        let timeout = self.config.control_timeout;
        let read = self.transport_mut()?.control_in(setup, buf, timeout)?;
        debug!(
            request_type = setup.request_type,
            request = setup.request,
            bytes = hex::encode(&buf[..read]),
            "Control in"
        );
        Ok(read)
    }
}

impl<T: Transport> Drop for DeviceSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}
