//! Driver for the BluePill SWD probe.
//!
//! The probe firmware runs on an STM32F103 "Blue Pill" board and bit-bangs SWD on
//! SWDIO = B12, SWCLK = B13 with nRST on B0. It exposes a single vendor interface with
//! one bulk endpoint pair carrying the frames described in [`protocol`].

mod protocol;

use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};

use self::protocol::{Command, Response, SwdRequest, RESPONSE_LEN};
use super::{DebugProbeError, PortType, SwdTransport, TransferError};
use crate::config::UsbConfig;

/// A bidirectional bulk pipe to the probe.
pub trait BulkPipe {
    /// Sends one complete request, returning the number of bytes written.
    fn write(&mut self, data: &[u8]) -> Result<usize, DebugProbeError>;

    /// Receives one response into `buffer`, returning the number of bytes read.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, DebugProbeError>;
}

/// The USB bulk pipe of a BluePill probe.
pub struct UsbPipe {
    handle: DeviceHandle<Context>,
    interface: u8,
    endpoint_out: u8,
    endpoint_in: u8,
    timeout: Duration,
}

impl UsbPipe {
    /// Opens the first device matching the configured VID/PID and claims its interface.
    pub fn open(config: &UsbConfig) -> Result<Self, DebugProbeError> {
        let context = Context::new()?;

        tracing::debug!("Acquired libusb context.");

        let device = context
            .devices()?
            .iter()
            .find(|device| match device.device_descriptor() {
                Ok(descriptor) => {
                    descriptor.vendor_id() == config.vendor_id
                        && descriptor.product_id() == config.product_id
                }
                Err(_) => false,
            })
            .ok_or(DebugProbeError::ProbeNotFound {
                vendor_id: config.vendor_id,
                product_id: config.product_id,
            })?;

        let descriptor = device.config_descriptor(0)?;
        for endpoint in [config.endpoint_out, config.endpoint_in] {
            let present = descriptor
                .interfaces()
                .filter(|interface| interface.number() == config.interface)
                .flat_map(|interface| interface.descriptors())
                .flat_map(|setting| setting.endpoint_descriptors().collect::<Vec<_>>())
                .any(|ep| ep.address() == endpoint);

            if !present {
                return Err(DebugProbeError::EndpointNotFound(endpoint));
            }
        }

        let handle = device.open()?;

        tracing::debug!("Aquired handle for probe");

        handle.set_active_configuration(config.configuration)?;
        handle.claim_interface(config.interface)?;

        tracing::debug!("Claimed interface {} of USB device.", config.interface);

        Ok(Self {
            handle,
            interface: config.interface,
            endpoint_out: config.endpoint_out,
            endpoint_in: config.endpoint_in,
            timeout: config.timeout(),
        })
    }
}

impl BulkPipe for UsbPipe {
    fn write(&mut self, data: &[u8]) -> Result<usize, DebugProbeError> {
        Ok(self
            .handle
            .write_bulk(self.endpoint_out, data, self.timeout)?)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, DebugProbeError> {
        Ok(self
            .handle
            .read_bulk(self.endpoint_in, buffer, self.timeout)?)
    }
}

impl Drop for UsbPipe {
    fn drop(&mut self) {
        // We ignore the error case as we can't do much about it anyways.
        let _ = self.handle.release_interface(self.interface);
    }
}

/// A BluePill probe reachable through a [`BulkPipe`].
pub struct BluePill<P = UsbPipe> {
    pipe: P,
}

impl BluePill<UsbPipe> {
    /// Opens the probe on the USB bus and checks that it answers.
    pub fn open(config: &UsbConfig) -> Result<Self, TransferError> {
        let mut probe = BluePill::new(UsbPipe::open(config)?);
        probe.ping()?;

        tracing::debug!("Succesfully attached to BluePill.");

        Ok(probe)
    }
}

impl<P: BulkPipe> BluePill<P> {
    /// Wraps an already opened pipe.
    pub fn new(pipe: P) -> Self {
        Self { pipe }
    }

    /// Gives back the underlying pipe.
    pub fn into_inner(self) -> P {
        self.pipe
    }

    fn execute(&mut self, command: Command) -> Result<Option<u32>, TransferError> {
        let frame = command.to_bytes().map_err(DebugProbeError::from)?;

        tracing::trace!("> {:?} {:02x?}", command, frame);

        let written = self.pipe.write(&frame)?;
        if written != frame.len() {
            return Err(DebugProbeError::RequestIncomplete {
                expected: frame.len(),
                written,
            }
            .into());
        }

        let mut response = [0u8; RESPONSE_LEN];
        let received = self.pipe.read(&mut response)?;

        tracing::trace!("< {:02x?}", &response[..received]);

        let response = Response::parse(&response[..received])?;

        Ok(response.data)
    }

    /// Checks that the probe firmware answers.
    pub fn ping(&mut self) -> Result<(), TransferError> {
        self.execute(Command::Ping)?;
        Ok(())
    }

    /// Enables or releases the SWJ pins.
    pub fn configure_swj(&mut self, enabled: bool) -> Result<(), TransferError> {
        self.execute(Command::ConfigureSwj { enabled })?;
        Ok(())
    }

    /// Sends the JTAG-to-SWD switch sequence.
    pub fn switch_to_swd(&mut self) -> Result<(), TransferError> {
        self.execute(Command::SwitchToSwd)?;
        Ok(())
    }

    /// Drives the auxiliary GPIO pins as outputs, or releases them.
    pub fn configure_gpio(&mut self, enabled: bool) -> Result<(), TransferError> {
        self.execute(Command::ConfigureGpio { enabled })?;
        Ok(())
    }

    /// Sets the state of the four auxiliary GPIO pins, one bit per pin.
    pub fn set_gpio(&mut self, states: u8) -> Result<(), TransferError> {
        self.execute(Command::SetGpio {
            states: states & 0x0F,
        })?;
        Ok(())
    }

    /// Brings the SWD link up: ping, enable SWJ and switch the line to SWD.
    pub fn connect_swd(&mut self) -> Result<(), TransferError> {
        tracing::info!("Switching the target to SWD");

        self.ping()?;
        self.configure_swj(true)?;
        self.switch_to_swd()
    }

    fn read(&mut self, port: PortType, register: u8) -> Result<u32, TransferError> {
        let request = SwdRequest {
            port,
            read: true,
            register,
        };

        self.execute(Command::Read(request))?
            .ok_or_else(|| DebugProbeError::MissingReadData.into())
    }

    fn write(&mut self, port: PortType, register: u8, value: u32) -> Result<(), TransferError> {
        let request = SwdRequest {
            port,
            read: false,
            register,
        };

        self.execute(Command::Write(request, value))?;
        Ok(())
    }
}

impl<P: BulkPipe> SwdTransport for BluePill<P> {
    fn dp_read(&mut self, register: u8) -> Result<u32, TransferError> {
        self.read(PortType::DebugPort, register)
    }

    fn dp_write(&mut self, register: u8, value: u32) -> Result<(), TransferError> {
        self.write(PortType::DebugPort, register, value)
    }

    fn ap_read(&mut self, register: u8) -> Result<u32, TransferError> {
        self.read(PortType::AccessPort, register)
    }

    fn ap_write(&mut self, register: u8, value: u32) -> Result<(), TransferError> {
        self.write(PortType::AccessPort, register, value)
    }
}
