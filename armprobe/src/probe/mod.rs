//! Debug probe abstraction.
//!
//! The ADIv5 layers only need a probe to carry single SWD transfers. This module
//! defines that capability ([`SwdTransport`]) together with the errors a transfer
//! can end with.

pub mod bluepill;
pub mod fake_probe;

use std::fmt;

/// An error that occured in the probe or on the way to it.
#[derive(Debug, thiserror::Error)]
pub enum DebugProbeError {
    #[error("USB Communication Error")]
    Usb(#[from] rusb::Error),
    #[error("No probe with VID {vendor_id:#06x} and PID {product_id:#06x} was found")]
    ProbeNotFound { vendor_id: u16, product_id: u16 },
    #[error("The probe does not expose endpoint {0:#04x}")]
    EndpointNotFound(u8),
    #[error("Only {written} of {expected} bytes of the request were sent")]
    RequestIncomplete { expected: usize, written: usize },
    #[error("Response too short: expected at least {expected} bytes, received {actual}")]
    ResponseTooShort { expected: usize, actual: usize },
    #[error("The answer to a read carries no data word")]
    MissingReadData,
    #[error("Response carries an invalid tag {0:#010x}")]
    InvalidTag(u32),
    #[error("The probe reported error status {0}")]
    ProbeStatus(u8),
    #[error("Failed to encode or decode a probe frame")]
    Codec(#[from] scroll::Error),
}

/// The acknowledgement a target answers an SWD request header with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwdAck {
    /// The transfer was accepted.
    Ok,
    /// The target is busy, the same transfer may be retried later.
    Wait,
    /// A sticky error flag is set in the debug port.
    Fault,
    /// Anything else, including line errors where no target answered.
    Other(u8),
}

impl SwdAck {
    /// Decodes a raw acknowledgement as reported by the probe.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => SwdAck::Ok,
            2 => SwdAck::Wait,
            4 => SwdAck::Fault,
            other => SwdAck::Other(other),
        }
    }

    /// The raw acknowledgement code.
    pub fn code(self) -> u8 {
        match self {
            SwdAck::Ok => 1,
            SwdAck::Wait => 2,
            SwdAck::Fault => 4,
            SwdAck::Other(code) => code,
        }
    }
}

impl fmt::Display for SwdAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwdAck::Ok => write!(f, "OK"),
            SwdAck::Wait => write!(f, "WAIT"),
            SwdAck::Fault => write!(f, "FAULT"),
            SwdAck::Other(code) => write!(f, "unknown acknowledgement {code}"),
        }
    }
}

/// The outcome of a failed SWD transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("The probe failed to carry out the transfer")]
    Probe(#[from] DebugProbeError),
    #[error("The target answered the transfer with {0}")]
    Ack(SwdAck),
}

/// Which port of the SWD-DP a transfer addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortType {
    DebugPort,
    AccessPort,
}

/// A probe which can carry single SWD transfers to a target.
///
/// `register` is the two bit register index A\[3:2\] of the SWD request. For the access
/// port it selects a register inside the bank chosen by the DP SELECT register.
///
/// AP reads are posted: the value returned by [`SwdTransport::ap_read`] is the result
/// of the previous AP read, not of the one just issued.
pub trait SwdTransport {
    fn dp_read(&mut self, register: u8) -> Result<u32, TransferError>;

    fn dp_write(&mut self, register: u8, value: u32) -> Result<(), TransferError>;

    fn ap_read(&mut self, register: u8) -> Result<u32, TransferError>;

    fn ap_write(&mut self, register: u8, value: u32) -> Result<(), TransferError>;
}

impl<T: SwdTransport + ?Sized> SwdTransport for &mut T {
    fn dp_read(&mut self, register: u8) -> Result<u32, TransferError> {
        (**self).dp_read(register)
    }

    fn dp_write(&mut self, register: u8, value: u32) -> Result<(), TransferError> {
        (**self).dp_write(register, value)
    }

    fn ap_read(&mut self, register: u8) -> Result<u32, TransferError> {
        (**self).ap_read(register)
    }

    fn ap_write(&mut self, register: u8, value: u32) -> Result<(), TransferError> {
        (**self).ap_write(register, value)
    }
}

impl<T: SwdTransport + ?Sized> SwdTransport for Box<T> {
    fn dp_read(&mut self, register: u8) -> Result<u32, TransferError> {
        (**self).dp_read(register)
    }

    fn dp_write(&mut self, register: u8, value: u32) -> Result<(), TransferError> {
        (**self).dp_write(register, value)
    }

    fn ap_read(&mut self, register: u8) -> Result<u32, TransferError> {
        (**self).ap_read(register)
    }

    fn ap_write(&mut self, register: u8, value: u32) -> Result<(), TransferError> {
        (**self).ap_write(register, value)
    }
}
