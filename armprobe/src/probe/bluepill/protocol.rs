//! Wire format of the BluePill probe firmware.
//!
//! Every command is a single 12 byte bulk OUT transfer, answered by a single bulk IN
//! transfer of up to 12 bytes. All multi byte fields are little endian.

use scroll::{Pread, Pwrite, LE};

use crate::probe::{DebugProbeError, PortType, SwdAck, TransferError};

/// Marker word at the start of every request and response.
pub(crate) const TAG: u32 = 0xDEAD_BABE;

/// Size of an encoded request.
pub(crate) const REQUEST_LEN: usize = 12;

/// Largest response the firmware sends.
pub(crate) const RESPONSE_LEN: usize = 12;

/// Response bytes up to and including the probe status.
const STATUS_LEN: usize = 5;

/// Response bytes up to and including the SWD acknowledgement.
const ACK_LEN: usize = 6;

/// Offset of the data word in a read response.
const DATA_OFFSET: usize = 8;

/// A single command understood by the probe firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Ping,
    ConfigureSwj { enabled: bool },
    SwitchToSwd,
    Read(SwdRequest),
    Write(SwdRequest, u32),
    ConfigureGpio { enabled: bool },
    SetGpio { states: u8 },
}

impl Command {
    fn opcode(&self) -> u8 {
        match self {
            Command::Ping => 0,
            Command::ConfigureSwj { .. } => 1,
            Command::SwitchToSwd => 2,
            Command::Read(_) => 3,
            Command::Write(..) => 4,
            Command::ConfigureGpio { .. } => 5,
            Command::SetGpio { .. } => 6,
        }
    }

    fn param8(&self) -> u8 {
        match self {
            Command::Ping | Command::SwitchToSwd => 0,
            Command::ConfigureSwj { enabled } | Command::ConfigureGpio { enabled } => {
                u8::from(*enabled)
            }
            Command::Read(request) | Command::Write(request, _) => request.to_byte(),
            Command::SetGpio { states } => *states,
        }
    }

    fn param32(&self) -> u32 {
        match self {
            Command::Write(_, value) => *value,
            _ => 0,
        }
    }

    /// Serializes the command into a request frame.
    pub(crate) fn to_bytes(&self) -> Result<[u8; REQUEST_LEN], scroll::Error> {
        let mut frame = [0u8; REQUEST_LEN];

        frame.pwrite_with(TAG, 0, LE)?;
        frame.pwrite_with(self.opcode(), 4, LE)?;
        frame.pwrite_with(self.param8(), 5, LE)?;
        // param16 is not used by any command.
        frame.pwrite_with(0u16, 6, LE)?;
        frame.pwrite_with(self.param32(), 8, LE)?;

        Ok(frame)
    }
}

/// The packet header of a single SWD transfer, minus start, parity, stop and park bits
/// which the firmware adds itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SwdRequest {
    pub port: PortType,
    pub read: bool,
    /// Register index A\[3:2\].
    pub register: u8,
}

impl SwdRequest {
    pub(crate) fn to_byte(self) -> u8 {
        let ap = u8::from(self.port == PortType::AccessPort);
        ap | (u8::from(self.read) << 1) | ((self.register & 0x3) << 2)
    }
}

/// A response which passed all checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Response {
    /// The data word, only present in answers to reads.
    pub data: Option<u32>,
}

impl Response {
    /// Validates and decodes a response frame.
    pub(crate) fn parse(frame: &[u8]) -> Result<Response, TransferError> {
        if frame.len() < STATUS_LEN {
            return Err(DebugProbeError::ResponseTooShort {
                expected: STATUS_LEN,
                actual: frame.len(),
            }
            .into());
        }

        let tag: u32 = frame.pread_with(0, LE).map_err(DebugProbeError::from)?;
        if tag != TAG {
            return Err(DebugProbeError::InvalidTag(tag).into());
        }

        let status: u8 = frame.pread_with(4, LE).map_err(DebugProbeError::from)?;
        if status != 0 {
            return Err(DebugProbeError::ProbeStatus(status).into());
        }

        if frame.len() < ACK_LEN {
            return Ok(Response { data: None });
        }

        let ack = SwdAck::from_code(frame[ACK_LEN - 1]);
        if ack != SwdAck::Ok {
            return Err(TransferError::Ack(ack));
        }

        let data = if frame.len() >= DATA_OFFSET + 4 {
            Some(frame.pread_with(DATA_OFFSET, LE).map_err(DebugProbeError::from)?)
        } else {
            None
        };

        Ok(Response { data })
    }
}
