//! All the interface bits for ARM.

#[macro_use]
mod register_generation;

pub mod ap;
pub mod dp;
pub mod memory;

pub use register_generation::{BitRegister, Field, FieldValue};

use crate::probe::{DebugProbeError, SwdAck, TransferError};

pub use ap::{AccessPort, DataSize, MemoryAp};
pub use dp::DebugPort;

/// An error in the ADIv5 protocol layers.
#[derive(Debug, thiserror::Error)]
pub enum ArmError {
    #[error("An error with the usage of the probe occured")]
    Probe(#[source] DebugProbeError),
    #[error("The target answered with {0} (code {})", .0.code())]
    Ack(SwdAck),
    /// The READOK bit in CTRL/STAT was clear after a posted AP read.
    ///
    /// The data of that read must be discarded and STICKYERR cleared through ABORT
    /// before the access port is used again.
    #[error("The posted AP read did not complete, READOK is clear")]
    ReadNotValid,
    #[error("Invalid use of the access port")]
    Configuration(#[from] ConfigurationError),
    #[error("Failed to access address {address:#010x} as it is not aligned to the requirement of {alignment} bytes.")]
    MemoryNotAligned { address: u32, alignment: usize },
    #[error("Timeout while waiting for the debug port")]
    Timeout,
}

impl ArmError {
    /// The SWD acknowledgement carried by this error, if the target answered with one.
    pub fn ack(&self) -> Option<SwdAck> {
        match self {
            ArmError::Ack(ack) => Some(*ack),
            _ => None,
        }
    }

    pub(crate) fn alignment_error(address: u32, alignment: usize) -> Self {
        ArmError::MemoryNotAligned { address, alignment }
    }
}

impl From<TransferError> for ArmError {
    fn from(error: TransferError) -> Self {
        match error {
            TransferError::Probe(e) => ArmError::Probe(e),
            TransferError::Ack(ack) => ArmError::Ack(ack),
        }
    }
}

impl From<DebugProbeError> for ArmError {
    fn from(error: DebugProbeError) -> Self {
        ArmError::Probe(error)
    }
}

/// A capability was invoked outside of its declared range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{0:#05b} is not a valid CSW size code")]
    InvalidDataSize(u8),
    #[error("Byte laning does not support {0:?} accesses")]
    UnsupportedDataSize(DataSize),
}
