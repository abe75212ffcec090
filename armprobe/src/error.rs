use crate::architecture::arm::ArmError;
use crate::config::ConfigError;
use crate::probe::DebugProbeError;
use thiserror::Error;

/// The overall error type of the crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("An error with the usage of the probe occured")]
    Probe(#[from] DebugProbeError),
    #[error("An ARM debug interface specific error occured")]
    Arm(#[from] ArmError),
    #[error("The configuration could not be loaded")]
    Config(#[from] ConfigError),
    #[error("An I/O error occured")]
    Io(#[from] std::io::Error),
}

impl From<crate::probe::TransferError> for Error {
    fn from(error: crate::probe::TransferError) -> Self {
        match error {
            crate::probe::TransferError::Probe(e) => Error::Probe(e),
            ack @ crate::probe::TransferError::Ack(_) => Error::Arm(ack.into()),
        }
    }
}
