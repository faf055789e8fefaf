// Copyright (c) 2022-2023 The MobileCoin Foundation

use ledger_dmk_apdu::{BuilderError, CommandError};
use tokio::time::error::Elapsed;

use crate::{task::path::PathError, transport::TransportError};

/// Ledger device management error type
///
/// Shared by commands, chunked transfers and device actions, so a failure at any
/// layer reaches the caller in the same form.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Request timeout
    #[error("Timeout waiting for device response")]
    RequestTimeout,

    /// Command encoding or status word error
    #[error("Command failed: {0}")]
    Command(#[from] CommandError),

    /// Invalid derivation path
    #[error("Invalid derivation path: {0}")]
    Path(#[from] PathError),

    /// Device is locked and was not unlocked in time
    #[error("Device is locked")]
    DeviceLocked,

    /// Device has not been set up
    #[error("Device is not onboarded")]
    DeviceNotOnboarded,

    /// User refused the operation on device
    #[error("Operation rejected by user")]
    RefusedByUser,

    /// Firmware does not support the requested operation
    #[error("Unsupported firmware: {0}")]
    UnsupportedFirmware(String),

    /// Application is not available for this device
    #[error("Unsupported application: {0}")]
    UnsupportedApplication(String),

    /// Not enough storage for the requested applications
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Manager API failure
    #[error("Manager API error: {0}")]
    Manager(anyhow::Error),

    /// Secure channel failure
    #[error("Secure channel error: {0}")]
    SecureChannel(String),

    /// Session or action misconfiguration
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal defect, should never be observed
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Check whether the device reported it is locked
    pub fn is_locked(&self) -> bool {
        match self {
            Error::DeviceLocked => true,
            Error::Command(e) => e.is_locked(),
            _ => false,
        }
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::RequestTimeout
    }
}

impl From<BuilderError> for Error {
    fn from(e: BuilderError) -> Self {
        Error::Command(CommandError::Encoding(e))
    }
}
