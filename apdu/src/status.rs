// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Status words and command errors

use num_enum::TryFromPrimitive;
use strum::{Display, EnumIter};

use crate::{BuilderError, ParserError};

/// Success status word
pub const SW_SUCCESS: u16 = 0x9000;

/// Status words shared by all commands
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, EnumIter, TryFromPrimitive)]
#[repr(u16)]
pub enum GlobalError {
    ActionRefused = 0x5501,
    PinNotSet = 0x5502,
    DeviceLocked = 0x5515,
    DeviceInternal = 0x5223,
    WrongLength = 0x6700,
    SecurityStatusNotSatisfied = 0x6982,
    ConditionsNotSatisfied = 0x6985,
    InvalidData = 0x6a80,
    IncorrectParameters = 0x6b00,
    InsNotSupported = 0x6d00,
    ClaNotSupported = 0x6e00,
}

impl GlobalError {
    /// Human readable description
    pub fn message(&self) -> &'static str {
        match self {
            GlobalError::ActionRefused => "Action refused on device",
            GlobalError::PinNotSet => "PIN not set",
            GlobalError::DeviceLocked => "Device is locked",
            GlobalError::DeviceInternal => "Device internal error",
            GlobalError::WrongLength => "Wrong length",
            GlobalError::SecurityStatusNotSatisfied => "Security status not satisfied",
            GlobalError::ConditionsNotSatisfied => "Conditions of use not satisfied",
            GlobalError::InvalidData => "Invalid data",
            GlobalError::IncorrectParameters => "Incorrect parameters",
            GlobalError::InsNotSupported => "Instruction not supported",
            GlobalError::ClaNotSupported => "Class not supported",
        }
    }
}

/// Errors returned when sending or parsing a command
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum CommandError {
    /// Status word from the shared table
    #[error("{kind} ({status:#06x})")]
    Global { status: u16, kind: GlobalError },

    /// Status word specific to the command
    #[error("{message} ({status:#06x})")]
    Command { status: u16, message: &'static str },

    /// Status word not known for this command
    #[error("unexpected status word {0:#06x}")]
    UnknownStatus(u16),

    /// Success response with a malformed payload
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Frame could not be encoded
    #[error("encoding failed: {0}")]
    Encoding(#[from] BuilderError),

    /// Response could not be decoded
    #[error("decoding failed: {0}")]
    Decoding(#[from] ParserError),
}

impl CommandError {
    /// Map a failure status word using the shared table
    pub fn from_status(status: u16) -> Self {
        match GlobalError::try_from(status) {
            Ok(kind) => CommandError::Global { status, kind },
            Err(_) => CommandError::UnknownStatus(status),
        }
    }

    /// Status word carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            CommandError::Global { status, .. } | CommandError::Command { status, .. } => {
                Some(*status)
            }
            CommandError::UnknownStatus(status) => Some(*status),
            _ => None,
        }
    }

    /// Check whether the device reported it is locked
    pub fn is_locked(&self) -> bool {
        self.status() == Some(GlobalError::DeviceLocked as u16)
    }

    /// Check whether the user refused the action on device
    pub fn is_refused(&self) -> bool {
        self.status() == Some(GlobalError::ActionRefused as u16)
    }
}
