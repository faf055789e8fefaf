// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Generic command definition

use crate::{Apdu, ApduResponse, BuilderError, CommandError, DeviceModelId};

/// A command pairs a request frame with the parser for its response
pub trait Command: Send + Sync {
    /// Decoded response value
    type Response: Send + 'static;

    /// Command name, used for logging
    fn name(&self) -> &'static str;

    /// Build the request frame
    fn apdu(&self) -> Result<Apdu, BuilderError>;

    /// Decode a response frame for the provided device model
    fn parse_response(
        &self,
        response: &ApduResponse,
        model: DeviceModelId,
    ) -> Result<Self::Response, CommandError>;

    /// Command specific status word descriptions
    fn command_error(&self, _status: u16) -> Option<&'static str> {
        None
    }

    /// Map a failure status word, command specific entries take precedence
    fn status_error(&self, status: u16) -> CommandError {
        match self.command_error(status) {
            Some(message) => CommandError::Command { status, message },
            None => CommandError::from_status(status),
        }
    }
}

/// Prebuilt frame returning the raw response payload
#[derive(Clone, PartialEq, Debug)]
pub struct RawCommand {
    pub apdu: Apdu,
}

impl RawCommand {
    pub fn new(apdu: Apdu) -> Self {
        Self { apdu }
    }
}

impl Command for RawCommand {
    type Response = Vec<u8>;

    fn name(&self) -> &'static str {
        "RawCommand"
    }

    fn apdu(&self) -> Result<Apdu, BuilderError> {
        Ok(self.apdu.clone())
    }

    fn parse_response(
        &self,
        response: &ApduResponse,
        _model: DeviceModelId,
    ) -> Result<Self::Response, CommandError> {
        if !response.is_success() {
            return Err(self.status_error(response.status));
        }

        Ok(response.data.clone())
    }
}
