// Copyright (c) 2022-2023 The MobileCoin Foundation

use crate::{
    os::{ins, OS_CLA},
    Apdu, ApduBuilder, ApduHeader, ApduResponse, BuilderError, Command, CommandError,
    DeviceModelId,
};

/// Open an application by name
///
/// The device prompts the user for confirmation, so this command may be
/// pending for as long as the user takes to respond.
#[derive(Clone, PartialEq, Debug)]
pub struct OpenApp {
    pub app_name: String,
}

impl OpenApp {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Command for OpenApp {
    type Response = ();

    fn name(&self) -> &'static str {
        "OpenApp"
    }

    fn apdu(&self) -> Result<Apdu, BuilderError> {
        let mut b = ApduBuilder::new(ApduHeader::new(OS_CLA, ins::OPEN_APP, 0x00, 0x00));
        b.add_ascii_string(&self.app_name)?;
        Ok(b.build())
    }

    fn parse_response(
        &self,
        response: &ApduResponse,
        _model: DeviceModelId,
    ) -> Result<Self::Response, CommandError> {
        match response.is_success() {
            true => Ok(()),
            false => Err(self.status_error(response.status)),
        }
    }

    fn command_error(&self, status: u16) -> Option<&'static str> {
        match status {
            0x5501 => Some("Action refused on device"),
            0x670a => Some("No app name provided"),
            0x6807 => Some("Unknown application name"),
            0x6811 => Some("Application not supported on this device"),
            _ => None,
        }
    }
}
