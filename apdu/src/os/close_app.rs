// Copyright (c) 2022-2023 The MobileCoin Foundation

use crate::{
    os::{ins, BOLOS_CLA},
    Apdu, ApduHeader, ApduResponse, BuilderError, Command, CommandError, DeviceModelId,
};

/// Exit the running application, returning to the dashboard
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct CloseApp;

impl Command for CloseApp {
    type Response = ();

    fn name(&self) -> &'static str {
        "CloseApp"
    }

    fn apdu(&self) -> Result<Apdu, BuilderError> {
        Ok(Apdu::new(ApduHeader::new(BOLOS_CLA, ins::CLOSE_APP, 0x00, 0x00)))
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
}
