// Copyright (c) 2022-2023 The MobileCoin Foundation

use crate::{
    os::{ins, BOLOS_CLA},
    Apdu, ApduHeader, ApduResponse, BuilderError, Command, CommandError, DeviceModelId,
    DASHBOARD_APP_NAME,
};

/// Fetch the running application name and version
///
/// Served by the dashboard as well as by applications.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct GetAppAndVersion;

/// Running application information
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    FORMAT     |   NAME_LEN    |            NAME...            /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  VERSION_LEN  |                  VERSION...                   /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  FLAGS_LEN    |                   FLAGS...  (optional)        /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct AppAndVersion {
    pub name: String,
    pub version: String,
    pub flags: Option<Vec<u8>>,
}

impl AppAndVersion {
    /// Check whether the dashboard is running rather than an application
    pub fn is_dashboard(&self) -> bool {
        self.name == DASHBOARD_APP_NAME
    }
}

impl Command for GetAppAndVersion {
    type Response = AppAndVersion;

    fn name(&self) -> &'static str {
        "GetAppAndVersion"
    }

    fn apdu(&self) -> Result<Apdu, BuilderError> {
        Ok(Apdu::new(ApduHeader::new(
            BOLOS_CLA,
            ins::GET_APP_AND_VERSION,
            0x00,
            0x00,
        )))
    }

    fn parse_response(
        &self,
        response: &ApduResponse,
        _model: DeviceModelId,
    ) -> Result<Self::Response, CommandError> {
        if !response.is_success() {
            return Err(self.status_error(response.status));
        }

        let mut p = response.parser();

        let format = p.extract_u8()?;
        if format != 1 {
            return Err(CommandError::InvalidResponse(format!(
                "unsupported format: {format}"
            )));
        }

        let name = p.extract_string_lv()?.to_string();
        let version = p.extract_string_lv()?.to_string();
        let flags = p.extract_field_lv().ok().map(|f| f.to_vec());

        Ok(AppAndVersion {
            name,
            version,
            flags,
        })
    }
}
