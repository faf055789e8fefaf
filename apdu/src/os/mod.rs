// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Operating system commands
//!
//! These are served by the dashboard (and in part by any running application)
//! and are used to inspect device state and to open, close and enumerate applications.

mod get_app_and_version;
pub use get_app_and_version::{AppAndVersion, GetAppAndVersion};

mod get_os_version;
pub use get_os_version::{GetOsVersion, OsVersion, SecureElementFlags};

mod open_app;
pub use open_app::OpenApp;

mod close_app;
pub use close_app::CloseApp;

mod list_apps;
pub use list_apps::{AppEntry, ListApps};

/// Class used by commands served by both the OS and applications
pub const BOLOS_CLA: u8 = 0xb0;

/// Class used by dashboard commands
pub const OS_CLA: u8 = 0xe0;

/// Instruction codes, scoped by class
pub mod ins {
    /// Fetch running application name and version ([BOLOS_CLA](super::BOLOS_CLA))
    pub const GET_APP_AND_VERSION: u8 = 0x01;

    /// Exit the running application ([BOLOS_CLA](super::BOLOS_CLA))
    pub const CLOSE_APP: u8 = 0xa7;

    /// Fetch OS version ([OS_CLA](super::OS_CLA))
    pub const GET_OS_VERSION: u8 = 0x01;

    /// Open an application by name ([OS_CLA](super::OS_CLA))
    pub const OPEN_APP: u8 = 0xd8;

    /// Fetch the first page of installed applications ([OS_CLA](super::OS_CLA))
    pub const LIST_APPS: u8 = 0xde;

    /// Fetch following pages of installed applications ([OS_CLA](super::OS_CLA))
    pub const LIST_APPS_CONTINUE: u8 = 0xdf;
}
