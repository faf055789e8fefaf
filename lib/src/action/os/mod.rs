// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Built-in device actions
//!
//! These use operating system commands along with the manager and secure
//! channel collaborators, and are composed to build application level actions.

use ledger_dmk_apdu::{os::AppAndVersion, DASHBOARD_APP_NAME};

mod get_device_status;
pub use get_device_status::{DeviceStatusOutput, GetDeviceStatus};

mod go_to_dashboard;
pub use go_to_dashboard::GoToDashboard;

mod open_app;
pub use open_app::OpenApp;

mod list_apps;
pub use list_apps::{ListApps, LIST_APPS_PAGE_LEN};

mod call_task_in_app;
pub use call_task_in_app::{
    AppTask, CallTaskInApp, CallTaskIntermediate, CallTaskStep, CommandTask, SendCommandInApp,
};

mod get_device_metadata;
pub use get_device_metadata::GetDeviceMetadata;

mod install_or_update_apps;
pub use install_or_update_apps::{
    InstallIntermediate, InstallOrUpdateApps, InstallOrUpdateAppsOutput, InstallProgress,
};

mod open_app_with_dependencies;
pub use open_app_with_dependencies::{OpenAppWithDependencies, OpenAppWithDependenciesOutput};

/// Session record for the dashboard, after closing an application
pub(crate) fn dashboard_app() -> AppAndVersion {
    AppAndVersion {
        name: DASHBOARD_APP_NAME.to_string(),
        ..Default::default()
    }
}
