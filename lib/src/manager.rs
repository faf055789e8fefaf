// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Manager and secure channel collaborators
//!
//! The manager API resolves firmware and application metadata for a device,
//! the secure channel installs applications. Both are external services,
//! this module defines only the types and traits exchanged with them.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use ledger_dmk_apdu::{
    os::{AppEntry, OsVersion},
    DeviceModelId, FirmwareVersion,
};

use crate::{session::DeviceSession, Error};

/// Application catalog entry
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    pub version_id: u64,
    /// Application name, as reported by the device
    pub version_name: String,
    pub version: String,
    /// Binary size in bytes
    pub bytes: Option<u64>,
    pub hash: String,
    pub perso: String,
    pub firmware: String,
    pub firmware_key: String,
    pub delete: String,
    pub delete_key: String,
    /// Library application this one depends on
    pub parent_name: Option<String>,
    pub currency_id: Option<String>,
}

impl Application {
    /// Parsed application version
    pub fn firmware_version(&self) -> FirmwareVersion {
        FirmwareVersion::coerce(&self.version).unwrap_or_default()
    }
}

/// Firmware descriptor
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Firmware {
    pub id: u64,
    pub version: String,
    pub perso: Option<String>,
    pub firmware: Option<String>,
    pub firmware_key: Option<String>,
    pub hash: Option<String>,
}

/// Installed firmware and available update, if any
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirmwareUpdateContext {
    pub current_firmware: Firmware,
    pub available_update: Option<Firmware>,
}

/// Application metadata resolved from the installed application list
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationsMetadata {
    /// Catalog entries for the installed applications
    pub installed: Vec<Application>,
    /// Installed applications with a newer catalog version
    pub updates: Vec<Application>,
    /// Applications available for this device and firmware
    pub catalog: Vec<Application>,
}

/// Device metadata, cached in the session once fetched
#[derive(Clone, PartialEq, Debug, Default)]
pub struct DeviceMetadata {
    pub firmware_version: OsVersion,
    pub firmware_update_context: FirmwareUpdateContext,
    /// Applications as listed by the device
    pub installed_apps: Vec<AppEntry>,
    /// Catalog entries for the installed applications
    pub applications: Vec<Application>,
    pub applications_updates: Vec<Application>,
    pub catalog: Vec<Application>,
}

impl DeviceMetadata {
    /// Catalog entry by application name
    pub fn catalog_app(&self, name: &str) -> Option<&Application> {
        self.catalog.iter().find(|a| a.version_name == name)
    }

    /// Installed application by name
    pub fn installed_app(&self, name: &str) -> Option<&Application> {
        self.applications.iter().find(|a| a.version_name == name)
    }
}

/// Manager API collaborator
#[async_trait]
pub trait ManagerApi: Send + Sync {
    /// Resolve the installed firmware and any available update
    async fn firmware_update_context(
        &self,
        os_version: &OsVersion,
        model: DeviceModelId,
    ) -> anyhow::Result<FirmwareUpdateContext>;

    /// Resolve catalog metadata for the installed applications
    async fn applications_metadata(
        &self,
        installed: &[AppEntry],
        os_version: &OsVersion,
        model: DeviceModelId,
    ) -> anyhow::Result<ApplicationsMetadata>;
}

/// Events reported while installing an application
#[derive(Clone, PartialEq, Debug)]
pub enum SecureChannelEvent {
    /// Device identified by the secure channel
    DeviceId(String),
    /// Waiting for the user to allow the secure connection
    PermissionRequested,
    /// User allowed the secure connection
    PermissionGranted,
    /// Install progress in `0.0..=1.0`
    Progress(f32),
}

/// Secure channel collaborator
///
/// Implementations relay frames through [DeviceSession::exchange], so they
/// run under the same single-flight guarantee as other commands.
pub trait SecureChannel: Send + Sync {
    /// Install (or update) an application, the stream ends once the install completes
    fn install_app(
        &self,
        session: &DeviceSession,
        os_version: &OsVersion,
        app: &Application,
    ) -> BoxStream<'static, Result<SecureChannelEvent, Error>>;
}
