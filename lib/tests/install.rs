// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};

use ledger_dmk::{
    action::os::{
        GetDeviceMetadata, InstallIntermediate, InstallOrUpdateApps, OpenAppWithDependencies,
        LIST_APPS_PAGE_LEN,
    },
    apdu::{
        os::{ins, AppEntry, OsVersion},
        DeviceModelId, DASHBOARD_APP_NAME,
    },
    execute,
    manager::{
        Application, ApplicationsMetadata, Firmware, FirmwareUpdateContext, ManagerApi,
        SecureChannel, SecureChannelEvent,
    },
    task::ApplicationDependency,
    DeviceActionState, DeviceSession, Error, InternalApi, UserInteractionRequired,
};

mod helpers;
use helpers::*;

fn catalog_app(name: &str, bytes: u64, parent: Option<&str>) -> Application {
    Application {
        version_name: name.to_string(),
        version: "1.10.3".to_string(),
        bytes: Some(bytes),
        parent_name: parent.map(|p| p.to_string()),
        ..Default::default()
    }
}

/// Manager resolving installed applications from a fixed catalog
#[derive(Clone)]
struct MockManager {
    catalog: Vec<Application>,
    update: Option<Firmware>,
}

impl MockManager {
    fn new() -> Self {
        Self {
            catalog: vec![
                catalog_app("Bitcoin", 40 * 1024, None),
                catalog_app("Ethereum", 64 * 1024, None),
                catalog_app("Polygon", 8 * 1024, Some("Ethereum")),
                catalog_app("Huge", 4 * 1024 * 1024, None),
            ],
            update: None,
        }
    }
}

#[async_trait]
impl ManagerApi for MockManager {
    async fn firmware_update_context(
        &self,
        os_version: &OsVersion,
        _model: DeviceModelId,
    ) -> anyhow::Result<FirmwareUpdateContext> {
        Ok(FirmwareUpdateContext {
            current_firmware: Firmware {
                version: os_version.se_version.clone(),
                ..Default::default()
            },
            available_update: self.update.clone(),
        })
    }

    async fn applications_metadata(
        &self,
        installed: &[AppEntry],
        _os_version: &OsVersion,
        _model: DeviceModelId,
    ) -> anyhow::Result<ApplicationsMetadata> {
        let installed = self
            .catalog
            .iter()
            .filter(|a| installed.iter().any(|i| i.name == a.version_name))
            .cloned()
            .collect();

        Ok(ApplicationsMetadata {
            installed,
            updates: vec![],
            catalog: self.catalog.clone(),
        })
    }
}

/// Secure channel recording installed applications
#[derive(Clone, Default)]
struct MockSecureChannel {
    installed: Arc<Mutex<Vec<String>>>,
    refuse: bool,
}

impl SecureChannel for MockSecureChannel {
    fn install_app(
        &self,
        _session: &DeviceSession,
        _os_version: &OsVersion,
        app: &Application,
    ) -> BoxStream<'static, Result<SecureChannelEvent, Error>> {
        self.installed.lock().unwrap().push(app.version_name.clone());

        let events = match self.refuse {
            true => vec![
                Ok(SecureChannelEvent::PermissionRequested),
                Err(Error::RefusedByUser),
            ],
            false => vec![
                Ok(SecureChannelEvent::DeviceId("0001".to_string())),
                Ok(SecureChannelEvent::PermissionRequested),
                Ok(SecureChannelEvent::PermissionGranted),
                Ok(SecureChannelEvent::Progress(0.5)),
                Ok(SecureChannelEvent::Progress(1.0)),
            ],
        };

        futures::stream::iter(events).boxed()
    }
}

/// Queue responses for fetching metadata with `installed` applications
fn respond_metadata(t: &MockTransport, installed: &[(&str, u16)]) {
    // Dashboard check, firmware, dashboard check for listing, then the list
    t.respond_app(DASHBOARD_APP_NAME)
        .respond_hex(NANO_X_OS_VERSION, SW_OK)
        .respond_app(DASHBOARD_APP_NAME);

    for page in installed.chunks(LIST_APPS_PAGE_LEN) {
        t.respond(&list_apps_page(page), SW_OK);
    }

    // A full last page is followed by an empty one
    if installed.len() % LIST_APPS_PAGE_LEN == 0 {
        t.respond(&[], SW_OK);
    }
}

/// Number of ListApps sequences started
fn list_apps_requests(t: &MockTransport) -> usize {
    t.sent_ins().iter().filter(|i| **i == ins::LIST_APPS).count()
}

fn api(t: &MockTransport, sc: &MockSecureChannel) -> InternalApi {
    InternalApi::new(t.session())
        .with_manager(MockManager::new())
        .with_secure_channel(sc.clone())
}

#[tokio::test]
async fn device_metadata_cached() {
    setup();

    let t = MockTransport::new();
    respond_metadata(&t, &[("Bitcoin", 10)]);

    let api = api(&t, &MockSecureChannel::default());

    let m = execute(GetDeviceMetadata::default(), api.clone())
        .result()
        .await
        .unwrap();

    assert_eq!(m.firmware_version.se_version, "2.2.3");
    assert_eq!(m.firmware_update_context.current_firmware.version, "2.2.3");
    assert_eq!(m.installed_apps.len(), 1);
    assert_eq!(m.applications.len(), 1);
    assert_eq!(m.catalog.len(), 4);
    assert_eq!(api.state().metadata.as_ref(), Some(&m));

    // Cached metadata is returned without device interaction
    let n = t.sent().len();
    let cached = execute(GetDeviceMetadata::default(), api).result().await.unwrap();

    assert_eq!(cached, m);
    assert_eq!(t.sent().len(), n);
}

#[tokio::test]
async fn device_metadata_requires_manager() {
    setup();

    let t = MockTransport::new();
    t.respond_app(DASHBOARD_APP_NAME)
        .respond_hex(NANO_X_OS_VERSION, SW_OK);

    let r = execute(GetDeviceMetadata::default(), InternalApi::new(t.session()))
        .result()
        .await;

    assert!(matches!(r, Err(Error::InvalidState(_))), "{r:?}");
}

#[tokio::test]
async fn install_with_parent() {
    setup();

    let t = MockTransport::new();
    respond_metadata(&t, &[("Bitcoin", 10)]);
    // Dashboard check prior to installing
    t.respond_app(DASHBOARD_APP_NAME);
    respond_metadata(&t, &[("Bitcoin", 10), ("Ethereum", 16), ("Polygon", 2)]);

    let sc = MockSecureChannel::default();
    let a = InstallOrUpdateApps::new(
        vec![
            ApplicationDependency::new("Bitcoin"),
            ApplicationDependency::new("Polygon"),
        ],
        false,
    );

    let api = api(&t, &sc);
    let mut h = execute(a, api.clone());

    let mut states: Vec<InstallIntermediate> = vec![];
    let out = loop {
        match h.next_state().await {
            Some(DeviceActionState::Pending(s)) => states.push(s),
            Some(DeviceActionState::Completed(o)) => break o,
            s => panic!("unexpected state: {s:?}"),
        }
    };

    // Parent installed ahead of the requested application
    assert_eq!(*sc.installed.lock().unwrap(), vec!["Ethereum", "Polygon"]);

    let names: Vec<_> = out
        .successfully_installed
        .iter()
        .map(|a| a.version_name.as_str())
        .collect();
    assert_eq!(names, vec!["Ethereum", "Polygon"]);
    assert_eq!(out.already_installed, vec!["Bitcoin"]);
    assert!(out.missing_applications.is_empty());

    // Install progress and permission are reported
    assert!(states.iter().any(|s| s.required_user_interaction
        == UserInteractionRequired::AllowSecureConnection));
    assert!(states.iter().any(|s| matches!(
        &s.install_plan,
        Some(p) if p.current_index == 1 && p.current_progress == 0.5
    )));

    assert!(api.state().is_secure_connection_allowed);
    assert_eq!(
        api.state().metadata.map(|m| m.installed_apps.len()),
        Some(3)
    );
    assert_eq!(t.remaining(), 0);
}

#[tokio::test]
async fn install_nothing_required() {
    setup();

    let t = MockTransport::new();
    respond_metadata(&t, &[("Ethereum", 16)]);

    let sc = MockSecureChannel::default();
    let a = InstallOrUpdateApps::new(
        vec![
            ApplicationDependency::new("Ethereum"),
            ApplicationDependency::new("Unknown"),
        ],
        true,
    );

    let out = execute(a, api(&t, &sc)).result().await.unwrap();

    assert!(out.successfully_installed.is_empty());
    assert_eq!(out.already_installed, vec!["Ethereum"]);
    assert_eq!(out.missing_applications, vec!["Unknown"]);
    assert!(sc.installed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn install_missing_application() {
    setup();

    let t = MockTransport::new();
    respond_metadata(&t, &[]);

    let a = InstallOrUpdateApps::new(vec![ApplicationDependency::new("Unknown")], false);

    let r = execute(a, api(&t, &MockSecureChannel::default()))
        .result()
        .await;

    assert!(matches!(r, Err(Error::UnsupportedApplication(_))), "{r:?}");
}

#[tokio::test]
async fn install_out_of_memory() {
    setup();

    let t = MockTransport::new();
    respond_metadata(&t, &[]);

    let sc = MockSecureChannel::default();
    let a = InstallOrUpdateApps::new(vec![ApplicationDependency::new("Huge")], false);

    let r = execute(a, api(&t, &sc)).result().await;

    assert!(matches!(r, Err(Error::OutOfMemory(_))), "{r:?}");
    assert!(sc.installed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn install_refused() {
    setup();

    let t = MockTransport::new();
    respond_metadata(&t, &[]);
    t.respond_app(DASHBOARD_APP_NAME);

    let sc = MockSecureChannel {
        refuse: true,
        ..Default::default()
    };
    let a = InstallOrUpdateApps::new(vec![ApplicationDependency::new("Ethereum")], false);

    let api = api(&t, &sc);
    let r = execute(a, api.clone()).result().await;

    assert!(matches!(r, Err(Error::RefusedByUser)), "{r:?}");
    assert!(!api.state().is_secure_connection_allowed);
    assert_eq!(*sc.installed.lock().unwrap(), vec!["Ethereum"]);
}

#[tokio::test]
async fn open_with_dependencies() {
    setup();

    let t = MockTransport::new();
    // Metadata, nothing to install, then open the application
    respond_metadata(&t, &[("Ethereum", 16), ("Polygon", 2)]);
    t.respond_app(DASHBOARD_APP_NAME)
        .respond(&[], SW_OK)
        .respond_app("Polygon");

    let a = OpenAppWithDependencies::new(
        ApplicationDependency::new("Polygon"),
        vec![ApplicationDependency::new("Ethereum")],
    );

    let out = execute(a, api(&t, &MockSecureChannel::default()))
        .result()
        .await
        .unwrap();

    assert_eq!(out.device_metadata.installed_apps.len(), 2);
    assert!(out.install_result.successfully_installed.is_empty());
    assert_eq!(out.install_result.already_installed, vec!["Ethereum", "Polygon"]);

    let sent = t.sent_ins();
    assert_eq!(sent[sent.len() - 2], ins::OPEN_APP);
    assert_eq!(t.remaining(), 0);

    // Installed applications are only listed once
    assert_eq!(list_apps_requests(&t), 1);
}

#[tokio::test]
async fn install_uses_cached_metadata() {
    setup();

    let t = MockTransport::new();
    respond_metadata(&t, &[("Ethereum", 16)]);

    let sc = MockSecureChannel::default();
    let api = api(&t, &sc);

    execute(GetDeviceMetadata::default(), api.clone())
        .result()
        .await
        .unwrap();
    let n = t.sent().len();

    let a = InstallOrUpdateApps::new(vec![ApplicationDependency::new("Ethereum")], false);
    let states = execute(a, api).collect::<Vec<_>>().await;

    // Nothing to install, the device is not queried again
    assert_eq!(t.sent().len(), n);
    assert_eq!(list_apps_requests(&t), 1);
    assert!(!states.iter().any(|s| matches!(
        s,
        DeviceActionState::Pending(i)
            if i.required_user_interaction == UserInteractionRequired::AllowListApps
    )));
    match states.last() {
        Some(DeviceActionState::Completed(o)) => {
            assert_eq!(o.already_installed, vec!["Ethereum"])
        }
        s => panic!("unexpected state: {s:?}"),
    }
}

#[tokio::test]
async fn open_with_dependencies_outdated_firmware() {
    setup();

    let t = MockTransport::new();
    respond_metadata(&t, &[]);

    let mut manager = MockManager::new();
    manager.update = Some(Firmware {
        version: "2.3.0".to_string(),
        ..Default::default()
    });

    let api = InternalApi::new(t.session())
        .with_manager(manager)
        .with_secure_channel(MockSecureChannel::default());

    let a = OpenAppWithDependencies::new(ApplicationDependency::new("Ethereum"), vec![])
        .require_latest_firmware(true);

    let r = execute(a, api).result().await;

    assert!(matches!(r, Err(Error::UnsupportedFirmware(_))), "{r:?}");
}
