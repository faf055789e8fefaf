// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use ledger_dmk_apdu::os::{AppEntry, GetOsVersion, OsVersion};

use super::{GoToDashboard, ListApps};
use crate::{
    action::{
        machine::{
            finish, not_invoked, run_sub, Cancelled, Context, MachineContext, Observer,
            StateMachine, Terminal, Transition,
        },
        Interaction,
    },
    api::InternalApi,
    manager::{DeviceMetadata, FirmwareUpdateContext},
    Error,
};

/// Fetch firmware, installed application and catalog metadata
///
/// Metadata is cached in the session, the cached value is returned unless
/// `force_update` is set.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct GetDeviceMetadata {
    pub force_update: bool,
    pub unlock_timeout: Option<Duration>,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
    CacheCheck,
    GoToDashboard,
    GetOsVersion,
    GetFirmwareUpdateContext,
    ListApps,
    GetApplicationsMetadata,
    Success,
    Error,
}

#[derive(Debug, Default)]
pub struct Internal {
    os_version: Option<OsVersion>,
    firmware_update_context: Option<FirmwareUpdateContext>,
    installed_apps: Option<Vec<AppEntry>>,
    metadata: Option<DeviceMetadata>,
    error: Option<Error>,
}

impl GetDeviceMetadata {
    pub fn new(force_update: bool, unlock_timeout: Option<Duration>) -> Self {
        Self {
            force_update,
            unlock_timeout,
        }
    }
}

#[async_trait]
impl StateMachine for GetDeviceMetadata {
    type Output = DeviceMetadata;
    type Intermediate = Interaction;
    type Internal = Internal;
    type State = State;

    fn name(&self) -> &'static str {
        "GetDeviceMetadata"
    }

    fn initial(&self, api: &InternalApi) -> (State, MachineContext<Self>) {
        let internal = Internal {
            metadata: match self.force_update {
                true => None,
                false => api.state().metadata,
            },
            ..Default::default()
        };

        (State::CacheCheck, Context::new(Interaction::default(), internal))
    }

    fn enter(&self, state: State, ctx: &mut MachineContext<Self>) -> Transition<State> {
        match state {
            State::CacheCheck if ctx.internal.metadata.is_some() => {
                debug!("Using cached device metadata");
                Transition::Goto(State::Success)
            }
            State::CacheCheck => Transition::Goto(State::GoToDashboard),
            State::Success => Transition::Success,
            State::Error => Transition::Error,
            _ => Transition::Invoke,
        }
    }

    async fn invoke(
        &self,
        state: State,
        ctx: &mut MachineContext<Self>,
        api: &InternalApi,
        observer: &mut Observer<'_, Interaction>,
    ) -> Result<State, Cancelled> {
        let i = &mut ctx.internal;

        let r = match state {
            State::GoToDashboard => {
                let sub = GoToDashboard::new(self.unlock_timeout);
                run_sub(&sub, api, observer, &mut ctx.intermediate, |p, s| *p = *s)
                    .await?
                    .map(|_| State::GetOsVersion)
            }
            State::GetOsVersion => api.send_command(&GetOsVersion).await.map(|v| {
                api.update_state(|s| s.os_version = Some(v.clone()));
                i.os_version = Some(v);
                State::GetFirmwareUpdateContext
            }),
            State::GetFirmwareUpdateContext => match (api.manager(), &i.os_version) {
                (Ok(m), Some(os)) => m
                    .firmware_update_context(os, api.model())
                    .await
                    .map_err(Error::Manager)
                    .map(|c| {
                        i.firmware_update_context = Some(c);
                        State::ListApps
                    }),
                (Err(e), _) => Err(e),
                (_, None) => Err(Error::Unknown("No firmware version".to_string())),
            },
            State::ListApps => {
                let sub = ListApps::new(self.unlock_timeout);
                run_sub(&sub, api, observer, &mut ctx.intermediate, |p, s| *p = *s)
                    .await?
                    .map(|a| {
                        i.installed_apps = Some(a);
                        State::GetApplicationsMetadata
                    })
            }
            State::GetApplicationsMetadata => match (api.manager(), i.os_version.take()) {
                (Ok(m), Some(os)) => {
                    let installed = i.installed_apps.take().unwrap_or_default();

                    m.applications_metadata(&installed, &os, api.model())
                        .await
                        .map_err(Error::Manager)
                        .map(|a| {
                            let metadata = DeviceMetadata {
                                firmware_version: os,
                                firmware_update_context: i
                                    .firmware_update_context
                                    .take()
                                    .unwrap_or_default(),
                                installed_apps: installed,
                                applications: a.installed,
                                applications_updates: a.updates,
                                catalog: a.catalog,
                            };

                            api.update_state(|s| s.metadata = Some(metadata.clone()));
                            i.metadata = Some(metadata);
                            State::Success
                        })
                }
                (Err(e), _) => Err(e),
                (_, None) => Err(Error::Unknown("No firmware version".to_string())),
            },
            _ => Err(not_invoked(self.name(), state)),
        };

        match r {
            Ok(s) => Ok(s),
            Err(e) => {
                i.error = Some(e);
                Ok(State::Error)
            }
        }
    }

    fn output(&self, ctx: MachineContext<Self>, terminal: Terminal) -> Result<DeviceMetadata, Error> {
        let out = match terminal {
            Terminal::Success => ctx.internal.metadata,
            Terminal::Error => None,
        };

        finish(self.name(), terminal, out, ctx.internal.error)
    }
}
