// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::time::Duration;

use async_trait::async_trait;

use super::{
    GetDeviceMetadata, InstallIntermediate, InstallOrUpdateApps, InstallOrUpdateAppsOutput,
    OpenApp,
};
use crate::{
    action::machine::{
        finish, not_invoked, run_sub, Cancelled, Context, MachineContext, Observer, StateMachine,
        Terminal, Transition,
    },
    api::InternalApi,
    manager::DeviceMetadata,
    task::ApplicationDependency,
    Error,
};

/// Install an application and its dependencies if required, then open it
#[derive(Clone, PartialEq, Debug, Default)]
pub struct OpenAppWithDependencies {
    pub application: ApplicationDependency,
    /// Applications installed ahead of the target application
    pub dependencies: Vec<ApplicationDependency>,
    /// Fail if a firmware update is available
    pub require_latest_firmware: bool,
    pub unlock_timeout: Option<Duration>,
}

/// Metadata and install result for [OpenAppWithDependencies]
#[derive(Clone, PartialEq, Debug)]
pub struct OpenAppWithDependenciesOutput {
    pub device_metadata: DeviceMetadata,
    pub install_result: InstallOrUpdateAppsOutput,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
    GetDeviceMetadata,
    FirmwareCheck,
    InstallOrUpdateApps,
    OpenApp,
    Success,
    Error,
}

#[derive(Debug, Default)]
pub struct Internal {
    metadata: Option<DeviceMetadata>,
    install_result: Option<InstallOrUpdateAppsOutput>,
    error: Option<Error>,
}

impl OpenAppWithDependencies {
    pub fn new(application: ApplicationDependency, dependencies: Vec<ApplicationDependency>) -> Self {
        Self {
            application,
            dependencies,
            ..Default::default()
        }
    }

    pub fn require_latest_firmware(mut self, require: bool) -> Self {
        self.require_latest_firmware = require;
        self
    }
}

#[async_trait]
impl StateMachine for OpenAppWithDependencies {
    type Output = OpenAppWithDependenciesOutput;
    type Intermediate = InstallIntermediate;
    type Internal = Internal;
    type State = State;

    fn name(&self) -> &'static str {
        "OpenAppWithDependencies"
    }

    fn initial(&self, _api: &InternalApi) -> (State, MachineContext<Self>) {
        (State::GetDeviceMetadata, Context::default())
    }

    fn enter(&self, state: State, ctx: &mut MachineContext<Self>) -> Transition<State> {
        let i = &mut ctx.internal;

        match state {
            State::FirmwareCheck => {
                let outdated = i
                    .metadata
                    .as_ref()
                    .map(|m| m.firmware_update_context.available_update.is_some())
                    .unwrap_or(false);

                if self.require_latest_firmware && outdated {
                    i.error = Some(Error::UnsupportedFirmware(
                        "Firmware is not the latest version".to_string(),
                    ));
                    Transition::Goto(State::Error)
                } else {
                    Transition::Goto(State::InstallOrUpdateApps)
                }
            }
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
        observer: &mut Observer<'_, InstallIntermediate>,
    ) -> Result<State, Cancelled> {
        let i = &mut ctx.internal;

        let r = match state {
            State::GetDeviceMetadata => {
                let sub = GetDeviceMetadata::new(false, self.unlock_timeout);
                run_sub(&sub, api, observer, &mut ctx.intermediate, |p, s| {
                    p.required_user_interaction = s.required_user_interaction
                })
                .await?
                .map(|m| {
                    i.metadata = Some(m);
                    State::FirmwareCheck
                })
            }
            State::InstallOrUpdateApps => {
                let mut applications = self.dependencies.clone();
                applications.push(self.application.clone());

                let sub = InstallOrUpdateApps {
                    applications,
                    allow_missing_application: false,
                    unlock_timeout: self.unlock_timeout,
                };

                let r = run_sub(&sub, api, observer, &mut ctx.intermediate, |p, s| *p = s.clone())
                    .await?;

                // Installs refresh the session metadata
                if let Some(m) = api.state().metadata {
                    i.metadata = Some(m);
                }

                r.map(|o| {
                    i.install_result = Some(o);
                    State::OpenApp
                })
            }
            State::OpenApp => {
                let sub = OpenApp::new(&self.application.name);
                run_sub(&sub, api, observer, &mut ctx.intermediate, |p, s| {
                    p.required_user_interaction = s.required_user_interaction
                })
                .await?
                .map(|_| State::Success)
            }
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

    fn output(
        &self,
        ctx: MachineContext<Self>,
        terminal: Terminal,
    ) -> Result<OpenAppWithDependenciesOutput, Error> {
        let i = ctx.internal;

        let out = match (terminal, i.metadata, i.install_result) {
            (Terminal::Success, Some(device_metadata), Some(install_result)) => {
                Some(OpenAppWithDependenciesOutput {
                    device_metadata,
                    install_result,
                })
            }
            _ => None,
        };

        finish(self.name(), terminal, out, i.error)
    }
}
