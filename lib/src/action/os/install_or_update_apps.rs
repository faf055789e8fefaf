// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;

use ledger_dmk_apdu::DeviceModelId;

use super::{GetDeviceMetadata, GoToDashboard};
use crate::{
    action::{
        machine::{
            finish, not_invoked, run_sub, Cancelled, Context, MachineContext, Observer,
            StateMachine, Terminal, Transition,
        },
        map_refused, UserInteractionRequired,
    },
    api::InternalApi,
    manager::{Application, DeviceMetadata, SecureChannelEvent},
    task::{build_install_plan, predict_out_of_memory, ApplicationDependency},
    Error,
};

/// Install progress, reported while installing applications
#[derive(Clone, PartialEq, Debug, Default)]
pub struct InstallProgress {
    pub install_plan: Vec<Application>,
    pub already_installed: Vec<String>,
    pub missing_applications: Vec<String>,
    /// Index of the application being installed
    pub current_index: usize,
    /// Progress of the current install in `0.0..=1.0`
    pub current_progress: f32,
}

/// Intermediate value for install actions
#[derive(Clone, PartialEq, Debug, Default)]
pub struct InstallIntermediate {
    pub required_user_interaction: UserInteractionRequired,
    pub install_plan: Option<InstallProgress>,
}

/// Install result
#[derive(Clone, PartialEq, Debug, Default)]
pub struct InstallOrUpdateAppsOutput {
    pub successfully_installed: Vec<Application>,
    pub already_installed: Vec<String>,
    pub missing_applications: Vec<String>,
}

/// Install or update applications, along with their parent applications
#[derive(Clone, PartialEq, Debug, Default)]
pub struct InstallOrUpdateApps {
    pub applications: Vec<ApplicationDependency>,
    /// Report applications missing from the catalog rather than failing
    pub allow_missing_application: bool,
    pub unlock_timeout: Option<Duration>,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
    UpdateDeviceMetadata,
    InstallPlanCheck,
    BuildInstallPlan,
    PredictOutOfMemory,
    GoToDashboard,
    InstallApp,
    InstallAppCheck,
    Success,
    Error,
}

#[derive(Debug)]
pub struct Internal {
    model: DeviceModelId,
    metadata: Option<DeviceMetadata>,
    successfully_installed: Vec<Application>,
    error: Option<Error>,
}

impl InstallOrUpdateApps {
    pub fn new(applications: Vec<ApplicationDependency>, allow_missing_application: bool) -> Self {
        Self {
            applications,
            allow_missing_application,
            unlock_timeout: None,
        }
    }
}

#[async_trait]
impl StateMachine for InstallOrUpdateApps {
    type Output = InstallOrUpdateAppsOutput;
    type Intermediate = InstallIntermediate;
    type Internal = Internal;
    type State = State;

    fn name(&self) -> &'static str {
        "InstallOrUpdateApps"
    }

    fn initial(&self, api: &InternalApi) -> (State, MachineContext<Self>) {
        let internal = Internal {
            model: api.model(),
            metadata: None,
            successfully_installed: vec![],
            error: None,
        };

        (
            State::UpdateDeviceMetadata,
            Context::new(InstallIntermediate::default(), internal),
        )
    }

    fn enter(&self, state: State, ctx: &mut MachineContext<Self>) -> Transition<State> {
        let i = &mut ctx.internal;

        match state {
            // Metadata is refreshed again once installs complete
            State::InstallPlanCheck if ctx.intermediate.install_plan.is_some() => {
                Transition::Goto(State::Success)
            }
            State::InstallPlanCheck => Transition::Goto(State::BuildInstallPlan),
            State::BuildInstallPlan => {
                let plan = match &i.metadata {
                    Some(m) => build_install_plan(
                        m,
                        i.model,
                        &self.applications,
                        self.allow_missing_application,
                    ),
                    None => Err(Error::Unknown("Device metadata not fetched".to_string())),
                };

                match plan {
                    Ok(p) => {
                        let empty = p.install_plan.is_empty();

                        ctx.intermediate.install_plan = Some(InstallProgress {
                            install_plan: p.install_plan,
                            already_installed: p.already_installed,
                            missing_applications: p.missing_applications,
                            ..Default::default()
                        });

                        match empty {
                            true => Transition::Goto(State::Success),
                            false => Transition::Goto(State::PredictOutOfMemory),
                        }
                    }
                    Err(e) => {
                        i.error = Some(e);
                        Transition::Goto(State::Error)
                    }
                }
            }
            State::PredictOutOfMemory => {
                let oom = match (&i.metadata, &ctx.intermediate.install_plan) {
                    (Some(m), Some(p)) => predict_out_of_memory(m, i.model, &p.install_plan),
                    _ => false,
                };

                match oom {
                    true => {
                        i.error = Some(Error::OutOfMemory(
                            "Not enough memory for those applications".to_string(),
                        ));
                        Transition::Goto(State::Error)
                    }
                    false => Transition::Goto(State::GoToDashboard),
                }
            }
            State::InstallAppCheck if i.error.is_some() => Transition::Goto(State::Error),
            State::InstallAppCheck => match &ctx.intermediate.install_plan {
                Some(p) if p.current_index < p.install_plan.len() => {
                    Transition::Goto(State::InstallApp)
                }
                _ => Transition::Goto(State::UpdateDeviceMetadata),
            },
            State::UpdateDeviceMetadata | State::GoToDashboard | State::InstallApp => {
                Transition::Invoke
            }
            State::Success => Transition::Success,
            State::Error => Transition::Error,
        }
    }

    async fn invoke(
        &self,
        state: State,
        ctx: &mut MachineContext<Self>,
        api: &InternalApi,
        observer: &mut Observer<'_, InstallIntermediate>,
    ) -> Result<State, Cancelled> {
        let r = match state {
            State::UpdateDeviceMetadata => {
                let sub = GetDeviceMetadata::new(false, self.unlock_timeout);
                run_sub(&sub, api, observer, &mut ctx.intermediate, |p, s| {
                    p.required_user_interaction = s.required_user_interaction
                })
                .await?
                .map(|m| {
                    ctx.internal.metadata = Some(m);
                    State::InstallPlanCheck
                })
            }
            State::GoToDashboard => {
                let sub = GoToDashboard::new(self.unlock_timeout);
                run_sub(&sub, api, observer, &mut ctx.intermediate, |p, s| {
                    p.required_user_interaction = s.required_user_interaction
                })
                .await?
                .map(|_| {
                    // Installed applications change from here on
                    api.update_state(|s| s.metadata = None);
                    State::InstallApp
                })
            }
            State::InstallApp => self.install_app(ctx, api, observer).await?,
            _ => Err(not_invoked(self.name(), state)),
        };

        match r {
            Ok(s) => Ok(s),
            Err(e) => {
                ctx.internal.error = Some(e);
                Ok(State::Error)
            }
        }
    }

    fn output(
        &self,
        ctx: MachineContext<Self>,
        terminal: Terminal,
    ) -> Result<InstallOrUpdateAppsOutput, Error> {
        let out = match (terminal, ctx.intermediate.install_plan) {
            (Terminal::Success, Some(p)) => Some(InstallOrUpdateAppsOutput {
                successfully_installed: ctx.internal.successfully_installed,
                already_installed: p.already_installed,
                missing_applications: p.missing_applications,
            }),
            _ => None,
        };

        finish(self.name(), terminal, out, ctx.internal.error)
    }
}

impl InstallOrUpdateApps {
    /// Install the current application from the plan via the secure channel
    async fn install_app(
        &self,
        ctx: &mut MachineContext<Self>,
        api: &InternalApi,
        observer: &mut Observer<'_, InstallIntermediate>,
    ) -> Result<Result<State, Error>, Cancelled> {
        let (app, os) = match (&ctx.intermediate.install_plan, &ctx.internal.metadata) {
            (Some(p), Some(m)) => match p.install_plan.get(p.current_index) {
                Some(a) => (a.clone(), m.firmware_version.clone()),
                None => return Ok(Err(Error::Unknown("Install index out of range".to_string()))),
            },
            _ => return Ok(Err(Error::Unknown("No install plan".to_string()))),
        };

        let channel = match api.secure_channel() {
            Ok(c) => c,
            Err(e) => return Ok(Err(e)),
        };

        debug!("Installing {} {}", app.version_name, app.version);

        let mut events = channel.install_app(api.session(), &os, &app);

        while let Some(ev) = events.next().await {
            let ev = match ev {
                Ok(v) => v,
                Err(e) => {
                    ctx.intermediate.required_user_interaction = UserInteractionRequired::None;
                    return Ok(Err(map_refused(e)));
                }
            };

            match ev {
                SecureChannelEvent::DeviceId(id) => {
                    debug!("Secure channel device: {}", id);
                    continue;
                }
                SecureChannelEvent::PermissionRequested => {
                    ctx.intermediate.required_user_interaction =
                        UserInteractionRequired::AllowSecureConnection;
                }
                SecureChannelEvent::PermissionGranted => {
                    ctx.intermediate.required_user_interaction = UserInteractionRequired::None;
                    api.update_state(|s| s.is_secure_connection_allowed = true);
                }
                SecureChannelEvent::Progress(p) => {
                    if let Some(plan) = &mut ctx.intermediate.install_plan {
                        plan.current_progress = p;
                    }
                }
            }

            observer.notify(&ctx.intermediate)?;
        }

        ctx.intermediate.required_user_interaction = UserInteractionRequired::None;
        if let Some(plan) = &mut ctx.intermediate.install_plan {
            plan.current_index += 1;
            plan.current_progress = 0.0;
        }
        ctx.internal.successfully_installed.push(app);

        Ok(Ok(State::InstallAppCheck))
    }
}
