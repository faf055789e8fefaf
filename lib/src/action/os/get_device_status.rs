// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::time::Instant;

use ledger_dmk_apdu::os::{AppAndVersion, GetAppAndVersion};

use crate::{
    action::{
        machine::{
            finish, not_invoked, Cancelled, Context, MachineContext, Observer, StateMachine,
            Terminal, Transition,
        },
        Interaction, UserInteractionRequired,
    },
    api::InternalApi,
    session::DeviceStatus,
    Error,
};

/// Fetch the running application, waiting for the user to unlock the device if required
#[derive(Clone, PartialEq, Debug, Default)]
pub struct GetDeviceStatus {
    /// Time allowed to unlock the device, the session default when unset
    pub unlock_timeout: Option<Duration>,
}

/// Running application name and version
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DeviceStatusOutput {
    pub current_app: String,
    pub current_app_version: String,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
    OnboardingCheck,
    AppAndVersion,
    AppAndVersionCheck,
    UnlockDevice,
    Success,
    Error,
}

#[derive(Debug)]
pub struct Internal {
    onboarded: bool,
    locked: bool,
    unlock_timeout: Duration,
    unlock_poll: Duration,
    current_app: Option<AppAndVersion>,
    error: Option<Error>,
}

impl GetDeviceStatus {
    pub fn new(unlock_timeout: Option<Duration>) -> Self {
        Self { unlock_timeout }
    }
}

/// Record a fetched application in the context and session
fn record_app(ctx: &mut MachineContext<GetDeviceStatus>, api: &InternalApi, app: AppAndVersion) {
    api.update_state(|s| {
        s.status = DeviceStatus::Ready;
        s.current_app = Some(app.clone());
    });
    ctx.internal.locked = false;
    ctx.internal.current_app = Some(app);
}

#[async_trait]
impl StateMachine for GetDeviceStatus {
    type Output = DeviceStatusOutput;
    type Intermediate = Interaction;
    type Internal = Internal;
    type State = State;

    fn name(&self) -> &'static str {
        "GetDeviceStatus"
    }

    fn initial(&self, api: &InternalApi) -> (State, MachineContext<Self>) {
        let internal = Internal {
            onboarded: api.state().is_onboarded(),
            locked: false,
            unlock_timeout: self
                .unlock_timeout
                .unwrap_or_else(|| api.config().unlock_timeout()),
            unlock_poll: api.config().unlock_poll(),
            current_app: None,
            error: None,
        };

        (
            State::OnboardingCheck,
            Context::new(Interaction::default(), internal),
        )
    }

    fn enter(&self, state: State, ctx: &mut MachineContext<Self>) -> Transition<State> {
        let i = &mut ctx.internal;

        match state {
            State::OnboardingCheck if i.onboarded => Transition::Goto(State::AppAndVersion),
            State::OnboardingCheck => {
                i.error = Some(Error::DeviceNotOnboarded);
                Transition::Goto(State::Error)
            }
            State::AppAndVersion => Transition::Invoke,
            State::AppAndVersionCheck if i.error.is_some() => Transition::Goto(State::Error),
            State::AppAndVersionCheck if i.locked => Transition::Goto(State::UnlockDevice),
            State::AppAndVersionCheck => Transition::Goto(State::Success),
            State::UnlockDevice => {
                ctx.intermediate.required_user_interaction = UserInteractionRequired::UnlockDevice;
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
        observer: &mut Observer<'_, Interaction>,
    ) -> Result<State, Cancelled> {
        match state {
            State::AppAndVersion => match api.send_command(&GetAppAndVersion).await {
                Ok(app) => record_app(ctx, api, app),
                Err(e) if e.is_locked() => ctx.internal.locked = true,
                Err(e) => ctx.internal.error = Some(e),
            },
            State::UnlockDevice => {
                let deadline = Instant::now() + ctx.internal.unlock_timeout;

                loop {
                    if Instant::now() + ctx.internal.unlock_poll > deadline {
                        debug!("Device not unlocked in time");
                        ctx.internal.error = Some(Error::DeviceLocked);
                        break;
                    }

                    tokio::time::sleep(ctx.internal.unlock_poll).await;

                    match api.send_command(&GetAppAndVersion).await {
                        Ok(app) => {
                            record_app(ctx, api, app);
                            break;
                        }
                        Err(e) if e.is_locked() => {
                            debug!("Waiting for device unlock");
                            observer.notify(&ctx.intermediate)?;
                        }
                        Err(e) => {
                            ctx.internal.error = Some(e);
                            break;
                        }
                    }
                }

                ctx.intermediate.required_user_interaction = UserInteractionRequired::None;
                ctx.internal.locked = false;
            }
            _ => {
                ctx.internal.error = Some(not_invoked(self.name(), state));
                return Ok(State::Error);
            }
        }

        Ok(State::AppAndVersionCheck)
    }

    fn output(&self, ctx: MachineContext<Self>, terminal: Terminal) -> Result<Self::Output, Error> {
        let out = ctx.internal.current_app.map(|a| DeviceStatusOutput {
            current_app: a.name,
            current_app_version: a.version,
        });

        finish(self.name(), terminal, out, ctx.internal.error)
    }
}
