// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::time::Duration;

use async_trait::async_trait;

use ledger_dmk_apdu::{
    os::{CloseApp, GetAppAndVersion},
    DASHBOARD_APP_NAME,
};

use super::GetDeviceStatus;
use crate::{
    action::{
        machine::{
            finish, not_invoked, run_sub, Cancelled, Context, MachineContext, Observer,
            StateMachine, Terminal, Transition,
        },
        Interaction,
    },
    api::InternalApi,
    Error,
};

/// Return to the dashboard, closing the running application if required
#[derive(Clone, PartialEq, Debug, Default)]
pub struct GoToDashboard {
    pub unlock_timeout: Option<Duration>,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
    DeviceStatus,
    DashboardCheck,
    CloseApp,
    GetAppAndVersion,
    Success,
    Error,
}

#[derive(Debug, Default)]
pub struct Internal {
    current_app: Option<String>,
    closed: bool,
    error: Option<Error>,
}

impl GoToDashboard {
    pub fn new(unlock_timeout: Option<Duration>) -> Self {
        Self { unlock_timeout }
    }
}

#[async_trait]
impl StateMachine for GoToDashboard {
    type Output = ();
    type Intermediate = Interaction;
    type Internal = Internal;
    type State = State;

    fn name(&self) -> &'static str {
        "GoToDashboard"
    }

    fn initial(&self, _api: &InternalApi) -> (State, MachineContext<Self>) {
        (State::DeviceStatus, Context::default())
    }

    fn enter(&self, state: State, ctx: &mut MachineContext<Self>) -> Transition<State> {
        let i = &mut ctx.internal;

        match state {
            State::DashboardCheck if i.error.is_some() => Transition::Goto(State::Error),
            State::DashboardCheck => match i.current_app.as_deref() {
                Some(DASHBOARD_APP_NAME) => Transition::Goto(State::Success),
                Some(_) if !i.closed => Transition::Goto(State::CloseApp),
                Some(a) => {
                    i.error = Some(Error::InvalidState(format!("Failed to close {a}")));
                    Transition::Goto(State::Error)
                }
                None => {
                    i.error = Some(Error::Unknown("No current application".to_string()));
                    Transition::Goto(State::Error)
                }
            },
            State::DeviceStatus | State::CloseApp | State::GetAppAndVersion => Transition::Invoke,
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
        let next = match state {
            State::DeviceStatus => {
                let sub = GetDeviceStatus::new(self.unlock_timeout);
                let r = run_sub(&sub, api, observer, &mut ctx.intermediate, |p, s| *p = *s).await?;

                match r {
                    Ok(s) => ctx.internal.current_app = Some(s.current_app),
                    Err(e) => ctx.internal.error = Some(e),
                }
                State::DashboardCheck
            }
            State::CloseApp => match api.send_command(&CloseApp).await {
                Ok(_) => {
                    ctx.internal.closed = true;
                    State::GetAppAndVersion
                }
                Err(e) => {
                    ctx.internal.error = Some(e);
                    State::Error
                }
            },
            State::GetAppAndVersion => {
                match api.send_command(&GetAppAndVersion).await {
                    Ok(app) => {
                        ctx.internal.current_app = Some(app.name.clone());
                        api.update_state(|s| s.current_app = Some(app));
                    }
                    Err(e) => ctx.internal.error = Some(e),
                }
                State::DashboardCheck
            }
            _ => {
                ctx.internal.error = Some(not_invoked(self.name(), state));
                State::Error
            }
        };

        Ok(next)
    }

    fn output(&self, ctx: MachineContext<Self>, terminal: Terminal) -> Result<(), Error> {
        let out = match terminal {
            Terminal::Success => Some(()),
            Terminal::Error => None,
        };

        finish(self.name(), terminal, out, ctx.internal.error)
    }
}

